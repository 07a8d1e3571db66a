//! LMDB database integrity checks.
//!
//! Run by [`LmdbEnvironment::open_verified`](crate::LmdbEnvironment::open_verified)
//! on startup, before the indexer starts writing.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::Env;

use crate::environment::{META_DB, RECORDS_DB};
use crate::key::KEY_LEN;
use crate::LmdbError;

/// Summary of an integrity check run.
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

const EXPECTED_DATABASES: &[&str] = &[RECORDS_DB, META_DB];

/// Check LMDB database integrity.
///
/// Counts entries in every expected database and verifies that record keys
/// have the fixed composite length. Read failures are recorded in the report
/// rather than causing a hard error.
pub fn check_integrity(env: &Arc<Env>) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
                if db_name == RECORDS_DB {
                    let iter = match db.iter(&rtxn) {
                        Ok(iter) => iter,
                        Err(e) => {
                            report.errors.push(format!("failed to scan records: {}", e));
                            continue;
                        }
                    };
                    for entry in iter {
                        match entry {
                            Ok((key, _)) if key.len() != KEY_LEN => report
                                .errors
                                .push(format!("record key of length {}", key.len())),
                            Ok(_) => {}
                            Err(e) => {
                                report.errors.push(format!("failed to scan records: {}", e));
                                break;
                            }
                        }
                    }
                }
            }
            // Not created yet: a fresh store.
            Ok(None) => {}
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent or empty) directory. Returns an
/// error if the directory holds other files but no `data.mdb`.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    let is_empty = fs::read_dir(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?
        .next()
        .is_none();
    if !data_file.exists() && !is_empty {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
