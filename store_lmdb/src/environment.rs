//! LMDB environment setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::integrity::{check_data_dir, check_integrity};
use crate::migration::Migrator;
use crate::{LmdbError, LmdbMetaStore, LmdbReferendumStore};

pub const RECORDS_DB: &str = "records";
pub const META_DB: &str = "meta";

/// Default map size: 1 GiB is far more than any governance history needs.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
const MAX_DBS: u32 = 4;

/// Wraps the LMDB environment and all database handles.
#[derive(Debug)]
pub struct LmdbEnvironment {
    path: PathBuf,
    env: Arc<Env>,
    records_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path
        // and never mapped by anything else concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let records_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(RECORDS_DB))?;
        let meta_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        Ok(Self {
            path: path.to_path_buf(),
            env: Arc::new(env),
            records_db,
            meta_db,
        })
    }

    /// Open with default sizing and bring the schema up to date.
    pub fn open_and_migrate(path: &Path) -> Result<Self, LmdbError> {
        let env = Self::open(path, MAX_DBS, DEFAULT_MAP_SIZE)?;
        Migrator::run(&env.meta_store())?;
        info!(path = %path.display(), "store opened");
        Ok(env)
    }

    /// Check the directory, open and migrate, then verify every database.
    ///
    /// Refuses to hand out a store whose records fail verification.
    pub fn open_verified(path: &Path) -> Result<Self, LmdbError> {
        check_data_dir(path).map_err(LmdbError::Integrity)?;
        let env = Self::open_and_migrate(path)?;
        let report = check_integrity(env.env())?;
        if !report.is_healthy() {
            return Err(LmdbError::Integrity(report.errors.join("; ")));
        }
        info!(
            databases = report.databases_checked,
            entries = report.total_entries,
            "integrity check passed"
        );
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn referendum_store(&self) -> LmdbReferendumStore {
        LmdbReferendumStore {
            env: Arc::clone(&self.env),
            records_db: self.records_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_open_of_fresh_and_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        drop(LmdbEnvironment::open_verified(&path).unwrap());
        let env = LmdbEnvironment::open_verified(&path).unwrap();
        assert_eq!(env.path(), path.as_path());
    }

    #[test]
    fn verified_open_rejects_malformed_record_key() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open_and_migrate(dir.path()).unwrap();
            let mut wtxn = env.env().write_txn().unwrap();
            env.records_db.put(&mut wtxn, &[0u8, 1, 2][..], &[][..]).unwrap();
            wtxn.commit().unwrap();
        }
        let err = LmdbEnvironment::open_verified(dir.path()).unwrap_err();
        assert!(matches!(err, LmdbError::Integrity(ref msg) if msg.contains("length 3")));
    }

    #[test]
    fn verified_open_rejects_foreign_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a store").unwrap();
        assert!(matches!(
            LmdbEnvironment::open_verified(dir.path()),
            Err(LmdbError::Integrity(_))
        ));
    }
}
