use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("unknown referendum variant tag {0:#04x}")]
    UnknownVariant(u8),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("SCALE decode failed: {0}")]
    Scale(String),
}

impl From<parity_scale_codec::Error> for DecodeError {
    fn from(e: parity_scale_codec::Error) -> Self {
        DecodeError::Scale(e.to_string())
    }
}

impl From<hex::FromHexError> for DecodeError {
    fn from(e: hex::FromHexError) -> Self {
        DecodeError::Hex(e.to_string())
    }
}
