use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModemError {
    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("No decoder candidate passed the CRC check")]
    DecodeFailure,
}

pub type Result<T> = std::result::Result<T, ModemError>;
