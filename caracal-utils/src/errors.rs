//! Errors surfaced by the model checker.

use thiserror::Error;

/// Convenience wrapper to represent success or a meaningful checker error.
pub type CaracalResult<T> = std::result::Result<T, Error>;

/// Errors surfaced by the model checker.
#[derive(Error, Debug)]
pub enum Error {
    /// The AIG file is malformed.
    #[error("aiger parse error: {0}")]
    AigerParse(String),

    /// The circuit carries a property kind the checker does not handle:
    /// zero or multiple bad signals, justice, or fairness.
    #[error("unsupported property: {0}")]
    UnsupportedProperty(String),

    /// The SAT back-end gave up without a verdict. Fatal for the run.
    #[error("sat solver returned unknown")]
    SatUnknown,

    /// Fresh variable allocation ran past the signed id space.
    #[error("variable id space exhausted (last id {0})")]
    IdOverflow(i64),

    /// Wrapper for I/O failures while reading circuits or writing witnesses.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn aiger_parse<S: ToString>(msg: S) -> Self {
        Error::AigerParse(msg.to_string())
    }

    pub fn unsupported<S: ToString>(msg: S) -> Self {
        Error::UnsupportedProperty(msg.to_string())
    }
}
