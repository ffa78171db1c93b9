//! Error types for evolink
//!
//! This module defines all error types used throughout the library, plus
//! the setup-time error sink that accumulates configuration problems and
//! reports them in one batch.

use thiserror::Error;

/// Error type for configuration and setup failures
///
/// Every variant names the parameter path or the configured value that
/// caused the failure, so a bad run dies with an actionable message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    /// A required parameter was missing
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A parameter was present but could not be parsed
    #[error("Bad value for parameter {path}: {message}")]
    BadParameter { path: String, message: String },

    /// An unknown class tag was given for a registry lookup
    #[error("Unknown class tag {tag:?} for parameter {path}")]
    UnknownTag { path: String, tag: String },

    /// Invalid (mu, lambda) configuration
    #[error("Bad ES configuration for {path}: {message}")]
    BadEsConfiguration { path: String, message: String },

    /// Invalid objective bounds
    #[error("For objective {objective} the min fitness must be strictly less than the max fitness")]
    BadObjectiveBounds { objective: usize },

    /// Several setup errors, gathered by an [`ErrorSink`]
    #[error("{} setup error(s):\n{}", .0.len(), format_errors(.0))]
    Multiple(Vec<SetupError>),
}

fn format_errors(errors: &[SetupError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Error type for breeding failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BreedError {
    /// A subpopulation was smaller than its mu
    #[error("Subpopulation {subpop} has {size} individuals but mu is {mu}")]
    SubpopulationTooSmall {
        subpop: usize,
        size: usize,
        mu: usize,
    },

    /// The population shape does not match the breeder configuration
    #[error("Population has {actual} subpopulations but the breeder was configured for {expected}")]
    SubpopulationCountMismatch { expected: usize, actual: usize },

    /// A pipeline did not produce the requested number of individuals
    #[error("Breeding pipeline for subpopulation {subpop} produced {produced} individuals, expected exactly 1")]
    WrongProductionCount { subpop: usize, produced: usize },

    /// A pipeline invoked the ES selector other than exactly once
    #[error("Breeding pipeline for subpopulation {subpop} used the ES selector {uses} times, expected exactly once")]
    EsSelectionMisuse { subpop: usize, uses: usize },

    /// A pipeline produced an individual of the wrong species
    #[error("Breeding pipeline for subpopulation {subpop} produced an individual of the wrong species")]
    WrongSpecies { subpop: usize },
}

/// Error type for the individual/fitness codec
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream did not contain what the prototype expects
    #[error("Malformed stream: {0}")]
    Malformed(String),

    /// A text token had the wrong type prefix
    #[error("Expected a {expected} token, found {found:?}")]
    WrongToken { expected: &'static str, found: String },

    /// String payload was not valid UTF-8
    #[error("Invalid UTF-8 in string payload")]
    InvalidUtf8,
}

/// Error type for the slave protocol runtime
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O failure on the master connection
    #[error("I/O error on master connection: {0}")]
    Io(#[from] std::io::Error),

    /// Codec failure while reading or writing protocol bodies
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The master sent an opcode this slave does not understand
    #[error("Unknown problem form specified: {0}")]
    UnknownOpcode(u8),

    /// Connecting or handshaking with the master failed fatally
    #[error("Unable to connect to master at {host}:{port}: {source}")]
    Handshake {
        host: String,
        port: u16,
        source: std::io::Error,
    },
}

/// Top-level error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Setup failure
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Breeding failure
    #[error("Breeding error: {0}")]
    Breed(#[from] BreedError),

    /// Codec failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O failure outside the protocol path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Accumulator for setup-time errors
///
/// Setup code records every problem it finds instead of bailing on the
/// first one, then calls [`ErrorSink::exit_if_errors`] once, so a
/// misconfigured run reports all bad parameters in a single pass.
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Vec<SetupError>,
}

impl ErrorSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a setup error
    pub fn error(&mut self, err: SetupError) {
        self.errors.push(err);
    }

    /// True if any error has been recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Flush the sink: `Ok(())` if clean, otherwise all recorded errors
    pub fn exit_if_errors(&mut self) -> Result<(), SetupError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let errors = std::mem::take(&mut self.errors);
        if errors.len() == 1 {
            Err(errors.into_iter().next().unwrap())
        } else {
            Err(SetupError::Multiple(errors))
        }
    }
}
