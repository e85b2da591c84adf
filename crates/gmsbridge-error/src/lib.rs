use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for gmsbridge operations.
///
/// One variant per failure class of the opcode decoder and the symbol
/// resolver. Every variant carries enough context to render a diagnostic
/// without going back to the backend.
#[derive(Error, Debug)]
pub enum BridgeError {
    // === I/O Errors ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opcode file could not be opened.
    #[error("unable to open opcode file: '{path}'")]
    CannotOpen { path: PathBuf },

    // === Opcode Stream Errors ===
    /// Bad framing byte, bad width selector, or truncated read.
    #[error("malformed opcode stream at byte {offset}: {detail}")]
    MalformedStream { offset: u64, detail: String },

    /// Missing/zero constant pool, or instructions referencing past its end.
    #[error("constant pool inconsistency: {detail}")]
    PoolInconsistency { detail: String },

    /// The encoder refused a program that violates the framing invariants.
    #[error("cannot encode opcode program: {detail}")]
    EncodeInvariant { detail: String },

    // === Symbol Resolution Errors ===
    /// The symbol kind cannot be resolved against this backend.
    #[error("resolving {kind} symbols against the {backend} is not implemented")]
    UnsupportedCombination {
        kind: &'static str,
        backend: &'static str,
    },

    /// Symbol lookup failed.
    #[error("could not find symbol {symbol}")]
    SymbolNotFound { symbol: String },

    /// A concrete selector has no label in the catalog.
    #[error("could not find UEL #{uel} (selector position {position})")]
    LabelNotFound { position: usize, uel: i32 },

    /// No record matches the requested key.
    #[error("could not find record for symbol {symbol}{key}{}", backend_suffix(.backend_message))]
    RecordNotFound {
        symbol: String,
        key: String,
        backend_message: String,
    },

    /// A set level value is not representable as a bounded integer.
    #[error("value {value} of symbol {symbol} is not a valid integer index")]
    ValueOutOfRange { symbol: String, value: f64 },

    /// Opaque passthrough of a failed backend call.
    #[error("backend call {call} failed: {message}")]
    BackendFailure { call: &'static str, message: String },

    /// Reference shape is inconsistent (dimension, selector count or sign).
    #[error("invalid symbolic reference: {detail}")]
    InvalidReference { detail: String },
}

fn backend_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

/// Stable numeric status codes for callers that report through integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Opcode file could not be opened.
    FileOpenFailed = 1,
    /// Generic I/O failure.
    IoErr = 2,
    /// Opcode stream framing is broken.
    InvalidOpCode = 3,
    /// Pool and instructions disagree.
    Inconsistency = 4,
    /// Operation not implemented for this combination.
    NotImplemented = 5,
    /// Symbol or record is not in the catalog.
    NotFound = 6,
    /// Value out of the representable range.
    IndexOutOfRange = 7,
    /// Backend call failed.
    BackendCallFailed = 8,
    /// Caller passed a malformed argument.
    InvalidArgument = 9,
}

impl BridgeError {
    /// Map this error to a numeric status code.
    #[allow(clippy::match_same_arms)]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::CannotOpen { .. } => ErrorCode::FileOpenFailed,
            Self::Io(_) => ErrorCode::IoErr,
            Self::MalformedStream { .. } => ErrorCode::InvalidOpCode,
            Self::PoolInconsistency { .. } => ErrorCode::Inconsistency,
            Self::EncodeInvariant { .. } => ErrorCode::InvalidArgument,
            Self::UnsupportedCombination { .. } => ErrorCode::NotImplemented,
            Self::SymbolNotFound { .. }
            | Self::LabelNotFound { .. }
            | Self::RecordNotFound { .. } => ErrorCode::NotFound,
            Self::ValueOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            Self::BackendFailure { .. } => ErrorCode::BackendCallFailed,
            Self::InvalidReference { .. } => ErrorCode::InvalidArgument,
        }
    }

    /// Whether the modeler can likely fix this by changing their input.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CannotOpen { .. }
                | Self::SymbolNotFound { .. }
                | Self::LabelNotFound { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidReference { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CannotOpen { .. } => Some("Check that the opcode file path exists"),
            Self::MalformedStream { .. } => {
                Some("Regenerate the opcode file; it was truncated or written by another format")
            }
            Self::RecordNotFound { .. } => {
                Some("Check the element labels used to index the symbol")
            }
            Self::UnsupportedCombination { .. } => {
                Some("Load the symbol through the other catalog backend")
            }
            _ => None,
        }
    }

    /// Create a malformed-stream error.
    pub fn malformed(offset: u64, detail: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            detail: detail.into(),
        }
    }

    /// Create a pool-inconsistency error.
    pub fn pool(detail: impl Into<String>) -> Self {
        Self::PoolInconsistency {
            detail: detail.into(),
        }
    }

    /// Create a symbol-not-found error.
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
        }
    }

    /// Create a backend-failure error.
    pub fn backend(call: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            call,
            message: message.into(),
        }
    }

    /// Create an invalid-reference error.
    pub fn invalid_reference(detail: impl Into<String>) -> Self {
        Self::InvalidReference {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;
