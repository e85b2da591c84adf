use gmsbridge_types::limits::DEFAULT_READ_BUFFER;
use serde::{Deserialize, Serialize};

/// Configuration for the opcode decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Accept the stray `NoOp` record some producers write after a final
    /// `Store` in place of the `End` record.
    pub noop_trailer_shim: bool,
    /// Fail the decode when instructions reference constants past the end of
    /// the pool, instead of leaving the check to the caller.
    pub strict_pool_check: bool,
    /// Capacity of the read buffer used for path-based decoding.
    pub buffer_capacity: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            noop_trailer_shim: true,
            strict_pool_check: false,
            buffer_capacity: DEFAULT_READ_BUFFER,
        }
    }
}

impl DecodeConfig {
    /// Reject every stream that deviates from the documented framing.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            noop_trailer_shim: false,
            strict_pool_check: true,
            ..Self::default()
        }
    }

    /// Clamp values that would make the decoder misbehave.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.buffer_capacity = self.buffer_capacity.max(64);
        self
    }
}
