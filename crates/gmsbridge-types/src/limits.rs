//! Platform limits and sentinel values shared by the decoder and resolver.

/// Maximum number of index positions of a catalog symbol.
pub const MAX_INDEX_DIM: usize = 20;

/// Selector value meaning "unconstrained in this dimension".
pub const WILDCARD: i32 = 0;

/// The platform's "not available" integer special value.
///
/// Set levels at or above this value cannot be used as element indices.
pub const NA_INT: f64 = 2_100_000_000.0;

/// Position of the level field in a raw record value tuple.
pub const VAL_LEVEL: usize = 0;
/// Number of value fields in a raw record.
pub const VAL_MAX: usize = 5;

/// Number of bytes the opcode reader buffers per refill.
pub const DEFAULT_READ_BUFFER: usize = 4 * 1024;
