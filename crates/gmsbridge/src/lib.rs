//! Public API facade for gmsbridge.
//!
//! Reads the platform's nonlinear opcode files and resolves symbolic
//! references against its dictionary and database catalogs. The member
//! crates are re-exported for callers that need the lower-level pieces.

pub use gmsbridge_catalog::{
    ElementLabels, MemoryDatabase, MemoryDictionary, MutableDatabase, StaticDictionary,
};
pub use gmsbridge_error::{BridgeError, ErrorCode, Result};
pub use gmsbridge_opcode::{DecodeConfig, decode, decode_bytes, decode_with, encode};
pub use gmsbridge_resolve::{
    CatalogBackend, DatabaseBackend, DictionaryBackend, ImmediateIterator, ReferenceOrigin,
    ResolverConfig, SymbolResolver, VmIdent, VmIterator,
};
pub use gmsbridge_types::{
    Instruction, Opcode, OpcodeProgram, ProgramBuilder, Resolution, ResolvedSymbol, SymbolId,
    SymbolKind, SymbolicReference,
};

pub use gmsbridge_catalog;
pub use gmsbridge_opcode;
pub use gmsbridge_resolve;
pub use gmsbridge_types;
