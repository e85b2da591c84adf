//! Symbol catalog protocols and in-memory catalogs.

pub mod memory;
pub mod traits;

pub use memory::{
    CursorStats, DbRecordIter, DbSymbolHandle, DictCursor, MemoryDatabase, MemoryDictionary,
};
pub use traits::{
    ElementLabels, MutableDatabase, RawRecord, StaticDictionary, SymbolInfo, SymbolInfoField,
};
