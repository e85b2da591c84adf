//! Resolution of symbolic references against the platform's symbol
//! catalogs.
//!
//! Variables and equations resolve through the static dictionary into model
//! column/row indices. Sets and parameters resolve through the mutable
//! database into element indices and values.

pub mod backend;
pub mod origin;
pub mod resolver;

pub use backend::{CatalogBackend, DatabaseBackend, DictionaryBackend};
pub use origin::{ImmediateIterator, ReferenceOrigin, VmIdent, VmIterator};
pub use resolver::{ResolverConfig, SymbolResolver};
