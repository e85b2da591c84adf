//! The active catalog backend.
//!
//! # Sealed Trait Discipline
//!
//! [`CatalogBackend`] is sealed: the resolver knows exactly two backends and
//! routes each symbol kind to the one able to serve it. Catalog
//! implementations plug in one level lower, through the open
//! `StaticDictionary` / `MutableDatabase` traits of `gmsbridge-catalog`.

use gmsbridge_catalog::{ElementLabels, MutableDatabase, StaticDictionary};
use gmsbridge_error::Result;
use gmsbridge_types::ResolvedSymbol;

use crate::origin::ReferenceOrigin;
use crate::resolver::{DATABASE, DICTIONARY, SymbolResolver};

pub(crate) mod sealed {
    /// Marker trait restricting implementation to this crate.
    pub trait Sealed {}
}

/// A catalog a [`SymbolResolver`] can resolve references against.
pub trait CatalogBackend: sealed::Sealed {
    /// Backend name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Resolve `origin` through the protocol of this backend.
    #[doc(hidden)]
    fn resolve_with(
        &self,
        resolver: &mut SymbolResolver,
        origin: &ReferenceOrigin,
        name: Option<&str>,
    ) -> Result<ResolvedSymbol>;
}

/// The static dictionary of a generated model.
#[derive(Debug)]
pub struct DictionaryBackend<'a, D> {
    dict: &'a D,
}

impl<'a, D: StaticDictionary> DictionaryBackend<'a, D> {
    pub fn new(dict: &'a D) -> Self {
        Self { dict }
    }
}

impl<D: StaticDictionary> sealed::Sealed for DictionaryBackend<'_, D> {}

impl<D: StaticDictionary> CatalogBackend for DictionaryBackend<'_, D> {
    fn name(&self) -> &'static str {
        DICTIONARY
    }

    fn resolve_with(
        &self,
        resolver: &mut SymbolResolver,
        origin: &ReferenceOrigin,
        _name: Option<&str>,
    ) -> Result<ResolvedSymbol> {
        let reference = origin.dictionary_reference()?;
        resolver.resolve_dict(self.dict, &reference)
    }
}

/// A mutable database, optionally paired with the dictionary whose element
/// space the selectors were issued in.
pub struct DatabaseBackend<'a, G> {
    db: &'a G,
    labels: Option<&'a dyn ElementLabels>,
}

impl<'a, G: MutableDatabase> DatabaseBackend<'a, G> {
    /// Selectors are element indices of the database itself.
    pub fn new(db: &'a G) -> Self {
        Self { db, labels: None }
    }

    /// Selectors are element indices of `dict`.
    pub fn with_dictionary<D: StaticDictionary>(db: &'a G, dict: &'a D) -> Self {
        Self {
            db,
            labels: Some(dict),
        }
    }

    pub fn has_dictionary(&self) -> bool {
        self.labels.is_some()
    }
}

impl<G> std::fmt::Debug for DatabaseBackend<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseBackend")
            .field("has_dictionary", &self.labels.is_some())
            .finish_non_exhaustive()
    }
}

impl<G: MutableDatabase> sealed::Sealed for DatabaseBackend<'_, G> {}

impl<G: MutableDatabase> CatalogBackend for DatabaseBackend<'_, G> {
    fn name(&self) -> &'static str {
        DATABASE
    }

    fn resolve_with(
        &self,
        resolver: &mut SymbolResolver,
        origin: &ReferenceOrigin,
        name: Option<&str>,
    ) -> Result<ResolvedSymbol> {
        let reference = origin.database_reference(name)?;
        resolver.resolve_db(self.db, self.labels, &reference)
    }
}
