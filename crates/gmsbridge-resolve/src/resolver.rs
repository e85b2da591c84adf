//! Symbol resolution against the two catalog backends.
//!
//! A resolution opens exactly one catalog cursor, drains it, and closes it
//! before returning, whatever the outcome. Cursors are held in guards whose
//! `Drop` hands them back, so early returns through `?` cannot leak them.

use gmsbridge_catalog::{
    ElementLabels, MutableDatabase, RawRecord, StaticDictionary, SymbolInfoField,
};
use gmsbridge_error::{BridgeError, Result};
use gmsbridge_types::limits::{NA_INT, VAL_LEVEL, WILDCARD};
use gmsbridge_types::{
    KeyPart, Resolution, ResolvedSymbol, SymbolId, SymbolKind, SymbolicReference,
    render_key_tuple,
};
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, span, trace};

use crate::backend::CatalogBackend;
use crate::origin::ReferenceOrigin;

pub(crate) const DICTIONARY: &str = "dictionary";
pub(crate) const DATABASE: &str = "database";

/// Tuning for a [`SymbolResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Initial capacity of the scratch buffers.
    pub initial_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
        }
    }
}

/// Resolves symbolic references into indices or values.
///
/// Owns growable scratch buffers that are cleared at the start of every
/// call and keep their capacity across calls.
#[derive(Debug)]
pub struct SymbolResolver {
    config: ResolverConfig,
    indices: Vec<i32>,
    values: Vec<f64>,
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolResolver {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            indices: Vec::with_capacity(config.initial_capacity),
            values: Vec::with_capacity(config.initial_capacity),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a reference from either origin against `backend`.
    ///
    /// `name` is the symbol name, needed when a VM reference is resolved
    /// against the database.
    pub fn resolve<B: CatalogBackend>(
        &mut self,
        backend: &B,
        origin: &ReferenceOrigin,
        name: Option<&str>,
    ) -> Result<ResolvedSymbol> {
        backend.resolve_with(self, origin, name)
    }

    /// Resolve a variable or equation reference against the static
    /// dictionary.
    pub fn resolve_dict<D: StaticDictionary>(
        &mut self,
        dict: &D,
        reference: &SymbolicReference,
    ) -> Result<ResolvedSymbol> {
        let kind = reference.kind();
        if !kind.is_equvar() {
            return Err(unsupported(kind, DICTIONARY));
        }
        let symbol = match reference.symbol_id() {
            SymbolId::Index(idx) => *idx,
            SymbolId::Name(name) => dict
                .symbol_index(name)
                .ok_or_else(|| BridgeError::symbol_not_found(name.clone()))?,
        };
        let symbol_name = dict
            .symbol_name(symbol)
            .unwrap_or_else(|| reference.symbol_id().to_string());

        let span = span!(
            Level::DEBUG,
            "resolve_dict",
            symbol = %symbol_name,
            kind = %kind,
            dim = reference.dim(),
        );
        let _guard = span.enter();
        for (position, &uel) in reference.selectors().iter().enumerate() {
            trace_selector(position, uel, || dict.index_to_label(uel));
        }

        let (cursor, first) = dict.find_first(symbol, reference.selectors());
        let mut cursor = DictCursorGuard::new(dict, cursor);
        if first < 0 {
            return Err(BridgeError::RecordNotFound {
                symbol: symbol_name,
                key: dictionary_key(dict, reference.selectors()),
                backend_message: String::new(),
            });
        }
        let count = dict.record_count(symbol).ok_or_else(|| {
            BridgeError::backend("record_count", format!("no record count for {symbol_name}"))
        })?;

        let all_wildcard = reference.all_wildcard();
        if reference.compact_requested() {
            drop(cursor);
            debug!(count, start_index = first, "resolved compact range");
            return Ok(ResolvedSymbol::new(
                Resolution::Range {
                    count,
                    start_index: first,
                },
                all_wildcard,
            ));
        }

        self.indices.clear();
        self.indices.reserve(count);
        self.indices.push(first);
        while let Some(index) = cursor.next() {
            self.indices.push(index);
        }
        drop(cursor);
        debug!(records = self.indices.len(), "resolved index list");
        Ok(ResolvedSymbol::new(
            Resolution::IndexList(self.indices.drain(..).collect()),
            all_wildcard,
        ))
    }

    /// Resolve a set or parameter reference against the mutable database.
    ///
    /// Labels of concrete selectors come from `dict` when given, otherwise
    /// from the database's own element space.
    pub fn resolve_db<G: MutableDatabase>(
        &mut self,
        db: &G,
        dict: Option<&dyn ElementLabels>,
        reference: &SymbolicReference,
    ) -> Result<ResolvedSymbol> {
        let symbol = match reference.symbol_id() {
            SymbolId::Name(name) => db.find_symbol(name),
            SymbolId::Index(ordinal) => db.find_symbol_by_ordinal(*ordinal),
        }
        .ok_or_else(|| BridgeError::symbol_not_found(reference.symbol_id().to_string()))?;

        let kind = reference.kind();
        if kind.is_equvar() {
            return Err(unsupported(kind, DATABASE));
        }
        let symbol_name = match reference.symbol_id() {
            SymbolId::Name(name) => name.clone(),
            SymbolId::Index(_) => db
                .symbol_info(&symbol, SymbolInfoField::Name)
                .and_then(|info| info.as_text().map(str::to_owned))
                .unwrap_or_else(|| reference.symbol_id().to_string()),
        };

        let symbol_dim = db
            .symbol_info(&symbol, SymbolInfoField::Dim)
            .and_then(|info| info.as_int())
            .ok_or_else(|| BridgeError::backend("symbol_info", db.last_error_text()))?;
        if usize::try_from(symbol_dim).ok() != Some(reference.dim()) {
            return Err(BridgeError::invalid_reference(format!(
                "symbol {symbol_name} has dimension {symbol_dim}, got {} selectors",
                reference.dim()
            )));
        }

        let span = span!(
            Level::DEBUG,
            "resolve_db",
            symbol = %symbol_name,
            kind = %kind,
            dim = reference.dim(),
        );
        let _guard = span.enter();

        let mut labels: Vec<Option<String>> = Vec::with_capacity(reference.dim());
        for (position, &uel) in reference.selectors().iter().enumerate() {
            if uel == WILDCARD {
                trace!(position, "wildcard (:)");
                labels.push(None);
                continue;
            }
            let label = match dict {
                Some(dict) => dict.element_label(uel),
                None => db.uel_label(uel),
            }
            .ok_or(BridgeError::LabelNotFound { position, uel })?;
            trace!(position, uel, label = %label, "selector");
            labels.push(Some(label));
        }

        let all_wildcard = reference.all_wildcard();
        let dim = reference.dim();
        let not_found = |labels: &[Option<String>]| BridgeError::RecordNotFound {
            symbol: symbol_name.clone(),
            key: database_key(labels),
            backend_message: db.last_error_text(),
        };

        if reference.is_single_record() {
            let key: Vec<&str> = labels.iter().flatten().map(String::as_str).collect();
            let record = db
                .find_record(&symbol, &key)
                .ok_or_else(|| not_found(&labels))?;
            let record = DbIterGuard::new(db, record);
            let level = record
                .read(dim)
                .ok_or_else(|| BridgeError::backend("get_record_raw", db.last_error_text()))?
                .values[VAL_LEVEL];
            drop(record);
            debug!(records = 1, "resolved single record");
            let resolution = match kind {
                SymbolKind::Set => Resolution::IndexList(vec![set_level(&symbol_name, level)?]),
                _ => Resolution::ScalarValue(level),
            };
            return Ok(ResolvedSymbol::new(resolution, all_wildcard));
        }

        let record = if reference.compact_requested() {
            db.find_first_record(&symbol)
        } else {
            let slice: Vec<Option<&str>> = labels.iter().map(Option::as_deref).collect();
            db.find_first_record_slice(&symbol, &slice)
        }
        .ok_or_else(|| not_found(&labels))?;
        let mut record = DbIterGuard::new(db, record);

        let hint = db
            .symbol_info(&symbol, SymbolInfoField::NrRecords)
            .and_then(|info| info.as_int())
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| BridgeError::backend("symbol_info", db.last_error_text()))?;
        self.indices.clear();
        self.values.clear();
        match kind {
            SymbolKind::Set => self.indices.reserve(hint),
            _ => self.values.reserve(hint),
        }

        loop {
            let raw = record
                .read(dim)
                .ok_or_else(|| BridgeError::backend("get_record_raw", db.last_error_text()))?;
            let level = raw.values[VAL_LEVEL];
            match kind {
                SymbolKind::Set => self.indices.push(set_level(&symbol_name, level)?),
                _ => self.values.push(level),
            }
            if !record.advance()? {
                break;
            }
        }
        drop(record);

        let resolution = match kind {
            SymbolKind::Set => Resolution::IndexList(self.indices.drain(..).collect()),
            _ => Resolution::ValueList(self.values.drain(..).collect()),
        };
        debug!(records = resolution.len(), "resolved record list");
        Ok(ResolvedSymbol::new(resolution, all_wildcard))
    }
}

fn unsupported(kind: SymbolKind, backend: &'static str) -> BridgeError {
    BridgeError::UnsupportedCombination {
        kind: kind.name(),
        backend,
    }
}

/// Check that a set level can serve as an element index.
#[allow(clippy::cast_possible_truncation)]
fn set_level(symbol: &str, level: f64) -> Result<i32> {
    if level.is_finite() && level.fract() == 0.0 && level < NA_INT && level >= f64::from(i32::MIN)
    {
        Ok(level as i32)
    } else {
        Err(BridgeError::ValueOutOfRange {
            symbol: symbol.to_owned(),
            value: level,
        })
    }
}

fn trace_selector(position: usize, uel: i32, label: impl FnOnce() -> Option<String>) {
    if uel == WILDCARD {
        trace!(position, "wildcard (:)");
    } else {
        let label = label().unwrap_or_else(|| format!("UEL#{uel}"));
        trace!(position, uel, label = %label, "selector");
    }
}

fn dictionary_key<D: StaticDictionary>(dict: &D, selectors: &[i32]) -> String {
    let parts: Vec<KeyPart> = selectors
        .iter()
        .map(|&uel| {
            if uel == WILDCARD {
                KeyPart::Wildcard
            } else {
                dict.index_to_label(uel)
                    .map_or(KeyPart::Unresolved(uel), KeyPart::Label)
            }
        })
        .collect();
    render_key_tuple(&parts)
}

fn database_key(labels: &[Option<String>]) -> String {
    let parts: Vec<KeyPart> = labels
        .iter()
        .map(|label| label.clone().map_or(KeyPart::Wildcard, KeyPart::Label))
        .collect();
    render_key_tuple(&parts)
}

// ---------------------------------------------------------------------------
// Cursor guards
// ---------------------------------------------------------------------------

/// Closes a dictionary search when dropped.
struct DictCursorGuard<'a, D: StaticDictionary> {
    dict: &'a D,
    cursor: Option<D::Cursor>,
}

impl<'a, D: StaticDictionary> DictCursorGuard<'a, D> {
    fn new(dict: &'a D, cursor: D::Cursor) -> Self {
        Self {
            dict,
            cursor: Some(cursor),
        }
    }

    fn next(&mut self) -> Option<i32> {
        let cursor = self.cursor.as_mut()?;
        self.dict.find_next(cursor)
    }
}

impl<D: StaticDictionary> Drop for DictCursorGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.dict.close(cursor);
        }
    }
}

/// Frees a database record iterator when dropped.
struct DbIterGuard<'a, G: MutableDatabase> {
    db: &'a G,
    record: Option<G::Record>,
}

impl<'a, G: MutableDatabase> DbIterGuard<'a, G> {
    fn new(db: &'a G, record: G::Record) -> Self {
        Self {
            db,
            record: Some(record),
        }
    }

    fn read(&self, dim: usize) -> Option<RawRecord> {
        self.db.get_record_raw(self.record.as_ref()?, dim)
    }

    /// Step to the next record; `false` at the end.
    ///
    /// A record announced by `record_has_next` that cannot be reached is a
    /// backend failure, not the end of the iteration.
    fn advance(&mut self) -> Result<bool> {
        let Some(record) = self.record.as_mut() else {
            return Ok(false);
        };
        if !self.db.record_has_next(record) {
            return Ok(false);
        }
        if self.db.record_move_next(record) {
            Ok(true)
        } else {
            Err(BridgeError::backend(
                "record_move_next",
                self.db.last_error_text(),
            ))
        }
    }
}

impl<G: MutableDatabase> Drop for DbIterGuard<'_, G> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.db.free_iterator(record);
        }
    }
}
