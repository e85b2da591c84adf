//! Cursor protocols of the two symbol catalogs.
//!
//! Both catalogs are owned by the modeling platform; these traits describe
//! the calls the resolver makes into them and nothing more. They keep the
//! vendor's success-flag shape: a failed call returns `None`/`false`, and the
//! reason is available from the catalog afterwards.
//!
//! # Cursor ownership
//!
//! A cursor handed out by `find_first` / `find_*record*` belongs to the
//! caller until it is passed back to `close` / `free_iterator`, which
//! consume it. Handles are not `Send`: a catalog serves one resolution at a
//! time on one thread.

use gmsbridge_types::limits::VAL_MAX;

// ---------------------------------------------------------------------------
// Static dictionary
// ---------------------------------------------------------------------------

/// The read-only dictionary of a generated model.
///
/// Symbols are addressed by index. Records of variables and equations carry
/// the model column/row index they were assigned.
pub trait StaticDictionary {
    /// Handle of an open row/column search.
    type Cursor;

    /// Start a search over the records of `symbol` matching `selectors`
    /// (`0` is a wildcard).
    ///
    /// Returns the cursor together with the first matching row/column index,
    /// or a negative value when nothing matches. The cursor must be closed in
    /// both cases.
    fn find_first(&self, symbol: i32, selectors: &[i32]) -> (Self::Cursor, i32);

    /// Advance the search. Returns `None` once the search is exhausted.
    fn find_next(&self, cursor: &mut Self::Cursor) -> Option<i32>;

    /// Release a search handle.
    fn close(&self, cursor: Self::Cursor);

    /// Number of records of `symbol`, ignoring any selector.
    fn record_count(&self, symbol: i32) -> Option<usize>;

    /// Name of `symbol`.
    fn symbol_name(&self, symbol: i32) -> Option<String>;

    /// Index of the symbol called `name`.
    fn symbol_index(&self, name: &str) -> Option<i32>;

    /// Label of element `uel`.
    fn index_to_label(&self, uel: i32) -> Option<String>;

    /// Element index of `label`.
    fn label_to_index(&self, label: &str) -> Option<i32>;
}

// ---------------------------------------------------------------------------
// Mutable database
// ---------------------------------------------------------------------------

/// Symbol properties that can be queried from a [`MutableDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolInfoField {
    Name,
    Dim,
    NrRecords,
}

/// Value of a [`SymbolInfoField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolInfo {
    Int(i64),
    Text(String),
}

impl SymbolInfo {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

/// Key and value tuple of one record, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Element index per dimension.
    pub keys: Vec<i32>,
    /// Level, marginal, lower, upper, scale.
    pub values: [f64; VAL_MAX],
}

/// A mutable in-memory database of symbols and records.
///
/// Symbols are looked up by name or by ordinal number (the latter also
/// reaches aliases). Record keys are passed as element labels.
pub trait MutableDatabase {
    /// Symbol handle.
    type Symbol;
    /// Record iterator handle.
    type Record;

    /// Look up a symbol by name.
    fn find_symbol(&self, name: &str) -> Option<Self::Symbol>;

    /// Look up a symbol (or alias) by ordinal number.
    fn find_symbol_by_ordinal(&self, ordinal: i32) -> Option<Self::Symbol>;

    /// Position an iterator on the record with exactly these key labels.
    fn find_record(&self, symbol: &Self::Symbol, labels: &[&str]) -> Option<Self::Record>;

    /// Position an iterator on the first record of `symbol`.
    fn find_first_record(&self, symbol: &Self::Symbol) -> Option<Self::Record>;

    /// Position an iterator on the first record matching `labels`, where
    /// `None` leaves a position unconstrained. The iterator only visits
    /// matching records.
    fn find_first_record_slice(
        &self,
        symbol: &Self::Symbol,
        labels: &[Option<&str>],
    ) -> Option<Self::Record>;

    /// Whether the iterator has a record after the current one.
    fn record_has_next(&self, record: &Self::Record) -> bool;

    /// Advance the iterator. Returns `false` at the end.
    fn record_move_next(&self, record: &mut Self::Record) -> bool;

    /// Read the current record's keys and values.
    fn get_record_raw(&self, record: &Self::Record, dim: usize) -> Option<RawRecord>;

    /// Query a symbol property.
    fn symbol_info(&self, symbol: &Self::Symbol, field: SymbolInfoField) -> Option<SymbolInfo>;

    /// Release an iterator.
    fn free_iterator(&self, record: Self::Record);

    /// Label of element `uel` in the database's own element space.
    fn uel_label(&self, uel: i32) -> Option<String>;

    /// Text of the last failed call.
    fn last_error_text(&self) -> String;
}

// ---------------------------------------------------------------------------
// Label lookup
// ---------------------------------------------------------------------------

/// Element label lookup, the only dictionary service the database resolver
/// borrows.
///
/// Implemented for every [`StaticDictionary`]; exists so callers can pass a
/// dictionary as a trait object regardless of its cursor type.
pub trait ElementLabels {
    /// Label of element `uel`.
    fn element_label(&self, uel: i32) -> Option<String>;
}

impl<T: StaticDictionary + ?Sized> ElementLabels for T {
    fn element_label(&self, uel: i32) -> Option<String> {
        self.index_to_label(uel)
    }
}
