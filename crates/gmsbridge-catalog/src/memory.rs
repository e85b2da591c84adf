//! In-memory catalogs.
//!
//! [`MemoryDictionary`] and [`MemoryDatabase`] implement the catalog
//! protocols over plain vectors. They are used by tests and by tools that
//! build small catalogs by hand. Both count every cursor they hand out and
//! every cursor handed back, so callers can check that no cursor leaks.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use gmsbridge_types::SymbolKind;
use gmsbridge_types::limits::{VAL_LEVEL, VAL_MAX, WILDCARD};
use tracing::trace;

use crate::traits::{
    MutableDatabase, RawRecord, StaticDictionary, SymbolInfo, SymbolInfoField,
};

// ---------------------------------------------------------------------------
// Cursor accounting
// ---------------------------------------------------------------------------

/// Counters of cursor traffic on an in-memory catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    /// Cursors handed out.
    pub opened: usize,
    /// Cursors handed back.
    pub closed: usize,
    /// Calls made through a cursor that was already handed back.
    pub used_after_close: usize,
}

impl CursorStats {
    /// Cursors handed out but not yet handed back.
    pub fn outstanding(&self) -> usize {
        self.opened.saturating_sub(self.closed)
    }
}

#[derive(Debug, Default)]
struct CursorLedger {
    next_id: Cell<u64>,
    live: RefCell<HashSet<u64>>,
    stats: Cell<CursorStats>,
}

impl CursorLedger {
    fn open(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.live.borrow_mut().insert(id);
        self.bump(|s| s.opened += 1);
        id
    }

    fn close(&self, id: u64) {
        if self.live.borrow_mut().remove(&id) {
            self.bump(|s| s.closed += 1);
        } else {
            self.bump(|s| s.used_after_close += 1);
        }
    }

    fn check_live(&self, id: u64) {
        if !self.live.borrow().contains(&id) {
            self.bump(|s| s.used_after_close += 1);
        }
    }

    fn bump(&self, f: impl FnOnce(&mut CursorStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

/// Interned element labels, indexed from 1.
#[derive(Debug, Default, Clone)]
struct UelTable {
    labels: Vec<String>,
    by_label: HashMap<String, i32>,
}

impl UelTable {
    fn intern(&mut self, label: &str) -> i32 {
        if let Some(&uel) = self.by_label.get(label) {
            return uel;
        }
        self.labels.push(label.to_owned());
        let uel = i32::try_from(self.labels.len()).unwrap_or(i32::MAX);
        self.by_label.insert(label.to_owned(), uel);
        uel
    }

    fn label(&self, uel: i32) -> Option<&str> {
        let pos = usize::try_from(uel).ok()?.checked_sub(1)?;
        self.labels.get(pos).map(String::as_str)
    }

    fn index(&self, label: &str) -> Option<i32> {
        self.by_label.get(label).copied()
    }
}

fn keys_match(keys: &[i32], selectors: &[i32]) -> bool {
    keys.len() == selectors.len()
        && keys
            .iter()
            .zip(selectors)
            .all(|(&k, &s)| s == WILDCARD || k == s)
}

// ---------------------------------------------------------------------------
// MemoryDictionary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DictSymbol {
    name: String,
    kind: SymbolKind,
    dim: usize,
    /// `(element keys, row/column index)` in dictionary order.
    records: Vec<(Vec<i32>, i32)>,
}

/// Search handle of a [`MemoryDictionary`].
#[derive(Debug)]
pub struct DictCursor {
    id: u64,
    matches: Vec<i32>,
    pos: usize,
}

/// An in-memory [`StaticDictionary`].
///
/// Symbol indices start at 1, like element indices.
#[derive(Debug, Default)]
pub struct MemoryDictionary {
    symbols: Vec<DictSymbol>,
    uels: UelTable,
    cursors: CursorLedger,
}

impl MemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an element label, returning its index.
    pub fn uel(&mut self, label: &str) -> i32 {
        self.uels.intern(label)
    }

    /// Declare a symbol, returning its index.
    pub fn add_symbol(&mut self, name: &str, kind: SymbolKind, dim: usize) -> i32 {
        self.symbols.push(DictSymbol {
            name: name.to_owned(),
            kind,
            dim,
            records: Vec::new(),
        });
        i32::try_from(self.symbols.len()).unwrap_or(i32::MAX)
    }

    /// Append a record mapping `labels` to row/column `index`.
    ///
    /// # Panics
    ///
    /// Panics on an unknown symbol or a key of the wrong dimension.
    pub fn add_record(&mut self, symbol: i32, labels: &[&str], index: i32) {
        let keys: Vec<i32> = labels.iter().map(|l| self.uels.intern(l)).collect();
        let sym = self
            .symbol_mut(symbol)
            .expect("add_record on an unknown symbol");
        assert_eq!(keys.len(), sym.dim, "record key has the wrong dimension");
        sym.records.push((keys, index));
    }

    /// Kind of `symbol`.
    pub fn symbol_kind(&self, symbol: i32) -> Option<SymbolKind> {
        self.symbol(symbol).map(|s| s.kind)
    }

    /// Cursor traffic so far.
    pub fn cursor_stats(&self) -> CursorStats {
        self.cursors.stats.get()
    }

    fn symbol(&self, symbol: i32) -> Option<&DictSymbol> {
        let pos = usize::try_from(symbol).ok()?.checked_sub(1)?;
        self.symbols.get(pos)
    }

    fn symbol_mut(&mut self, symbol: i32) -> Option<&mut DictSymbol> {
        let pos = usize::try_from(symbol).ok()?.checked_sub(1)?;
        self.symbols.get_mut(pos)
    }
}

impl StaticDictionary for MemoryDictionary {
    type Cursor = DictCursor;

    fn find_first(&self, symbol: i32, selectors: &[i32]) -> (DictCursor, i32) {
        let matches: Vec<i32> = self
            .symbol(symbol)
            .map(|sym| {
                sym.records
                    .iter()
                    .filter(|(keys, _)| keys_match(keys, selectors))
                    .map(|&(_, index)| index)
                    .collect()
            })
            .unwrap_or_default();
        let first = matches.first().copied().unwrap_or(-1);
        let id = self.cursors.open();
        trace!(symbol, cursor = id, matches = matches.len(), "dictionary search opened");
        (
            DictCursor {
                id,
                matches,
                pos: 0,
            },
            first,
        )
    }

    fn find_next(&self, cursor: &mut DictCursor) -> Option<i32> {
        self.cursors.check_live(cursor.id);
        cursor.pos += 1;
        cursor.matches.get(cursor.pos).copied()
    }

    fn close(&self, cursor: DictCursor) {
        trace!(cursor = cursor.id, "dictionary search closed");
        self.cursors.close(cursor.id);
    }

    fn record_count(&self, symbol: i32) -> Option<usize> {
        self.symbol(symbol).map(|s| s.records.len())
    }

    fn symbol_name(&self, symbol: i32) -> Option<String> {
        self.symbol(symbol).map(|s| s.name.clone())
    }

    fn symbol_index(&self, name: &str) -> Option<i32> {
        let pos = self
            .symbols
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))?;
        i32::try_from(pos + 1).ok()
    }

    fn index_to_label(&self, uel: i32) -> Option<String> {
        self.uels.label(uel).map(str::to_owned)
    }

    fn label_to_index(&self, label: &str) -> Option<i32> {
        self.uels.index(label)
    }
}

// ---------------------------------------------------------------------------
// MemoryDatabase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DbSymbol {
    name: String,
    kind: SymbolKind,
    dim: usize,
    records: Vec<(Vec<i32>, [f64; VAL_MAX])>,
}

/// Symbol handle of a [`MemoryDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSymbolHandle(usize);

/// Record iterator of a [`MemoryDatabase`].
#[derive(Debug)]
pub struct DbRecordIter {
    id: u64,
    symbol: usize,
    rows: Vec<usize>,
    pos: usize,
}

/// An in-memory [`MutableDatabase`].
///
/// Ordinals start at 1; aliases get their own ordinal and point at an
/// existing symbol.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    symbols: Vec<DbSymbol>,
    /// Ordinal (minus one) to position in `symbols`.
    ordinals: Vec<usize>,
    uels: UelTable,
    last_error: RefCell<String>,
    fail_raw_reads_after: Cell<Option<usize>>,
    raw_reads: Cell<usize>,
    cursors: CursorLedger,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an element label, returning its index.
    pub fn uel(&mut self, label: &str) -> i32 {
        self.uels.intern(label)
    }

    /// Declare a symbol, returning its ordinal.
    pub fn add_symbol(&mut self, name: &str, kind: SymbolKind, dim: usize) -> i32 {
        self.symbols.push(DbSymbol {
            name: name.to_owned(),
            kind,
            dim,
            records: Vec::new(),
        });
        self.ordinals.push(self.symbols.len() - 1);
        i32::try_from(self.ordinals.len()).unwrap_or(i32::MAX)
    }

    /// Give `target` a second ordinal, returning it.
    ///
    /// # Panics
    ///
    /// Panics when `target` is not a known ordinal.
    pub fn add_alias(&mut self, target: i32) -> i32 {
        let pos = self
            .position_of_ordinal(target)
            .expect("add_alias on an unknown ordinal");
        self.ordinals.push(pos);
        i32::try_from(self.ordinals.len()).unwrap_or(i32::MAX)
    }

    /// Append a record with the given level; the other value fields are 0.
    pub fn add_level(&mut self, ordinal: i32, labels: &[&str], level: f64) {
        let mut values = [0.0; VAL_MAX];
        values[VAL_LEVEL] = level;
        self.add_record(ordinal, labels, values);
    }

    /// Append a record.
    ///
    /// # Panics
    ///
    /// Panics on an unknown ordinal or a key of the wrong dimension.
    pub fn add_record(&mut self, ordinal: i32, labels: &[&str], values: [f64; VAL_MAX]) {
        let keys: Vec<i32> = labels.iter().map(|l| self.uels.intern(l)).collect();
        let pos = self
            .position_of_ordinal(ordinal)
            .expect("add_record on an unknown ordinal");
        let sym = &mut self.symbols[pos];
        assert_eq!(keys.len(), sym.dim, "record key has the wrong dimension");
        sym.records.push((keys, values));
    }

    /// Make every `get_record_raw` call after the first `n` fail.
    pub fn fail_raw_reads_after(&self, n: usize) {
        self.fail_raw_reads_after.set(Some(n));
        self.raw_reads.set(0);
    }

    /// Kind of the symbol behind `ordinal`.
    pub fn symbol_kind(&self, ordinal: i32) -> Option<SymbolKind> {
        self.position_of_ordinal(ordinal)
            .map(|pos| self.symbols[pos].kind)
    }

    /// Cursor traffic so far.
    pub fn cursor_stats(&self) -> CursorStats {
        self.cursors.stats.get()
    }

    fn position_of_ordinal(&self, ordinal: i32) -> Option<usize> {
        let pos = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.ordinals.get(pos).copied()
    }

    fn fail(&self, message: String) {
        *self.last_error.borrow_mut() = message;
    }

    fn open_iter(&self, symbol: usize, rows: Vec<usize>) -> DbRecordIter {
        let id = self.cursors.open();
        trace!(
            symbol = %self.symbols[symbol].name,
            cursor = id,
            rows = rows.len(),
            "database iterator opened"
        );
        DbRecordIter {
            id,
            symbol,
            rows,
            pos: 0,
        }
    }

    /// Translate labels to keys; `None` stays a wildcard.
    fn keys_for(&self, labels: &[Option<&str>]) -> Option<Vec<i32>> {
        labels
            .iter()
            .map(|l| match l {
                Some(label) => self.uels.index(label),
                None => Some(WILDCARD),
            })
            .collect()
    }

    fn matching_rows(&self, symbol: usize, labels: &[Option<&str>]) -> Option<Vec<usize>> {
        let sym = &self.symbols[symbol];
        if labels.len() != sym.dim {
            self.fail(format!(
                "symbol {} has dimension {}, got {} labels",
                sym.name,
                sym.dim,
                labels.len()
            ));
            return None;
        }
        let Some(selectors) = self.keys_for(labels) else {
            self.fail("unknown element label".to_owned());
            return None;
        };
        let rows: Vec<usize> = sym
            .records
            .iter()
            .enumerate()
            .filter(|(_, (keys, _))| keys_match(keys, &selectors))
            .map(|(row, _)| row)
            .collect();
        if rows.is_empty() {
            self.fail(format!("no record of {} matches the key", sym.name));
            return None;
        }
        Some(rows)
    }
}

impl MutableDatabase for MemoryDatabase {
    type Symbol = DbSymbolHandle;
    type Record = DbRecordIter;

    fn find_symbol(&self, name: &str) -> Option<DbSymbolHandle> {
        let found = self
            .symbols
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name));
        if found.is_none() {
            self.fail(format!("symbol {name} not found"));
        }
        found.map(DbSymbolHandle)
    }

    fn find_symbol_by_ordinal(&self, ordinal: i32) -> Option<DbSymbolHandle> {
        let found = self.position_of_ordinal(ordinal);
        if found.is_none() {
            self.fail(format!("symbol number {ordinal} not found"));
        }
        found.map(DbSymbolHandle)
    }

    fn find_record(&self, symbol: &DbSymbolHandle, labels: &[&str]) -> Option<DbRecordIter> {
        let labels: Vec<Option<&str>> = labels.iter().copied().map(Some).collect();
        let rows = self.matching_rows(symbol.0, &labels)?;
        Some(self.open_iter(symbol.0, vec![rows[0]]))
    }

    fn find_first_record(&self, symbol: &DbSymbolHandle) -> Option<DbRecordIter> {
        let sym = &self.symbols[symbol.0];
        if sym.records.is_empty() {
            self.fail(format!("symbol {} has no records", sym.name));
            return None;
        }
        Some(self.open_iter(symbol.0, (0..sym.records.len()).collect()))
    }

    fn find_first_record_slice(
        &self,
        symbol: &DbSymbolHandle,
        labels: &[Option<&str>],
    ) -> Option<DbRecordIter> {
        let rows = self.matching_rows(symbol.0, labels)?;
        Some(self.open_iter(symbol.0, rows))
    }

    fn record_has_next(&self, record: &DbRecordIter) -> bool {
        self.cursors.check_live(record.id);
        record.pos + 1 < record.rows.len()
    }

    fn record_move_next(&self, record: &mut DbRecordIter) -> bool {
        self.cursors.check_live(record.id);
        if record.pos + 1 < record.rows.len() {
            record.pos += 1;
            true
        } else {
            false
        }
    }

    fn get_record_raw(&self, record: &DbRecordIter, dim: usize) -> Option<RawRecord> {
        self.cursors.check_live(record.id);
        let reads = self.raw_reads.get();
        self.raw_reads.set(reads + 1);
        if self.fail_raw_reads_after.get().is_some_and(|n| reads >= n) {
            self.fail("injected record read failure".to_owned());
            return None;
        }
        let sym = &self.symbols[record.symbol];
        if dim != sym.dim {
            self.fail(format!(
                "symbol {} has dimension {}, asked for {dim}",
                sym.name, sym.dim
            ));
            return None;
        }
        let (keys, values) = &sym.records[*record.rows.get(record.pos)?];
        Some(RawRecord {
            keys: keys.clone(),
            values: *values,
        })
    }

    fn symbol_info(&self, symbol: &DbSymbolHandle, field: SymbolInfoField) -> Option<SymbolInfo> {
        let sym = self.symbols.get(symbol.0)?;
        Some(match field {
            SymbolInfoField::Name => SymbolInfo::Text(sym.name.clone()),
            SymbolInfoField::Dim => SymbolInfo::Int(i64::try_from(sym.dim).ok()?),
            SymbolInfoField::NrRecords => SymbolInfo::Int(i64::try_from(sym.records.len()).ok()?),
        })
    }

    fn free_iterator(&self, record: DbRecordIter) {
        trace!(cursor = record.id, "database iterator freed");
        self.cursors.close(record.id);
    }

    fn uel_label(&self, uel: i32) -> Option<String> {
        let label = self.uels.label(uel).map(str::to_owned);
        if label.is_none() {
            self.fail(format!("UEL #{uel} not found"));
        }
        label
    }

    fn last_error_text(&self) -> String {
        self.last_error.borrow().clone()
    }
}
