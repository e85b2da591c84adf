use gmsbridge_catalog::{
    DbRecordIter, DbSymbolHandle, MemoryDatabase, MemoryDictionary, MutableDatabase, RawRecord,
    StaticDictionary, SymbolInfo, SymbolInfoField,
};
use gmsbridge_error::BridgeError;
use gmsbridge_resolve::{
    DatabaseBackend, DictionaryBackend, ImmediateIterator, ReferenceOrigin, SymbolResolver,
    VmIdent, VmIterator,
};
use gmsbridge_types::{Resolution, SymbolKind};
use proptest::prelude::*;

const LABELS_I: [&str; 4] = ["i1", "i2", "i3", "i4"];
const LABELS_J: [&str; 3] = ["j1", "j2", "j3"];

fn immediate(kind: SymbolKind, ordinal: i32, selectors: Vec<i32>, compact: bool) -> ReferenceOrigin {
    ReferenceOrigin::Immediate(ImmediateIterator {
        kind,
        symbol_ordinal: ordinal,
        selectors,
        compact,
    })
}

/// Present records as `(i, j)` positions into the label tables.
fn arb_records() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::btree_set((0..LABELS_I.len(), 0..LABELS_J.len()), 1..10)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_dictionary_count_and_hygiene(
        records in arb_records(),
        sel_i in 0..=LABELS_I.len(),
        sel_j in 0..=LABELS_J.len(),
        compact in any::<bool>(),
    ) {
        let mut dct = MemoryDictionary::new();
        for label in LABELS_I.iter().chain(LABELS_J.iter()) {
            dct.uel(label);
        }
        let x = dct.add_symbol("x", SymbolKind::Var, 2);
        for (n, &(i, j)) in records.iter().enumerate() {
            dct.add_record(x, &[LABELS_I[i], LABELS_J[j]], 100 + i32::try_from(n).unwrap());
        }
        // Position 0 of a selector axis is the wildcard.
        let uel = |labels: &[&str], pos: usize| {
            if pos == 0 { 0 } else { dct.label_to_index(labels[pos - 1]).unwrap() }
        };
        let selectors = vec![uel(&LABELS_I, sel_i), uel(&LABELS_J, sel_j)];
        let expected: Vec<i32> = records
            .iter()
            .enumerate()
            .filter(|(_, (i, j))| (sel_i == 0 || *i == sel_i - 1) && (sel_j == 0 || *j == sel_j - 1))
            .map(|(n, _)| 100 + i32::try_from(n).unwrap())
            .collect();

        let result = SymbolResolver::new().resolve(
            &DictionaryBackend::new(&dct),
            &immediate(SymbolKind::Var, x, selectors, compact),
            None,
        );

        match result {
            Ok(resolved) if compact => {
                prop_assert_eq!(
                    resolved.resolution,
                    Resolution::Range { count: records.len(), start_index: expected[0] }
                );
            }
            Ok(resolved) => {
                prop_assert_eq!(resolved.resolution, Resolution::IndexList(expected));
                prop_assert_eq!(resolved.all_wildcard, sel_i == 0 && sel_j == 0);
            }
            Err(BridgeError::RecordNotFound { .. }) => prop_assert!(expected.is_empty()),
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
        let stats = dct.cursor_stats();
        prop_assert_eq!(stats.opened, 1);
        prop_assert_eq!(stats.closed, 1);
        prop_assert_eq!(stats.used_after_close, 0);
    }

    #[test]
    fn prop_database_routing_and_hygiene(
        records in arb_records(),
        sel_i in 0..=LABELS_I.len(),
        sel_j in 0..=LABELS_J.len(),
        fail_after in prop::option::of(0usize..4),
    ) {
        let mut gmd = MemoryDatabase::new();
        for label in LABELS_I.iter().chain(LABELS_J.iter()) {
            gmd.uel(label);
        }
        let p = gmd.add_symbol("p", SymbolKind::Param, 2);
        for &(i, j) in &records {
            gmd.add_level(p, &[LABELS_I[i], LABELS_J[j]], (i * 10 + j) as f64);
        }
        if let Some(n) = fail_after {
            gmd.fail_raw_reads_after(n);
        }
        // UELs were interned in table order: i1..i4 are 1..=4, j1..j3 are 5..=7.
        let uel_i = i32::try_from(sel_i).unwrap();
        let uel_j = if sel_j == 0 { 0 } else { i32::try_from(LABELS_I.len() + sel_j).unwrap() };
        let expected: Vec<f64> = records
            .iter()
            .filter(|(i, j)| (sel_i == 0 || *i == sel_i - 1) && (sel_j == 0 || *j == sel_j - 1))
            .map(|&(i, j)| (i * 10 + j) as f64)
            .collect();
        let single = sel_i != 0 && sel_j != 0;

        let result = SymbolResolver::new().resolve(
            &DatabaseBackend::new(&gmd),
            &immediate(SymbolKind::Param, p, vec![uel_i, uel_j], false),
            None,
        );

        match result {
            Ok(resolved) if single => {
                prop_assert_eq!(resolved.resolution, Resolution::ScalarValue(expected[0]));
            }
            Ok(resolved) => {
                prop_assert_eq!(resolved.len(), expected.len());
                prop_assert_eq!(resolved.resolution, Resolution::ValueList(expected));
            }
            Err(BridgeError::RecordNotFound { .. }) => prop_assert!(expected.is_empty()),
            Err(BridgeError::BackendFailure { .. }) => {
                prop_assert!(fail_after.is_some_and(|n| n < expected.len()));
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
        let stats = gmd.cursor_stats();
        prop_assert_eq!(stats.outstanding(), 0);
        prop_assert!(stats.opened <= 1);
        prop_assert_eq!(stats.used_after_close, 0);
    }
}

#[test]
fn unsupported_pairs_never_open_a_cursor() {
    let mut dct = MemoryDictionary::new();
    let x = dct.add_symbol("x", SymbolKind::Set, 0);
    let mut gmd = MemoryDatabase::new();
    let v = gmd.add_symbol("v", SymbolKind::Var, 0);
    let mut resolver = SymbolResolver::new();

    let err = resolver
        .resolve(
            &DictionaryBackend::new(&dct),
            &immediate(SymbolKind::Set, x, vec![], false),
            None,
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "resolving set symbols against the dictionary is not implemented"
    );

    let err = resolver
        .resolve(
            &DatabaseBackend::new(&gmd),
            &immediate(SymbolKind::Equ, v, vec![], false),
            None,
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "resolving equation symbols against the database is not implemented"
    );
    assert_eq!(dct.cursor_stats().opened, 0);
    assert_eq!(gmd.cursor_stats().opened, 0);
}

#[test]
fn scalar_parameter_uses_single_record_path() {
    let mut gmd = MemoryDatabase::new();
    let alpha = gmd.add_symbol("alpha", SymbolKind::Param, 0);
    gmd.add_level(alpha, &[], 0.25);
    let got = SymbolResolver::new()
        .resolve(
            &DatabaseBackend::new(&gmd),
            &immediate(SymbolKind::Param, alpha, vec![], true),
            None,
        )
        .unwrap();
    assert_eq!(got.resolution, Resolution::ScalarValue(0.25));
    assert!(got.all_wildcard);
}

/// A database whose iterator cannot step or whose record count is
/// unavailable, delegating everything else.
struct FaultyDatabase {
    inner: MemoryDatabase,
    move_next_fails: bool,
    record_count_fails: bool,
}

impl MutableDatabase for FaultyDatabase {
    type Symbol = DbSymbolHandle;
    type Record = DbRecordIter;

    fn find_symbol(&self, name: &str) -> Option<DbSymbolHandle> {
        self.inner.find_symbol(name)
    }

    fn find_symbol_by_ordinal(&self, ordinal: i32) -> Option<DbSymbolHandle> {
        self.inner.find_symbol_by_ordinal(ordinal)
    }

    fn find_record(&self, symbol: &DbSymbolHandle, labels: &[&str]) -> Option<DbRecordIter> {
        self.inner.find_record(symbol, labels)
    }

    fn find_first_record(&self, symbol: &DbSymbolHandle) -> Option<DbRecordIter> {
        self.inner.find_first_record(symbol)
    }

    fn find_first_record_slice(
        &self,
        symbol: &DbSymbolHandle,
        labels: &[Option<&str>],
    ) -> Option<DbRecordIter> {
        self.inner.find_first_record_slice(symbol, labels)
    }

    fn record_has_next(&self, record: &DbRecordIter) -> bool {
        self.inner.record_has_next(record)
    }

    fn record_move_next(&self, record: &mut DbRecordIter) -> bool {
        !self.move_next_fails && self.inner.record_move_next(record)
    }

    fn get_record_raw(&self, record: &DbRecordIter, dim: usize) -> Option<RawRecord> {
        self.inner.get_record_raw(record, dim)
    }

    fn symbol_info(&self, symbol: &DbSymbolHandle, field: SymbolInfoField) -> Option<SymbolInfo> {
        if self.record_count_fails && field == SymbolInfoField::NrRecords {
            return None;
        }
        self.inner.symbol_info(symbol, field)
    }

    fn free_iterator(&self, record: DbRecordIter) {
        self.inner.free_iterator(record);
    }

    fn uel_label(&self, uel: i32) -> Option<String> {
        self.inner.uel_label(uel)
    }

    fn last_error_text(&self) -> String {
        self.inner.last_error_text()
    }
}

fn faulty_parameter(move_next_fails: bool, record_count_fails: bool) -> (FaultyDatabase, i32) {
    let mut inner = MemoryDatabase::new();
    let p = inner.add_symbol("p", SymbolKind::Param, 1);
    for (label, level) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
        inner.add_level(p, &[label], level);
    }
    let db = FaultyDatabase {
        inner,
        move_next_fails,
        record_count_fails,
    };
    (db, p)
}

#[test]
fn failed_step_is_not_a_short_list() {
    let (db, p) = faulty_parameter(true, false);
    let err = SymbolResolver::new()
        .resolve(
            &DatabaseBackend::new(&db),
            &immediate(SymbolKind::Param, p, vec![0], false),
            None,
        )
        .unwrap_err();
    assert!(
        matches!(err, BridgeError::BackendFailure { call: "record_move_next", .. }),
        "{err}"
    );
    let stats = db.inner.cursor_stats();
    assert_eq!((stats.opened, stats.closed, stats.used_after_close), (1, 1, 0));
}

#[test]
fn failed_record_count_aborts_the_read() {
    let (db, p) = faulty_parameter(false, true);
    let err = SymbolResolver::new()
        .resolve(
            &DatabaseBackend::new(&db),
            &immediate(SymbolKind::Param, p, vec![0], false),
            None,
        )
        .unwrap_err();
    assert!(
        matches!(err, BridgeError::BackendFailure { call: "symbol_info", .. }),
        "{err}"
    );
    let stats = db.inner.cursor_stats();
    assert_eq!((stats.opened, stats.closed, stats.used_after_close), (1, 1, 0));
}

#[test]
fn single_record_never_steps_or_counts() {
    let (mut db, p) = faulty_parameter(true, true);
    let b = db.inner.uel("b");
    let got = SymbolResolver::new()
        .resolve(
            &DatabaseBackend::new(&db),
            &immediate(SymbolKind::Param, p, vec![b], false),
            None,
        )
        .unwrap();
    assert_eq!(got.resolution, Resolution::ScalarValue(2.0));
    assert_eq!(db.inner.cursor_stats().outstanding(), 0);
}

#[test]
fn vm_lookup_by_unknown_name_reports_the_name() {
    let mut gmd = MemoryDatabase::new();
    let p = gmd.add_symbol("p", SymbolKind::Param, 1);
    gmd.add_level(p, &["a"], 1.0);
    let origin = ReferenceOrigin::Vm(VmIterator {
        ident: VmIdent {
            kind: SymbolKind::Param,
            index: p,
            dim: 1,
        },
        selectors: vec![0],
        compact: false,
    });

    let err = SymbolResolver::new()
        .resolve(&DatabaseBackend::new(&gmd), &origin, Some("demand"))
        .unwrap_err();
    assert!(
        matches!(&err, BridgeError::SymbolNotFound { symbol } if symbol == "demand"),
        "{err}"
    );
    assert_eq!(err.to_string(), "could not find symbol demand");
    let stats = gmd.cursor_stats();
    assert_eq!((stats.opened, stats.closed), (0, 0));

    let got = SymbolResolver::new()
        .resolve(&DatabaseBackend::new(&gmd), &origin, Some("p"))
        .unwrap();
    assert_eq!(got.resolution, Resolution::ValueList(vec![1.0]));
    let stats = gmd.cursor_stats();
    assert_eq!((stats.opened, stats.closed, stats.used_after_close), (1, 1, 0));
}
