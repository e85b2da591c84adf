//! A small model instance: an opcode file whose equation rows and variable
//! columns are looked up through the catalogs.

use gmsbridge::{
    BridgeError, DatabaseBackend, DecodeConfig, DictionaryBackend, MemoryDatabase,
    MemoryDictionary, Opcode, ProgramBuilder, ReferenceOrigin, Resolution, StaticDictionary,
    SymbolKind, SymbolResolver, VmIdent, VmIterator, decode, decode_with, encode,
};
use tempfile::tempdir;

/// Dictionary of `x(i)` (columns 0..3) and `balance(i)` (rows 0..3).
fn dictionary() -> MemoryDictionary {
    let mut dct = MemoryDictionary::new();
    let x = dct.add_symbol("x", SymbolKind::Var, 1);
    let balance = dct.add_symbol("balance", SymbolKind::Equ, 1);
    for (n, label) in ["i1", "i2", "i3"].into_iter().enumerate() {
        let n = i32::try_from(n).expect("small");
        dct.add_record(x, &[label], n);
        dct.add_record(balance, &[label], n);
    }
    dct.add_symbol("cost", SymbolKind::Param, 1);
    dct
}

#[test]
fn equation_rows_match_decoded_blocks() {
    let dct = dictionary();
    let mut resolver = SymbolResolver::new();
    let rows = resolver
        .resolve(
            &DictionaryBackend::new(&dct),
            &ReferenceOrigin::Vm(VmIterator {
                ident: VmIdent {
                    kind: SymbolKind::Equ,
                    index: dct.symbol_index("balance").expect("declared"),
                    dim: 1,
                },
                selectors: vec![0],
                compact: true,
            }),
            None,
        )
        .expect("rows");
    let Resolution::Range { count, start_index } = rows.resolution else {
        panic!("expected a range, got {:?}", rows.resolution);
    };
    assert_eq!((count, start_index), (3, 0));

    // One nonlinear block per row: x(i) * cost(i).
    let mut b = ProgramBuilder::new();
    for row in 0..count {
        let col = u32::try_from(row).expect("small");
        b.begin_equation()
            .emit(Opcode::PushV, col)
            .emit(Opcode::MulI, col)
            .emit(Opcode::Store, col);
    }
    let program = b.finish(vec![1.0, 2.0, 3.0]);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nlcode.bin");
    encode(&program, &path).expect("encode");
    let decoded = decode_with(&path, &DecodeConfig::strict()).expect("decode");
    assert_eq!(decoded.equation_count(), count);
    assert_eq!(decoded.min_pool_len(), 3);
}

#[test]
fn parameter_values_come_from_the_database() {
    let dct = dictionary();
    let mut gmd = MemoryDatabase::new();
    let cost = gmd.add_symbol("cost", SymbolKind::Param, 1);
    gmd.add_level(cost, &["i1"], 1.0);
    gmd.add_level(cost, &["i3"], 3.0);

    let i3 = dct.label_to_index("i3").expect("interned");
    let origin = ReferenceOrigin::Vm(VmIterator {
        ident: VmIdent {
            kind: SymbolKind::Param,
            index: dct.symbol_index("cost").expect("declared"),
            dim: 1,
        },
        selectors: vec![i3],
        compact: false,
    });
    let backend = DatabaseBackend::with_dictionary(&gmd, &dct);
    let mut resolver = SymbolResolver::new();
    let got = resolver.resolve(&backend, &origin, Some("cost")).expect("value");
    assert_eq!(got.resolution, Resolution::ScalarValue(3.0));

    let i2 = dct.label_to_index("i2").expect("interned");
    let origin = ReferenceOrigin::Vm(VmIterator {
        ident: VmIdent {
            kind: SymbolKind::Param,
            index: 3,
            dim: 1,
        },
        selectors: vec![i2],
        compact: false,
    });
    let err = resolver
        .resolve(&backend, &origin, Some("cost"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::RecordNotFound { .. }));
    assert!(err.to_string().starts_with("could not find record for symbol cost('i2')"));
    assert_eq!(gmd.cursor_stats().outstanding(), 0);
}

#[test]
fn missing_opcode_file_cannot_be_opened() {
    let dir = tempdir().expect("tempdir");
    let err = decode(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, BridgeError::CannotOpen { .. }));
    assert!(err.is_user_recoverable());
}
