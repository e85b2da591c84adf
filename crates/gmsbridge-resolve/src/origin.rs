//! Where a symbolic reference comes from.
//!
//! The interpreter hands references over in two shapes. Immediate mode
//! addresses the symbol by its database ordinal; the VM carries a symbol
//! identity with the dictionary index and dimension, and addresses the
//! database by name.

use gmsbridge_error::{BridgeError, Result};
use gmsbridge_types::{SymbolId, SymbolKind, SymbolicReference};

/// A reference issued in immediate mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateIterator {
    pub kind: SymbolKind,
    pub symbol_ordinal: i32,
    pub selectors: Vec<i32>,
    pub compact: bool,
}

/// Symbol identity as the VM knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmIdent {
    pub kind: SymbolKind,
    /// Dictionary symbol index.
    pub index: i32,
    pub dim: usize,
}

/// A reference issued by the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmIterator {
    pub ident: VmIdent,
    pub selectors: Vec<i32>,
    pub compact: bool,
}

/// A reference together with its calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceOrigin {
    Immediate(ImmediateIterator),
    Vm(VmIterator),
}

impl ReferenceOrigin {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Self::Immediate(it) => it.kind,
            Self::Vm(it) => it.ident.kind,
        }
    }

    /// Reference addressing the static dictionary, which always uses the
    /// numeric symbol index.
    pub fn dictionary_reference(&self) -> Result<SymbolicReference> {
        match self {
            Self::Immediate(it) => SymbolicReference::new(
                it.kind,
                SymbolId::Index(it.symbol_ordinal),
                it.selectors.clone(),
                it.compact,
            ),
            Self::Vm(it) => {
                check_vm_dim(it)?;
                SymbolicReference::new(
                    it.ident.kind,
                    SymbolId::Index(it.ident.index),
                    it.selectors.clone(),
                    it.compact,
                )
            }
        }
    }

    /// Reference addressing the mutable database.
    ///
    /// Immediate references use the ordinal. VM references use `name`,
    /// which is then required.
    pub fn database_reference(&self, name: Option<&str>) -> Result<SymbolicReference> {
        match self {
            Self::Immediate(_) => self.dictionary_reference(),
            Self::Vm(it) => {
                check_vm_dim(it)?;
                let name = name.ok_or_else(|| {
                    BridgeError::invalid_reference(
                        "a VM reference needs the symbol name to address the database",
                    )
                })?;
                SymbolicReference::new(
                    it.ident.kind,
                    SymbolId::Name(name.to_owned()),
                    it.selectors.clone(),
                    it.compact,
                )
            }
        }
    }
}

fn check_vm_dim(it: &VmIterator) -> Result<()> {
    if it.selectors.len() == it.ident.dim {
        Ok(())
    } else {
        Err(BridgeError::invalid_reference(format!(
            "symbol of dimension {} given {} selectors",
            it.ident.dim,
            it.selectors.len()
        )))
    }
}
