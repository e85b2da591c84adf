//! Symbolic references into a catalog and their resolved form.

use std::fmt;

use gmsbridge_error::{BridgeError, Result};

use crate::limits::{MAX_INDEX_DIM, WILDCARD};

/// The kind of a catalog symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SymbolKind {
    Set,
    Param,
    Var,
    Equ,
}

impl SymbolKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Param => "parameter",
            Self::Var => "variable",
            Self::Equ => "equation",
        }
    }

    /// Variables and equations map to model columns and rows.
    pub const fn is_equvar(self) -> bool {
        matches!(self, Self::Var | Self::Equ)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a symbol is addressed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolId {
    /// Numeric symbol index (dictionary index or database ordinal).
    Index(i32),
    /// Symbol name.
    Name(String),
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(idx) => write!(f, "#{idx}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A reference to (a slice of) a catalog symbol.
///
/// Each selector is a positive UEL index or [`WILDCARD`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicReference {
    kind: SymbolKind,
    symbol_id: SymbolId,
    selectors: Vec<i32>,
    compact_requested: bool,
}

impl SymbolicReference {
    /// Build a reference, checking the dimension limit and selector signs.
    pub fn new(
        kind: SymbolKind,
        symbol_id: SymbolId,
        selectors: Vec<i32>,
        compact_requested: bool,
    ) -> Result<Self> {
        if selectors.len() > MAX_INDEX_DIM {
            return Err(BridgeError::invalid_reference(format!(
                "dimension {} exceeds the maximum of {MAX_INDEX_DIM}",
                selectors.len()
            )));
        }
        if let Some(pos) = selectors.iter().position(|&s| s < WILDCARD) {
            return Err(BridgeError::invalid_reference(format!(
                "selector {pos} is negative ({})",
                selectors[pos]
            )));
        }
        Ok(Self {
            kind,
            symbol_id,
            selectors,
            compact_requested,
        })
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn symbol_id(&self) -> &SymbolId {
        &self.symbol_id
    }

    pub fn selectors(&self) -> &[i32] {
        &self.selectors
    }

    pub fn dim(&self) -> usize {
        self.selectors.len()
    }

    pub fn compact_requested(&self) -> bool {
        self.compact_requested
    }

    /// Every selector is a wildcard. Vacuously true for scalars.
    pub fn all_wildcard(&self) -> bool {
        self.selectors.iter().all(|&s| s == WILDCARD)
    }

    /// Whether a lookup reads exactly one record.
    ///
    /// Scalars always do. Otherwise every selector must be concrete and no
    /// compact read may have been requested: a compact request forces the
    /// multi-record path even without wildcards.
    pub fn is_single_record(&self) -> bool {
        self.selectors.is_empty()
            || (!self.compact_requested && self.selectors.iter().all(|&s| s != WILDCARD))
    }
}

/// The records a resolution produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    /// `count` contiguous indices starting at `start_index`.
    Range { count: usize, start_index: i32 },
    /// Explicit indices in catalog order.
    IndexList(Vec<i32>),
    /// The level of a single parameter record.
    ScalarValue(f64),
    /// Parameter levels in catalog order.
    ValueList(Vec<f64>),
}

impl Resolution {
    /// Number of records covered.
    pub fn len(&self) -> usize {
        match self {
            Self::Range { count, .. } => *count,
            Self::IndexList(v) => v.len(),
            Self::ScalarValue(_) => 1,
            Self::ValueList(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of resolving one [`SymbolicReference`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedSymbol {
    pub resolution: Resolution,
    /// True iff every selector was a wildcard.
    pub all_wildcard: bool,
}

impl ResolvedSymbol {
    pub fn new(resolution: Resolution, all_wildcard: bool) -> Self {
        Self {
            resolution,
            all_wildcard,
        }
    }

    pub fn len(&self) -> usize {
        self.resolution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolution.is_empty()
    }

    /// Materialize the covered indices, expanding a range.
    ///
    /// Returns `None` for parameter values, and for a range running past
    /// `i32::MAX`.
    pub fn indices(&self) -> Option<Vec<i32>> {
        match &self.resolution {
            Resolution::Range { count, start_index } => {
                let count = i32::try_from(*count).ok()?;
                (0..count).map(|i| start_index.checked_add(i)).collect()
            }
            Resolution::IndexList(v) => Some(v.clone()),
            Resolution::ScalarValue(_) | Resolution::ValueList(_) => None,
        }
    }
}
