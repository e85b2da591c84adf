//! Core data types shared by the opcode decoder and the symbol resolver.

pub mod label;
pub mod limits;
pub mod opcode;
pub mod program;
pub mod symbol;

pub use label::{KeyPart, quote_label, render_key_tuple};
pub use opcode::{Instruction, Opcode};
pub use program::{OpcodeProgram, ProgramBuilder};
pub use symbol::{Resolution, ResolvedSymbol, SymbolId, SymbolKind, SymbolicReference};
