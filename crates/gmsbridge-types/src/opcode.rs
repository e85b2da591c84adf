/// Nonlinear-equation opcodes.
///
/// These correspond 1:1 to the modeling platform's instruction set for
/// nonlinear expression trees. Each opcode is one step of a postfix program
/// evaluated on a value stack; the numeric values match the platform's byte
/// encoding and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    NoOp = 0,

    // === Stack pushes ===
    /// Push variable.
    PushV = 1,
    /// Push immediate (pool constant).
    PushI = 2,

    /// Store the evaluated expression into the row.
    Store = 3,

    // === Arithmetic ===
    /// Add.
    Add = 4,
    /// Add variable.
    AddV = 5,
    /// Add immediate.
    AddI = 6,
    /// Subtract.
    Sub = 7,
    /// Subtract variable.
    SubV = 8,
    /// Subtract immediate.
    SubI = 9,
    /// Multiply.
    Mul = 10,
    /// Multiply variable.
    MulV = 11,
    /// Multiply immediate.
    MulI = 12,
    /// Divide.
    Div = 13,
    /// Divide variable.
    DivV = 14,
    /// Divide immediate.
    DivI = 15,
    /// Unary minus.
    UMin = 16,
    /// Unary minus variable.
    UMinV = 17,

    // === Framing ===
    /// Equation header; operand is the block length including the header.
    Header = 18,
    /// End of instruction list.
    End = 19,

    // === Function calls ===
    /// Function call with 1 argument.
    CallArg1 = 20,
    /// Function call with 2 arguments.
    CallArg2 = 21,
    /// Function call with N arguments.
    CallArgN = 22,
    /// Number of arguments (precedes `CallArgN`).
    FuncArgN = 23,

    /// Multiply by immediate and add.
    MulIAdd = 24,
    /// Push a zero constant.
    PushZero = 25,
    Chk = 26,
    AddO = 27,
    PushO = 28,
    Invoc = 29,
    StackIn = 30,
}

impl Opcode {
    /// Total number of opcodes defined.
    pub const COUNT: usize = 31;

    /// Get the opcode mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoOp => "NoOp",
            Self::PushV => "PushV",
            Self::PushI => "PushI",
            Self::Store => "Store",
            Self::Add => "Add",
            Self::AddV => "AddV",
            Self::AddI => "AddI",
            Self::Sub => "Sub",
            Self::SubV => "SubV",
            Self::SubI => "SubI",
            Self::Mul => "Mul",
            Self::MulV => "MulV",
            Self::MulI => "MulI",
            Self::Div => "Div",
            Self::DivV => "DivV",
            Self::DivI => "DivI",
            Self::UMin => "UMin",
            Self::UMinV => "UMinV",
            Self::Header => "Header",
            Self::End => "End",
            Self::CallArg1 => "CallArg1",
            Self::CallArg2 => "CallArg2",
            Self::CallArgN => "CallArgN",
            Self::FuncArgN => "FuncArgN",
            Self::MulIAdd => "MulIAdd",
            Self::PushZero => "PushZero",
            Self::Chk => "Chk",
            Self::AddO => "AddO",
            Self::PushO => "PushO",
            Self::Invoc => "Invoc",
            Self::StackIn => "StackIn",
        }
    }

    /// Decode an opcode from its byte value.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::NoOp),
            1 => Some(Self::PushV),
            2 => Some(Self::PushI),
            3 => Some(Self::Store),
            4 => Some(Self::Add),
            5 => Some(Self::AddV),
            6 => Some(Self::AddI),
            7 => Some(Self::Sub),
            8 => Some(Self::SubV),
            9 => Some(Self::SubI),
            10 => Some(Self::Mul),
            11 => Some(Self::MulV),
            12 => Some(Self::MulI),
            13 => Some(Self::Div),
            14 => Some(Self::DivV),
            15 => Some(Self::DivI),
            16 => Some(Self::UMin),
            17 => Some(Self::UMinV),
            18 => Some(Self::Header),
            19 => Some(Self::End),
            20 => Some(Self::CallArg1),
            21 => Some(Self::CallArg2),
            22 => Some(Self::CallArgN),
            23 => Some(Self::FuncArgN),
            24 => Some(Self::MulIAdd),
            25 => Some(Self::PushZero),
            26 => Some(Self::Chk),
            27 => Some(Self::AddO),
            28 => Some(Self::PushO),
            29 => Some(Self::Invoc),
            30 => Some(Self::StackIn),
            _ => None,
        }
    }

    /// The byte value of this opcode.
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether the operand of this opcode is an index into the constant pool.
    pub const fn references_pool(self) -> bool {
        matches!(
            self,
            Self::PushI | Self::AddI | Self::SubI | Self::MulI | Self::DivI | Self::MulIAdd
        )
    }

    /// Whether this opcode delimits blocks instead of computing anything.
    pub const fn is_framing(self) -> bool {
        matches!(self, Self::Header | Self::End)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    /// The opcode.
    pub opcode: Opcode,
    /// The operand: block length, variable index, pool index or function code.
    pub operand: u32,
}

impl Instruction {
    #[inline]
    pub const fn new(opcode: Opcode, operand: u32) -> Self {
        Self { opcode, operand }
    }
}
