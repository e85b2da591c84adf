//! Opcode file encoding, the mirror image of [`crate::decoder`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gmsbridge_error::{BridgeError, Result};
use gmsbridge_types::{Opcode, OpcodeProgram};
use tracing::debug;

use crate::field::{field_len, write_field};

/// Serialize `program` into a new byte vector.
///
/// Refuses programs whose blocks do not follow the header framing, and
/// programs with an empty pool (the decoder would reject them).
pub fn encode_to_vec(program: &OpcodeProgram) -> Result<Vec<u8>> {
    program.validate_framing()?;
    if program.pool().is_empty() {
        return Err(BridgeError::EncodeInvariant {
            detail: "the constant pool is empty".to_owned(),
        });
    }
    let pool_len = u32::try_from(program.pool().len()).map_err(|_| BridgeError::EncodeInvariant {
        detail: format!("pool of {} constants exceeds u32", program.pool().len()),
    })?;

    let code_len: usize = program
        .instructions()
        .iter()
        .map(|i| 1 + field_len(i.operand))
        .sum();
    let mut out = Vec::with_capacity(code_len + 11 + program.pool().len() * 8);

    for instr in program.instructions() {
        out.push(instr.opcode.as_byte());
        write_field(&mut out, instr.operand);
    }
    out.push(Opcode::End.as_byte());
    write_field(&mut out, 0);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&pool_len.to_le_bytes());
    for v in program.pool() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

/// Serialize `program` into `writer`.
pub fn encode_to_writer<W: Write>(program: &OpcodeProgram, mut writer: W) -> Result<()> {
    let bytes = encode_to_vec(program)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write `program` to the file at `path`, replacing its contents.
pub fn encode(program: &OpcodeProgram, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|_| BridgeError::CannotOpen {
        path: path.to_path_buf(),
    })?;
    encode_to_writer(program, BufWriter::new(file))?;
    debug!(
        path = %path.display(),
        equations = program.equation_count(),
        pool_len = program.pool().len(),
        "opcode file written"
    );
    Ok(())
}
