//! Opcode file decoding.
//!
//! An opcode file is a sequence of equation blocks followed by a constant
//! pool:
//!
//! ```text
//! Header(len) op(operand) × (len-1)     one block per equation
//! ...
//! End(0) reserved:u32                   reserved word is always 0
//! pool_len:u32 f64 × pool_len           pool_len > 0
//! [f64 ...]                             trailing diagnostics, ignored
//! ```
//!
//! Opcodes are single bytes, operands are variable-width fields (see
//! [`crate::field`]), and every multi-byte value is little-endian.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use gmsbridge_error::{BridgeError, Result};
use gmsbridge_types::{Instruction, Opcode, OpcodeProgram};
use tracing::{debug, warn};

use crate::config::DecodeConfig;
use crate::reader::StreamReader;

/// Upper bound on a single up-front reservation driven by a header length.
///
/// Header lengths come from the file; past this bound the vectors simply grow
/// as instructions arrive.
const MAX_RESERVE_HINT: usize = 1 << 20;

/// Bytes following a stray `NoOp` record before the pool trailer.
const NOOP_TRAILER_PADDING: usize = 3;

/// Decode the opcode file at `path` with the default configuration.
pub fn decode(path: impl AsRef<Path>) -> Result<OpcodeProgram> {
    decode_with(path, &DecodeConfig::default())
}

/// Decode the opcode file at `path`.
pub fn decode_with(path: impl AsRef<Path>, config: &DecodeConfig) -> Result<OpcodeProgram> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            BridgeError::CannotOpen {
                path: path.to_path_buf(),
            }
        } else {
            BridgeError::Io(e)
        }
    })?;
    let config = config.clone().validated();
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "opcode_decode",
        path = %path.display(),
        buffer_capacity = config.buffer_capacity,
    );
    let _guard = span.enter();
    decode_reader_with(BufReader::with_capacity(config.buffer_capacity, file), &config)
}

/// Decode an in-memory opcode image with the default configuration.
pub fn decode_bytes(bytes: &[u8]) -> Result<OpcodeProgram> {
    decode_reader_with(bytes, &DecodeConfig::default())
}

/// Decode an opcode stream from any reader with the default configuration.
pub fn decode_reader<R: Read>(reader: R) -> Result<OpcodeProgram> {
    decode_reader_with(reader, &DecodeConfig::default())
}

/// Decode an opcode stream from any reader.
///
/// On failure nothing decoded so far is returned; the partial buffers are
/// dropped with the decoder.
pub fn decode_reader_with<R: Read>(reader: R, config: &DecodeConfig) -> Result<OpcodeProgram> {
    let program = Decoder::new(reader, config).run()?;
    debug!(
        equations = program.equation_count(),
        instructions = program.instructions().len(),
        pool_len = program.pool().len(),
        min_pool_len = program.min_pool_len(),
        "opcode stream decoded"
    );
    if program.min_pool_len() as usize > program.pool().len() {
        if config.strict_pool_check {
            program.validate_pool()?;
        } else {
            warn!(
                min_pool_len = program.min_pool_len(),
                pool_len = program.pool().len(),
                "instructions reference constants past the end of the pool"
            );
        }
    }
    Ok(program)
}

/// Position of the decoder in the framing grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    ExpectHeaderOrEnd,
    ReadingBlock { remaining: u32 },
    PoolTrailer,
}

struct Decoder<'a, R> {
    reader: StreamReader<R>,
    config: &'a DecodeConfig,
    instructions: Vec<Instruction>,
    equation_offsets: Vec<usize>,
    min_pool_len: u32,
}

impl<'a, R: Read> Decoder<'a, R> {
    fn new(reader: R, config: &'a DecodeConfig) -> Self {
        Self {
            reader: StreamReader::new(reader),
            config,
            instructions: Vec::new(),
            equation_offsets: Vec::new(),
            min_pool_len: 0,
        }
    }

    fn run(mut self) -> Result<OpcodeProgram> {
        let mut state = DecodeState::ExpectHeaderOrEnd;
        loop {
            state = match state {
                DecodeState::ExpectHeaderOrEnd => self.expect_header_or_end()?,
                DecodeState::ReadingBlock { remaining } => self.read_block(remaining)?,
                DecodeState::PoolTrailer => {
                    let pool = self.read_pool()?;
                    return Ok(OpcodeProgram::from_parts(
                        self.instructions,
                        self.equation_offsets,
                        pool,
                        self.min_pool_len,
                    ));
                }
            };
        }
    }

    fn expect_header_or_end(&mut self) -> Result<DecodeState> {
        let at = self.reader.offset();
        let byte = self.reader.read_u8("opcode")?;
        match Opcode::from_byte(byte) {
            Some(Opcode::Header) => {
                let len = self.reader.read_field("header length")?;
                if len == 0 {
                    return Err(BridgeError::malformed(
                        at,
                        format!("equation {} has a zero-length header", self.equation_offsets.len()),
                    ));
                }
                let hint = usize::try_from(len).unwrap_or(MAX_RESERVE_HINT);
                self.instructions.reserve(hint.min(MAX_RESERVE_HINT));
                self.equation_offsets.push(self.instructions.len());
                self.instructions.push(Instruction::new(Opcode::Header, len));
                Ok(DecodeState::ReadingBlock { remaining: len - 1 })
            }
            Some(Opcode::End) => {
                self.reader.read_field("End record")?;
                let reserved = self.reader.read_u32_le("reserved word after End")?;
                if reserved != 0 {
                    warn!(reserved, "reserved word after End should be 0");
                }
                Ok(DecodeState::PoolTrailer)
            }
            Some(Opcode::NoOp) if self.config.noop_trailer_shim => {
                self.skip_stray_noop_after_store(at)?;
                Ok(DecodeState::PoolTrailer)
            }
            Some(op) => Err(BridgeError::malformed(
                at,
                format!("expecting Header, found {op}"),
            )),
            None => Err(BridgeError::malformed(
                at,
                format!("expecting Header, found unknown opcode byte {byte}"),
            )),
        }
    }

    fn read_block(&mut self, remaining: u32) -> Result<DecodeState> {
        let equation = self.equation_offsets.len() - 1;
        for _ in 0..remaining {
            let at = self.reader.offset();
            let byte = self.reader.read_u8("opcode")?;
            let opcode = match Opcode::from_byte(byte) {
                Some(op) if op.is_framing() => {
                    return Err(BridgeError::malformed(
                        at,
                        format!("unexpected {op} inside equation {equation}"),
                    ));
                }
                Some(op) => op,
                None => {
                    return Err(BridgeError::malformed(
                        at,
                        format!("unknown opcode byte {byte} in equation {equation}"),
                    ));
                }
            };
            let operand = self.reader.read_field("operand")?;
            if opcode.references_pool() {
                self.min_pool_len = self.min_pool_len.max(operand.saturating_add(1));
            }
            self.instructions.push(Instruction::new(opcode, operand));
        }
        Ok(DecodeState::ExpectHeaderOrEnd)
    }

    /// Compatibility shim for a producer quirk: a `NoOp` record written right
    /// after an equation's final `Store` instead of the `End` record. It is
    /// followed by three padding bytes and then directly by the pool length.
    fn skip_stray_noop_after_store(&mut self, at: u64) -> Result<()> {
        if self.instructions.last().map(|i| i.opcode) != Some(Opcode::Store) {
            return Err(BridgeError::malformed(
                at,
                "expecting Header, found NoOp not preceded by Store",
            ));
        }
        warn!(
            offset = at,
            equations = self.equation_offsets.len(),
            "stray NoOp after Store in place of End; treating the stream as finished"
        );
        self.reader
            .skip(NOOP_TRAILER_PADDING, "NoOp trailer padding")
    }

    fn read_pool(&mut self) -> Result<Vec<f64>> {
        let pool_len = self.reader.read_u32_le("pool length")?;
        if pool_len == 0 {
            return Err(BridgeError::pool("pool length is zero"));
        }
        let pool_len = usize::try_from(pool_len)
            .map_err(|_| BridgeError::pool(format!("pool length {pool_len} does not fit")))?;
        let mut pool = Vec::with_capacity(pool_len.min(MAX_RESERVE_HINT));
        for _ in 0..pool_len {
            pool.push(self.reader.read_f64_le("pool constant")?);
        }

        let (trailing, partial) = self.reader.read_trailing_doubles()?;
        for (i, v) in trailing.iter().enumerate() {
            if v.abs() > 0.0 {
                warn!(index = i, value = %v, "nonzero trailing value after the pool");
            }
        }
        if partial != 0 {
            debug!(bytes = partial, "partial trailing word after the pool");
        }
        Ok(pool)
    }
}
