//! Reader and writer for the platform's nonlinear opcode files.

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod field;
mod reader;

pub use config::DecodeConfig;
pub use decoder::{decode, decode_bytes, decode_reader, decode_reader_with, decode_with};
pub use encoder::{encode, encode_to_vec, encode_to_writer};
pub use field::{field_len, field_payload_len, field_selector_for, read_field, write_field};
