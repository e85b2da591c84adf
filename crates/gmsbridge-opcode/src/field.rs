//! Variable-width operand encoding.
//!
//! Every operand in an opcode file is preceded by one width selector byte
//! describing the little-endian payload that follows:
//!
//! | Selector | Payload size | Range          |
//! |----------|--------------|----------------|
//! | 0        | 1            | `0..2^8`       |
//! | 1        | 2            | `0..2^16`      |
//! | 2        | 4            | `0..2^32`      |
//! | other    | n/a          | malformed      |

/// Compute the payload size for a width selector.
///
/// Returns `None` for selectors outside `0..=2`.
pub const fn field_payload_len(selector: u8) -> Option<usize> {
    match selector {
        0 => Some(1),
        1 => Some(2),
        2 => Some(4),
        _ => None,
    }
}

/// Choose the narrowest selector able to hold `value`.
pub const fn field_selector_for(value: u32) -> u8 {
    if value <= 0xFF {
        0
    } else if value <= 0xFFFF {
        1
    } else {
        2
    }
}

/// Total encoded size of `value` (selector byte included).
pub const fn field_len(value: u32) -> usize {
    match field_payload_len(field_selector_for(value)) {
        Some(n) => n + 1,
        None => unreachable!(),
    }
}

/// Decode a field from a byte slice, returning `(value, bytes_consumed)`.
///
/// Returns `None` when the selector is invalid or the slice is too short.
pub fn read_field(buf: &[u8]) -> Option<(u32, usize)> {
    let (&selector, rest) = buf.split_first()?;
    let len = field_payload_len(selector)?;
    let payload = rest.get(..len)?;
    let value = match *payload {
        [b0] => u32::from(b0),
        [b0, b1] => u32::from(u16::from_le_bytes([b0, b1])),
        [b0, b1, b2, b3] => u32::from_le_bytes([b0, b1, b2, b3]),
        _ => return None,
    };
    Some((value, len + 1))
}

/// Append the narrowest encoding of `value` to `out`.
///
/// Returns the number of bytes written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_field(out: &mut Vec<u8>, value: u32) -> usize {
    let selector = field_selector_for(value);
    out.push(selector);
    match selector {
        0 => out.push(value as u8),
        1 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => out.extend_from_slice(&value.to_le_bytes()),
    }
    field_len(value)
}
