//! RFC 4648 base-32 encoding (standard alphabet, no padding) for token plaintexts.
//!
//! Only encoding is needed: presented tokens are hashed as-is, never decoded.

/// RFC 4648 alphabet (32 symbols).
const ENCODE_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encode `input` without `=` padding. Output length is `ceil(len * 8 / 5)`.
pub fn encode_no_pad(input: &[u8]) -> String {
    // ---
    let mut out = String::with_capacity((input.len() * 8).div_ceil(5));

    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in input {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;

        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1f) as usize;
            out.push(ENCODE_ALPHABET[index] as char);
        }
        // Keep only the bits not yet emitted.
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(ENCODE_ALPHABET[index] as char);
    }

    out
}
