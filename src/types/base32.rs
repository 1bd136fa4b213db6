//! Nix-flavoured base-32 encoding.
//!
//! The alphabet omits `e`, `o`, `t` and `u`, and digits are emitted starting
//! from the most significant 5-bit group of the little-endian bit stream.

pub const ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Number of characters needed to encode `len` bytes
pub fn encoded_len(len: usize) -> usize {
    if len == 0 {
        0
    } else {
        (len * 8 - 1) / 5 + 1
    }
}

pub fn encode(bytes: &[u8]) -> String {
    let len = encoded_len(bytes.len());
    let mut out = String::with_capacity(len);

    for n in (0..len).rev() {
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        let low = (bytes[i] as u16) >> j;
        let high = if i + 1 < bytes.len() {
            (bytes[i + 1] as u16) << (8 - j)
        } else {
            0
        };
        out.push(ALPHABET[((low | high) & 0x1f) as usize] as char);
    }

    out
}

/// Decode into exactly `size` bytes, or `None` if the input is malformed
pub fn decode(input: &str, size: usize) -> Option<Vec<u8>> {
    if input.len() != encoded_len(size) {
        return None;
    }

    let mut out = vec![0u8; size];

    for (n, c) in input.bytes().rev().enumerate() {
        let digit = ALPHABET.iter().position(|&a| a == c)? as u16;
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;

        out[i] |= (digit << j) as u8;
        let carry = digit >> (8 - j);
        if i + 1 < size {
            out[i + 1] |= carry as u8;
        } else if carry != 0 {
            return None;
        }
    }

    Some(out)
}

pub fn is_valid_char(c: char) -> bool {
    c.is_ascii() && ALPHABET.contains(&(c as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(20), 32);
        assert_eq!(encoded_len(32), 52);
        assert_eq!(encoded_len(64), 103);
    }

    #[test]
    fn test_single_bytes() {
        assert_eq!(encode(&[0x00]), "00");
        assert_eq!(encode(&[0xff]), "7z");
        assert_eq!(decode("7z", 1), Some(vec![0xff]));
    }

    #[test]
    fn test_decode_restores_digest() {
        let digest: Vec<u8> = (0u8..32).map(|b| b.wrapping_mul(37)).collect();
        let text = encode(&digest);
        assert_eq!(text.len(), 52);
        assert_eq!(decode(&text, 32), Some(digest));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        // 'e' is not part of the alphabet
        assert_eq!(decode("0e", 1), None);
        // wrong length
        assert_eq!(decode("000", 1), None);
        // top digit overflows a single byte
        assert_eq!(decode("8z", 1), None);
    }
}
