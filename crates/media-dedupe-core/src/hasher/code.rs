use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher as _;
use thiserror::Error;
use twox_hash::XxHash64;

/// Widest code accepted by the parser. Real perceptual hashes top out at 1024 bits.
pub const MAX_CODE_BITS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed hash '{raw}': {reason}")]
    MalformedHash { raw: String, reason: &'static str },

    #[error("hash width mismatch: {left} bits vs {right} bits")]
    WidthMismatch { left: u32, right: u32 },
}

/// How raw hash columns are spelled by the scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    /// Hex digits, optionally prefixed with `0x`. Four bits per digit.
    #[default]
    Hex,
    /// A string of `0`/`1`, optionally prefixed with `0b`. One bit per digit.
    Binary,
}

/// A fixed-width bit string.
///
/// Stored little-endian by word: `words[0]` holds the 64 least significant bits,
/// i.e. the last 16 hex digits of the textual form. Bits above `bits` are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitCode {
    bits: u32,
    words: Box<[u64]>,
}

impl BitCode {
    pub fn from_u64(value: u64, bits: u32) -> Self {
        assert!((1..=64).contains(&bits), "from_u64 supports 1..=64 bits");
        let masked = if bits == 64 {
            value
        } else {
            value & ((1u64 << bits) - 1)
        };
        Self {
            bits,
            words: vec![masked].into_boxed_slice(),
        }
    }

    pub fn parse(raw: &str, encoding: HashEncoding) -> Result<Self, CodecError> {
        let trimmed = raw.trim();
        let (digits, bits_per_digit) = match encoding {
            HashEncoding::Hex => (
                trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed),
                4usize,
            ),
            HashEncoding::Binary => (
                trimmed
                    .strip_prefix("0b")
                    .or_else(|| trimmed.strip_prefix("0B"))
                    .unwrap_or(trimmed),
                1usize,
            ),
        };

        let malformed = |reason| CodecError::MalformedHash {
            raw: raw.to_string(),
            reason,
        };

        if digits.is_empty() {
            return Err(malformed("empty value"));
        }
        let bits = digits.len() * bits_per_digit;
        if bits > MAX_CODE_BITS {
            return Err(malformed("wider than the supported maximum"));
        }

        let radix = if bits_per_digit == 4 { 16 } else { 2 };
        let mut words = vec![0u64; bits.div_ceil(64)];
        // Walk from the least significant digit; a digit never straddles a word.
        for (k, ch) in digits.chars().rev().enumerate() {
            let value = ch
                .to_digit(radix)
                .ok_or_else(|| malformed(if radix == 16 { "non-hex digit" } else { "non-binary digit" }))?;
            let pos = k * bits_per_digit;
            words[pos / 64] |= u64::from(value) << (pos % 64);
        }

        Ok(Self {
            bits: bits as u32,
            words: words.into_boxed_slice(),
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Hamming distance. Codes of different widths are never comparable.
    pub fn distance(&self, other: &BitCode) -> Result<u32, CodecError> {
        if self.bits != other.bits {
            return Err(CodecError::WidthMismatch {
                left: self.bits,
                right: other.bits,
            });
        }
        Ok(self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }

    /// Read `len` (1..=64) bits starting at bit `start`, counted from the least significant end.
    fn read_bits(&self, start: u32, len: u32) -> u64 {
        debug_assert!((1..=64).contains(&len) && start + len <= self.bits);
        let word = (start / 64) as usize;
        let offset = start % 64;
        let mut value = self.words[word] >> offset;
        if offset != 0 && offset + len > 64 {
            value |= self.words[word + 1] << (64 - offset);
        }
        if len == 64 {
            value
        } else {
            value & ((1u64 << len) - 1)
        }
    }

    /// Key for the bit range `[lo, hi)`.
    ///
    /// Ranges of up to 64 bits map to their exact value. Wider ranges are digested,
    /// so equal ranges always share a key and unequal ones rarely do.
    pub fn block_key(&self, lo: u32, hi: u32) -> u64 {
        let len = hi - lo;
        if len <= 64 {
            return self.read_bits(lo, len);
        }
        let mut hasher = XxHash64::with_seed(0);
        let mut pos = lo;
        while pos < hi {
            let take = (hi - pos).min(64);
            hasher.write_u64(self.read_bits(pos, take));
            pos += take;
        }
        hasher.finish()
    }

    /// True when the bit range `[lo, hi)` is identical in both codes.
    pub fn block_eq(&self, other: &BitCode, lo: u32, hi: u32) -> bool {
        let mut pos = lo;
        while pos < hi {
            let take = (hi - pos).min(64);
            if self.read_bits(pos, take) != other.read_bits(pos, take) {
                return false;
            }
            pos += take;
        }
        true
    }
}

impl fmt::Display for BitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits % 4 == 0 {
            for nibble in (0..self.bits / 4).rev() {
                write!(f, "{:x}", self.read_bits(nibble * 4, 4))?;
            }
        } else {
            write!(f, "0b")?;
            for bit in (0..self.bits).rev() {
                write!(f, "{}", self.read_bits(bit, 1))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_width_and_display() {
        let code = BitCode::parse("0f0f", HashEncoding::Hex).unwrap();
        assert_eq!(code.bits(), 16);
        assert_eq!(code.to_string(), "0f0f");

        let prefixed = BitCode::parse("0x0F0F", HashEncoding::Hex).unwrap();
        assert_eq!(prefixed, code);
    }

    #[test]
    fn test_parse_trims_padding() {
        // CHAR(n) columns come back space padded
        let code = BitCode::parse("  ffee   ", HashEncoding::Hex).unwrap();
        assert_eq!(code.bits(), 16);
    }

    #[test]
    fn test_parse_binary() {
        let code = BitCode::parse("0b1011", HashEncoding::Binary).unwrap();
        assert_eq!(code.bits(), 4);
        assert_eq!(code, BitCode::from_u64(0b1011, 4));
        assert_eq!(code.to_string(), "b");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            BitCode::parse("", HashEncoding::Hex),
            Err(CodecError::MalformedHash { .. })
        ));
        assert!(matches!(
            BitCode::parse("0x", HashEncoding::Hex),
            Err(CodecError::MalformedHash { .. })
        ));
        assert!(matches!(
            BitCode::parse("12zz", HashEncoding::Hex),
            Err(CodecError::MalformedHash { .. })
        ));
        assert!(matches!(
            BitCode::parse("0102", HashEncoding::Binary),
            Err(CodecError::MalformedHash { .. })
        ));
        let too_wide = "f".repeat(MAX_CODE_BITS / 4 + 1);
        assert!(BitCode::parse(&too_wide, HashEncoding::Hex).is_err());
    }

    #[test]
    fn test_distance() {
        let a = BitCode::parse("0f0f", HashEncoding::Hex).unwrap();
        let b = BitCode::parse("0f0e", HashEncoding::Hex).unwrap();
        let c = BitCode::parse("f0f0", HashEncoding::Hex).unwrap();
        assert_eq!(a.distance(&a).unwrap(), 0);
        assert_eq!(a.distance(&b).unwrap(), 1);
        assert_eq!(a.distance(&c).unwrap(), 16);
        assert_eq!(c.distance(&a).unwrap(), 16);
    }

    #[test]
    fn test_distance_width_mismatch() {
        let a = BitCode::parse("0f0f", HashEncoding::Hex).unwrap();
        let b = BitCode::parse("0f0f0f0f", HashEncoding::Hex).unwrap();
        assert_eq!(
            a.distance(&b),
            Err(CodecError::WidthMismatch {
                left: 16,
                right: 32
            })
        );
    }

    #[test]
    fn test_wide_codes_span_words() {
        // 256-bit hashes differ in one bit in the top word and one in the bottom word
        let base = "0".repeat(64);
        let mut other: Vec<char> = base.chars().collect();
        other[0] = '8';
        other[63] = '1';
        let other: String = other.into_iter().collect();

        let a = BitCode::parse(&base, HashEncoding::Hex).unwrap();
        let b = BitCode::parse(&other, HashEncoding::Hex).unwrap();
        assert_eq!(a.bits(), 256);
        assert_eq!(a.distance(&b).unwrap(), 2);
        assert_eq!(b.to_string(), other);
    }

    #[test]
    fn test_block_key_exact_for_narrow_ranges() {
        let code = BitCode::from_u64(0xABCD, 16);
        assert_eq!(code.block_key(0, 4), 0xD);
        assert_eq!(code.block_key(4, 8), 0xC);
        assert_eq!(code.block_key(8, 16), 0xAB);
    }

    #[test]
    fn test_block_key_straddles_word_boundary() {
        // high word 0x3, low word 0xc; bits 62..66 straddle the two
        let hex = format!("{}3{}c", "0".repeat(15), "0".repeat(15));
        let code = BitCode::parse(&hex, HashEncoding::Hex).unwrap();
        assert_eq!(code.bits(), 128);
        assert_eq!(code.block_key(62, 66), 0b1100);
        assert_eq!(code.block_key(0, 4), 0xc);
        assert!(code.block_eq(&code, 0, 128));
    }

    #[test]
    fn test_block_key_digests_wide_ranges() {
        let a = BitCode::parse(&"ab".repeat(32), HashEncoding::Hex).unwrap();
        let b = BitCode::parse(&"ab".repeat(32), HashEncoding::Hex).unwrap();
        assert_eq!(a.block_key(0, 128), b.block_key(0, 128));
        assert!(a.block_eq(&b, 0, 256));
    }
}
