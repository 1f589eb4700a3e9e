//! Byte-oriented run-length encoding for region payloads.
//!
//! The stream is a sequence of run records:
//!
//! | Run length | Encoding |
//! |------------|----------|
//! | 1..=128 | `len - 1` (high bit clear), `value` |
//! | 129..=32768 | `0x80 \| (len - 1) >> 8`, `(len - 1) & 0xFF`, `value` |
//!
//! The worst case (no two adjacent bytes equal) is exactly `2n` bytes.

/// Longest run representable with the short form.
const SHORT_RUN_MAX: usize = 0x80;

/// Longest run representable with the extended form.
const LONG_RUN_MAX: usize = 0x8000;

/// Errors that can occur during RLE decoding.
#[derive(Debug, thiserror::Error)]
pub enum RleError {
    /// The stream ended in the middle of a run record.
    #[error("RLE stream truncated at byte {0}")]
    Truncated(usize),
    /// Decoded length does not match expected length.
    #[error("RLE length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected number of bytes.
        expected: usize,
        /// Number of bytes the stream decodes to (at least).
        actual: usize,
    },
}

/// Compresses `data`. An empty input produces an empty output.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 + 16);
    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let mut len = 1;
        while i + len < data.len() && data[i + len] == value && len < LONG_RUN_MAX {
            len += 1;
        }

        let stored = len - 1;
        if len <= SHORT_RUN_MAX {
            out.push(stored as u8);
        } else {
            out.push(0x80 | (stored >> 8) as u8);
            out.push((stored & 0xFF) as u8);
        }
        out.push(value);
        i += len;
    }
    out
}

/// Decompresses `data`, which must expand to exactly `expected_len` bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, RleError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;
    while i < data.len() {
        let head = data[i];
        let (len, value_at) = if head & 0x80 == 0 {
            (head as usize + 1, i + 1)
        } else {
            let low = *data.get(i + 1).ok_or(RleError::Truncated(i))?;
            ((((head & 0x7F) as usize) << 8 | low as usize) + 1, i + 2)
        };
        let value = *data.get(value_at).ok_or(RleError::Truncated(i))?;

        if out.len() + len > expected_len {
            return Err(RleError::LengthMismatch {
                expected: expected_len,
                actual: out.len() + len,
            });
        }
        out.resize(out.len() + len, value);
        i = value_at + 1;
    }

    if out.len() != expected_len {
        return Err(RleError::LengthMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let packed = compress(data);
        decompress(&packed, data.len()).unwrap()
    }

    #[test]
    fn test_empty() {
        assert!(compress(&[]).is_empty());
        assert_eq!(decompress(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_all_zero_chunk_sized() {
        let data = vec![0u8; 262_144];
        let packed = compress(&data);
        // Eight maximal runs of 32768 bytes, 3 bytes each.
        assert_eq!(packed.len(), 8 * 3);
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn test_all_distinct_is_worst_case() {
        let data: Vec<u8> = (0..=255u8).collect();
        let packed = compress(&data);
        assert_eq!(packed.len(), 2 * data.len());
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn test_run_boundaries() {
        for len in [1usize, 2, 127, 128, 129, 130, 32767, 32768, 32769, 70_000] {
            let data = vec![7u8; len];
            assert_eq!(round_trip(&data), data, "run of {len}");
        }
        assert_eq!(compress(&[9u8; 128]), vec![127, 9]);
        assert_eq!(compress(&[9u8; 129]), vec![0x80, 128, 9]);
    }

    #[test]
    fn test_mixed_input() {
        let mut data = Vec::new();
        for i in 0..2000u32 {
            let value = (i * 31 % 7) as u8;
            let repeat = (i % 5) as usize + (if i % 97 == 0 { 400 } else { 0 });
            data.extend(std::iter::repeat_n(value, repeat + 1));
        }
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn test_truncated_stream() {
        let packed = compress(&[3u8; 500]);
        assert!(matches!(
            decompress(&packed[..1], 500),
            Err(RleError::Truncated(0))
        ));
        assert!(matches!(
            decompress(&packed[..2], 500),
            Err(RleError::Truncated(0))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let packed = compress(&[1u8; 10]);
        assert!(matches!(
            decompress(&packed, 11),
            Err(RleError::LengthMismatch {
                expected: 11,
                actual: 10
            })
        ));
        assert!(matches!(
            decompress(&packed, 9),
            Err(RleError::LengthMismatch { expected: 9, .. })
        ));
    }
}
