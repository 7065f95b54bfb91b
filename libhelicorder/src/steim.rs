//! Steim1 and Steim2 decompression.
//!
//! Data is a sequence of 64 byte frames of sixteen 32-bit words. Word 0 of every frame holds
//! sixteen 2-bit nibbles describing how each word of the frame is packed. In the first frame
//! words 1 and 2 hold the forward and reverse integration constants (first and last sample).
use byteorder::ByteOrder;

use super::constants::{STEIM_FRAME_SIZE, STEIM_FRAME_WORDS};
use super::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteimLevel {
    One,
    Two,
}

/// Sign-extend the low `bits` bits of `value`
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Unpack `count` fields of `bits` bits each from the low end of `word`, most significant first
fn unpack(word: u32, count: u32, bits: u32, diffs: &mut Vec<i32>) {
    let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
    for idx in (0..count).rev() {
        diffs.push(sign_extend((word >> (idx * bits)) & mask, bits));
    }
}

fn unpack_word(level: SteimLevel, nibble: u32, word: u32, diffs: &mut Vec<i32>) {
    match (level, nibble) {
        (_, 0) => (),
        (_, 1) => unpack(word, 4, 8, diffs),
        (SteimLevel::One, 2) => unpack(word, 2, 16, diffs),
        (SteimLevel::One, _) => unpack(word, 1, 32, diffs),
        (SteimLevel::Two, 2) => match word >> 30 {
            1 => unpack(word, 1, 30, diffs),
            2 => unpack(word, 2, 15, diffs),
            3 => unpack(word, 3, 10, diffs),
            _ => (),
        },
        (SteimLevel::Two, _) => match word >> 30 {
            0 => unpack(word, 5, 6, diffs),
            1 => unpack(word, 6, 5, diffs),
            2 => unpack(word, 7, 4, diffs),
            _ => (),
        },
    }
}

/// Decode `n_samples` samples from Steim compressed `payload`
pub fn decode<B: ByteOrder>(
    level: SteimLevel,
    payload: &[u8],
    n_samples: usize,
) -> Result<Vec<i32>, RecordError> {
    if n_samples == 0 {
        return Ok(Vec::new());
    }

    let mut diffs: Vec<i32> = Vec::with_capacity(n_samples);
    let mut first: Option<i32> = None;
    let mut last: i32 = 0;
    for (frame_idx, frame) in payload.chunks_exact(STEIM_FRAME_SIZE).enumerate() {
        let control = B::read_u32(&frame[0..4]);
        for word_idx in 1..STEIM_FRAME_WORDS {
            let word = B::read_u32(&frame[word_idx * 4..word_idx * 4 + 4]);
            if frame_idx == 0 && word_idx == 1 {
                first = Some(word as i32);
                continue;
            }
            if frame_idx == 0 && word_idx == 2 {
                last = word as i32;
                continue;
            }
            let nibble = (control >> (30 - 2 * word_idx)) & 0b11;
            unpack_word(level, nibble, word, &mut diffs);
        }
        if diffs.len() >= n_samples {
            break;
        }
    }

    let first = first.ok_or(RecordError::BadSampleCount {
        expected: n_samples,
        found: 0,
    })?;
    if diffs.len() < n_samples {
        return Err(RecordError::BadSampleCount {
            expected: n_samples,
            found: diffs.len(),
        });
    }

    // The first difference refers to the previous record, so integration starts at X0
    let mut samples = Vec::with_capacity(n_samples);
    samples.push(first);
    let mut current = first;
    for diff in diffs.iter().skip(1).take(n_samples - 1) {
        current = current.wrapping_add(*diff);
        samples.push(current);
    }

    if current != last {
        spdlog::warn!(
            "Steim integrity check failed: last sample {} does not match reverse integration constant {}",
            current,
            last
        );
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::BigEndian;

    fn frame_bytes(words: [u32; 16]) -> Vec<u8> {
        let mut bytes = vec![0u8; STEIM_FRAME_SIZE];
        for (idx, word) in words.iter().enumerate() {
            BigEndian::write_u32(&mut bytes[idx * 4..idx * 4 + 4], *word);
        }
        bytes
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0b10000, 5), -16);
    }

    #[test]
    fn test_steim1_byte_differences() {
        // Samples 10, 11, 9, 9, 14, 20, 19: diffs (0), 1, -2, 0, 5, 6, -1
        let mut words = [0u32; 16];
        // nibbles: w1, w2 = 0 (constants), w3 = 1, w4 = 1
        words[0] = (1 << (30 - 6)) | (1 << (30 - 8));
        words[1] = 10;
        words[2] = 19;
        words[3] = u32::from_be_bytes([0, 1, (-2i8) as u8, 0]);
        words[4] = u32::from_be_bytes([5, 6, (-1i8) as u8, 0]);
        let payload = frame_bytes(words);
        let samples = decode::<BigEndian>(SteimLevel::One, &payload, 7).unwrap();
        assert_eq!(samples, vec![10, 11, 9, 9, 14, 20, 19]);
    }

    #[test]
    fn test_steim2_packed_differences() {
        // nibble 2 with dnib 3: three 10-bit differences; nibble 3 with dnib 0: five 6-bit
        let mut words = [0u32; 16];
        words[0] = (2 << (30 - 6)) | (3 << (30 - 8));
        words[1] = 100;
        words[2] = 100 + 300 - 200 + 1 - 1 + 2 - 3;
        let ten = |v: i32| (v as u32) & 0x3FF;
        words[3] = (3 << 30) | (ten(0) << 20) | (ten(300) << 10) | ten(-200);
        let six = |v: i32| (v as u32) & 0x3F;
        words[4] = (six(1) << 24) | (six(-1) << 18) | (six(2) << 12) | (six(-3) << 6) | six(0);
        let payload = frame_bytes(words);
        let samples = decode::<BigEndian>(SteimLevel::Two, &payload, 7).unwrap();
        assert_eq!(samples, vec![100, 400, 200, 201, 200, 202, 199]);
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let mut words = [0u32; 16];
        words[0] = 1 << (30 - 6);
        words[1] = 5;
        let payload = frame_bytes(words);
        assert!(matches!(
            decode::<BigEndian>(SteimLevel::One, &payload, 10),
            Err(RecordError::BadSampleCount { expected: 10, found: 4 })
        ));
    }
}
