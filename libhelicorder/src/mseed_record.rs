use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use time::{Date, Duration, OffsetDateTime, Time};

use super::channel_id::ChannelId;
use super::constants::*;
use super::error::RecordError;
use super::steim::{self, SteimLevel};
use super::stream::Segment;

/// Data encodings understood by the record decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Int16,
    Int32,
    Float32,
    Float64,
    Steim1,
    Steim2,
}

impl TryFrom<u8> for Encoding {
    type Error = RecordError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Int16),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Float32),
            5 => Ok(Self::Float64),
            10 => Ok(Self::Steim1),
            11 => Ok(Self::Steim2),
            _ => Err(RecordError::UnsupportedEncoding(value)),
        }
    }
}

impl Encoding {
    pub fn code(&self) -> u8 {
        match self {
            Self::Int16 => 1,
            Self::Int32 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            Self::Steim1 => 10,
            Self::Steim2 => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    Little,
    Big,
}

/// The fixed section data header and the blockettes needed to decode a record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub sequence_number: String,
    pub quality: char,
    pub id: ChannelId,
    pub start: OffsetDateTime,
    pub n_samples: u16,
    pub sample_rate: f64,
    pub activity_flags: u8,
    pub io_flags: u8,
    pub quality_flags: u8,
    pub n_blockettes: u8,
    pub time_correction: i32,
    pub data_offset: u16,
    pub first_blockette: u16,
    pub encoding: Encoding,
    pub word_order: WordOrder,
    pub record_length: usize,
}

/// One miniSEED 2.x data record with its decoded samples
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: RecordHeader,
    pub samples: Vec<f64>,
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Nominal sample rate from the header factor and multiplier
fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (factor as f64, multiplier as f64);
    if factor == 0 || multiplier == 0 {
        0.0
    } else if factor > 0 && multiplier > 0 {
        f * m
    } else if factor > 0 {
        -f / m
    } else if multiplier > 0 {
        -m / f
    } else {
        1.0 / (f * m)
    }
}

/// Header byte order, guessed from whether the BTIME year and day look sane
fn detect_header_order(bytes: &[u8]) -> WordOrder {
    let year = BigEndian::read_u16(&bytes[20..22]);
    let day = BigEndian::read_u16(&bytes[22..24]);
    if (MIN_SANE_YEAR..=MAX_SANE_YEAR).contains(&year) && (1..=366).contains(&day) {
        WordOrder::Big
    } else {
        WordOrder::Little
    }
}

fn btime<B: ByteOrder>(cursor: &mut Cursor<&[u8]>) -> Result<OffsetDateTime, RecordError> {
    let year = cursor.read_u16::<B>()?;
    let day = cursor.read_u16::<B>()?;
    let hour = cursor.read_u8()?;
    let minute = cursor.read_u8()?;
    let second = cursor.read_u8()?;
    let _unused = cursor.read_u8()?;
    let fraction = cursor.read_u16::<B>()?;

    let date = Date::from_ordinal_date(year as i32, day).map_err(|_| RecordError::BadStartTime)?;
    // A leap second is written as second 60
    let leap = second == 60;
    let time = Time::from_hms(hour, minute, if leap { 59 } else { second })
        .map_err(|_| RecordError::BadStartTime)?;
    let mut start = date.with_time(time).assume_utc();
    if leap {
        start += Duration::SECOND;
    }
    Ok(start + Duration::nanoseconds(fraction as i64 * BTIME_FRACTION_NANOS))
}

impl Record {
    /// Parse a single record from the front of `bytes`.
    ///
    /// The record length is taken from blockette 1000; `bytes` may extend past the record.
    pub fn parse(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < FIXED_HEADER_SIZE {
            return Err(RecordError::ShortHeader(bytes.len()));
        }
        match detect_header_order(bytes) {
            WordOrder::Big => Self::parse_with::<BigEndian>(bytes),
            WordOrder::Little => Self::parse_with::<LittleEndian>(bytes),
        }
    }

    fn parse_with<B: ByteOrder>(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(20);
        let mut start = btime::<B>(&mut cursor)?;
        let n_samples = cursor.read_u16::<B>()?;
        let rate_factor = cursor.read_i16::<B>()?;
        let rate_multiplier = cursor.read_i16::<B>()?;
        let activity_flags = cursor.read_u8()?;
        let io_flags = cursor.read_u8()?;
        let quality_flags = cursor.read_u8()?;
        let n_blockettes = cursor.read_u8()?;
        let time_correction = cursor.read_i32::<B>()?;
        let data_offset = cursor.read_u16::<B>()?;
        let first_blockette = cursor.read_u16::<B>()?;

        let mut sample_rate = sample_rate(rate_factor, rate_multiplier);
        let mut b1000: Option<(u8, u8, u8)> = None;

        // Walk the blockette chain
        let mut next = first_blockette;
        let mut visited = 0;
        while next != 0 && visited < n_blockettes.max(1) as usize * 2 {
            let offset = next as usize;
            if offset + BLOCKETTE_HEADER_SIZE > bytes.len() || offset < FIXED_HEADER_SIZE {
                return Err(RecordError::BadBlockette(next));
            }
            cursor.set_position(offset as u64);
            let kind = cursor.read_u16::<B>()?;
            next = cursor.read_u16::<B>()?;
            match kind {
                BLOCKETTE_1000 => {
                    let encoding = cursor.read_u8()?;
                    let word_order = cursor.read_u8()?;
                    let length_exp = cursor.read_u8()?;
                    b1000 = Some((encoding, word_order, length_exp));
                }
                BLOCKETTE_100 => {
                    let actual = cursor.read_f32::<B>()? as f64;
                    if actual > 0.0 {
                        sample_rate = actual;
                    }
                }
                BLOCKETTE_1001 => {
                    let _timing_quality = cursor.read_i8()?;
                    let microseconds = cursor.read_i8()?;
                    start += Duration::microseconds(microseconds as i64);
                }
                _ => (),
            }
            visited += 1;
        }

        let (encoding, word_order, length_exp) = b1000.ok_or(RecordError::MissingBlockette1000)?;
        if !(MIN_RECORD_LENGTH_EXP..=MAX_RECORD_LENGTH_EXP).contains(&length_exp) {
            return Err(RecordError::BadRecordLength(length_exp));
        }
        let record_length = 1usize << length_exp;
        if record_length > bytes.len() {
            return Err(RecordError::ShortRecord(record_length, bytes.len()));
        }
        if (data_offset as usize) > record_length {
            return Err(RecordError::BadDataOffset(data_offset));
        }
        let encoding = Encoding::try_from(encoding)?;
        let word_order = if word_order == 0 {
            WordOrder::Little
        } else {
            WordOrder::Big
        };

        if activity_flags & TIME_CORRECTION_APPLIED == 0 && time_correction != 0 {
            start += Duration::nanoseconds(time_correction as i64 * BTIME_FRACTION_NANOS);
        }

        let header = RecordHeader {
            sequence_number: ascii_field(&bytes[0..6]),
            quality: bytes[6] as char,
            id: ChannelId::new(
                &ascii_field(&bytes[18..20]),
                &ascii_field(&bytes[8..13]),
                &ascii_field(&bytes[13..15]),
                &ascii_field(&bytes[15..18]),
            ),
            start,
            n_samples,
            sample_rate,
            activity_flags,
            io_flags,
            quality_flags,
            n_blockettes,
            time_correction,
            data_offset,
            first_blockette,
            encoding,
            word_order,
            record_length,
        };

        let payload = if data_offset == 0 {
            &bytes[0..0]
        } else {
            &bytes[data_offset as usize..record_length]
        };
        let samples = match word_order {
            WordOrder::Big => decode_payload::<BigEndian>(encoding, payload, n_samples as usize)?,
            WordOrder::Little => {
                decode_payload::<LittleEndian>(encoding, payload, n_samples as usize)?
            }
        };

        Ok(Record { header, samples })
    }

    /// True for records that carry waveform samples (log and event records have no rate)
    pub fn has_waveform(&self) -> bool {
        self.header.sample_rate > 0.0 && !self.samples.is_empty()
    }

    pub fn into_segment(self) -> Segment {
        Segment::new(
            self.header.id,
            self.header.sample_rate,
            self.header.start,
            self.samples,
        )
    }
}

fn decode_payload<B: ByteOrder>(
    encoding: Encoding,
    payload: &[u8],
    n_samples: usize,
) -> Result<Vec<f64>, RecordError> {
    let width = match encoding {
        Encoding::Int16 => 2,
        Encoding::Int32 | Encoding::Float32 => 4,
        Encoding::Float64 => 8,
        Encoding::Steim1 => {
            return Ok(steim::decode::<B>(SteimLevel::One, payload, n_samples)?
                .into_iter()
                .map(|v| v as f64)
                .collect())
        }
        Encoding::Steim2 => {
            return Ok(steim::decode::<B>(SteimLevel::Two, payload, n_samples)?
                .into_iter()
                .map(|v| v as f64)
                .collect())
        }
    };
    if payload.len() < n_samples * width {
        return Err(RecordError::BadSampleCount {
            expected: n_samples,
            found: payload.len() / width,
        });
    }
    let mut cursor = Cursor::new(payload);
    let mut samples = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        samples.push(match encoding {
            Encoding::Int16 => cursor.read_i16::<B>()? as f64,
            Encoding::Int32 => cursor.read_i32::<B>()? as f64,
            Encoding::Float32 => cursor.read_f32::<B>()? as f64,
            _ => cursor.read_f64::<B>()?,
        });
    }
    Ok(samples)
}

/// Header factor/multiplier for a sample rate, plus whether blockette 100 is needed
fn rate_fields(sample_rate: f64) -> Result<(i16, i16, bool), RecordError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(RecordError::BadSampleRate(sample_rate));
    }
    if sample_rate >= 1.0 && sample_rate.fract() == 0.0 && sample_rate <= i16::MAX as f64 {
        return Ok((sample_rate as i16, 1, false));
    }
    let period = 1.0 / sample_rate;
    if period.fract() == 0.0 && period <= i16::MAX as f64 {
        return Ok((-(period as i16), 1, false));
    }
    // Closest representable period, refined by blockette 100
    let period = period.round().clamp(1.0, i16::MAX as f64);
    Ok((-(period as i16), 1, true))
}

/// Write `segment` as a sequence of uncompressed big-endian records.
///
/// Only `Int32` and `Float64` are supported for writing; samples are rounded for `Int32`.
/// `length_exp` gives the record length as a power of two.
pub fn write_segment<W: Write>(
    writer: &mut W,
    segment: &Segment,
    encoding: Encoding,
    length_exp: u8,
) -> Result<(), RecordError> {
    let width = match encoding {
        Encoding::Int32 => 4,
        Encoding::Float64 => 8,
        _ => return Err(RecordError::UnsupportedEncoding(encoding.code())),
    };
    if !(MIN_RECORD_LENGTH_EXP..=MAX_RECORD_LENGTH_EXP).contains(&length_exp) {
        return Err(RecordError::BadRecordLength(length_exp));
    }
    let (factor, multiplier, needs_b100) = rate_fields(segment.sample_rate)?;
    let record_length = 1usize << length_exp;
    let data_offset = FIXED_HEADER_SIZE + BLOCKETTE_1000_SIZE + if needs_b100 { BLOCKETTE_100_SIZE } else { 0 };
    let data_offset = data_offset.next_multiple_of(16);
    let per_record = ((record_length - data_offset) / width).min(u16::MAX as usize);

    for (record_idx, chunk) in segment.samples.chunks(per_record).enumerate() {
        let start = segment.time_of(record_idx * per_record);
        let mut record: Vec<u8> = Vec::with_capacity(record_length);
        write!(record, "{:06}", (record_idx + 1) % 1_000_000)?;
        record.push(b'D');
        record.push(b' ');
        write!(record, "{:<5.5}", segment.id.station)?;
        write!(record, "{:<2.2}", segment.id.location)?;
        write!(record, "{:<3.3}", segment.id.channel)?;
        write!(record, "{:<2.2}", segment.id.network)?;
        // BTIME
        record.write_u16::<BigEndian>(start.year() as u16)?;
        record.write_u16::<BigEndian>(start.ordinal())?;
        record.write_u8(start.hour())?;
        record.write_u8(start.minute())?;
        record.write_u8(start.second())?;
        record.write_u8(0)?;
        record.write_u16::<BigEndian>((start.nanosecond() as i64 / BTIME_FRACTION_NANOS) as u16)?;
        record.write_u16::<BigEndian>(chunk.len() as u16)?;
        record.write_i16::<BigEndian>(factor)?;
        record.write_i16::<BigEndian>(multiplier)?;
        record.write_u8(0)?; // activity
        record.write_u8(0)?; // io
        record.write_u8(0)?; // quality
        record.write_u8(if needs_b100 { 2 } else { 1 })?;
        record.write_i32::<BigEndian>(0)?;
        record.write_u16::<BigEndian>(data_offset as u16)?;
        record.write_u16::<BigEndian>(FIXED_HEADER_SIZE as u16)?;
        // Blockette 1000
        record.write_u16::<BigEndian>(BLOCKETTE_1000)?;
        let next = if needs_b100 { FIXED_HEADER_SIZE + BLOCKETTE_1000_SIZE } else { 0 };
        record.write_u16::<BigEndian>(next as u16)?;
        record.write_u8(encoding.code())?;
        record.write_u8(1)?;
        record.write_u8(length_exp)?;
        record.write_u8(0)?;
        if needs_b100 {
            record.write_u16::<BigEndian>(BLOCKETTE_100)?;
            record.write_u16::<BigEndian>(0)?;
            record.write_f32::<BigEndian>(segment.sample_rate as f32)?;
            record.write_all(&[0u8; 4])?;
        }
        record.resize(data_offset, 0);
        for sample in chunk {
            match encoding {
                Encoding::Int32 => record.write_i32::<BigEndian>(sample.round() as i32)?,
                _ => record.write_f64::<BigEndian>(*sample)?,
            }
        }
        record.resize(record_length, 0);
        writer.write_all(&record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn segment(sample_rate: f64, samples: Vec<f64>) -> Segment {
        Segment::new(
            ChannelId::new("XX", "ABC", "00", "HHZ"),
            sample_rate,
            datetime!(2024-03-10 23:59:50.25 UTC),
            samples,
        )
    }

    #[test]
    fn test_sample_rate_fields() {
        assert_eq!(sample_rate(100, 1), 100.0);
        assert_eq!(sample_rate(-10, 1), 0.1);
        assert_eq!(sample_rate(1, -10), 0.1);
        assert_eq!(sample_rate(-10, -10), 0.01);
        assert_eq!(sample_rate(0, 1), 0.0);
    }

    #[test]
    fn test_written_records_parse_back() {
        let seg = segment(100.0, (0..300).map(|v| v as f64 - 150.0).collect());
        let mut bytes = Vec::new();
        write_segment(&mut bytes, &seg, Encoding::Int32, 9).unwrap();
        // 512 byte records hold (512 - 64) / 4 = 112 samples
        assert_eq!(bytes.len(), 3 * 512);

        let first = Record::parse(&bytes).unwrap();
        assert_eq!(first.header.id, seg.id);
        assert_eq!(first.header.start, seg.start);
        assert_eq!(first.header.record_length, 512);
        assert_eq!(first.header.encoding, Encoding::Int32);
        assert_eq!(first.samples.len(), 112);
        assert_eq!(first.samples[0], -150.0);

        let second = Record::parse(&bytes[512..]).unwrap();
        assert_eq!(second.header.start, seg.time_of(112));
        assert_eq!(second.samples[0], -38.0);
    }

    #[test]
    fn test_fractional_rate_uses_blockette_100() {
        let seg = segment(40.0 / 3.0, vec![0.5, -1.25, 2.0]);
        let mut bytes = Vec::new();
        write_segment(&mut bytes, &seg, Encoding::Float64, 8).unwrap();
        let record = Record::parse(&bytes).unwrap();
        assert!((record.header.sample_rate - 40.0 / 3.0).abs() < 1.0e-4);
        assert_eq!(record.samples, vec![0.5, -1.25, 2.0]);
    }

    #[test]
    fn test_unknown_encoding() {
        let seg = segment(1.0, vec![1.0]);
        let mut bytes = Vec::new();
        write_segment(&mut bytes, &seg, Encoding::Int32, 8).unwrap();
        bytes[52] = 30; // encoding byte of blockette 1000
        assert!(matches!(
            Record::parse(&bytes),
            Err(RecordError::UnsupportedEncoding(30))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Record::parse(&[0u8; 20]),
            Err(RecordError::ShortHeader(20))
        ));
        assert!(Record::parse(&[b'x'; 512]).is_err());
    }
}
