use std::path::Path;

use super::constants::FIXED_HEADER_SIZE;
use super::error::MseedFileError;
use super::mseed_record::Record;
use super::stream::Segment;

/// A miniSEED file held in memory and read record by record.
///
/// Records may have different lengths; each record's blockette 1000 says where the next
/// one begins.
#[derive(Debug)]
pub struct MseedFile {
    buffer: Vec<u8>,
    position: usize,
}

impl MseedFile {
    /// Open and read a file. Fails if the file does not exist or cannot be read.
    pub fn new(path: &Path) -> Result<Self, MseedFileError> {
        if !path.exists() {
            return Err(MseedFileError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            buffer: std::fs::read(path)?,
            position: 0,
        })
    }

    pub fn size_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_eof(&self) -> bool {
        self.buffer.len() - self.position < FIXED_HEADER_SIZE
    }

    /// Get the next record in the file. Returns `MseedFileError::EndOfFile` once exhausted.
    pub fn get_next_record(&mut self) -> Result<Record, MseedFileError> {
        if self.is_eof() {
            return Err(MseedFileError::EndOfFile);
        }
        let record = Record::parse(&self.buffer[self.position..])?;
        self.position += record.header.record_length;
        Ok(record)
    }

    /// Read every waveform record, joining contiguous records of the same channel
    pub fn read_segments(&mut self) -> Result<Vec<Segment>, MseedFileError> {
        let mut segments: Vec<Segment> = Vec::new();
        loop {
            let record = match self.get_next_record() {
                Ok(record) => record,
                Err(MseedFileError::EndOfFile) => break,
                Err(e) => return Err(e),
            };
            if !record.has_waveform() {
                continue;
            }
            let segment = record.into_segment();
            let absorbed = match segments.last_mut() {
                Some(last) => last.try_absorb(&segment),
                None => false,
            };
            if !absorbed {
                segments.push(segment);
            }
        }
        Ok(segments)
    }
}

/// Parse a whole file into segments
pub fn read_file(path: &Path) -> Result<Vec<Segment>, MseedFileError> {
    MseedFile::new(path)?.read_segments()
}
