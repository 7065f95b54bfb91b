use std::path::PathBuf;
use thiserror::Error;
use time::Date;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Template {0:?} contains an unknown field {{{1}}}")]
    UnknownField(String, String),
    #[error("Template {0:?} contains an unterminated field")]
    UnterminatedField(String),
    #[error("Template {0:?} contains an unmatched '}}'")]
    UnmatchedBrace(String),
    #[error("Template field {{{field}}} has an invalid format spec {spec:?}")]
    BadSpec { field: String, spec: String },
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to parse buffer into a miniSEED record: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Record buffer of {0} bytes is shorter than the fixed header ({size} bytes)", size=FIXED_HEADER_SIZE)]
    ShortHeader(usize),
    #[error("Record declares {0} bytes but only {1} are available")]
    ShortRecord(usize, usize),
    #[error("Record start time is not a valid date/time")]
    BadStartTime,
    #[error("Record has no blockette 1000; encoding and record length are unknown")]
    MissingBlockette1000,
    #[error("Record length exponent {0} is outside {min}..={max}", min=MIN_RECORD_LENGTH_EXP, max=MAX_RECORD_LENGTH_EXP)]
    BadRecordLength(u8),
    #[error("Blockette chain points outside the record (offset {0})")]
    BadBlockette(u16),
    #[error("Data offset {0} lies outside the record")]
    BadDataOffset(u16),
    #[error("Unsupported data encoding {0}")]
    UnsupportedEncoding(u8),
    #[error("Record payload holds {found} samples but the header declares {expected}")]
    BadSampleCount { expected: usize, found: usize },
    #[error("Sample rate {0} cannot be written to a record header")]
    BadSampleRate(f64),
}

#[derive(Debug, Error)]
pub enum MseedFileError {
    #[error("Could not open miniSEED file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Error when parsing record from miniSEED file: {0}")]
    BadRecord(#[from] RecordError),
    #[error("Reached end of miniSEED file")]
    EndOfFile,
    #[error("miniSEED file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive query failed to resolve a path template: {0}")]
    Template(#[from] TemplateError),
    #[error("Archive query produced an invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Archive path {0:?} is not valid unicode")]
    BadPatternPath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Interval of {0} minutes does not divide an hour evenly")]
    BadInterval(u32),
    #[error("Normalization floor must be positive and finite, found {0}")]
    BadNormFactor(f64),
    #[error("Padding must be between 0 and {max} seconds, found {pad}")]
    BadPadding { pad: f64, max: f64 },
    #[error("Unknown detrend mode {0:?}")]
    UnknownDetrend(String),
    #[error("Filter {name} has unknown type {kind:?}")]
    UnknownFilter { name: String, kind: String },
    #[error("Filter {name} is missing required parameter {param:?}")]
    MissingFilterParameter { name: String, param: &'static str },
    #[error("Filter {name} has an invalid parameter: {reason}")]
    BadFilterParameter { name: String, reason: String },
    #[error("Unknown palette {0:?}")]
    UnknownPalette(String),
    #[error("Unknown stylesheet {0:?}")]
    UnknownStylesheet(String),
    #[error("Component must be a single character, found {0:?}")]
    BadComponent(String),
    #[error("Figure geometry must be positive, found {0} x {1} inches at {2} dpi")]
    BadFigure(f64, f64, u32),
    #[error("Config has an invalid path template: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter {name} corner {freq} Hz is at or above the Nyquist frequency {nyquist} Hz")]
    AboveNyquist { name: String, freq: f64, nyquist: f64 },
    #[error("Filter {name} cannot run on data with sample rate {rate}")]
    BadSampleRate { name: String, rate: f64 },
    #[error("Filter {0} needs at least one corner")]
    NoCorners(String),
    #[error("Filter {name} corner frequency {freq} Hz must be positive")]
    BadCorner { name: String, freq: f64 },
    #[error("Filter {name} lower corner {freqmin} Hz is not below upper corner {freqmax} Hz")]
    BadBand { name: String, freqmin: f64, freqmax: f64 },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot render a helicorder from an empty stream")]
    EmptyStream,
    #[error("Helicorder requires a single channel but found both {0} and {1}")]
    MixedChannels(String, String),
    #[error("Plotting backend failed: {0}")]
    Backend(String),
    #[error("Render failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("No data available for {station} on {date}")]
    NoData { station: String, date: Date },
    #[error("Processor failed due to Archive error: {0}")]
    ArchiveError(#[from] ArchiveError),
    #[error("Processor failed due to Filter error: {0}")]
    FilterError(#[from] FilterError),
    #[error("Processor failed due to Render error: {0}")]
    RenderError(#[from] RenderError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Template error: {0}")]
    TemplateError(#[from] TemplateError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Worker {0} panicked")]
    WorkerPanic(usize),
}

impl ProcessorError {
    /// True for the no-data condition, which callers report rather than treat as a crash
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}
