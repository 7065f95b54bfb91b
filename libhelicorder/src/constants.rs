// miniSEED 2.x record layout
pub const FIXED_HEADER_SIZE: usize = 48;
pub const BLOCKETTE_HEADER_SIZE: usize = 4;
pub const BLOCKETTE_100: u16 = 100;
pub const BLOCKETTE_1000: u16 = 1000;
pub const BLOCKETTE_1001: u16 = 1001;
pub const BLOCKETTE_100_SIZE: usize = 12;
pub const BLOCKETTE_1000_SIZE: usize = 8;
pub const MIN_RECORD_LENGTH_EXP: u8 = 7; // 128 bytes
pub const MAX_RECORD_LENGTH_EXP: u8 = 20; // 1 MiB
pub const BTIME_FRACTION_NANOS: i64 = 100_000; // BTIME and time corrections count in 0.0001 s
pub const TIME_CORRECTION_APPLIED: u8 = 0x02; // activity flag bit 1
pub const MIN_SANE_YEAR: u16 = 1900;
pub const MAX_SANE_YEAR: u16 = 2100;

// Steim compression
pub const STEIM_FRAME_SIZE: usize = 64;
pub const STEIM_FRAME_WORDS: usize = 16;

// Calendar
pub const MINUTES_PER_DAY: u32 = 1_440;
pub const MINUTES_PER_HOUR: u32 = 60;

// Archive window
pub const MAX_PADDING_SECONDS: f64 = 86_400.0; // One day either side of the requested day

// Drum layout
pub const PALETTE_CYCLE: usize = 4; // Colors repeat every 4 rows
pub const X_MAJOR_DIVISIONS: f64 = 15.0;

// Products
pub const HELICORDER_STREAM: &str = "seismic/helicorders";
pub const HELICORDER_SUFFIX: &str = "seismic-helicorder";
