//! # helicorder
//!
//! helicorder draws seismic drum plots, written in Rust. It reads continuous waveform data
//! from a date-partitioned miniSEED archive, stitches the files of a day into one series,
//! optionally detrends and filters it, and renders 24 hours of a single channel as a stack
//! of fixed-length rows on one page.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./helicorder_cli` from the top
//! level repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`). To use the CLI see the `helicorder_cli`
//! README.
//!
//! Rendering text into the figure uses the system fonts, so a sans-serif font must be
//! available at runtime.
//!
//! ## Configuration
//!
//! A template configuration can be made with `helicorder_cli -c config.yml new`. The YAML
//! format of a configuration file is as follows:
//!
//! ```yml
//! stylesheet: light
//! site:
//!   network: XX
//!   station: STA
//!   location: ''
//!   channels: HH?
//! archive: /path/to/archive
//! archive_format: '{year}/{network}/{station}/{channels}.D/{network}.{station}.{location}.{channels}.D.{year}.{jday:03d}'
//! products: /path/to/products
//! products_format: '{stream}/{network}/{station}'
//! norm_factor: 1000.0
//! interval: 30
//! component: Z
//! palette: magma
//! figure:
//!   width: 9.0
//!   height: 11.0
//!   dpi: 100
//! pre_pad: 0.0
//! post_pad: 0.0
//! preprocess:
//!   detrend:
//!   - linear
//!   - demean
//!   filters:
//!   - type: bandpass
//!     freqmin: 0.5
//!     freqmax: 10.0
//! n_threads: 1
//! ```
//!
//! - `archive_format` is resolved once per day touched by the request. Recognised fields are
//! `{network}`, `{station}`, `{location}`, `{channels}`, `{datetime}`, `{year}` and `{jday}`.
//! The result is a glob pattern relative to `archive`.
//! - `products_format` accepts `{stream}`, `{network}` and `{station}`; images are written to
//! `products/<products_format>/NET.STA_YYYY-MM-DD_<filters>_seismic-helicorder.png`.
//! - `interval` is the number of minutes per row and must divide an hour evenly.
//! - `norm_factor` is the normalization floor: traces are divided by the larger of this and
//! the largest absolute sample of the day.
//! - `preprocess.detrend` is an ordered list of `linear`, `demean` (or `constant`) and
//! `simple`.
//! - `preprocess.filters` is an ordered list of Butterworth filters. Each entry has a `type`
//! (`bandpass` with `freqmin`/`freqmax`, or `lowpass`/`highpass` with `freq`) and optionally
//! `name`, `corners` (default 4) and `zerophase` (default false).
//! - `pre_pad`/`post_pad` widen the window read from the archive, in seconds.
//! - `palette` is one of `magma`, `inferno`, `plasma`, `viridis`, `cividis` and `turbo`.
//!
//! ## Output
//!
//! One PNG per rendered day, and a log file `helicorder.log`. Rows with no data are left
//! blank; a day with no data at all produces no image.
pub mod archive;
pub mod channel_id;
pub mod config;
pub mod constants;
pub mod detrend;
pub mod error;
pub mod filter;
pub mod mseed_file;
pub mod mseed_record;
pub mod palette;
pub mod path_resolver;
pub mod plot_surface;
pub mod preprocess;
pub mod process;
pub mod render;
pub mod steim;
pub mod stream;
pub mod template;
pub mod worker_status;
