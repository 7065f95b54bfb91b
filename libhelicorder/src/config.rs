use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Date;

use super::constants::{
    HELICORDER_STREAM, HELICORDER_SUFFIX, MAX_PADDING_SECONDS, MINUTES_PER_HOUR,
};
use super::detrend::DetrendMode;
use super::error::{ConfigError, TemplateError};
use super::filter::{describe_filters, FilterKind, FilterSpec, DEFAULT_CORNERS};
use super::palette::{Palette, Style};
use super::path_resolver::{resolve, ArchiveQuery};
use super::render::{Figure, HelicorderParams, RenderContext};
use super::stream::start_of_day;
use super::template::{format_template, FieldValue};

/// The station and channel selection to draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channels: String,
}

/// Figure size in inches and its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureConfig {
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
}

impl Default for FigureConfig {
    fn default() -> Self {
        let figure = Figure::default();
        Self {
            width: figure.width,
            height: figure.height,
            dpi: figure.dpi,
        }
    }
}

/// One entry of `preprocess.filters`, as written in the config file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freqmin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freqmax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zerophase: Option<bool>,
}

fn require(value: Option<f64>, name: &str, param: &'static str) -> Result<f64, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingFilterParameter {
        name: name.to_string(),
        param,
    })?;
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::BadFilterParameter {
            name: name.to_string(),
            reason: format!("{param} must be a positive frequency, found {value}"),
        });
    }
    Ok(value)
}

impl FilterConfig {
    /// The name used to identify this filter in messages
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("filters[{index}] ({})", self.kind),
        }
    }

    /// Resolve into a typed filter, checking that the kind is known and its parameters present
    pub fn to_spec(&self, index: usize) -> Result<FilterSpec, ConfigError> {
        let name = self.display_name(index);
        let kind = match self.kind.as_str() {
            "bandpass" => {
                let freqmin = require(self.freqmin, &name, "freqmin")?;
                let freqmax = require(self.freqmax, &name, "freqmax")?;
                if freqmin >= freqmax {
                    return Err(ConfigError::BadFilterParameter {
                        name,
                        reason: format!("freqmin ({freqmin}) must be below freqmax ({freqmax})"),
                    });
                }
                FilterKind::Bandpass { freqmin, freqmax }
            }
            "lowpass" => FilterKind::Lowpass {
                freq: require(self.freq, &name, "freq")?,
            },
            "highpass" => FilterKind::Highpass {
                freq: require(self.freq, &name, "freq")?,
            },
            _ => {
                return Err(ConfigError::UnknownFilter {
                    name,
                    kind: self.kind.clone(),
                })
            }
        };
        let corners = self.corners.unwrap_or(DEFAULT_CORNERS);
        if corners == 0 {
            return Err(ConfigError::BadFilterParameter {
                name,
                reason: String::from("corners must be at least 1"),
            });
        }
        Ok(FilterSpec {
            name,
            kind,
            corners,
            zerophase: self.zerophase.unwrap_or(false),
        })
    }
}

/// Optional preprocessing applied before drawing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub detrend: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

fn default_stylesheet() -> String {
    String::from("light")
}

fn default_component() -> String {
    String::from("Z")
}

fn default_palette() -> String {
    Palette::default().to_string()
}

fn default_n_threads() -> usize {
    1
}

/// Structure representing the application configuration.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,
    pub site: SiteConfig,
    pub archive: PathBuf,
    pub archive_format: String,
    pub products: PathBuf,
    pub products_format: String,
    pub norm_factor: f64,
    pub interval: u32,
    #[serde(default = "default_component")]
    pub component: String,
    #[serde(default = "default_palette")]
    pub palette: String,
    #[serde(default)]
    pub figure: FigureConfig,
    #[serde(default)]
    pub pre_pad: f64,
    #[serde(default)]
    pub post_pad: f64,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
}

impl Default for Config {
    /// A template configuration for an SDS style archive. Paths must be edited before use.
    fn default() -> Self {
        Self {
            stylesheet: default_stylesheet(),
            site: SiteConfig {
                network: String::from("XX"),
                station: String::from("STA"),
                location: String::from(""),
                channels: String::from("HH?"),
            },
            archive: PathBuf::from("/path/to/archive"),
            archive_format: String::from(
                "{year}/{network}/{station}/{channels}.D/{network}.{station}.{location}.{channels}.D.{year}.{jday:03d}",
            ),
            products: PathBuf::from("/path/to/products"),
            products_format: String::from("{stream}/{network}/{station}"),
            norm_factor: 1000.0,
            interval: 30,
            component: default_component(),
            palette: default_palette(),
            figure: FigureConfig::default(),
            pre_pad: 0.0,
            post_pad: 0.0,
            preprocess: PreprocessConfig {
                detrend: vec![String::from("linear"), String::from("demean")],
                filters: vec![FilterConfig {
                    kind: String::from("bandpass"),
                    freqmin: Some(0.5),
                    freqmax: Some(10.0),
                    ..Default::default()
                }],
            },
            n_threads: default_n_threads(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration as YAML
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Resolve the raw document into typed settings, failing on the first invalid value.
    ///
    /// Path templates are test-formatted here so that a bad field name is reported before any
    /// archive access.
    pub fn validate(&self) -> Result<RenderConfig, ConfigError> {
        if self.interval == 0 || MINUTES_PER_HOUR % self.interval != 0 {
            return Err(ConfigError::BadInterval(self.interval));
        }
        if !(self.norm_factor.is_finite() && self.norm_factor > 0.0) {
            return Err(ConfigError::BadNormFactor(self.norm_factor));
        }
        for pad in [self.pre_pad, self.post_pad] {
            if !(0.0..=MAX_PADDING_SECONDS).contains(&pad) {
                return Err(ConfigError::BadPadding {
                    pad,
                    max: MAX_PADDING_SECONDS,
                });
            }
        }
        let mut component_chars = self.component.chars();
        let component = match (component_chars.next(), component_chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            _ => return Err(ConfigError::BadComponent(self.component.clone())),
        };
        let figure = Figure {
            width: self.figure.width,
            height: self.figure.height,
            dpi: self.figure.dpi,
        };
        if !(figure.width > 0.0 && figure.height > 0.0 && figure.dpi > 0) {
            return Err(ConfigError::BadFigure(figure.width, figure.height, figure.dpi));
        }

        let detrend = self
            .preprocess
            .detrend
            .iter()
            .map(|mode| mode.parse::<DetrendMode>())
            .collect::<Result<Vec<DetrendMode>, ConfigError>>()?;
        let filters = self
            .preprocess
            .filters
            .iter()
            .enumerate()
            .map(|(idx, filter)| filter.to_spec(idx))
            .collect::<Result<Vec<FilterSpec>, ConfigError>>()?;

        let validated = RenderConfig {
            site: self.site.clone(),
            archive: self.archive.clone(),
            archive_format: self.archive_format.clone(),
            products: self.products.clone(),
            products_format: self.products_format.clone(),
            norm_factor: self.norm_factor,
            interval: self.interval,
            component,
            context: RenderContext {
                palette: self.palette.parse::<Palette>()?,
                style: self.stylesheet.parse::<Style>()?,
                figure,
            },
            pre_pad: self.pre_pad,
            post_pad: self.post_pad,
            detrend,
            filters,
            n_threads: self.n_threads.max(1),
        };

        // Any day exercises every template field
        resolve(
            &validated.archive_query(time::macros::date!(2000 - 01 - 01)),
            &validated.archive_format,
        )?;
        validated.get_product_directory()?;

        Ok(validated)
    }
}

/// Validated, typed settings for rendering. Built by [`Config::validate`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub site: SiteConfig,
    pub archive: PathBuf,
    pub archive_format: String,
    pub products: PathBuf,
    pub products_format: String,
    pub norm_factor: f64,
    pub interval: u32,
    pub component: char,
    pub context: RenderContext,
    pub pre_pad: f64,
    pub post_pad: f64,
    pub detrend: Vec<DetrendMode>,
    pub filters: Vec<FilterSpec>,
    pub n_threads: usize,
}

impl RenderConfig {
    /// The archive request covering one whole day plus padding
    pub fn archive_query(&self, day: Date) -> ArchiveQuery {
        let start = start_of_day(day);
        ArchiveQuery {
            network: self.site.network.clone(),
            station: self.site.station.clone(),
            location: self.site.location.clone(),
            channels: self.site.channels.clone(),
            start,
            end: start + time::Duration::days(1),
            pre_pad: self.pre_pad,
            post_pad: self.post_pad,
        }
    }

    pub fn filter_description(&self) -> String {
        describe_filters(&self.filters)
    }

    pub fn helicorder_params(&self) -> HelicorderParams {
        HelicorderParams {
            interval: self.interval,
            norm_factor: self.norm_factor,
            filter_description: self.filter_description(),
        }
    }

    /// Directory the helicorders of this station are written to
    pub fn get_product_directory(&self) -> Result<PathBuf, TemplateError> {
        let fields = [
            ("stream", FieldValue::Text(HELICORDER_STREAM)),
            ("network", FieldValue::Text(&self.site.network)),
            ("station", FieldValue::Text(&self.site.station)),
        ];
        Ok(self
            .products
            .join(format_template(&self.products_format, &fields)?))
    }

    /// Image file name for one day, e.g. `XX.STA_2024-03-10_unfiltered_seismic-helicorder.png`
    pub fn get_product_file_name(&self, day: Date) -> String {
        format!(
            "{}.{}_{:04}-{:02}-{:02}_{}_{}.png",
            self.site.network,
            self.site.station,
            day.year(),
            day.month() as u8,
            day.day(),
            self.filter_description(),
            HELICORDER_SUFFIX
        )
    }

    /// Full path of the image for one day
    pub fn get_product_path(&self, day: Date) -> Result<PathBuf, TemplateError> {
        Ok(self
            .get_product_directory()?
            .join(self.get_product_file_name(day)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const YAML: &str = r#"
stylesheet: dark
site:
  network: XX
  station: ABC
  location: ""
  channels: HH?
archive: /data/archive
archive_format: "{year}/{network}/{station}/{channels}.D/{network}.{station}.{location}.{channels}.D.{year}.{jday:03d}"
products: /data/products
products_format: "{stream}/{network}/{station}"
norm_factor: 2000.0
interval: 15
preprocess:
  detrend: [linear, demean]
  filters:
    - type: bandpass
      freqmin: 0.5
      freqmax: 10.0
    - name: smooth
      type: lowpass
      freq: 20.0
      corners: 2
      zerophase: true
"#;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str::<Config>(yaml).unwrap()
    }

    #[test]
    fn test_full_config() {
        let config = parse(YAML).validate().unwrap();
        assert_eq!(config.interval, 15);
        assert_eq!(config.component, 'Z');
        assert_eq!(config.context.palette, Palette::Magma);
        assert_eq!(config.context.style, "dark".parse::<Style>().unwrap());
        assert_eq!(config.detrend, vec![DetrendMode::Linear, DetrendMode::Demean]);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].name, "filters[0] (bandpass)");
        assert_eq!(config.filters[0].corners, DEFAULT_CORNERS);
        assert_eq!(config.filters[1].name, "smooth");
        assert!(config.filters[1].zerophase);
        assert_eq!(
            config.filter_description(),
            "bandpass_0.50-10.00Hz_lowpass_20.00Hz"
        );
        assert_eq!(
            config.get_product_path(date!(2024 - 03 - 10)).unwrap(),
            PathBuf::from(
                "/data/products/seismic/helicorders/XX/ABC/XX.ABC_2024-03-10_bandpass_0.50-10.00Hz_lowpass_20.00Hz_seismic-helicorder.png"
            )
        );
    }

    #[test]
    fn test_optional_sections_default() {
        let minimal = r#"
site: {network: XX, station: ABC, channels: HHZ}
archive: /a
archive_format: "{network}/{station}/{year}/{jday}/*"
products: /p
products_format: "{stream}"
norm_factor: 1.0
interval: 60
"#;
        let config = parse(minimal);
        assert_eq!(config.stylesheet, "light");
        assert_eq!(config.palette, "magma");
        assert_eq!(config.figure, FigureConfig::default());
        let config = config.validate().unwrap();
        assert!(config.detrend.is_empty());
        assert!(config.filters.is_empty());
        assert_eq!(config.filter_description(), "unfiltered");
    }

    #[test]
    fn test_interval_must_divide_an_hour() {
        for interval in [0, 7, 45, 90] {
            let mut config = parse(YAML);
            config.interval = interval;
            assert!(matches!(config.validate(), Err(ConfigError::BadInterval(_))));
        }
        for interval in [1, 5, 10, 12, 20, 30, 60] {
            let mut config = parse(YAML);
            config.interval = interval;
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_filter_errors_name_the_filter() {
        let mut config = parse(YAML);
        config.preprocess.filters[1].kind = String::from("notch");
        match config.validate() {
            Err(ConfigError::UnknownFilter { name, kind }) => {
                assert_eq!(name, "smooth");
                assert_eq!(kind, "notch");
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut config = parse(YAML);
        config.preprocess.filters[0].freqmax = None;
        match config.validate() {
            Err(ConfigError::MissingFilterParameter { name, param }) => {
                assert_eq!(name, "filters[0] (bandpass)");
                assert_eq!(param, "freqmax");
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut config = parse(YAML);
        config.preprocess.filters[0].freqmin = Some(20.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadFilterParameter { .. })
        ));
    }

    #[test]
    fn test_other_invalid_values() {
        let mut config = parse(YAML);
        config.preprocess.detrend.push(String::from("spline"));
        assert!(matches!(config.validate(), Err(ConfigError::UnknownDetrend(_))));

        let mut config = parse(YAML);
        config.palette = String::from("rainbow");
        assert!(matches!(config.validate(), Err(ConfigError::UnknownPalette(_))));

        let mut config = parse(YAML);
        config.norm_factor = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::BadNormFactor(_))));

        let mut config = parse(YAML);
        config.component = String::from("ZN");
        assert!(matches!(config.validate(), Err(ConfigError::BadComponent(_))));

        let mut config = parse(YAML);
        config.archive_format = String::from("{year}/{sensor}");
        assert!(matches!(config.validate(), Err(ConfigError::Template(_))));

        let mut config = parse(YAML);
        config.pre_pad = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::BadPadding { .. })));
    }

    #[test]
    fn test_padding_is_bounded() {
        let mut config = parse(YAML);
        config.pre_pad = 1.0e12;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadPadding { pad, .. }) if pad == 1.0e12
        ));

        let mut config = parse(YAML);
        config.post_pad = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::BadPadding { .. })));

        let mut config = parse(YAML);
        config.pre_pad = MAX_PADDING_SECONDS;
        config.post_pad = MAX_PADDING_SECONDS;
        let validated = config.validate().unwrap();
        let query = validated.archive_query(time::macros::date!(2024 - 03 - 10));
        // One extra day either side
        assert_eq!(resolve(&query, &validated.archive_format).unwrap().len(), 4);
    }

    #[test]
    fn test_file_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::BadFilePath(_))
        ));
        Config::default().write_config_file(&path).unwrap();
        let read = Config::read_config_file(&path).unwrap();
        assert_eq!(read, Config::default());
        assert!(read.validate().is_ok());

        std::fs::write(&path, "site: [unclosed").unwrap();
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::ParsingError(_))
        ));
    }
}
