use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

/// Trend removal applied to each segment before filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetrendMode {
    /// Subtract the least-squares line
    Linear,
    /// Subtract the mean
    Demean,
    /// Subtract the line through the first and last samples
    Simple,
}

impl FromStr for DetrendMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "demean" | "constant" => Ok(Self::Demean),
            "simple" => Ok(Self::Simple),
            _ => Err(ConfigError::UnknownDetrend(s.to_string())),
        }
    }
}

impl fmt::Display for DetrendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Demean => write!(f, "demean"),
            Self::Simple => write!(f, "simple"),
        }
    }
}

impl DetrendMode {
    pub fn apply(&self, samples: &mut [f64]) {
        if samples.is_empty() {
            return;
        }
        match self {
            Self::Demean => {
                let mean = samples.iter().sum::<f64>() / samples.len() as f64;
                samples.iter_mut().for_each(|s| *s -= mean);
            }
            Self::Simple => {
                let first = samples[0];
                let slope = if samples.len() > 1 {
                    (samples[samples.len() - 1] - first) / (samples.len() - 1) as f64
                } else {
                    0.0
                };
                for (idx, s) in samples.iter_mut().enumerate() {
                    *s -= first + slope * idx as f64;
                }
            }
            Self::Linear => {
                let n = samples.len() as f64;
                let x_mean = (n - 1.0) / 2.0;
                let y_mean = samples.iter().sum::<f64>() / n;
                let (mut sxy, mut sxx) = (0.0, 0.0);
                for (idx, s) in samples.iter().enumerate() {
                    let dx = idx as f64 - x_mean;
                    sxy += dx * (s - y_mean);
                    sxx += dx * dx;
                }
                let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
                for (idx, s) in samples.iter_mut().enumerate() {
                    *s -= y_mean + slope * (idx as f64 - x_mean);
                }
            }
        }
    }
}
