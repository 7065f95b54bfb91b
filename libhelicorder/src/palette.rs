use colorgrad::Gradient;
use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

/// An opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Sequential colormaps available for row coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Palette {
    #[default]
    Magma,
    Inferno,
    Plasma,
    Viridis,
    Cividis,
    Turbo,
}

impl FromStr for Palette {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "magma" => Ok(Self::Magma),
            "inferno" => Ok(Self::Inferno),
            "plasma" => Ok(Self::Plasma),
            "viridis" => Ok(Self::Viridis),
            "cividis" => Ok(Self::Cividis),
            "turbo" => Ok(Self::Turbo),
            _ => Err(ConfigError::UnknownPalette(s.to_string())),
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Magma => "magma",
            Self::Inferno => "inferno",
            Self::Plasma => "plasma",
            Self::Viridis => "viridis",
            Self::Cividis => "cividis",
            Self::Turbo => "turbo",
        };
        write!(f, "{name}")
    }
}

impl Palette {
    /// Sample the colormap at `t` in `[0, 1]`
    pub fn at(&self, t: f32) -> Rgb {
        let color = match self {
            Self::Magma => colorgrad::preset::magma().at(t),
            Self::Inferno => colorgrad::preset::inferno().at(t),
            Self::Plasma => colorgrad::preset::plasma().at(t),
            Self::Viridis => colorgrad::preset::viridis().at(t),
            Self::Cividis => colorgrad::preset::cividis().at(t),
            Self::Turbo => colorgrad::preset::turbo().at(t),
        };
        let [r, g, b, _] = color.to_rgba8();
        Rgb(r, g, b)
    }

    /// Colors for `count` rows, cycling through four evenly spaced colormap positions.
    ///
    /// Row k takes the color at `(k mod 4) / 4`, so rows k and k + 4 always match.
    pub fn cycle(&self, count: usize, period: usize) -> Vec<Rgb> {
        let period = period.max(1);
        let stops: Vec<Rgb> = (0..period)
            .map(|k| self.at(k as f32 / period as f32))
            .collect();
        (0..count).map(|k| stops[k % period]).collect()
    }
}

/// Background and foreground colors of a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub background: Rgb,
    pub foreground: Rgb,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            background: Rgb::WHITE,
            foreground: Rgb::BLACK,
        }
    }
}

impl FromStr for Style {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "light" | "default" => Ok(Self::default()),
            "dark" => Ok(Self {
                background: Rgb(24, 24, 28),
                foreground: Rgb(220, 220, 220),
            }),
            _ => Err(ConfigError::UnknownStylesheet(s.to_string())),
        }
    }
}
