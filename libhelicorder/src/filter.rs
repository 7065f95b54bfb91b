//! Butterworth filters built from cascaded second-order sections.
//!
//! | kind     | constructed by                    | passes          |
//! | -------- | --------------------------------- | --------------- |
//! | lowpass  | Butterworth LPF                   | below `freq`    |
//! | highpass | Butterworth HPF                   | above `freq`    |
//! | bandpass | HPF(`freqmin`) then LPF(`freqmax`) | between corners |
//!
//! Sections use the bilinear transform with frequency prewarping, so the -3 dB point lands
//! on the requested corner. Each segment is filtered independently starting from rest.
use std::f64::consts::PI;

use super::error::FilterError;

/// The kind of a configured filter and its corner frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    Bandpass { freqmin: f64, freqmax: f64 },
    Lowpass { freq: f64 },
    Highpass { freq: f64 },
}

/// A named, validated filter definition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub name: String,
    pub kind: FilterKind,
    pub corners: u32,
    pub zerophase: bool,
}

pub const DEFAULT_CORNERS: u32 = 4;

impl FilterSpec {
    /// Filename-friendly description, e.g. `bandpass_0.50-10.00Hz`
    pub fn describe(&self) -> String {
        match self.kind {
            FilterKind::Bandpass { freqmin, freqmax } => {
                format!("bandpass_{freqmin:.2}-{freqmax:.2}Hz")
            }
            FilterKind::Lowpass { freq } => format!("lowpass_{freq:.2}Hz"),
            FilterKind::Highpass { freq } => format!("highpass_{freq:.2}Hz"),
        }
    }

    /// Build the section cascade for data sampled at `sample_rate`
    pub fn design(&self, sample_rate: f64) -> Result<Cascade, FilterError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FilterError::BadSampleRate {
                name: self.name.clone(),
                rate: sample_rate,
            });
        }
        if self.corners == 0 {
            return Err(FilterError::NoCorners(self.name.clone()));
        }
        let corners = match self.kind {
            FilterKind::Bandpass { freqmin, freqmax } => vec![freqmin, freqmax],
            FilterKind::Lowpass { freq } | FilterKind::Highpass { freq } => vec![freq],
        };
        if let Some(freq) = corners.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(FilterError::BadCorner {
                name: self.name.clone(),
                freq: *freq,
            });
        }
        if let FilterKind::Bandpass { freqmin, freqmax } = self.kind {
            if freqmin >= freqmax {
                return Err(FilterError::BadBand {
                    name: self.name.clone(),
                    freqmin,
                    freqmax,
                });
            }
        }
        let nyquist = sample_rate / 2.0;
        let above_nyquist = |freq: f64| FilterError::AboveNyquist {
            name: self.name.clone(),
            freq,
            nyquist,
        };
        let mut sections = Vec::new();
        match self.kind {
            FilterKind::Bandpass { freqmin, freqmax } => {
                if freqmin >= nyquist {
                    return Err(above_nyquist(freqmin));
                }
                sections.extend(butterworth(Response::Highpass, self.corners, freqmin, sample_rate));
                if freqmax >= nyquist {
                    spdlog::warn!(
                        "Filter {}: upper corner {} Hz is at or above Nyquist ({} Hz); applying a highpass instead",
                        self.name,
                        freqmax,
                        nyquist
                    );
                } else {
                    sections.extend(butterworth(Response::Lowpass, self.corners, freqmax, sample_rate));
                }
            }
            FilterKind::Lowpass { freq } => {
                if freq >= nyquist {
                    return Err(above_nyquist(freq));
                }
                sections.extend(butterworth(Response::Lowpass, self.corners, freq, sample_rate));
            }
            FilterKind::Highpass { freq } => {
                if freq >= nyquist {
                    return Err(above_nyquist(freq));
                }
                sections.extend(butterworth(Response::Highpass, self.corners, freq, sample_rate));
            }
        }
        Ok(Cascade { sections })
    }

    /// Filter `samples` in place. Sample count and timing are unchanged.
    pub fn apply(&self, samples: &mut [f64], sample_rate: f64) -> Result<(), FilterError> {
        let cascade = self.design(sample_rate)?;
        cascade.run(samples);
        if self.zerophase {
            samples.reverse();
            cascade.run(samples);
            samples.reverse();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    Lowpass,
    Highpass,
}

/// One normalized second-order section (a0 = 1), run in transposed direct form II
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn run(&self, samples: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for sample in samples.iter_mut() {
            let x = *sample;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *sample = y;
        }
    }

    /// Second-order section with quality factor `q`
    fn second_order(response: Response, freq: f64, sample_rate: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;
        let (b0, b1, b2) = match response {
            Response::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            Response::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
        };
        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// First-order section, used for the real pole of odd orders
    fn first_order(response: Response, freq: f64, sample_rate: f64) -> Self {
        let k = (PI * freq / sample_rate).tan();
        let a1 = (k - 1.0) / (k + 1.0);
        let (b0, b1) = match response {
            Response::Lowpass => (k / (k + 1.0), k / (k + 1.0)),
            Response::Highpass => (1.0 / (k + 1.0), -1.0 / (k + 1.0)),
        };
        Biquad {
            b0,
            b1,
            b2: 0.0,
            a1,
            a2: 0.0,
        }
    }
}

/// Sections of an order-`order` Butterworth response
fn butterworth(response: Response, order: u32, freq: f64, sample_rate: f64) -> Vec<Biquad> {
    let n = order as f64;
    let mut sections: Vec<Biquad> = (0..order / 2)
        .map(|k| {
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * n);
            let q = 1.0 / (2.0 * theta.sin());
            Biquad::second_order(response, freq, sample_rate, q)
        })
        .collect();
    if order % 2 == 1 {
        sections.push(Biquad::first_order(response, freq, sample_rate));
    }
    sections
}

/// A designed filter: its sections are run one after another
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cascade {
    sections: Vec<Biquad>,
}

impl Cascade {
    pub fn run(&self, samples: &mut [f64]) {
        for section in self.sections.iter() {
            section.run(samples);
        }
    }
}

/// Description of an ordered filter list, `unfiltered` when empty
pub fn describe_filters(filters: &[FilterSpec]) -> String {
    if filters.is_empty() {
        return String::from("unfiltered");
    }
    filters
        .iter()
        .map(|f| f.describe())
        .collect::<Vec<String>>()
        .join("_")
}
