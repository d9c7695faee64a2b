use std::fmt::Display;

use clap::ValueEnum;
use mzpeaks::Tolerance;
use serde::{Deserialize, Serialize};

use psmannotate::AnnotationParams;

/// The unit of the fragment ion mass tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceUnit {
    /// Daltons, absolute m/z difference
    #[default]
    Da,
    /// Parts-per-million of the theoretical m/z
    PPM,
}

impl ToleranceUnit {
    pub fn tolerance(&self, value: f64) -> Tolerance {
        match self {
            ToleranceUnit::Da => Tolerance::Da(value),
            ToleranceUnit::PPM => Tolerance::PPM(value),
        }
    }
}

impl Display for ToleranceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceUnit::Da => f.write_str("Da"),
            ToleranceUnit::PPM => f.write_str("ppm"),
        }
    }
}

pub fn make_default_annotation_params() -> AnnotationParams {
    AnnotationParams::default()
}

pub(crate) fn non_negative_float(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}
