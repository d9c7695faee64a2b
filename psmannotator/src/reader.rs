//! Conversion of MGF spectra read by `mzdata` into [`SpectrumRecord`]s
use mzdata::params::ParamDescribed;
use mzdata::prelude::*;
use mzdata::spectrum::SpectrumConversionError;
use thiserror::Error;

use psmannotate::{Precursor, Spectrum, SpectrumError, SpectrumRecord};

use crate::types::SpectrumType;

/// The MGF header holding the modified sequence
pub const SEQUENCE_PARAM: &str = "seq";
/// The MGF header holding the scan number
pub const SCANS_PARAM: &str = "scans";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Spectrum {0} has no precursor")]
    MissingPrecursor(String),
    #[error("Spectrum {0} has no usable peak data: {1}")]
    MissingPeaks(String, #[source] SpectrumConversionError),
    #[error("Spectrum {0} is malformed: {1}")]
    Malformed(String, #[source] SpectrumError),
}

/// Widen a single precision value read by `mzdata` to the `f64` with the same
/// shortest decimal form, so `123.4` stays `123.4` when written back out.
pub(crate) fn widen_f32(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(value as f64)
}

/// Find the value of the header named `name`, ignoring case
pub fn header_value(spectrum: &SpectrumType, name: &str) -> Option<String> {
    spectrum
        .description()
        .params()
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.value.to_string().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a [`SpectrumRecord`] from `spectrum`, centroiding its peaks if they
/// are only available as arrays.
pub fn spectrum_record(spectrum: &mut SpectrumType) -> Result<SpectrumRecord, RecordError> {
    let title = spectrum.id().to_string();
    let modified_sequence = header_value(spectrum, SEQUENCE_PARAM);
    let scan = header_value(spectrum, SCANS_PARAM)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(-1);
    let retention_time = spectrum
        .acquisition()
        .scans
        .first()
        .map(|event| event.start_time)
        .unwrap_or(-1.0);

    let precursor = match spectrum.precursor() {
        Some(prec) => {
            let ion = prec.ion();
            Precursor::new(
                ion.mz,
                ion.charge.into_iter().collect(),
                retention_time,
                widen_f32(ion.intensity),
            )
        }
        None => return Err(RecordError::MissingPrecursor(title)),
    };

    let (mz, intensity): (Vec<f64>, Vec<f64>) = match spectrum.try_build_centroids() {
        Ok(peaks) => peaks.iter().map(|p| (p.mz, widen_f32(p.intensity))).unzip(),
        Err(e) => return Err(RecordError::MissingPeaks(title, e)),
    };

    let spectrum = match Spectrum::new(precursor, mz, intensity) {
        Ok(spectrum) => spectrum,
        Err(e) => return Err(RecordError::Malformed(title, e)),
    };
    Ok(SpectrumRecord::new(title, scan, modified_sequence, spectrum))
}
