//! Peak lists with their precursor ion description
use mzpeaks::{CentroidPeak, MZPeakSetType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("The m/z array has {0} entries but the intensity array has {1}")]
    MismatchedArrays(usize, usize),
}

/// The ion selected for fragmentation
#[derive(Debug, Clone, PartialEq)]
pub struct Precursor {
    pub mz: f64,
    /// The candidate charge states, the first of which is used for annotation
    pub charges: Vec<i32>,
    /// Retention time in minutes, negative when not known
    pub retention_time: f64,
    pub intensity: f64,
}

impl Precursor {
    pub fn new(mz: f64, charges: Vec<i32>, retention_time: f64, intensity: f64) -> Self {
        Self {
            mz,
            charges,
            retention_time,
            intensity,
        }
    }

    /// The charge state used for annotation, 1 if none is known
    pub fn charge(&self) -> i32 {
        self.charges.first().copied().unwrap_or(1)
    }

    pub fn has_retention_time(&self) -> bool {
        self.retention_time >= 0.0
    }
}

impl Default for Precursor {
    fn default() -> Self {
        Self {
            mz: 0.0,
            charges: Vec::new(),
            retention_time: -1.0,
            intensity: 0.0,
        }
    }
}

/// A centroided fragment spectrum stored as index-aligned m/z and intensity arrays
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    pub precursor: Precursor,
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    pub fn new(
        precursor: Precursor,
        mz: Vec<f64>,
        intensity: Vec<f64>,
    ) -> Result<Self, SpectrumError> {
        if mz.len() != intensity.len() {
            return Err(SpectrumError::MismatchedArrays(mz.len(), intensity.len()));
        }
        Ok(Self {
            precursor,
            mz,
            intensity,
        })
    }

    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    pub fn max_intensity(&self) -> f64 {
        self.intensity.iter().copied().fold(0.0, f64::max)
    }

    /// Copy the peaks into a searchable peak set
    pub fn to_peak_set(&self) -> MZPeakSetType<CentroidPeak> {
        let peaks: Vec<_> = self
            .iter()
            .enumerate()
            .map(|(i, (mz, intensity))| CentroidPeak::new(mz, intensity as f32, i as u32))
            .collect();
        MZPeakSetType::new(peaks)
    }

    /// Build a copy of this spectrum without the peaks lying within `tolerance`
    /// m/z of the precursor. `self` is left untouched.
    pub fn without_precursor_peaks(&self, tolerance: f64) -> Self {
        let precursor_mz = self.precursor.mz;
        let (mz, intensity) = self
            .iter()
            .filter(|(mz, _)| (mz - precursor_mz).abs() > tolerance)
            .unzip();
        Self {
            precursor: self.precursor.clone(),
            mz,
            intensity,
        }
    }
}

/// A [`Spectrum`] with its identifying metadata and peptide assignment, as
/// read from an annotated MGF file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumRecord {
    pub title: String,
    /// The scan number, negative when not known
    pub scan: i64,
    /// The modified sequence assigned to the spectrum
    pub modified_sequence: Option<String>,
    pub spectrum: Spectrum,
}

impl SpectrumRecord {
    pub fn new(
        title: String,
        scan: i64,
        modified_sequence: Option<String>,
        spectrum: Spectrum,
    ) -> Self {
        Self {
            title,
            scan,
            modified_sequence,
            spectrum,
        }
    }
}
