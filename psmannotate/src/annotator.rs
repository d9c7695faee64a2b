//! Matching of theoretical fragment ions against observed peaks
use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;

use mzpeaks::prelude::*;
use mzpeaks::Tolerance;
use thiserror::Error;
use tracing::{instrument, trace, warn};

use crate::fragment::{FragmentIonGenerator, IonFamily, NeutralLoss, TheoreticalIon};
use crate::modification::ModificationParseError;
use crate::peptide::Peptide;
use crate::projection::{project, AnnotatedPeakList};
use crate::registry::ModificationRegistry;
use crate::spectrum::{Spectrum, SpectrumRecord};

/// An error that might occur while annotating a spectrum
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("Failed to parse the modified sequence: {0}")]
    Parse(
        #[from]
        #[source]
        ModificationParseError,
    ),
    #[error("Modification position {position} is outside of {sequence}")]
    InvalidPosition { position: usize, sequence: String },
    #[error("Position {position} of {sequence} is already modified")]
    DuplicatePosition { position: usize, sequence: String },
    #[error("Unknown residue {residue:?} in {sequence}")]
    UnknownResidue { residue: char, sequence: String },
    #[error("Unsupported ion type {0:?}, only b and y ions are supported")]
    UnsupportedIonType(String),
    #[error("No peptide sequence was assigned")]
    MissingPeptide,
}

impl AnnotationError {
    /// Whether this error indicates a defect in the configuration rather than
    /// in a single spectrum's data
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnsupportedIonType(_))
    }
}

/// The parameters controlling fragment ion annotation
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationParams {
    /// The m/z error tolerance for matching a theoretical ion to a peak
    pub fragment_tolerance: Tolerance,
    /// Whether to consider water and ammonia losses
    pub neutral_losses: bool,
    /// Matches to peaks less intense than this fraction of the most intense peak are dropped
    pub intensity_cutoff: f64,
    /// The fragment ion families to consider
    pub ion_families: Vec<IonFamily>,
    /// Peaks within this many m/z of the precursor are removed prior to matching
    pub precursor_tolerance: f64,
}

impl Default for AnnotationParams {
    fn default() -> Self {
        Self {
            fragment_tolerance: Tolerance::Da(0.05),
            neutral_losses: true,
            intensity_cutoff: 0.01,
            ion_families: IonFamily::ALL.to_vec(),
            precursor_tolerance: 1.0,
        }
    }
}

impl AnnotationParams {
    pub fn new(
        fragment_tolerance: Tolerance,
        neutral_losses: bool,
        intensity_cutoff: f64,
        ion_families: Vec<IonFamily>,
    ) -> Self {
        Self {
            fragment_tolerance,
            neutral_losses,
            intensity_cutoff,
            ion_families,
            ..Default::default()
        }
    }

    /// Parse a list of ion family names like `["b", "y"]`, rejecting anything
    /// outside of the supported backbone fragments.
    pub fn with_ion_types<S: AsRef<str>>(mut self, ion_types: &[S]) -> Result<Self, AnnotationError> {
        self.ion_families = ion_types
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<IonFamily>, _>>()?;
        Ok(self)
    }

    pub fn is_ppm(&self) -> bool {
        matches!(self.fragment_tolerance, Tolerance::PPM(_))
    }

    /// The signed error of `observed` against `theoretical` in the tolerance's unit
    pub fn mass_error(&self, observed: f64, theoretical: f64) -> f64 {
        match self.fragment_tolerance {
            Tolerance::PPM(_) => (observed - theoretical) / theoretical * 1e6,
            Tolerance::Da(_) => observed - theoretical,
        }
    }

    pub fn fragment_generator(&self) -> FragmentIonGenerator {
        FragmentIonGenerator::new(self.ion_families.clone(), self.neutral_losses)
    }
}

/// A peak explained by a theoretical fragment ion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    pub mz: f64,
    pub intensity: f64,
    pub family: IonFamily,
    pub number: usize,
    pub charge: i32,
    pub neutral_loss: Option<NeutralLoss>,
    /// The observed minus theoretical m/z, in Da or PPM
    pub error: f64,
}

impl Annotation {
    /// The mzSpecLib style label, e.g. `y4-H2O^2/0.0012`
    pub fn label(&self) -> String {
        let loss = self.neutral_loss.map(|l| l.to_string()).unwrap_or_default();
        let charge = if self.charge > 1 {
            format!("^{}", self.charge)
        } else {
            String::new()
        };
        format!(
            "{}{}{}{}/{:.4}",
            self.family, self.number, loss, charge, self.error
        )
    }
}

/// The annotations of a single spectrum, sorted by m/z with at most one
/// annotation per peak.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new(mut annotations: Vec<Annotation>) -> Self {
        annotations.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        annotations.dedup_by(|a, b| a.mz == b.mz);
        Self { annotations }
    }

    /// Find the annotation of the peak at exactly `mz`
    pub fn find_mz(&self, mz: f64) -> Option<&Annotation> {
        self.annotations
            .binary_search_by(|a| a.mz.total_cmp(&mz))
            .ok()
            .map(|i| &self.annotations[i])
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }
}

impl IntoIterator for AnnotationSet {
    type Item = Annotation;
    type IntoIter = std::vec::IntoIter<Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.annotations.into_iter()
    }
}

/// Match the fragment ions of `peptide` against `spectrum`.
///
/// `spectrum` is expected to have had its precursor peaks removed already. Each
/// theoretical ion claims the closest peak within tolerance, and each peak keeps
/// only the claim with the smallest absolute m/z error, the first generated ion
/// winning exact ties. Peaks below `intensity_cutoff` times the most intense
/// peak are then dropped.
pub fn annotate(
    spectrum: &Spectrum,
    peptide: &Peptide,
    params: &AnnotationParams,
) -> Result<AnnotationSet, AnnotationError> {
    let ions = params
        .fragment_generator()
        .generate(peptide, spectrum.precursor.charge())?;
    let peaks = spectrum.to_peak_set();
    let tolerance = params.fragment_tolerance;

    let mut best: HashMap<u32, (TheoreticalIon, f64)> = HashMap::new();
    for ion in ions.iter() {
        let closest = peaks
            .all_peaks_for(ion.mz, tolerance)
            .iter()
            .map(|p| (p, (p.mz - ion.mz).abs()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b));
        let Some((peak, abs_error)) = closest else {
            continue;
        };
        match best.entry(peak.index) {
            Entry::Occupied(mut entry) => {
                if abs_error < (entry.get().1 - entry.get().0.mz).abs() {
                    trace!(
                        "{} replaces {} at {:0.4}",
                        ion.name(),
                        entry.get().0.name(),
                        peak.mz
                    );
                    entry.insert((*ion, peak.mz));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((*ion, peak.mz));
            }
        }
    }

    // The peak set stores intensities at single precision, so the cutoff is
    // checked against the spectrum's own values
    let intensities = spectrum.intensity();
    let threshold = params.intensity_cutoff * spectrum.max_intensity();
    let annotations = best
        .into_iter()
        .filter_map(|(index, (ion, mz))| {
            let intensity = *intensities.get(index as usize)?;
            (intensity >= threshold).then(|| Annotation {
                mz,
                intensity,
                family: ion.family,
                number: ion.number,
                charge: ion.charge,
                neutral_loss: ion.neutral_loss,
                error: params.mass_error(mz, ion.mz),
            })
        })
        .collect();
    Ok(AnnotationSet::new(annotations))
}

/// The result of annotating one [`SpectrumRecord`]
#[derive(Debug, Clone)]
pub struct AnnotatedSpectrum {
    pub record: SpectrumRecord,
    pub peptide: Peptide,
    pub peaks: AnnotatedPeakList,
}

impl AnnotatedSpectrum {
    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn charge(&self) -> i32 {
        self.record.spectrum.precursor.charge()
    }

    /// Whether no peak could be explained
    pub fn has_no_match(&self) -> bool {
        self.peaks.matched() == 0
    }
}

/// Annotates whole spectrum records with a fixed set of parameters and a
/// shared [`ModificationRegistry`]
#[derive(Debug, Clone)]
pub struct SpectrumAnnotator {
    pub params: AnnotationParams,
    registry: Arc<ModificationRegistry>,
}

impl SpectrumAnnotator {
    pub fn new(params: AnnotationParams, registry: Arc<ModificationRegistry>) -> Self {
        Self { params, registry }
    }

    pub fn registry(&self) -> &Arc<ModificationRegistry> {
        &self.registry
    }

    /// Build the peptide for `record` from its modified sequence
    pub fn peptide_for(&self, record: &SpectrumRecord) -> Result<Peptide, AnnotationError> {
        let modified_sequence = record
            .modified_sequence
            .as_deref()
            .ok_or(AnnotationError::MissingPeptide)?;
        Peptide::from_modified_sequence(modified_sequence, &self.registry)
    }

    /// Annotate `record` and project the result onto its complete peak list.
    ///
    /// The precursor peaks are only removed from a working copy, so the projected
    /// peak list always covers every original peak.
    #[instrument(level = "debug", skip_all, fields(title = %record.title, scan = record.scan))]
    pub fn annotate_record(
        &self,
        record: SpectrumRecord,
    ) -> Result<AnnotatedSpectrum, AnnotationError> {
        let peptide = self.peptide_for(&record)?;
        let working = record
            .spectrum
            .without_precursor_peaks(self.params.precursor_tolerance);
        let annotations = annotate(&working, &peptide, &self.params)?;
        if annotations.is_empty() {
            warn!(
                "No ions matched for {} (scan {}) assigned {}",
                record.title, record.scan, peptide
            );
        }
        let peaks = project(
            record.spectrum.mz(),
            record.spectrum.intensity(),
            &annotations,
        );
        Ok(AnnotatedSpectrum {
            record,
            peptide,
            peaks,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::mass::mass_charge_ratio;
    use crate::spectrum::Precursor;

    use super::*;

    const B3: f64 = 324.1554;
    const Y4: f64 = 477.21912;

    fn peptide_spectrum(mz: Vec<f64>, intensity: Vec<f64>, charge: i32) -> Spectrum {
        Spectrum::new(Precursor::new(400.6872, vec![charge], 10.0, 1e5), mz, intensity).unwrap()
    }

    fn no_loss_params() -> AnnotationParams {
        AnnotationParams {
            neutral_losses: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_peptide_b3_y4() {
        let peptide = Peptide::new("PEPTIDE");
        let spectrum = peptide_spectrum(
            vec![150.0, B3, 350.0, Y4, 612.0],
            vec![100.0, 500.0, 100.0, 800.0, 100.0],
            2,
        );
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.len(), 2);
        let b3 = annotations.find_mz(B3).unwrap();
        assert_eq!((b3.family, b3.number, b3.charge), (IonFamily::B, 3, 1));
        assert!(b3.error.abs() < 1e-3);
        let y4 = annotations.find_mz(Y4).unwrap();
        assert_eq!((y4.family, y4.number, y4.charge), (IonFamily::Y, 4, 1));
        assert!(annotations.find_mz(150.0).is_none());
    }

    // b2 and y2-H2O of SSSS have the same m/z
    const SS_B2: f64 = 175.071332;

    #[test]
    fn test_most_accurate_wins() {
        // shifts b2 0.02 above y2-H2O
        let registry = ModificationRegistry::new();
        let peptide = Peptide::from_modified_sequence("+0.02SSSS", &registry).unwrap();
        let params = AnnotationParams::default();

        let observed = SS_B2 + 0.004;
        let spectrum = peptide_spectrum(vec![observed], vec![100.0], 1);
        let annotations = annotate(&spectrum, &peptide, &params).unwrap();
        let ann = annotations.find_mz(observed).unwrap();
        assert_eq!((ann.family, ann.number), (IonFamily::Y, 2));
        assert_eq!(ann.neutral_loss, Some(NeutralLoss::Water));
        assert!((ann.error - 0.004).abs() < 1e-4);

        let observed = SS_B2 + 0.015;
        let spectrum = peptide_spectrum(vec![observed], vec![100.0], 1);
        let annotations = annotate(&spectrum, &peptide, &params).unwrap();
        let ann = annotations.find_mz(observed).unwrap();
        assert_eq!((ann.family, ann.number), (IonFamily::B, 2));
        assert!((ann.error + 0.005).abs() < 1e-4);
    }

    #[test]
    fn test_closest_peak_per_ion() {
        let peptide = Peptide::new("PEPTIDE");
        let spectrum = peptide_spectrum(vec![B3 - 0.03, B3 + 0.01], vec![100.0, 100.0], 1);
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert!(annotations.find_mz(B3 + 0.01).is_some());
    }

    #[test]
    fn test_intensity_cutoff() {
        let peptide = Peptide::new("PEPTIDE");
        let spectrum = peptide_spectrum(vec![B3, Y4, 900.0], vec![5.0, 800.0, 1000.0], 2);
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert!(annotations.find_mz(Y4).is_some());

        let params = AnnotationParams {
            intensity_cutoff: 0.0,
            ..no_loss_params()
        };
        assert_eq!(annotate(&spectrum, &peptide, &params).unwrap().len(), 2);
    }

    #[test]
    fn test_intensity_cutoff_inclusive() {
        let peptide = Peptide::new("PEPTIDE");
        let spectrum = peptide_spectrum(vec![B3, 900.0], vec![0.01, 1.0], 2);
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations.find_mz(B3).unwrap().intensity, 0.01);

        let spectrum = peptide_spectrum(vec![B3, 900.0], vec![123.4, 200.0], 2);
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.find_mz(B3).unwrap().intensity, 123.4);
    }

    #[test]
    fn test_charge_policy_respected() {
        let peptide = Peptide::new("PEPTIDE");
        let y4_2 = mass_charge_ratio(Y4 - 1.007276, 2);
        let y4_3 = mass_charge_ratio(Y4 - 1.007276, 3);
        let spectrum = peptide_spectrum(vec![y4_3, y4_2], vec![100.0, 100.0], 3);
        let annotations = annotate(&spectrum, &peptide, &no_loss_params()).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations.find_mz(y4_2).unwrap().charge, 2);

        let spectrum = peptide_spectrum(vec![y4_3, y4_2], vec![100.0, 100.0], 1);
        assert!(annotate(&spectrum, &peptide, &no_loss_params())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ppm_error() {
        let params = AnnotationParams {
            fragment_tolerance: Tolerance::PPM(20.0),
            ..no_loss_params()
        };
        assert!(params.is_ppm());
        let peptide = Peptide::new("PEPTIDE");
        let observed = B3 * (1.0 + 5e-6);
        let spectrum = peptide_spectrum(vec![observed], vec![100.0], 2);
        let annotations = annotate(&spectrum, &peptide, &params).unwrap();
        let ann = annotations.find_mz(observed).unwrap();
        assert!((ann.error - 5.0).abs() < 0.5, "{}", ann.error);
    }

    #[test]
    fn test_labels() {
        let ann = Annotation {
            mz: 100.0,
            intensity: 1.0,
            family: IonFamily::Y,
            number: 4,
            charge: 2,
            neutral_loss: Some(NeutralLoss::Water),
            error: -0.00123,
        };
        assert_eq!(ann.label(), "y4-H2O^2/-0.0012");
        let ann = Annotation {
            charge: 1,
            neutral_loss: None,
            family: IonFamily::B,
            error: 0.01,
            ..ann
        };
        assert_eq!(ann.label(), "b4/0.0100");
    }

    #[test]
    fn test_with_ion_types() {
        let params = AnnotationParams::default()
            .with_ion_types(&["y"])
            .unwrap();
        assert_eq!(params.ion_families, vec![IonFamily::Y]);
        let err = AnnotationParams::default()
            .with_ion_types(&["b", "z"])
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test_log::test]
    fn test_annotate_record() {
        let registry = Arc::new(ModificationRegistry::new());
        let annotator = SpectrumAnnotator::new(no_loss_params(), registry.clone());
        let spectrum = Spectrum::new(
            Precursor::new(400.6872, vec![2], 10.0, 1e5),
            vec![B3, 400.5, 400.6872, Y4],
            vec![500.0, 2000.0, 3000.0, 800.0],
        )
        .unwrap();
        let record = SpectrumRecord::new(
            "scan=7".to_string(),
            7,
            Some("PEPTIDE".to_string()),
            spectrum,
        );
        let result = annotator.annotate_record(record.clone()).unwrap();
        assert_eq!(result.peaks.len(), 4);
        assert_eq!(result.peaks.matched(), 2);
        assert_eq!(result.peaks.unmatched(), 2);
        let mzs: Vec<_> = result.peaks.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, record.spectrum.mz());
        assert!(!result.has_no_match());

        let again = annotator.annotate_record(record).unwrap();
        assert_eq!(result.peaks, again.peaks);
    }

    #[test_log::test]
    fn test_record_errors() {
        let annotator = SpectrumAnnotator::new(
            AnnotationParams::default(),
            Arc::new(ModificationRegistry::new()),
        );
        let mut record = SpectrumRecord::default();
        assert!(matches!(
            annotator.annotate_record(record.clone()),
            Err(AnnotationError::MissingPeptide)
        ));
        record.modified_sequence = Some("PEP+1TIDE".to_string());
        assert!(matches!(
            annotator.annotate_record(record.clone()),
            Err(AnnotationError::Parse(_))
        ));
        record.modified_sequence = Some("PEPTIDE".to_string());
        let result = annotator.annotate_record(record).unwrap();
        assert!(result.has_no_match());
        assert_eq!(result.peaks.len(), 0);
    }
}
