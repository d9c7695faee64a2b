use mzdata::spectrum::{utils::Collator, MultiLayerSpectrum};
use mzpeaks::{CentroidPeak, DeconvolutedPeak};

use psmannotate::AnnotatedSpectrum;

pub(crate) type CPeak = CentroidPeak;
pub(crate) type DPeak = DeconvolutedPeak;
pub(crate) type SpectrumType = MultiLayerSpectrum<CPeak, DPeak>;

/// What became of a single input spectrum. Failures still travel through the
/// collator so that it does not stall waiting on their index.
#[derive(Debug)]
pub(crate) enum SpectrumOutcome {
    Annotated(Box<AnnotatedSpectrum>),
    Failed,
}

pub(crate) type OutcomeCollator = Collator<SpectrumOutcome>;
pub(crate) const BUFFER_SIZE: usize = 10_000;
