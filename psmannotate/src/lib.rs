//! Fragment ion annotation of peptide-identified tandem mass spectra.
//!
//! A modified sequence like `-17.027SGLQENAFVNMKPSQILQ+0.984TVK` is parsed into a
//! [`Peptide`], whose b and y ions are matched against the peaks of a [`Spectrum`].
pub mod mass;
pub mod modification;
pub mod registry;
pub mod peptide;
pub mod spectrum;
pub mod fragment;
pub mod annotator;
pub mod projection;

pub use crate::annotator::{
    annotate, AnnotatedSpectrum, Annotation, AnnotationError, AnnotationParams, AnnotationSet,
    SpectrumAnnotator,
};
pub use crate::fragment::{FragmentIonGenerator, IonFamily, NeutralLoss, TheoreticalIon};
pub use crate::modification::{parse_modified_sequence, ModificationParseError, PositionMassMap};
pub use crate::peptide::Peptide;
pub use crate::projection::{project, AnnotatedPeakList, PeakLine};
pub use crate::registry::{Modification, ModificationRegistry, ModificationTarget};
pub use crate::spectrum::{Precursor, Spectrum, SpectrumError, SpectrumRecord};

pub use mzpeaks::Tolerance;
