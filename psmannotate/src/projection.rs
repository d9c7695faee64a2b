//! Projection of an [`AnnotationSet`] back onto the complete peak list it was
//! computed from
use std::fmt::Display;

use crate::annotator::{Annotation, AnnotationSet};

/// The marker written for a peak no fragment ion explains
pub const UNMATCHED_LABEL: &str = "?";

/// One original peak and its annotation, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakLine {
    pub mz: f64,
    pub intensity: f64,
    pub annotation: Option<Annotation>,
}

impl PeakLine {
    pub fn is_matched(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn label(&self) -> String {
        self.annotation
            .as_ref()
            .map(Annotation::label)
            .unwrap_or_else(|| UNMATCHED_LABEL.to_string())
    }
}

impl Display for PeakLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.mz, self.intensity, self.label())
    }
}

/// Every original peak in original order, each tagged with its annotation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotatedPeakList {
    lines: Vec<PeakLine>,
    matched: usize,
}

impl AnnotatedPeakList {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn unmatched(&self) -> usize {
        self.lines.len() - self.matched
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeakLine> {
        self.lines.iter()
    }
}

impl<'a> IntoIterator for &'a AnnotatedPeakList {
    type Item = &'a PeakLine;
    type IntoIter = std::slice::Iter<'a, PeakLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Pair each original peak with its annotation, looked up by exact m/z.
///
/// `mz` and `intensity` are expected to be index-aligned, extra entries of the
/// longer array are ignored.
pub fn project(mz: &[f64], intensity: &[f64], annotations: &AnnotationSet) -> AnnotatedPeakList {
    let lines: Vec<PeakLine> = mz
        .iter()
        .zip(intensity.iter())
        .map(|(mz, intensity)| PeakLine {
            mz: *mz,
            intensity: *intensity,
            annotation: annotations.find_mz(*mz).copied(),
        })
        .collect();
    let matched = lines.iter().filter(|line| line.is_matched()).count();
    AnnotatedPeakList { lines, matched }
}
