use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub spectra_read: usize,
    pub spectra_annotated: usize,
    pub spectra_failed: usize,
    pub spectra_without_matches: usize,
    pub matched_peaks: usize,
    pub unmatched_peaks: usize,
}

impl ProgressRecord {
    pub fn sum(self, other: Self) -> Self {
        self + other
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.spectra_read += rhs.spectra_read;
        self.spectra_annotated += rhs.spectra_annotated;
        self.spectra_failed += rhs.spectra_failed;
        self.spectra_without_matches += rhs.spectra_without_matches;
        self.matched_peaks += rhs.matched_peaks;
        self.unmatched_peaks += rhs.unmatched_peaks;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ProgressRecord::default(), ProgressRecord::sum)
    }
}
