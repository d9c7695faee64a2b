//! A peptide sequence with its modifications placed on specific positions
use std::fmt::Display;
use std::sync::Arc;

use itertools::Itertools;

use crate::annotator::AnnotationError;
use crate::mass::{residue_mass, H2O};
use crate::modification::{parse_modified_sequence, PositionMassMap};
use crate::registry::{Modification, ModificationRegistry};

/// A [`Modification`] placed at a position of a [`Peptide`]. Position 0
/// denotes the N-terminus, residues are numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationSite {
    pub position: usize,
    pub modification: Arc<Modification>,
}

impl ModificationSite {
    pub fn new(position: usize, modification: Arc<Modification>) -> Self {
        Self {
            position,
            modification,
        }
    }

    pub fn mass(&self) -> f64 {
        self.modification.mass
    }
}

/// An unmodified base sequence and the modifications attached to it,
/// at most one per position, ordered by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Peptide {
    sequence: String,
    modifications: Vec<ModificationSite>,
}

impl Peptide {
    /// Create an unmodified peptide
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            modifications: Vec::new(),
        }
    }

    /// Attach the modifications of `positions` to `sequence`, resolving each
    /// through `registry`.
    pub fn build(
        sequence: &str,
        positions: &PositionMassMap,
        registry: &ModificationRegistry,
    ) -> Result<Self, AnnotationError> {
        let mut peptide = Self::new(sequence);
        for (position, mass) in positions.iter() {
            let residue = match *position {
                0 => None,
                p if p <= sequence.len() => Some(sequence.as_bytes()[p - 1] as char),
                p => {
                    return Err(AnnotationError::InvalidPosition {
                        position: p,
                        sequence: sequence.to_string(),
                    })
                }
            };
            let modification = registry.ensure(residue, *mass, *position);
            peptide.add_modification(*position, modification)?;
        }
        Ok(peptide)
    }

    /// Parse a modified sequence and build the corresponding peptide
    pub fn from_modified_sequence(
        modified_sequence: &str,
        registry: &ModificationRegistry,
    ) -> Result<Self, AnnotationError> {
        let (sequence, positions) = parse_modified_sequence(modified_sequence)?;
        Self::build(&sequence, &positions, registry)
    }

    /// Place `modification` at `position`. Positions must lie in `[0, len]`
    /// and may only be used once.
    pub fn add_modification(
        &mut self,
        position: usize,
        modification: Arc<Modification>,
    ) -> Result<(), AnnotationError> {
        if position > self.len() {
            return Err(AnnotationError::InvalidPosition {
                position,
                sequence: self.sequence.clone(),
            });
        }
        match self
            .modifications
            .binary_search_by_key(&position, |site| site.position)
        {
            Ok(_) => Err(AnnotationError::DuplicatePosition {
                position,
                sequence: self.sequence.clone(),
            }),
            Err(i) => {
                self.modifications
                    .insert(i, ModificationSite::new(position, modification));
                Ok(())
            }
        }
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn modifications(&self) -> &[ModificationSite] {
        &self.modifications
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        !self.modifications.is_empty()
    }

    /// The total modification mass at `position`
    pub fn modification_mass_at(&self, position: usize) -> f64 {
        self.modifications
            .binary_search_by_key(&position, |site| site.position)
            .map(|i| self.modifications[i].mass())
            .unwrap_or_default()
    }

    /// The mass of every residue with its modifications folded in, with the
    /// N-terminal modification added to the first residue.
    pub fn residue_masses(&self) -> Result<Vec<f64>, AnnotationError> {
        let mut masses = self
            .sequence
            .bytes()
            .enumerate()
            .map(|(i, aa)| {
                residue_mass(aa)
                    .map(|m| m + self.modification_mass_at(i + 1))
                    .ok_or(AnnotationError::UnknownResidue {
                        residue: aa as char,
                        sequence: self.sequence.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = masses.first_mut() {
            *first += self.modification_mass_at(0);
        }
        Ok(masses)
    }

    /// The neutral monoisotopic mass of the whole peptide
    pub fn monoisotopic_mass(&self) -> Result<f64, AnnotationError> {
        Ok(self.residue_masses()?.iter().sum::<f64>() + H2O)
    }

    /// Render the sequence with each modification's mass in brackets after its
    /// residue, or before the first residue for the N-terminus.
    pub fn bracketed_sequence(&self) -> String {
        if !self.is_modified() {
            return self.sequence.clone();
        }
        let mut residues: Vec<String> = self.sequence.chars().map(String::from).collect();
        for site in self.modifications.iter() {
            let tag = format!("[{:.4}]", site.mass());
            if site.position == 0 {
                residues[0].insert_str(0, &tag);
            } else {
                residues[site.position - 1].push_str(&tag);
            }
        }
        residues.concat()
    }

    /// Render the modification list in the format read by the PDV viewer,
    /// `-` if there are none.
    pub fn pdv_modifications(&self) -> String {
        if !self.is_modified() {
            return "-".to_string();
        }
        self.modifications
            .iter()
            .map(|site| {
                if site.position == 0 {
                    format!(
                        "{} of N-term@{}[{:.4}]",
                        site.modification.name,
                        site.position,
                        site.mass()
                    )
                } else {
                    format!(
                        "{}@{}[{:.4}]",
                        site.modification.name,
                        site.position,
                        site.mass()
                    )
                }
            })
            .join(";")
    }
}

impl Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.bracketed_sequence())
    }
}
