//! A process-wide catalog of the mass-delta modifications seen so far
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// Where a [`Modification`] may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModificationTarget {
    /// The peptide N-terminus, not tied to a residue
    NTerm,
    /// A specific residue, by one-letter code
    Residue(char),
}

/// A named mass delta
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Modification {
    pub name: String,
    pub mass: f64,
    pub target: ModificationTarget,
}

impl Modification {
    pub fn new(name: String, mass: f64, target: ModificationTarget) -> Self {
        Self { name, mass, target }
    }

    pub fn is_n_terminal(&self) -> bool {
        matches!(self.target, ModificationTarget::NTerm)
    }
}

impl Display for Modification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Round `mass` so that deltas which differ only by floating point noise share a name
fn canonical_mass(mass: f64) -> f64 {
    let mass = (mass * 1e6).round() / 1e6;
    // Avoid naming a delta "-0"
    if mass == 0.0 {
        0.0
    } else {
        mass
    }
}

/// Derive the canonical name of a modification
pub fn modification_name(residue: Option<char>, mass: f64) -> String {
    let mass = canonical_mass(mass);
    match residue {
        Some(aa) => format!("{mass} of {aa}"),
        None => format!("{mass}"),
    }
}

/// An append-only, thread-safe collection of [`Modification`]s keyed by name.
///
/// Repeated requests for the same residue and mass always yield the same
/// shared [`Modification`] instance.
#[derive(Debug, Default)]
pub struct ModificationRegistry {
    modifications: Mutex<HashMap<String, Arc<Modification>>>,
}

impl ModificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the modification for `mass` on `residue` at `position`, creating it
    /// if it has not been seen before. Position 0 is always N-terminal and
    /// ignores `residue`.
    pub fn ensure(&self, residue: Option<char>, mass: f64, position: usize) -> Arc<Modification> {
        let residue = if position == 0 { None } else { residue };
        let name = modification_name(residue, mass);
        let mut modifications = self
            .modifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match modifications.entry(name) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let target = match residue {
                    Some(aa) => ModificationTarget::Residue(aa),
                    None => ModificationTarget::NTerm,
                };
                debug!("Registering modification {}", entry.key());
                let modification = Arc::new(Modification::new(
                    entry.key().clone(),
                    canonical_mass(mass),
                    target,
                ));
                entry.insert(modification.clone());
                modification
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Modification>> {
        self.modifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.modifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The names of all known modifications, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .modifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
