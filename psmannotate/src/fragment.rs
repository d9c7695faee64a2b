//! Theoretical backbone fragment ions of a peptide
use std::fmt::Display;
use std::str::FromStr;

use crate::annotator::AnnotationError;
use crate::mass::{mass_charge_ratio, AMMONIA_LOSS_RESIDUES, H2O, NH3, WATER_LOSS_RESIDUES};
use crate::peptide::Peptide;

/// The backbone cleavage fragment families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum IonFamily {
    /// N-terminal-retaining fragments
    B,
    /// C-terminal-retaining fragments
    Y,
}

impl IonFamily {
    pub const ALL: [IonFamily; 2] = [IonFamily::B, IonFamily::Y];

    /// The mass added to the sum of the fragment's residues
    pub const fn mass_offset(&self) -> f64 {
        match self {
            IonFamily::B => 0.0,
            IonFamily::Y => H2O,
        }
    }

    pub const fn letter(&self) -> char {
        match self {
            IonFamily::B => 'b',
            IonFamily::Y => 'y',
        }
    }

    /// The range of residue indices covered by fragment `number` of a peptide
    /// with `length` residues
    pub fn span(&self, number: usize, length: usize) -> std::ops::Range<usize> {
        match self {
            IonFamily::B => 0..number,
            IonFamily::Y => (length - number)..length,
        }
    }
}

impl Display for IonFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for IonFamily {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "b" | "B" => Ok(IonFamily::B),
            "y" | "Y" => Ok(IonFamily::Y),
            other => Err(AnnotationError::UnsupportedIonType(other.to_string())),
        }
    }
}

impl TryFrom<String> for IonFamily {
    type Error = AnnotationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IonFamily> for String {
    fn from(value: IonFamily) -> Self {
        value.to_string()
    }
}

/// A small molecule lost from a fragment ion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NeutralLoss {
    Water,
    Ammonia,
}

impl NeutralLoss {
    pub const ALL: [NeutralLoss; 2] = [NeutralLoss::Water, NeutralLoss::Ammonia];

    pub const fn mass(&self) -> f64 {
        match self {
            NeutralLoss::Water => H2O,
            NeutralLoss::Ammonia => NH3,
        }
    }

    pub const fn residues(&self) -> &'static [u8] {
        match self {
            NeutralLoss::Water => WATER_LOSS_RESIDUES,
            NeutralLoss::Ammonia => AMMONIA_LOSS_RESIDUES,
        }
    }

    /// Whether a fragment made of `residues` can lose this molecule
    pub fn applies_to(&self, residues: &[u8]) -> bool {
        let targets = self.residues();
        residues.iter().any(|aa| targets.contains(aa))
    }
}

impl Display for NeutralLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NeutralLoss::Water => f.write_str("-H2O"),
            NeutralLoss::Ammonia => f.write_str("-NH3"),
        }
    }
}

/// The fragment charge states considered for a precursor of charge `precursor_charge`.
///
/// Singly charged (or uncharged) precursors yield only singly charged fragments,
/// doubly charged precursors yield fragments of charge 1 and 2, and higher
/// charged precursors yield fragments up to one less than the precursor charge.
pub fn fragment_charges(precursor_charge: i32) -> std::ops::RangeInclusive<i32> {
    let max_charge = match precursor_charge {
        z if z <= 2 => z.max(1),
        z => z - 1,
    };
    1..=max_charge
}

/// A theoretical fragment ion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TheoreticalIon {
    pub family: IonFamily,
    /// The number of residues included from the fragment's terminus
    pub number: usize,
    pub charge: i32,
    pub neutral_loss: Option<NeutralLoss>,
    pub mz: f64,
}

impl TheoreticalIon {
    pub fn new(
        family: IonFamily,
        number: usize,
        charge: i32,
        neutral_loss: Option<NeutralLoss>,
        mz: f64,
    ) -> Self {
        Self {
            family,
            number,
            charge,
            neutral_loss,
            mz,
        }
    }

    /// The label of the ion without its charge or error, e.g. `y4-H2O`
    pub fn name(&self) -> String {
        match self.neutral_loss {
            Some(loss) => format!("{}{}{}", self.family, self.number, loss),
            None => format!("{}{}", self.family, self.number),
        }
    }
}

/// Generates the theoretical fragment ions of a [`Peptide`]
#[derive(Debug, Clone)]
pub struct FragmentIonGenerator {
    pub families: Vec<IonFamily>,
    pub neutral_losses: bool,
}

impl Default for FragmentIonGenerator {
    fn default() -> Self {
        Self {
            families: IonFamily::ALL.to_vec(),
            neutral_losses: true,
        }
    }
}

impl FragmentIonGenerator {
    pub fn new(families: Vec<IonFamily>, neutral_losses: bool) -> Self {
        Self {
            families,
            neutral_losses,
        }
    }

    /// Compute every fragment ion of `peptide` for the fragment charges allowed by
    /// `precursor_charge`, ordered by fragment number, then family, charge and loss.
    pub fn generate(
        &self,
        peptide: &Peptide,
        precursor_charge: i32,
    ) -> Result<Vec<TheoreticalIon>, AnnotationError> {
        let residue_masses = peptide.residue_masses()?;
        let residues = peptide.sequence().as_bytes();
        let length = residues.len();
        let charges = fragment_charges(precursor_charge);

        let mut ions = Vec::new();
        for number in 1..length {
            for family in self.families.iter().copied() {
                let span = family.span(number, length);
                let neutral_mass: f64 =
                    residue_masses[span.clone()].iter().sum::<f64>() + family.mass_offset();
                let losses = self
                    .neutral_losses
                    .then_some(NeutralLoss::ALL)
                    .into_iter()
                    .flatten()
                    .filter(|loss| loss.applies_to(&residues[span.clone()]));
                let variants: Vec<Option<NeutralLoss>> =
                    std::iter::once(None).chain(losses.map(Some)).collect();
                for charge in charges.clone() {
                    for loss in variants.iter().copied() {
                        let loss_mass = loss.map(|l| l.mass()).unwrap_or_default();
                        ions.push(TheoreticalIon::new(
                            family,
                            number,
                            charge,
                            loss,
                            mass_charge_ratio(neutral_mass - loss_mass, charge),
                        ));
                    }
                }
            }
        }
        Ok(ions)
    }
}

#[cfg(test)]
mod test {
    use crate::registry::ModificationRegistry;

    use super::*;

    fn mzs_of(ions: &[TheoreticalIon], family: IonFamily, charge: i32) -> Vec<f64> {
        ions.iter()
            .filter(|i| i.family == family && i.charge == charge && i.neutral_loss.is_none())
            .map(|i| i.mz)
            .collect()
    }

    fn check_within(observed: &[f64], expected: &[f64]) {
        assert_eq!(expected.len(), observed.len());
        for (a, b) in expected.iter().zip(observed.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} != {b}");
        }
    }

    #[test]
    fn test_charge_policy() {
        assert_eq!(fragment_charges(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(fragment_charges(1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(fragment_charges(2).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(fragment_charges(3).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(fragment_charges(5).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_peptide_ions() {
        let peptide = Peptide::new("PEPTIDE");
        let generator = FragmentIonGenerator::new(IonFamily::ALL.to_vec(), false);
        let ions = generator.generate(&peptide, 2).unwrap();
        assert_eq!(ions.len(), 24);

        check_within(
            &mzs_of(&ions, IonFamily::B, 1),
            &[98.06004, 227.10263, 324.1554, 425.20306, 538.2872, 653.3141],
        );
        check_within(
            &mzs_of(&ions, IonFamily::Y, 1),
            &[148.06043, 263.08737, 376.17144, 477.21912, 574.27188, 703.31447],
        );
        assert!(ions.iter().all(|i| i.charge == 1 || i.charge == 2));
    }

    #[test]
    fn test_neutral_losses() {
        let peptide = Peptide::new("PEPTIDE");
        let ions = FragmentIonGenerator::default().generate(&peptide, 1).unwrap();
        // b1 is a lone proline, which loses neither water nor ammonia
        assert!(ions
            .iter()
            .filter(|i| i.family == IonFamily::B && i.number == 1)
            .all(|i| i.neutral_loss.is_none()));
        // b2 contains a glutamate
        let b2_water = ions
            .iter()
            .find(|i| {
                i.family == IonFamily::B
                    && i.number == 2
                    && i.neutral_loss == Some(NeutralLoss::Water)
            })
            .unwrap();
        assert!((b2_water.mz - (227.10263 - H2O)).abs() < 1e-3);
        assert_eq!(b2_water.name(), "b2-H2O");
        // no residue of PEPTIDE can lose ammonia
        assert!(ions
            .iter()
            .all(|i| i.neutral_loss != Some(NeutralLoss::Ammonia)));
    }

    #[test]
    fn test_modified_ions() {
        let registry = ModificationRegistry::new();
        let peptide = Peptide::from_modified_sequence("+42.011PEPTIDEK+8.014", &registry).unwrap();
        let generator = FragmentIonGenerator::new(vec![IonFamily::B, IonFamily::Y], false);
        let ions = generator.generate(&peptide, 1).unwrap();
        let b1 = ions.iter().find(|i| i.family == IonFamily::B && i.number == 1).unwrap();
        assert!((b1.mz - (98.06004 + 42.011)).abs() < 1e-3);
        let y1 = ions.iter().find(|i| i.family == IonFamily::Y && i.number == 1).unwrap();
        assert!((y1.mz - (147.112804 + 8.014)).abs() < 1e-3);
    }

    #[test]
    fn test_family_parse() {
        assert_eq!("b".parse::<IonFamily>().unwrap(), IonFamily::B);
        assert_eq!("Y".parse::<IonFamily>().unwrap(), IonFamily::Y);
        assert!(matches!(
            "c".parse::<IonFamily>(),
            Err(AnnotationError::UnsupportedIonType(s)) if s == "c"
        ));
    }
}
