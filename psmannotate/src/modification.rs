//! Parsing of modified peptide sequences written with inline mass deltas, e.g.
//! `-17.027SGLQENAFVNMKPSQILQ+0.984TVK`.
//!
//! A delta directly following a residue letter modifies that residue. A delta
//! with no residue before it is an N-terminal modification, unless it directly
//! follows another delta in which case it is folded into the same position.
use std::collections::BTreeMap;
use std::num::ParseFloatError;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DELTA_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]?)([-+]?\d+\.\d+)").unwrap());

static DELTA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-+]?\d+\.\d+").unwrap());

/// Residue position to summed mass delta. Position 0 is the N-terminus, residues
/// are numbered from 1.
pub type PositionMassMap = BTreeMap<usize, f64>;

/// An error that might occur while parsing a modified sequence
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModificationParseError {
    #[error("Malformed token {token:?} at offset {offset} in {sequence:?}")]
    MalformedToken {
        sequence: String,
        token: char,
        offset: usize,
    },
    #[error("Failed to parse mass delta {0:?}: {1}")]
    InvalidMass(String, #[source] ParseFloatError),
    #[error("No residues found in {0:?}")]
    EmptySequence(String),
}

/// A mass delta token as found in the raw text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaToken<'a> {
    /// The numeric text, sign included
    pub text: &'a str,
    /// The residue letter immediately before the delta, if any
    pub anchor: Option<u8>,
    /// Byte offset of the token's first character (the anchor when present)
    pub offset: usize,
    /// Byte offset one past the end of the numeric text
    pub end: usize,
}

impl DeltaToken<'_> {
    pub fn mass(&self) -> Result<f64, ModificationParseError> {
        self.text
            .parse()
            .map_err(|e| ModificationParseError::InvalidMass(self.text.to_string(), e))
    }
}

/// Collect every `(anchor?, delta)` token of `sequence` in order of appearance
pub fn tokenize(sequence: &str) -> Vec<DeltaToken<'_>> {
    DELTA_TOKEN
        .captures_iter(sequence)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let delta = caps.get(2)?;
            let anchor = caps
                .get(1)
                .filter(|m| !m.is_empty())
                .map(|m| m.as_str().as_bytes()[0]);
            Some(DeltaToken {
                text: delta.as_str(),
                anchor,
                offset: whole.start(),
                end: delta.end(),
            })
        })
        .collect()
}

/// Remove every mass delta from `sequence`, leaving only residue letters
pub fn strip_deltas(sequence: &str) -> String {
    DELTA.replace_all(sequence, "").into_owned()
}

/// Split a modified sequence into its unmodified residues and the summed mass
/// delta at each modified position.
///
/// `consumed` tracks the total length of delta text already removed ahead of the
/// current token, so that `anchor offset + 1 - consumed` is always the 1-based
/// residue position of the anchor in the stripped sequence.
pub fn parse_modified_sequence(
    sequence: &str,
) -> Result<(String, PositionMassMap), ModificationParseError> {
    let delta_spans: Vec<_> = DELTA.find_iter(sequence).map(|m| m.range()).collect();
    if let Some((offset, token)) = sequence
        .char_indices()
        .filter(|(i, _)| !delta_spans.iter().any(|span| span.contains(i)))
        .find(|(_, c)| !c.is_ascii_uppercase())
    {
        return Err(ModificationParseError::MalformedToken {
            sequence: sequence.to_string(),
            token,
            offset,
        });
    }
    let base = strip_deltas(sequence);
    if base.is_empty() {
        return Err(ModificationParseError::EmptySequence(sequence.to_string()));
    }

    let mut positions = PositionMassMap::new();
    let mut consumed = 0usize;

    for token in tokenize(sequence) {
        let mass = token.mass()?;
        // A delta without a residue letter always belongs to the N-terminus
        let position = match token.anchor {
            Some(_) => token.offset + 1 - consumed,
            None => 0,
        };
        *positions.entry(position).or_default() += mass;
        consumed += token.text.len();
    }
    Ok((base, positions))
}

#[cfg(test)]
mod test {
    use super::*;

    fn isclose(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_nterm_and_residue() {
        let (base, mods) = parse_modified_sequence("-17.027SGLQENAFVNMKPSQILQ+0.984TVK").unwrap();
        assert_eq!(base, "SGLQENAFVNMKPSQILQTVK");
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[&0], -17.027);
        assert_eq!(mods[&18], 0.984);
        assert_eq!(base.as_bytes()[17], b'Q');
    }

    #[test]
    fn test_chained_nterm() {
        let (base, mods) = parse_modified_sequence("+43.006-17.027IAHQTIAN+0.984MQAR").unwrap();
        assert_eq!(base, "IAHQTIANMQAR");
        assert_eq!(mods.len(), 2);
        assert!(isclose(mods[&0], 43.006 - 17.027));
        assert_eq!(mods[&8], 0.984);
    }

    #[test]
    fn test_several_residues() {
        let (base, mods) = parse_modified_sequence("-17.027QILLTQSPAIM+15.995SASPGQ+0.984K").unwrap();
        assert_eq!(base, "QILLTQSPAIMSASPGQK");
        assert_eq!(mods[&0], -17.027);
        assert_eq!(mods[&11], 15.995);
        assert_eq!(mods[&17], 0.984);
        assert_eq!(base.as_bytes()[10], b'M');
        assert_eq!(base.as_bytes()[16], b'Q');
    }

    #[test]
    fn test_unanchored_delta_after_residue_delta() {
        let (base, mods) = parse_modified_sequence("PEM+15.995+0.984TIDE").unwrap();
        assert_eq!(base, "PEMTIDE");
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[&3], 15.995);
        assert_eq!(mods[&0], 0.984);

        let (_, mods) = parse_modified_sequence("-17.027PEM+15.995+0.984TIDE").unwrap();
        assert!(isclose(mods[&0], -17.027 + 0.984));
        assert_eq!(mods[&3], 15.995);
    }

    #[test]
    fn test_unmodified() {
        let (base, mods) = parse_modified_sequence("PEPTIDE").unwrap();
        assert_eq!(base, "PEPTIDE");
        assert!(mods.is_empty());
    }

    #[test]
    fn test_last_residue() {
        let (base, mods) = parse_modified_sequence("C+57.021PEPTIDEK+8.014").unwrap();
        assert_eq!(base, "CPEPTIDEK");
        assert_eq!(mods[&1], 57.021);
        assert_eq!(mods[&9], 8.014);
    }

    #[test]
    fn test_total_mass_preserved() {
        let cases = [
            "-17.027SGLQENAFVNMKPSQILQ+0.984TVK",
            "+43.006-17.027IAHQTIAN+0.984MQAR",
            "M+15.995PEPC+57.021K",
            "PEPTIDE",
        ];
        for case in cases {
            let expected: f64 = tokenize(case).iter().map(|t| t.mass().unwrap()).sum();
            let (base, mods) = parse_modified_sequence(case).unwrap();
            let observed: f64 = mods.values().sum();
            assert!(isclose(expected, observed), "{case}: {expected} != {observed}");
            assert!(mods.keys().all(|k| *k <= base.len()));
        }
    }

    #[test]
    fn test_malformed() {
        let err = parse_modified_sequence("PEP+1TIDE").unwrap_err();
        assert!(matches!(
            err,
            ModificationParseError::MalformedToken { token: '+', offset: 3, .. }
        ));
        assert!(parse_modified_sequence("PEPT1.IDE").is_err());
        assert!(parse_modified_sequence("pePTIDE").is_err());
        assert!(matches!(
            parse_modified_sequence("+15.995").unwrap_err(),
            ModificationParseError::EmptySequence(_)
        ));
    }
}
