//! Monoisotopic masses of residues and the small molecules involved in fragmentation
/// The mass of H+, a hydrogen atom minus an electron
pub use chemical_elements::PROTON;

/// The monoisotopic mass of water
pub const H2O: f64 = 18.0105646863;

/// The monoisotopic mass of ammonia
pub const NH3: f64 = 17.0265491015;

/// Residues which may lose a water molecule during fragmentation
pub const WATER_LOSS_RESIDUES: &[u8] = b"DEST";

/// Residues which may lose an ammonia molecule during fragmentation
pub const AMMONIA_LOSS_RESIDUES: &[u8] = b"KNQR";

/// Look up the monoisotopic residue mass of a one-letter amino acid code.
///
/// Returns `None` for letters which do not denote an amino acid with a
/// single known composition (e.g. `B`, `J`, `X`, `Z`).
pub const fn residue_mass(residue: u8) -> Option<f64> {
    let mass = match residue {
        b'A' => 71.037114,
        b'R' => 156.101111,
        b'N' => 114.042927,
        b'D' => 115.026943,
        b'C' => 103.009185,
        b'E' => 129.042593,
        b'Q' => 128.058578,
        b'G' => 57.021464,
        b'H' => 137.058912,
        b'I' => 113.084064,
        b'L' => 113.084064,
        b'K' => 128.094963,
        b'M' => 131.040485,
        b'F' => 147.068414,
        b'P' => 97.052764,
        b'S' => 87.032028,
        b'T' => 101.047679,
        b'W' => 186.079313,
        b'Y' => 163.063329,
        b'V' => 99.068414,
        b'U' => 150.953636,
        b'O' => 237.147727,
        _ => return None,
    };
    Some(mass)
}

/// Convert a neutral mass to m/z at `charge`
#[inline]
pub fn mass_charge_ratio(neutral_mass: f64, charge: i32) -> f64 {
    let z = charge as f64;
    (neutral_mass + z * PROTON) / z
}
