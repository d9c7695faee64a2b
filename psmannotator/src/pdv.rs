//! Side files for loading annotated spectra into the PDV viewer: a re-indexed
//! MGF file and a peptide table referring to it by index.
use std::io::{self, Write};

use psmannotate::AnnotatedSpectrum;

pub const PEPTIDE_TABLE_HEADER: &str = "peptide\tmodification\tspectrum_title\tcharge";

/// Peaks with intensity at or below this are not written to the PDV MGF
const MIN_INTENSITY: f64 = 1e-12;

#[derive(Debug)]
pub struct PDVWriter<M: Write, T: Write> {
    mgf: M,
    table: T,
}

impl<M: Write, T: Write> PDVWriter<M, T> {
    pub fn new(mgf: M, mut table: T) -> io::Result<Self> {
        writeln!(table, "{PEPTIDE_TABLE_HEADER}")?;
        Ok(Self { mgf, table })
    }

    fn write_mgf(&mut self, key: usize, spectrum: &AnnotatedSpectrum) -> io::Result<()> {
        let record = &spectrum.record;
        let precursor = &record.spectrum.precursor;
        let h = &mut self.mgf;
        writeln!(h, "BEGIN IONS")?;
        writeln!(h, "TITLE={key}")?;
        writeln!(h, "PEPMASS={} {}", precursor.mz, precursor.intensity)?;
        if precursor.has_retention_time() {
            writeln!(h, "RTINSECONDS={}", precursor.retention_time * 60.0)?;
        }
        writeln!(h, "CHARGE={}+", spectrum.charge())?;
        if record.scan >= 0 {
            writeln!(h, "SCANS={}", record.scan)?;
        }
        for (mz, intensity) in record.spectrum.iter() {
            if intensity > MIN_INTENSITY {
                writeln!(h, "{mz} {intensity}")?;
            }
        }
        writeln!(h, "END IONS")?;
        writeln!(h)?;
        Ok(())
    }

    /// Write `spectrum` titled `key` to the MGF and its peptide row to the table
    pub fn write(&mut self, key: usize, spectrum: &AnnotatedSpectrum) -> io::Result<()> {
        self.write_mgf(key, spectrum)?;
        writeln!(
            self.table,
            "{}\t{}\t{}\t{}",
            spectrum.peptide.sequence(),
            spectrum.peptide.pdv_modifications(),
            key,
            spectrum.charge()
        )?;
        Ok(())
    }

    pub fn close(mut self) -> io::Result<(M, T)> {
        self.mgf.flush()?;
        self.table.flush()?;
        Ok((self.mgf, self.table))
    }
}
