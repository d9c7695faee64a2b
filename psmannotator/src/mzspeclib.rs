//! Writing annotated spectra as an mzSpecLib 1.0 text library
use std::io::{self, Write};

use psmannotate::AnnotatedSpectrum;

pub const FORMAT_HEADER: &str = "<mzSpecLib 1.0>";

/// Writes a text-format mzSpecLib library, one `<Spectrum>` block per call to
/// [`MzSpecLibWriter::write`].
#[derive(Debug)]
pub struct MzSpecLibWriter<W: Write> {
    handle: W,
    library_name: String,
    spectra_written: usize,
}

impl<W: Write> MzSpecLibWriter<W> {
    /// Create a writer and emit the library header
    pub fn new(mut handle: W, library_name: impl Into<String>) -> io::Result<Self> {
        let library_name = library_name.into();
        writeln!(handle, "{FORMAT_HEADER}")?;
        writeln!(handle, "MS:1003188|library name={library_name}")?;
        Ok(Self {
            handle,
            library_name,
            spectra_written: 0,
        })
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    pub fn spectra_written(&self) -> usize {
        self.spectra_written
    }

    fn write_header(&mut self, key: usize, spectrum: &AnnotatedSpectrum) -> io::Result<()> {
        let record = &spectrum.record;
        let precursor = &record.spectrum.precursor;
        let h = &mut self.handle;
        writeln!(h, "<Spectrum={key}>")?;
        writeln!(h, "MS:1003061|library spectrum name={}", record.title)?;
        writeln!(
            h,
            "MS:1003208|experimental precursor monoisotopic m/z={}",
            precursor.mz
        )?;
        if precursor.has_retention_time() {
            writeln!(h, "MS:1000894|retention time={:.4}", precursor.retention_time)?;
        }
        writeln!(h, "MS:1003059|number of peaks={}", record.spectrum.len())?;
        writeln!(h, "<Analyte=1>")?;
        writeln!(
            h,
            "MS:1000888|stripped peptide sequence={}",
            spectrum.peptide.sequence()
        )?;
        writeln!(h, "[1]MS:1003275|other attribute name=SEQ")?;
        writeln!(
            h,
            "[1]MS:1003276|other attribute value={}",
            record.modified_sequence.as_deref().unwrap_or_default()
        )?;
        writeln!(h, "[2]MS:1003275|other attribute name=Modified Peptide")?;
        writeln!(
            h,
            "[2]MS:1003276|other attribute value={}",
            spectrum.peptide.bracketed_sequence()
        )?;
        writeln!(h, "MS:1000041|charge state={}", spectrum.charge())?;
        Ok(())
    }

    /// Write `spectrum` as library entry `key`
    pub fn write(&mut self, key: usize, spectrum: &AnnotatedSpectrum) -> io::Result<()> {
        self.write_header(key, spectrum)?;
        let h = &mut self.handle;
        writeln!(h, "<Interpretation=1>")?;
        writeln!(
            h,
            "MS:1001121|number of matched peaks={}",
            spectrum.peaks.matched()
        )?;
        writeln!(
            h,
            "MS:1001362|number of unmatched peaks={}",
            spectrum.peaks.unmatched()
        )?;
        writeln!(h, "<Peaks>")?;
        for line in spectrum.peaks.iter() {
            writeln!(h, "{line}")?;
        }
        writeln!(h)?;
        self.spectra_written += 1;
        Ok(())
    }

    /// Flush the library and release the underlying handle
    pub fn close(mut self) -> io::Result<W> {
        self.handle.flush()?;
        Ok(self.handle)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use psmannotate::{
        AnnotationParams, ModificationRegistry, Precursor, Spectrum, SpectrumAnnotator,
        SpectrumRecord,
    };

    use super::*;

    fn annotated() -> AnnotatedSpectrum {
        let annotator = SpectrumAnnotator::new(
            AnnotationParams::default(),
            Arc::new(ModificationRegistry::new()),
        );
        let spectrum = Spectrum::new(
            Precursor::new(468.741739, vec![2], 10.5, 2e4),
            vec![155.1268, 324.1554, 468.9, 700.0],
            vec![1000.0, 800.0, 5000.0, 20.0],
        )
        .unwrap();
        let record = SpectrumRecord::new(
            "small.2.2.2".to_string(),
            2,
            Some("PEPTIDEK+8.014".to_string()),
            spectrum,
        );
        annotator.annotate_record(record).unwrap()
    }

    #[test]
    fn test_write_library() {
        let mut writer = MzSpecLibWriter::new(Vec::new(), "small").unwrap();
        writer.write(2, &annotated()).unwrap();
        assert_eq!(writer.spectra_written(), 1);
        let text = String::from_utf8(writer.close().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "<mzSpecLib 1.0>");
        assert_eq!(lines[1], "MS:1003188|library name=small");
        assert_eq!(lines[2], "<Spectrum=2>");
        assert!(text.contains("MS:1003061|library spectrum name=small.2.2.2\n"));
        assert!(text.contains("MS:1000894|retention time=10.5000\n"));
        assert!(text.contains("MS:1003059|number of peaks=4\n"));
        assert!(text.contains("MS:1000888|stripped peptide sequence=PEPTIDEK\n"));
        assert!(text.contains("[1]MS:1003276|other attribute value=PEPTIDEK+8.014\n"));
        assert!(text.contains("[2]MS:1003276|other attribute value=PEPTIDEK[8.0140]\n"));
        assert!(text.contains("MS:1000041|charge state=2\n"));
        assert!(text.contains("MS:1001121|number of matched peaks=2\n"));
        assert!(text.contains("MS:1001362|number of unmatched peaks=2\n"));

        let peaks_at = lines.iter().position(|l| *l == "<Peaks>").unwrap();
        let peaks = &lines[peaks_at + 1..peaks_at + 5];
        assert!(peaks[0].starts_with("155.1268 1000 y1/"));
        assert!(peaks[1].starts_with("324.1554 800 b3/"));
        assert_eq!(peaks[2], "468.9 5000 ?");
        assert_eq!(peaks[3], "700 20 ?");
        assert!(text.ends_with("\n\n"));
    }
}
