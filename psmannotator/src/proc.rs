use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use mzdata::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use psmannotate::SpectrumAnnotator;

use crate::progress::ProgressRecord;
use crate::reader::spectrum_record;
use crate::types::{SpectrumOutcome, SpectrumType};

/// Annotate a single spectrum, never failing: errors are logged and reported as
/// [`SpectrumOutcome::Failed`].
pub(crate) fn annotate_spectrum(
    annotator: &SpectrumAnnotator,
    spectrum_idx: usize,
    mut spectrum: SpectrumType,
) -> (usize, SpectrumOutcome, ProgressRecord) {
    let span = tracing::debug_span!("annotating", spectrum_idx, scan_id = spectrum.id());
    let _entered = span.enter();
    let mut prog = ProgressRecord {
        spectra_read: 1,
        ..Default::default()
    };

    let record = match spectrum_record(&mut spectrum) {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping spectrum {spectrum_idx}: {e}");
            prog.spectra_failed += 1;
            return (spectrum_idx, SpectrumOutcome::Failed, prog);
        }
    };

    let title = record.title.clone();
    let scan = record.scan;
    match annotator.annotate_record(record) {
        Ok(annotated) => {
            prog.spectra_annotated += 1;
            prog.matched_peaks += annotated.peaks.matched();
            prog.unmatched_peaks += annotated.peaks.unmatched();
            if annotated.has_no_match() {
                prog.spectra_without_matches += 1;
            }
            (
                spectrum_idx,
                SpectrumOutcome::Annotated(Box::new(annotated)),
                prog,
            )
        }
        Err(e) => {
            warn!("Failed to annotate {title} (scan {scan}): {e}");
            prog.spectra_failed += 1;
            (spectrum_idx, SpectrumOutcome::Failed, prog)
        }
    }
}

/// Annotate every spectrum from `reader` on the current rayon pool, sending each
/// outcome tagged with its position in the input to `sender`.
pub fn prepare_processing<R: Iterator<Item = SpectrumType> + Send>(
    reader: R,
    annotator: &SpectrumAnnotator,
    sender: Sender<(usize, SpectrumOutcome)>,
) -> io::Result<ProgressRecord> {
    let init_counter = AtomicU32::new(0);
    let started = Instant::now();

    let prog: ProgressRecord = reader
        .enumerate()
        .par_bridge()
        .map_init(
            || {
                init_counter.fetch_add(1, Ordering::AcqRel);
            },
            |_, (spectrum_idx, spectrum)| annotate_spectrum(annotator, spectrum_idx, spectrum),
        )
        .map(|(spectrum_idx, outcome, prog)| {
            if tracing::event_enabled!(tracing::Level::TRACE) {
                let tid = thread::current().id();
                trace!("{tid:?}: Sending spectrum {spectrum_idx}");
            }
            if let Err(e) = sender.send((spectrum_idx, outcome)) {
                warn!("Failed to send spectrum: {}", e);
            }
            prog
        })
        .sum();

    let elapsed = Instant::now() - started;
    debug!(
        "{} threads run for annotation",
        init_counter.load(Ordering::SeqCst)
    );
    info!("Elapsed Time: {:0.3?}", elapsed);
    Ok(prog)
}
