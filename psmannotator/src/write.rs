use std::io::{self, Write};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use itertools::Itertools;
use tracing::{debug, error, info};

use crate::mzspeclib::MzSpecLibWriter;
use crate::pdv::PDVWriter;
use crate::types::{OutcomeCollator, SpectrumOutcome};

/// Move everything already queued on `receiver` into `collator`, returning
/// whether the channel has been closed.
fn drain_channel(
    collator: &mut OutcomeCollator,
    receiver: &Receiver<(usize, SpectrumOutcome)>,
    batch_size: usize,
) -> bool {
    for _ in 0..batch_size {
        match receiver.try_recv() {
            Ok((idx, outcome)) => collator.receive(idx, outcome),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                collator.done = true;
                break;
            }
        }
    }
    collator.done
}

/// Restore input order to the outcomes arriving out of order from the worker
/// pool before forwarding them to the writer.
pub(crate) fn collate_results(
    receiver: Receiver<(usize, SpectrumOutcome)>,
    sender: Sender<(usize, SpectrumOutcome)>,
) {
    let mut collator = OutcomeCollator::default();
    let mut has_work = true;
    while has_work {
        match receiver.recv() {
            Ok((idx, outcome)) => {
                collator.receive(idx, outcome);
                drain_channel(&mut collator, &receiver, 1000);
            }
            Err(_) => {
                collator.done = true;
            }
        }

        while let Some((idx, outcome)) = collator.try_next() {
            if let Err(e) = sender.send((idx, outcome)) {
                error!("Failed to send {idx} for writing: {e}");
                has_work = false;
                break;
            }
        }

        if collator.done {
            let n = collator.waiting.len();
            if n > 0 {
                debug!("Draining output queue, {n} items");
                let waiting_items = std::mem::take(&mut collator.waiting)
                    .into_iter()
                    .sorted_by(|(i, _), (j, _)| i.cmp(j));
                for (idx, outcome) in waiting_items {
                    if let Err(e) = sender.send((idx, outcome)) {
                        error!("Failed to send {idx} for writing: {e}");
                        break;
                    }
                }
            }
            debug!("Setting collator loop condition to false");
            has_work = false;
        }
    }
    debug!("Spectrum collator done");
}

/// Write each annotated spectrum in the order received, keyed by its 1-based
/// position in the input file. Returns the number of library entries written.
pub(crate) fn write_output<W: Write, M: Write, T: Write>(
    mut library: MzSpecLibWriter<W>,
    mut pdv: Option<PDVWriter<M, T>>,
    receiver: Receiver<(usize, SpectrumOutcome)>,
) -> io::Result<usize> {
    let started = Instant::now();
    let mut checkpoint = Instant::now();
    let mut last_idx = 0;
    while let Ok((idx, outcome)) = receiver.recv() {
        last_idx = idx;
        let annotated = match outcome {
            SpectrumOutcome::Annotated(annotated) => annotated,
            SpectrumOutcome::Failed => continue,
        };
        let key = idx + 1;
        library.write(key, &annotated)?;
        if let Some(pdv) = pdv.as_mut() {
            pdv.write(key, &annotated)?;
        }
        if (Instant::now() - checkpoint).as_secs_f64() > 10.0 {
            let queue_size = receiver.len();
            info!(
                "Completed Spectrum {key} | Written={} | {queue_size} items in the write queue",
                library.spectra_written()
            );
            checkpoint = Instant::now();
        }
    }
    let written = library.spectra_written();
    debug!(
        "Finished writing {} after spectrum {} in {:0.3?}",
        library.library_name(),
        last_idx + 1,
        Instant::now() - started
    );
    library.close()?;
    if let Some(pdv) = pdv {
        pdv.close()?;
    }
    Ok(written)
}
