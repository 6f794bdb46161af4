// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Conversion engine.
//!
//! Runs a [`ConversionJob`]: validate, open inputs, open outputs, stream the
//! merged records through every output, then finalize each output.
//!
//! # Example
//!
//! ```rust,no_run
//! use robobag::io::filter::TopicSelector;
//! use robobag::io::options::StorageOptions;
//! use robobag::rewriter::{bag_rewrite, OutputTarget};
//!
//! let summary = bag_rewrite(
//!     vec![StorageOptions::new("in/a"), StorageOptions::new("in/b")],
//!     vec![
//!         OutputTarget::new(StorageOptions::new("out/a_empty"))
//!             .with_selector(TopicSelector::include(["a_empty"])),
//!         OutputTarget::new(StorageOptions::new("out/full"))
//!             .with_selector(TopicSelector::exclude(".*empty.*")),
//!     ],
//! )?;
//! println!("{} records read", summary.messages_read);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{info, warn};

use crate::io::filter::CompiledSelector;
use crate::io::metadata::Record;
use crate::io::options::StorageOptions;
use crate::{BagError, Result};

use super::job::{AbortHandle, ConversionJob, ConversionOptions, Execution, OutputTarget};
use super::merge::MergeReader;
use super::outputs::{JobSummary, OutputWriter};
use super::validate::validate;

/// How the record stream ended.
#[derive(Debug, Default)]
struct StreamOutcome {
    messages_read: u64,
    aborted: bool,
    input_error: Option<BagError>,
}

/// Convert with default options.
pub fn convert(job: &ConversionJob) -> Result<JobSummary> {
    convert_with(job, &ConversionOptions::default())
}

/// Merge `inputs` and write them to `outputs` with default options.
pub fn bag_rewrite(inputs: Vec<StorageOptions>, outputs: Vec<OutputTarget>) -> Result<JobSummary> {
    convert(&ConversionJob::new(inputs, outputs))
}

/// Run a conversion job.
///
/// Returns the job summary when every output was finalized (or skipped).
/// When some outputs failed, returns [`BagError::PartialFailure`] carrying
/// the summary. Validation and input errors abort the job; outputs opened
/// before an input error are still finalized.
pub fn convert_with(job: &ConversionJob, options: &ConversionOptions) -> Result<JobSummary> {
    let selectors = validate(job)?;

    info!(
        context = "convert",
        inputs = job.inputs.len(),
        outputs = job.outputs.len(),
        execution = ?options.execution,
        "Starting conversion"
    );

    let reader = MergeReader::open(&job.inputs, &options.registry)?;
    let catalog = Arc::clone(reader.catalog());

    let mut outputs: Vec<OutputWriter> = job
        .outputs
        .iter()
        .zip(selectors)
        .enumerate()
        .map(|(index, (target, selector))| {
            OutputWriter::new(
                index,
                target,
                selector,
                options.registry.clone(),
                Arc::clone(&catalog),
            )
        })
        .collect();

    if options.eager_outputs {
        for output in &mut outputs {
            // A failed open is recorded in the output's state.
            let _ = output.open();
        }
    }

    let outcome = match options.execution {
        Execution::Sequential => run_sequential(reader, &mut outputs, &options.abort),
        Execution::Threaded { queue_capacity } => {
            run_threaded(reader, &mut outputs, queue_capacity, &options.abort)
        }
    };

    let reports: Vec<_> = outputs.into_iter().map(OutputWriter::into_report).collect();

    if let Some(e) = outcome.input_error {
        warn!(
            context = "convert",
            error = %e,
            messages_read = outcome.messages_read,
            "Input failed, conversion aborted"
        );
        return Err(e);
    }

    let summary = JobSummary {
        outputs: reports,
        messages_read: outcome.messages_read,
        aborted: outcome.aborted,
    };

    info!(
        context = "convert",
        messages_read = summary.messages_read,
        failed = summary.failed_count(),
        aborted = summary.aborted,
        "Conversion finished"
    );

    if summary.is_success() {
        Ok(summary)
    } else {
        Err(BagError::partial_failure(summary))
    }
}

/// Route every record to every output on the calling thread.
fn run_sequential(
    mut reader: MergeReader,
    outputs: &mut [OutputWriter],
    abort: &AbortHandle,
) -> StreamOutcome {
    let mut outcome = StreamOutcome::default();
    loop {
        if abort.is_aborted() {
            outcome.aborted = true;
            break;
        }
        match reader.next() {
            Some(Ok(record)) => {
                outcome.messages_read += 1;
                for output in outputs.iter_mut() {
                    output.route(&record);
                }
            }
            Some(Err(e)) => {
                outcome.input_error = Some(e);
                break;
            }
            None => break,
        }
    }
    outcome
}

/// Feed each output on its own thread through a bounded queue.
///
/// The reader stays on the calling thread and only sends records an output
/// selects. An output that fails drops its queue; it is skipped from then on.
fn run_threaded(
    mut reader: MergeReader,
    outputs: &mut [OutputWriter],
    queue_capacity: usize,
    abort: &AbortHandle,
) -> StreamOutcome {
    let capacity = queue_capacity.max(1);

    thread::scope(|scope| {
        let mut routes: Vec<(CompiledSelector, Option<Sender<Arc<Record>>>)> =
            Vec::with_capacity(outputs.len());

        for output in outputs.iter_mut() {
            if !output.state().is_active() {
                routes.push((output.selector().clone(), None));
                continue;
            }
            let (tx, rx) = bounded::<Arc<Record>>(capacity);
            routes.push((output.selector().clone(), Some(tx)));
            scope.spawn(move || {
                for record in rx {
                    if !output.route(&record) {
                        break;
                    }
                }
            });
        }

        let mut outcome = StreamOutcome::default();
        loop {
            if abort.is_aborted() {
                outcome.aborted = true;
                break;
            }
            match reader.next() {
                Some(Ok(record)) => {
                    outcome.messages_read += 1;
                    let record = Arc::new(record);
                    for (selector, sender) in routes.iter_mut() {
                        let Some(tx) = sender else {
                            continue;
                        };
                        if !selector.matches(&record.topic) {
                            continue;
                        }
                        if tx.send(Arc::clone(&record)).is_err() {
                            *sender = None;
                        }
                    }
                }
                Some(Err(e)) => {
                    outcome.input_error = Some(e);
                    break;
                }
                None => break,
            }
        }

        // Closing the queues ends the workers.
        drop(routes);
        outcome
    })
}
