//! Single merge point for per-ion results
//!
//! ```text
//! ┌──────────────┐    bounded channel    ┌──────────────────┐
//! │ rayon worker │ ──────IonResult────▶  │ sink thread      │
//! │ rayon worker │ ──────IonResult────▶  │ BTreeMap by      │
//! │     ...      │                       │ (file, compound, │
//! └──────────────┘                       │  ion index)      │
//!                                        └──────────────────┘
//! ```
//!
//! Workers finish in any order; the map makes the merged output independent
//! of scheduling.

use std::collections::BTreeMap;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use log::warn;

use super::error::PipelineError;
use super::report::IonResult;

/// Ordering key of an ion result
pub type IonKey = (String, String, usize);

/// Results merged by the sink
pub type IonResults = BTreeMap<IonKey, IonResult>;

/// Default channel capacity
pub const DEFAULT_SINK_CAPACITY: usize = 1024;

/// Background collector of [`IonResult`] records
pub struct ResultSink {
    sender: Sender<IonResult>,
    handle: JoinHandle<IonResults>,
}

impl ResultSink {
    /// Start the collector thread
    ///
    /// Senders block while `capacity` records are waiting.
    pub fn new(capacity: usize) -> Result<Self, PipelineError> {
        let (sender, receiver) = bounded::<IonResult>(capacity.max(1));

        let handle = thread::Builder::new()
            .name("mzquant-sink".to_string())
            .spawn(move || {
                let mut results = IonResults::new();
                // ends when every sender is dropped
                for record in receiver {
                    let key = record.key();
                    if results.insert(key.clone(), record).is_some() {
                        warn!("Duplicate result for {:?}, keeping the latest", key);
                    }
                }
                results
            })
            .map_err(|e| PipelineError::Sink(format!("failed to spawn sink thread: {}", e)))?;

        Ok(Self { sender, handle })
    }

    /// A sender for one producer
    pub fn sender(&self) -> Sender<IonResult> {
        self.sender.clone()
    }

    /// Close the channel and return everything received
    ///
    /// Senders cloned with [`ResultSink::sender`] must be dropped first or
    /// this call waits for them.
    pub fn finish(self) -> Result<IonResults, PipelineError> {
        drop(self.sender);
        self.handle
            .join()
            .map_err(|_| PipelineError::Sink("sink thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peaks::IntegrationMethod;
    use rayon::prelude::*;

    fn record(file: &str, compound: &str, ion_index: usize, area: f64) -> IonResult {
        IonResult {
            file: file.to_string(),
            compound: compound.to_string(),
            ion_index,
            mz: 100.0,
            label: None,
            apex_time: 1.0,
            start_time: 0.5,
            end_time: 1.5,
            left: 0,
            right: 2,
            raw_area: area,
            corrected_area: area,
            snr: 10.0,
            quality_score: 0.9,
            method: IntegrationMethod::Trapezoidal,
            intensity_sum: area,
        }
    }

    #[test]
    fn test_merge_is_order_independent() {
        let sink = ResultSink::new(4).unwrap();
        (0..100usize).into_par_iter().for_each_with(sink.sender(), |tx, i| {
            let file = if i % 2 == 0 { "b.mzML" } else { "a.mzML" };
            tx.send(record(file, "x", i, i as f64)).unwrap();
        });

        let results = sink.finish().unwrap();
        assert_eq!(results.len(), 100);
        let keys: Vec<&IonKey> = results.keys().collect();
        assert_eq!(keys[0], &("a.mzML".to_string(), "x".to_string(), 1));
        assert_eq!(keys[50], &("b.mzML".to_string(), "x".to_string(), 0));
    }

    #[test]
    fn test_duplicate_keeps_latest() {
        let sink = ResultSink::new(1).unwrap();
        let tx = sink.sender();
        tx.send(record("a", "x", 0, 1.0)).unwrap();
        tx.send(record("a", "x", 0, 2.0)).unwrap();
        drop(tx);
        let results = sink.finish().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.values().next().unwrap().raw_area, 2.0);
    }
}
