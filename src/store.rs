//! Scan Store: lazy, single-pass access to the scans of one mzML file
//!
//! [`ScanStore::open`] returns a [`ScanIterator`] that parses one spectrum at a
//! time, filters it by MS level and decodes it into a [`Scan`]. A spectrum whose
//! arrays fail to decode is logged and skipped; structural failures end the
//! iteration with a [`ParseError`].
//!
//! [`ScanStore::load`] is the batch form used by the pipeline: raw spectra are
//! gathered in batches and decoded in parallel with rayon before the next batch
//! is read.
//!
//! # Example
//!
//! ```rust,no_run
//! use mzquant::store::{ScanStore, ScanStoreOptions};
//!
//! let mut scans = ScanStore::open("sample.mzML", ScanStoreOptions::default())?;
//! for scan in scans.by_ref() {
//!     let scan = scan?;
//!     println!("{} @ {:.3} min, {} points", scan.native_id(), scan.retention_time(), scan.len());
//! }
//! println!("skipped {} undecodable spectra", scans.skipped());
//! # Ok::<(), mzquant::mzml::ParseError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::mzml::streamer::DEFAULT_INPUT_BUFFER_SIZE;
use crate::mzml::{DecodeError, MzMLStreamer, ParseError, RawSpectrum};
use crate::scan::Scan;

/// Shared flag used to stop long-running reads from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once [`CancellationToken::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options controlling which scans are produced
#[derive(Debug, Clone)]
pub struct ScanStoreOptions {
    /// Keep only scans of this MS level (`None` keeps all)
    pub ms_level: Option<u8>,
    /// Checked between scans
    pub cancel: CancellationToken,
    /// Input buffer size in bytes
    pub buffer_size: usize,
    /// Number of raw spectra decoded together by [`ScanStore::load`]
    pub batch_size: usize,
}

impl Default for ScanStoreOptions {
    fn default() -> Self {
        Self {
            ms_level: Some(1),
            cancel: CancellationToken::new(),
            buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            batch_size: 256,
        }
    }
}

/// All scans of one file, in file order
#[derive(Debug, Clone, Default)]
pub struct ScanCollection {
    /// Decoded scans
    pub scans: Vec<Scan>,
    /// Spectra skipped because their arrays could not be decoded
    pub skipped: usize,
    /// Spectra dropped by the MS level filter
    pub filtered: usize,
}

/// Entry point for reading scans from mzML files
pub struct ScanStore;

impl ScanStore {
    /// Open an mzML file as a lazy scan iterator
    pub fn open<P: AsRef<Path>>(
        path: P,
        options: ScanStoreOptions,
    ) -> Result<ScanIterator<BufReader<File>>, ParseError> {
        let streamer = MzMLStreamer::open_with_buffer_size(path, options.buffer_size)?;
        Ok(ScanIterator::new(streamer, options))
    }

    /// Read every scan of a file, decoding batches of spectra in parallel
    pub fn load<P: AsRef<Path>>(
        path: P,
        options: ScanStoreOptions,
    ) -> Result<ScanCollection, ParseError> {
        let streamer = MzMLStreamer::open_with_buffer_size(path.as_ref(), options.buffer_size)?;
        Self::load_from(streamer, &options)
    }

    /// Batch-decode every scan from an already constructed streamer
    pub fn load_from<R: BufRead>(
        mut streamer: MzMLStreamer<R>,
        options: &ScanStoreOptions,
    ) -> Result<ScanCollection, ParseError> {
        let batch_size = options.batch_size.max(1);
        let mut collection = ScanCollection::default();
        let mut raw_batch: Vec<RawSpectrum> = Vec::with_capacity(batch_size);

        loop {
            if options.cancel.is_cancelled() {
                return Err(ParseError::Cancelled);
            }
            let raw = streamer.next_raw_spectrum()?;
            let exhausted = raw.is_none();

            if let Some(raw) = raw {
                if accepts(options.ms_level, &raw) {
                    raw_batch.push(raw);
                } else {
                    collection.filtered += 1;
                }
            }

            if raw_batch.len() >= batch_size || (exhausted && !raw_batch.is_empty()) {
                let decoded: Vec<(usize, String, Result<Scan, DecodeError>)> = raw_batch
                    .par_drain(..)
                    .map(|raw| (raw.index, raw.id.clone(), raw.decode()))
                    .collect();
                for (index, id, result) in decoded {
                    match result {
                        Ok(scan) => collection.scans.push(scan),
                        Err(e) => {
                            warn!("Skipping spectrum {} ({}): {}", index, id, e);
                            collection.skipped += 1;
                        }
                    }
                }
                debug!("Decoded {} scans so far", collection.scans.len());
            }

            if exhausted {
                break;
            }
        }

        info!(
            "Loaded {} scans ({} skipped, {} filtered by MS level)",
            collection.scans.len(),
            collection.skipped,
            collection.filtered
        );
        Ok(collection)
    }
}

fn accepts(ms_level: Option<u8>, raw: &RawSpectrum) -> bool {
    ms_level.map_or(true, |level| raw.ms_level == level)
}

/// Finite, single-pass iterator over decoded scans
///
/// Restartable only by reopening the file. After a [`ParseError`] (including
/// [`ParseError::Cancelled`]) the iterator is exhausted.
pub struct ScanIterator<R: BufRead> {
    streamer: MzMLStreamer<R>,
    options: ScanStoreOptions,
    skipped: usize,
    done: bool,
}

impl<R: BufRead> ScanIterator<R> {
    /// Wrap a streamer; useful for in-memory documents
    pub fn new(streamer: MzMLStreamer<R>, options: ScanStoreOptions) -> Self {
        Self {
            streamer,
            options,
            skipped: 0,
            done: false,
        }
    }

    /// Number of spectra skipped so far because their arrays failed to decode
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for ScanIterator<R> {
    type Item = Result<Scan, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.options.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(ParseError::Cancelled));
            }

            let raw = match self.streamer.next_raw_spectrum() {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if !accepts(self.options.ms_level, &raw) {
                continue;
            }

            let (index, id) = (raw.index, raw.id.clone());
            match raw.decode() {
                Ok(scan) => return Some(Ok(scan)),
                Err(e) => {
                    warn!("Skipping spectrum {} ({}): {}", index, id, e);
                    self.skipped += 1;
                }
            }
        }
        None
    }
}

impl<R: BufRead> std::iter::FusedIterator for ScanIterator<R> {}
