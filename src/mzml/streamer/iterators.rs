use std::io::BufRead;

use super::{MzMLStreamer, ParseError};
use crate::mzml::models::RawSpectrum;

/// Iterator over raw (undecoded) spectra in an mzML file
///
/// Each item is a [`RawSpectrum`] that can later be decoded with `.decode()`.
/// The iterator is fused after the first error.
pub struct RawSpectrumIterator<R: BufRead> {
    pub(super) streamer: MzMLStreamer<R>,
    pub(super) failed: bool,
}

impl<R: BufRead> Iterator for RawSpectrumIterator<R> {
    type Item = Result<RawSpectrum, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.streamer.next_raw_spectrum() {
            Ok(Some(spectrum)) => Some(Ok(spectrum)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for RawSpectrumIterator<R> {}
