//! Streaming mzML parser using quick-xml
//!
//! This module provides a pull-based streaming parser for mzML files. Only the
//! spectrum being parsed is held in memory, and its binary arrays are kept as
//! Base64 text until the caller decodes them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

pub use error::ParseError;
pub use iterators::RawSpectrumIterator;

use helpers::get_attribute;

mod error;
mod helpers;
mod iterators;
mod spectrum;

#[cfg(test)]
mod tests;

/// Default input buffer size for mzML parsing (64KB)
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming parser for mzML files
pub struct MzMLStreamer<R: BufRead> {
    reader: Reader<R>,
    in_spectrum_list: bool,
    finished: bool,
    run_id: Option<String>,
    spectrum_count: Option<usize>,
    current_spectrum_index: usize,
}

impl MzMLStreamer<BufReader<File>> {
    /// Open an mzML file for streaming with the default buffer size
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        Self::open_with_buffer_size(path, DEFAULT_INPUT_BUFFER_SIZE)
    }

    /// Open an mzML file for streaming with a custom buffer size
    pub fn open_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> Result<Self, ParseError> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::with_capacity(buffer_size, file);
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> MzMLStreamer<R> {
    /// Create a new streamer from a BufRead source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);

        Self {
            reader: xml_reader,
            in_spectrum_list: false,
            finished: false,
            run_id: None,
            spectrum_count: None,
            current_spectrum_index: 0,
        }
    }

    /// Run identifier, known once the spectrum list has been reached
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Spectrum count declared on `<spectrumList>`, if any
    pub fn spectrum_count(&self) -> Option<usize> {
        self.spectrum_count
    }

    /// Iterate over all spectra as raw (undecoded) data
    pub fn raw_spectra(self) -> RawSpectrumIterator<R> {
        RawSpectrumIterator {
            streamer: self,
            failed: false,
        }
    }

    /// Skip the file header up to the opening `<spectrumList>` tag
    ///
    /// Everything before the spectrum list (cvList, fileDescription, the
    /// indexedmzML wrapper...) is irrelevant to quantitation and is skipped.
    pub(crate) fn seek_spectrum_list(&mut self) -> Result<(), ParseError> {
        let mut buf = Vec::new();
        let mut saw_element = false;
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    saw_element = true;
                    match e.name().as_ref() {
                        b"run" => {
                            self.run_id = get_attribute(e, "id")?;
                        }
                        b"spectrumList" => {
                            self.spectrum_count =
                                get_attribute(e, "count")?.and_then(|s| s.parse().ok());
                            self.in_spectrum_list = true;
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    saw_element = true;
                    if e.name().as_ref() == b"spectrumList" {
                        self.spectrum_count = Some(0);
                        self.finished = true;
                        return Ok(());
                    }
                }
                Event::Eof => {
                    let reason = if saw_element {
                        "no <spectrumList> element found"
                    } else {
                        "document contains no XML elements"
                    };
                    return Err(ParseError::InvalidStructure(reason.to_string()));
                }
                _ => {}
            }
            buf.clear();
        }
    }
}
