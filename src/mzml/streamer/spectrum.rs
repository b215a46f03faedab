use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};

use super::helpers::{get_attribute, parse_cv_param};
use super::{MzMLStreamer, ParseError};
use crate::mzml::binary::{BinaryEncoding, CompressionType};
use crate::mzml::cv_params::{normalize_retention_time, CvParam, MS_CV_ACCESSIONS};
use crate::mzml::models::{ArrayRole, RawBinaryArray, RawSpectrum};

impl<R: BufRead> MzMLStreamer<R> {
    /// Read the next spectrum from the stream WITHOUT decoding binary data
    ///
    /// Parses the XML and extracts the metadata quantitation needs, deferring
    /// Base64 decoding and decompression to [`RawSpectrum::decode`].
    /// Returns `Ok(None)` once `</spectrumList>` has been consumed.
    pub fn next_raw_spectrum(&mut self) -> Result<Option<RawSpectrum>, ParseError> {
        if self.finished {
            return Ok(None);
        }
        if !self.in_spectrum_list {
            self.seek_spectrum_list()?;
            if self.finished {
                return Ok(None);
            }
        }

        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ref e) if e.name().as_ref() == b"spectrum" => {
                    let spectrum = self.parse_raw_spectrum(e)?;
                    self.current_spectrum_index += 1;
                    return Ok(Some(spectrum));
                }
                Event::Empty(ref e) if e.name().as_ref() == b"spectrum" => {
                    let spectrum = self.spectrum_header(e)?;
                    self.current_spectrum_index += 1;
                    return Ok(Some(spectrum));
                }
                Event::End(ref e) if e.name().as_ref() == b"spectrumList" => {
                    self.in_spectrum_list = false;
                    self.finished = true;
                    return Ok(None);
                }
                Event::Eof => {
                    self.finished = true;
                    return Err(ParseError::InvalidStructure(
                        "Unexpected EOF in spectrumList".to_string(),
                    ));
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Build a raw spectrum from the attributes of a `<spectrum>` tag
    fn spectrum_header(&self, start_event: &BytesStart) -> Result<RawSpectrum, ParseError> {
        let index = get_attribute(start_event, "index")?
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.current_spectrum_index);
        let id = get_attribute(start_event, "id")?.unwrap_or_default();
        let default_array_length = get_attribute(start_event, "defaultArrayLength")?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        Ok(RawSpectrum::new(index, id, default_array_length))
    }

    /// Parse a single spectrum element WITHOUT decoding binary data
    fn parse_raw_spectrum(&mut self, start_event: &BytesStart) -> Result<RawSpectrum, ParseError> {
        let mut spectrum = self.spectrum_header(start_event)?;

        let mut depth = 1;
        let mut in_scan_list = false;
        let mut in_precursor_list = false;
        let mut in_binary_data_array = false;
        let mut in_binary = false;

        let mut current_binary_cv_params: Vec<CvParam> = Vec::new();
        let mut current_binary_data = String::new();
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    match e.name().as_ref() {
                        b"cvParam" => {
                            let cv_param = parse_cv_param(e)?;
                            Self::route_cv_param(
                                &mut spectrum,
                                &mut current_binary_cv_params,
                                cv_param,
                                in_binary_data_array,
                                in_precursor_list,
                                in_scan_list,
                            );
                        }
                        b"scanList" => in_scan_list = true,
                        b"precursorList" | b"productList" => in_precursor_list = true,
                        b"binaryDataArray" => {
                            in_binary_data_array = true;
                            current_binary_cv_params.clear();
                            current_binary_data.clear();
                        }
                        b"binary" => in_binary = true,
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"cvParam" {
                        let cv_param = parse_cv_param(e)?;
                        Self::route_cv_param(
                            &mut spectrum,
                            &mut current_binary_cv_params,
                            cv_param,
                            in_binary_data_array,
                            in_precursor_list,
                            in_scan_list,
                        );
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if in_binary {
                        // Base64 may be split over several lines
                        current_binary_data.push_str(&t.unescape()?);
                    }
                }
                Ok(Event::End(ref e)) => {
                    depth -= 1;
                    match e.name().as_ref() {
                        b"spectrum" if depth == 0 => break,
                        b"scanList" => in_scan_list = false,
                        b"precursorList" | b"productList" => in_precursor_list = false,
                        b"binary" => in_binary = false,
                        b"binaryDataArray" => {
                            in_binary_data_array = false;
                            spectrum.set_array(Self::raw_binary_array(
                                &current_binary_cv_params,
                                &mut current_binary_data,
                            ));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Err(ParseError::InvalidStructure(format!(
                        "Unexpected EOF in spectrum {}",
                        spectrum.id
                    )));
                }
                Err(e) => return Err(ParseError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(spectrum)
    }

    /// Dispatch a cvParam to the binary array, scan or spectrum it belongs to
    fn route_cv_param(
        spectrum: &mut RawSpectrum,
        binary_cv_params: &mut Vec<CvParam>,
        cv: CvParam,
        in_binary_data_array: bool,
        in_precursor_list: bool,
        in_scan_list: bool,
    ) {
        if in_binary_data_array {
            binary_cv_params.push(cv);
        } else if in_precursor_list {
            // isolation window and activation terms describe the precursor
        } else if in_scan_list {
            Self::apply_scan_cv_param(spectrum, &cv);
        } else {
            Self::apply_spectrum_cv_param(spectrum, &cv);
        }
    }

    /// Apply CV param to raw spectrum properties
    fn apply_spectrum_cv_param(spectrum: &mut RawSpectrum, cv: &CvParam) {
        match cv.accession.as_str() {
            MS_CV_ACCESSIONS::MS_LEVEL => {
                spectrum.ms_level = cv.parsed::<u8>().unwrap_or(1);
            }
            // some writers put the start time on the spectrum itself
            MS_CV_ACCESSIONS::SCAN_START_TIME => Self::apply_scan_cv_param(spectrum, cv),
            _ => {}
        }
    }

    /// Apply CV param to raw scan properties
    fn apply_scan_cv_param(spectrum: &mut RawSpectrum, cv: &CvParam) {
        if cv.accession == MS_CV_ACCESSIONS::SCAN_START_TIME {
            if let Some(val) = cv.value_as_f64() {
                spectrum.retention_time =
                    Some(normalize_retention_time(val, cv.time_unit()));
            }
        }
    }

    /// Build a raw binary array without decoding it
    fn raw_binary_array(cv_params: &[CvParam], base64_data: &mut String) -> RawBinaryArray {
        let mut encoding = BinaryEncoding::Float64;
        let mut compression = CompressionType::None;
        let mut role = ArrayRole::Other;

        for cv in cv_params {
            if let Some(found) = BinaryEncoding::from_cv_accession(&cv.accession) {
                encoding = found;
            } else if let Some(found) = CompressionType::from_cv_accession(&cv.accession) {
                compression = found;
            } else {
                match cv.accession.as_str() {
                    MS_CV_ACCESSIONS::MZ_ARRAY => role = ArrayRole::Mz,
                    MS_CV_ACCESSIONS::INTENSITY_ARRAY => role = ArrayRole::Intensity,
                    _ => {}
                }
            }
        }

        RawBinaryArray {
            base64: std::mem::take(base64_data),
            encoding,
            compression,
            role,
        }
    }
}
