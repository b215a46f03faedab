//! Raw (undecoded) spectrum records produced by the streaming parser
//!
//! The parser only captures metadata and the Base64 text of each array. Decoding
//! is deferred to [`RawSpectrum::decode`], so the expensive part can run on any
//! thread and the text buffers are dropped as soon as the [`Scan`] exists.

use super::binary::{BinaryDecoder, BinaryEncoding, CompressionType, DecodeError};
use crate::scan::Scan;

/// Semantic role of a binary data array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayRole {
    /// m/z axis (MS:1000514)
    Mz,
    /// Intensity axis (MS:1000515)
    Intensity,
    /// Any other array (time, ion mobility, charge...), ignored downstream
    Other,
}

/// Raw binary data container for deferred decoding
#[derive(Debug, Clone)]
pub struct RawBinaryArray {
    /// Raw Base64-encoded string from the `<binary>` element
    pub base64: String,
    /// Binary encoding precision (Float32 or Float64)
    pub encoding: BinaryEncoding,
    /// Compression type (None, Zlib, etc.)
    pub compression: CompressionType,
    /// Declared role of the array
    pub role: ArrayRole,
}

impl RawBinaryArray {
    /// Decode this array into f64 values
    pub fn decode(&self, expected_length: Option<usize>) -> Result<Vec<f64>, DecodeError> {
        BinaryDecoder::decode(&self.base64, self.encoding, self.compression, expected_length)
    }
}

/// Raw spectrum data with deferred binary decoding
#[derive(Debug, Clone, Default)]
pub struct RawSpectrum {
    /// Spectrum index (0-based)
    pub index: usize,

    /// Native spectrum ID from the file
    pub id: String,

    /// Declared array length (number of peaks)
    pub default_array_length: usize,

    /// MS level, 1 when the spectrum does not declare one
    pub ms_level: u8,

    /// Scan start time in minutes, when declared
    pub retention_time: Option<f64>,

    /// m/z array payload
    pub mz_data: Option<RawBinaryArray>,

    /// Intensity array payload
    pub intensity_data: Option<RawBinaryArray>,
}

impl RawSpectrum {
    /// Create an empty raw spectrum with mzML defaults
    pub fn new(index: usize, id: String, default_array_length: usize) -> Self {
        Self {
            index,
            id,
            default_array_length,
            ms_level: 1,
            ..Default::default()
        }
    }

    /// Attach a decoded-later array according to its role
    pub fn set_array(&mut self, array: RawBinaryArray) {
        match array.role {
            ArrayRole::Mz => self.mz_data = Some(array),
            ArrayRole::Intensity => self.intensity_data = Some(array),
            ArrayRole::Other => {}
        }
    }

    /// Decode this raw spectrum into a [`Scan`]
    ///
    /// Consumes `self` so the Base64 buffers are released together with it.
    /// A spectrum missing either array yields an empty scan.
    pub fn decode(self) -> Result<Scan, DecodeError> {
        let expected = Some(self.default_array_length);
        let mz = match &self.mz_data {
            Some(data) => data.decode(expected)?,
            None => Vec::new(),
        };
        let intensity = match &self.intensity_data {
            Some(data) => data.decode(expected)?,
            None => Vec::new(),
        };

        Ok(Scan::from_arrays(
            self.index,
            self.id,
            self.retention_time.unwrap_or(0.0),
            self.ms_level,
            mz,
            intensity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::*;

    fn f64_array(values: &[f64], role: ArrayRole) -> RawBinaryArray {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        RawBinaryArray {
            base64: BASE64_STANDARD.encode(bytes),
            encoding: BinaryEncoding::Float64,
            compression: CompressionType::None,
            role,
        }
    }

    #[test]
    fn test_decode_into_scan() {
        let mut raw = RawSpectrum::new(4, "scan=5".to_string(), 3);
        raw.retention_time = Some(2.5);
        raw.set_array(f64_array(&[100.0, 200.0, 300.0], ArrayRole::Mz));
        raw.set_array(f64_array(&[1.0, 2.0], ArrayRole::Intensity));
        raw.set_array(f64_array(&[9.0], ArrayRole::Other));

        let scan = raw.decode().unwrap();
        assert_eq!(scan.index(), 4);
        assert_eq!(scan.native_id(), "scan=5");
        assert_eq!(scan.retention_time(), 2.5);
        assert_eq!(scan.ms_level(), 1);
        assert_eq!(scan.mz(), &[100.0, 200.0]);
        assert_eq!(scan.total_ion_current(), 3.0);
    }

    #[test]
    fn test_missing_array_gives_empty_scan() {
        let mut raw = RawSpectrum::new(0, "scan=1".to_string(), 2);
        raw.set_array(f64_array(&[100.0, 200.0], ArrayRole::Mz));
        let scan = raw.decode().unwrap();
        assert!(scan.is_empty());
        assert_eq!(scan.retention_time(), 0.0);
    }

    #[test]
    fn test_bad_payload_propagates() {
        let mut raw = RawSpectrum::new(0, "scan=1".to_string(), 2);
        raw.set_array(f64_array(&[100.0, 200.0], ArrayRole::Mz));
        raw.set_array(RawBinaryArray {
            base64: "@@@@".to_string(),
            encoding: BinaryEncoding::Float32,
            compression: CompressionType::None,
            role: ArrayRole::Intensity,
        });
        assert!(raw.decode().is_err());
    }
}
