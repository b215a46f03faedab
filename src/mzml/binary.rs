//! `<binary>` payload decoding
//!
//! A payload goes through three stages: Base64 text to bytes, optional zlib
//! inflation, then little-endian floats widened to `f64`. Decoding is a pure
//! function of the payload and its declared precision and compression; array
//! roles and length reconciliation belong to [`crate::scan`].

use std::borrow::Cow;
use std::io::Read;

use base64::prelude::*;
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use log::debug;

use super::cv_params::MS_CV_ACCESSIONS;

/// Compression declared on a binary data array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    #[default]
    None,
    Zlib,
    NumpressLinear,
    NumpressPic,
    NumpressSlof,
}

impl CompressionType {
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        let found = match accession {
            MS_CV_ACCESSIONS::NO_COMPRESSION => Self::None,
            MS_CV_ACCESSIONS::ZLIB_COMPRESSION => Self::Zlib,
            MS_CV_ACCESSIONS::NUMPRESS_LINEAR => Self::NumpressLinear,
            MS_CV_ACCESSIONS::NUMPRESS_PIC => Self::NumpressPic,
            MS_CV_ACCESSIONS::NUMPRESS_SLOF => Self::NumpressSlof,
            _ => return None,
        };
        Some(found)
    }

    fn is_numpress(self) -> bool {
        matches!(
            self,
            Self::NumpressLinear | Self::NumpressPic | Self::NumpressSlof
        )
    }
}

/// Declared float precision. Arrays without one are read as 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryEncoding {
    Float32,
    #[default]
    Float64,
}

impl BinaryEncoding {
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        match accession {
            MS_CV_ACCESSIONS::FLOAT_32_BIT => Some(Self::Float32),
            MS_CV_ACCESSIONS::FLOAT_64_BIT => Some(Self::Float64),
            _ => None,
        }
    }

    /// Width of one value in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// Failure to turn one binary data array into numbers
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Decompression error: {0}")]
    Decompression(#[from] std::io::Error),

    /// Byte count is not a whole number of values
    #[error("Invalid data length: {bytes} bytes is not a multiple of {width}-byte values")]
    InvalidLength { bytes: usize, width: usize },

    #[error("Unsupported compression: {0:?}")]
    UnsupportedCompression(CompressionType),
}

/// Stateless decoder for `<binary>` payloads
pub struct BinaryDecoder;

impl BinaryDecoder {
    /// Decode the Base64 text of a `<binary>` element.
    ///
    /// Blank text is an empty array. `expected_length` is the spectrum's
    /// `defaultArrayLength`; a mismatch is only logged at debug level, the
    /// caller decides how to reconcile arrays.
    pub fn decode(
        base64_data: &str,
        encoding: BinaryEncoding,
        compression: CompressionType,
        expected_length: Option<usize>,
    ) -> Result<Vec<f64>, DecodeError> {
        let text = base64_data.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let values = Self::decode_bytes(&BASE64_STANDARD.decode(text)?, encoding, compression)?;
        match expected_length {
            Some(expected) if expected != values.len() => debug!(
                "defaultArrayLength is {} but the payload holds {} values",
                expected,
                values.len()
            ),
            _ => {}
        }
        Ok(values)
    }

    /// Decode bytes that are already Base64-decoded
    pub fn decode_bytes(
        bytes: &[u8],
        encoding: BinaryEncoding,
        compression: CompressionType,
    ) -> Result<Vec<f64>, DecodeError> {
        if compression.is_numpress() {
            return Err(DecodeError::UnsupportedCompression(compression));
        }
        let plain: Cow<'_, [u8]> = match compression {
            CompressionType::Zlib => Cow::Owned(inflate(bytes)?),
            _ => Cow::Borrowed(bytes),
        };
        widen(&plain, encoding)
    }
}

fn inflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    ZlibDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Reinterpret little-endian bytes as floats and widen them to `f64`
fn widen(bytes: &[u8], encoding: BinaryEncoding) -> Result<Vec<f64>, DecodeError> {
    let width = encoding.byte_size();
    if bytes.len() % width != 0 {
        return Err(DecodeError::InvalidLength {
            bytes: bytes.len(),
            width,
        });
    }

    let count = bytes.len() / width;
    Ok(match encoding {
        BinaryEncoding::Float64 => {
            let mut values = vec![0.0f64; count];
            LittleEndian::read_f64_into(bytes, &mut values);
            values
        }
        BinaryEncoding::Float32 => {
            let mut narrow = vec![0.0f32; count];
            LittleEndian::read_f32_into(bytes, &mut narrow);
            narrow.into_iter().map(f64::from).collect()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn payload(bytes: &[u8], compression: CompressionType) -> String {
        let bytes = if compression == CompressionType::Zlib {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).unwrap();
            encoder.finish().unwrap()
        } else {
            bytes.to_vec()
        };
        BASE64_STANDARD.encode(bytes)
    }

    fn f64_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_plain_and_zlib_f64() {
        let values = [147.1128, 130.0863, 0.0, 1e9];
        for compression in [CompressionType::None, CompressionType::Zlib] {
            let decoded = BinaryDecoder::decode(
                &payload(&f64_bytes(&values), compression),
                BinaryEncoding::Float64,
                compression,
                Some(values.len()),
            )
            .unwrap();
            assert_eq!(decoded, values);
        }
    }

    #[test]
    fn test_f32_widened_exactly() {
        let narrow = [0.25f32, 1500.5, 3.0e7];
        let bytes: Vec<u8> = narrow.iter().flat_map(|v| v.to_le_bytes()).collect();
        let decoded = BinaryDecoder::decode(
            &payload(&bytes, CompressionType::Zlib),
            BinaryEncoding::Float32,
            CompressionType::Zlib,
            None,
        )
        .unwrap();
        assert_eq!(decoded, vec![0.25, 1500.5, 3.0e7]);
    }

    #[test]
    fn test_blank_payload_is_empty() {
        let decoded =
            BinaryDecoder::decode(" \n\t", BinaryEncoding::Float32, CompressionType::Zlib, None)
                .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_length_mismatch_still_decodes() {
        let decoded = BinaryDecoder::decode(
            &payload(&f64_bytes(&[1.0, 2.0]), CompressionType::None),
            BinaryEncoding::Float64,
            CompressionType::None,
            Some(5),
        )
        .unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_malformed_payloads() {
        let err = BinaryDecoder::decode(
            "%%%not base64",
            BinaryEncoding::Float64,
            CompressionType::None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));

        // valid Base64, not a zlib stream
        let err = BinaryDecoder::decode(
            &BASE64_STANDARD.encode([9u8, 8, 7, 6, 5]),
            BinaryEncoding::Float64,
            CompressionType::Zlib,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Decompression(_)));
    }

    #[test]
    fn test_width_checked_after_inflation() {
        // 12 bytes: three f32 values but one and a half f64 values
        let text = payload(&[0u8; 12], CompressionType::Zlib);
        let err = BinaryDecoder::decode(&text, BinaryEncoding::Float64, CompressionType::Zlib, None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLength { bytes: 12, width: 8 }));

        let ok = BinaryDecoder::decode(&text, BinaryEncoding::Float32, CompressionType::Zlib, None)
            .unwrap();
        assert_eq!(ok, vec![0.0; 3]);
    }

    #[test]
    fn test_numpress_rejected() {
        for compression in [
            CompressionType::NumpressLinear,
            CompressionType::NumpressPic,
            CompressionType::NumpressSlof,
        ] {
            let err = BinaryDecoder::decode_bytes(&[0u8; 8], BinaryEncoding::Float64, compression)
                .unwrap_err();
            assert!(matches!(err, DecodeError::UnsupportedCompression(c) if c == compression));
        }
    }

    #[test]
    fn test_accession_mapping() {
        assert_eq!(
            BinaryEncoding::from_cv_accession(MS_CV_ACCESSIONS::FLOAT_32_BIT),
            Some(BinaryEncoding::Float32)
        );
        assert_eq!(
            CompressionType::from_cv_accession(MS_CV_ACCESSIONS::NO_COMPRESSION),
            Some(CompressionType::None)
        );
        assert_eq!(
            CompressionType::from_cv_accession(MS_CV_ACCESSIONS::NUMPRESS_SLOF),
            Some(CompressionType::NumpressSlof)
        );
        // an array role is neither
        assert_eq!(BinaryEncoding::from_cv_accession(MS_CV_ACCESSIONS::MZ_ARRAY), None);
        assert_eq!(CompressionType::from_cv_accession(MS_CV_ACCESSIONS::MZ_ARRAY), None);
    }
}
