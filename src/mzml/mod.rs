//! # mzML Reader Module
//!
//! Streaming access to mzML files, the XML-based community standard for mass
//! spectrometry data defined by HUPO-PSI. Only what quantitation needs is
//! extracted: MS level, scan start time and the m/z and intensity arrays.
//!
//! ## mzML Structure
//!
//! ```text
//! indexedmzML (optional wrapper)
//! └── mzML
//!     ├── cvList, fileDescription, softwareList ... (skipped)
//!     └── run
//!         └── spectrumList
//!             └── spectrum* (many)
//!                 ├── cvParam*
//!                 ├── scanList
//!                 ├── precursorList (for MS2+, ignored)
//!                 └── binaryDataArrayList
//!                     └── binaryDataArray*
//!                         ├── cvParam* (encoding info)
//!                         └── binary (base64 data)
//! ```

pub mod binary;
pub mod cv_params;
pub mod models;
pub mod streamer;

pub use binary::{BinaryDecoder, BinaryEncoding, CompressionType, DecodeError};
pub use cv_params::{normalize_retention_time, CvParam, TimeUnit, MS_CV_ACCESSIONS};
pub use models::{ArrayRole, RawBinaryArray, RawSpectrum};
pub use streamer::{MzMLStreamer, ParseError, RawSpectrumIterator};
