//! PSI-MS and UO terms read off `<cvParam>` elements
//!
//! The scan reader only ever looks at a handful of accessions: the MS level,
//! the scan start time with its unit, and the precision, compression and role
//! of each binary array. Everything else in the document is skipped.

use std::str::FromStr;

/// One `<cvParam>` element, attributes copied verbatim
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvParam {
    pub accession: String,
    pub name: String,
    pub value: Option<String>,
    pub unit_accession: Option<String>,
}

impl CvParam {
    /// Parse the `value` attribute, ignoring surrounding whitespace
    pub fn parsed<T: FromStr>(&self) -> Option<T> {
        self.value.as_deref().and_then(|v| v.trim().parse().ok())
    }

    pub fn value_as_f64(&self) -> Option<f64> {
        self.parsed()
    }

    /// Unit of a time-valued parameter, `None` when absent or not a time unit
    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.unit_accession.as_deref().and_then(TimeUnit::from_accession)
    }
}

#[allow(non_snake_case)]
pub mod MS_CV_ACCESSIONS {
    pub const MS_LEVEL: &str = "MS:1000511";
    pub const SCAN_START_TIME: &str = "MS:1000016";

    // array precision
    pub const FLOAT_32_BIT: &str = "MS:1000521";
    pub const FLOAT_64_BIT: &str = "MS:1000523";

    // array compression; the numpress family is recognised only to be rejected
    pub const ZLIB_COMPRESSION: &str = "MS:1000574";
    pub const NO_COMPRESSION: &str = "MS:1000576";
    pub const NUMPRESS_LINEAR: &str = "MS:1002312";
    pub const NUMPRESS_PIC: &str = "MS:1002313";
    pub const NUMPRESS_SLOF: &str = "MS:1002314";

    // array role
    pub const MZ_ARRAY: &str = "MS:1000514";
    pub const INTENSITY_ARRAY: &str = "MS:1000515";

    // UO time units
    pub const UNIT_SECOND: &str = "UO:0000010";
    pub const UNIT_MINUTE: &str = "UO:0000031";
    pub const UNIT_MILLISECOND: &str = "UO:0000028";
}

/// Time units a scan start time may be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
}

impl TimeUnit {
    pub fn from_accession(accession: &str) -> Option<Self> {
        match accession {
            MS_CV_ACCESSIONS::UNIT_MILLISECOND => Some(TimeUnit::Millisecond),
            MS_CV_ACCESSIONS::UNIT_SECOND => Some(TimeUnit::Second),
            MS_CV_ACCESSIONS::UNIT_MINUTE => Some(TimeUnit::Minute),
            _ => None,
        }
    }

    /// How many of this unit make up one minute
    fn per_minute(self) -> f64 {
        match self {
            TimeUnit::Millisecond => 60_000.0,
            TimeUnit::Second => 60.0,
            TimeUnit::Minute => 1.0,
        }
    }
}

/// Express a scan start time in minutes.
///
/// Writers disagree on the unit. A missing or unrecognised unit (see
/// [`CvParam::time_unit`]) is taken to already be minutes.
pub fn normalize_retention_time(value: f64, unit: Option<TimeUnit>) -> f64 {
    match unit {
        Some(unit) => value / unit.per_minute(),
        None => value,
    }
}
