/// Whole-file errors raised while pulling spectra out of an mzML document
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Error parsing XML
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid mzML document structure
    #[error("Invalid mzML structure: {0}")]
    InvalidStructure(String),

    /// UTF-8 encoding error in attribute or text content
    #[error("UTF-8 encoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Reading was stopped through a cancellation token
    #[error("scan reading cancelled")]
    Cancelled,
}
