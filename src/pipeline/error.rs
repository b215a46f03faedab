use crate::mzml::ParseError;

/// File-level failures of the processing pipeline
///
/// A failed file is reported in the batch report; it never stops the batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The file could not be opened or its spectrum list is malformed
    #[error("{file}: {source}")]
    Scan {
        file: String,
        #[source]
        source: ParseError,
    },

    /// The same input was given twice in one batch
    #[error("{0} is listed more than once in the batch")]
    DuplicateInput(String),

    /// Processing was cancelled through the cancellation token
    #[error("processing cancelled")]
    Cancelled,

    /// The result sink thread could not be started or stopped
    #[error("result sink failure: {0}")]
    Sink(String),
}

impl PipelineError {
    pub(crate) fn from_parse(file: &str, source: ParseError) -> Self {
        match source {
            ParseError::Cancelled => Self::Cancelled,
            source => Self::Scan {
                file: file.to_string(),
                source,
            },
        }
    }
}
