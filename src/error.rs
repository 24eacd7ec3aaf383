use thiserror::Error;

/// Terminal failures of one extraction. Row- and cell-level anomalies never surface here;
/// they are skipped by the extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0:?} (expected .xlsx or .csv)")]
    UnsupportedFormat(String),

    #[error("failed to read {format} source: {message}")]
    Read {
        format: &'static str,
        message: String,
    },

    #[error("could not find {anchor} in sheet {sheet:?}")]
    AnchorNotFound { anchor: Anchor, sheet: String },

    #[error("could not find {column} column in sheet {sheet:?}")]
    MissingColumn { column: String, sheet: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    CoMappingRow,
    MaxMarksRow,
    StudentDataStart,
}

impl Anchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::CoMappingRow => "co_mapping_row",
            Anchor::MaxMarksRow => "max_marks_row",
            Anchor::StudentDataStart => "student_data_start",
        }
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExtractError {
    pub fn read(format: &'static str, cause: impl std::fmt::Display) -> Self {
        ExtractError::Read {
            format,
            message: cause.to_string(),
        }
    }

    /// Stable code used in IPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractError::UnsupportedFormat(_) => "unsupported_format",
            ExtractError::Read { .. } => "read_error",
            ExtractError::AnchorNotFound { .. } => "anchor_not_found",
            ExtractError::MissingColumn { .. } => "missing_column",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ExtractError::UnsupportedFormat(ext) => Some(serde_json::json!({ "extension": ext })),
            ExtractError::Read { format, .. } => Some(serde_json::json!({ "format": format })),
            ExtractError::AnchorNotFound { anchor, sheet } => Some(serde_json::json!({
                "anchor": anchor.as_str(),
                "sheet": sheet,
            })),
            ExtractError::MissingColumn { column, sheet } => Some(serde_json::json!({
                "column": column,
                "sheet": sheet,
            })),
        }
    }
}
