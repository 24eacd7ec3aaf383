use crate::error::ExtractError;
use crate::sheet::{self, Sheet, SourceFormat};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Uploaded bytes parked in a temp file for the readers. The file is deleted when this value
/// is dropped, whichever way the request ends.
pub struct StagedUpload {
    file: NamedTempFile,
    pub format: SourceFormat,
    pub sha256: String,
    pub byte_len: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StagedUpload {
    /// The format is decided from `file_name` before anything touches the disk.
    pub fn from_reader<R: Read>(file_name: &str, mut src: R) -> Result<Self, StageError> {
        let format = SourceFormat::from_file_name(file_name)?;

        let mut file = tempfile::Builder::new()
            .prefix("coattaind-upload-")
            .suffix(format.extension())
            .tempfile()
            .context("failed to create temp file for upload")?;

        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        let mut byte_len = 0u64;
        loop {
            let n = src.read(&mut buf).context("failed to read upload")?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .context("failed to write upload to temp file")?;
            byte_len += n as u64;
        }
        file.flush().context("failed to flush upload temp file")?;

        Ok(Self {
            file,
            format,
            sha256: format!("{:x}", hasher.finalize()),
            byte_len,
        })
    }

    pub fn from_path(file_name: &str, source: &Path) -> Result<Self, StageError> {
        // Checked here too so an unsupported name never opens the source.
        SourceFormat::from_file_name(file_name)?;
        let f = std::fs::File::open(source)
            .with_context(|| format!("failed to open upload {}", source.to_string_lossy()))?;
        Self::from_reader(file_name, f)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read_sheets(&self) -> Result<Vec<Sheet>, ExtractError> {
        sheet::read_sheets(self.path(), self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn staged_file_is_removed_on_drop() {
        let staged = StagedUpload::from_reader("m.csv", Cursor::new(b"a,b\n1,2\n".to_vec()))
            .expect("stage csv");
        let p = staged.path().to_path_buf();
        assert!(p.is_file());
        assert_eq!(p.extension().and_then(|e| e.to_str()), Some("csv"));
        assert_eq!(staged.byte_len, 8);
        assert_eq!(staged.sha256.len(), 64);
        let sheets = staged.read_sheets().expect("read staged");
        assert_eq!(sheets[0].grid.row_count(), 2);
        drop(staged);
        assert!(!p.exists());
    }

    #[test]
    fn unsupported_name_is_rejected_before_opening_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The source does not exist; the extension check must fire first.
        let missing = dir.path().join("does-not-exist.txt");
        match StagedUpload::from_path("marks.txt", &missing) {
            Err(StageError::Extract(e)) => assert_eq!(e.code(), "unsupported_format"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("txt must be rejected"),
        }
    }

    #[test]
    fn same_bytes_same_digest() {
        let a = StagedUpload::from_reader("x.csv", Cursor::new(b"1,2".to_vec())).expect("a");
        let b = StagedUpload::from_reader("y.CSV", Cursor::new(b"1,2".to_vec())).expect("b");
        assert_eq!(a.sha256, b.sha256);
        assert_ne!(a.path(), b.path());
    }
}
