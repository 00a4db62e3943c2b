//! I/O utilities for file-backed storage.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::StoreError;

/// Classifies I/O errors into specific StoreError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> StoreError {
    match error.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            StoreError::DataCorruption(format!("{}: {}", context, error))
        }
        _ => StoreError::IoError(format!("{}: {}", context, error)),
    }
}

/// Replaces `path` with `contents` through a temporary file and a rename.
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8], sync: bool) -> std::io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let result = (|| {
        let mut file = File::create(temp_path)?;
        file.write_all(contents)?;
        if sync {
            file.sync_all()?;
        }
        fs::rename(temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    result
}
