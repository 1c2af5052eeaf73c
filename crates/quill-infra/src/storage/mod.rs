//! Blob store implementations - local filesystem and in-memory.

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::InMemoryBlobStore;

use quill_core::error::BlobError;

/// Accept only relative, slash-separated paths without `.`/`..` or empty segments.
fn check_path(path: &str) -> Result<(), BlobError> {
    let valid = !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(BlobError::InvalidPath(path.to_string()))
    }
}

fn join(dir: &str, name: &str) -> Result<String, BlobError> {
    if name.contains('/') {
        return Err(BlobError::InvalidPath(name.to_string()));
    }
    let path = format!("{}/{}", dir.trim_end_matches('/'), name);
    check_path(&path)?;
    Ok(path)
}
