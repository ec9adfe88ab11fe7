use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Reduce a client-supplied file name to its last path component.
///
/// Browsers on Windows may send `C:\fakepath\lot.jpg`, so both separators count.
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(raw: &str) -> Option<&str> {
    raw.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// An upload persisted verbatim in its own scratch directory.
///
/// The directory (and the file) is removed on [`ScratchUpload::remove`] or drop.
pub struct ScratchUpload {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchUpload {
    pub fn persist(scratch_root: &Path, file_name: &str, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(scratch_root)?;

        let path = dir.path().join(file_name);
        fs::write(&path, bytes)?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Upload persisted");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(self) -> io::Result<()> {
        self.dir.close()
    }
}
