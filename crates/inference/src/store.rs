use image::{ImageFormat, RgbImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const RESULT_SUFFIX: &str = "_result.jpg";

/// The served output directory. Holds the artifacts of the latest request only.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Delete every regular file directly inside the directory.
    ///
    /// Subdirectories are left alone and a missing directory is not an error.
    /// Returns the number of files removed.
    pub fn clear(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        tracing::debug!(dir = %self.root.display(), removed, "Output directory cleared");
        Ok(removed)
    }

    /// `<stem>_result.jpg`
    pub fn result_name(stem: &str) -> String {
        format!("{}{}", stem, RESULT_SUFFIX)
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write `image` as JPEG under `name`, replacing any file already there.
    pub fn save(&self, name: &str, image: &RgbImage) -> anyhow::Result<PathBuf> {
        let path = self.path_of(name);

        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Replaced previous result"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        image.save_with_format(&path, ImageFormat::Jpeg)?;
        Ok(path)
    }
}
