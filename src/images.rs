use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const PLANT_IMAGES: &str = "plant_images";

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// A file field received from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Browsers send an unnamed (or ".") part when no file was chosen.
    pub fn is_present(&self) -> bool {
        let name = self.file_name.trim();
        !name.is_empty() && name != "."
    }

    /// Lowercased extension of the uploaded file name.
    pub fn extension(&self) -> Option<String> {
        let (_, extension) = self.file_name.rsplit_once('.')?;
        (!extension.is_empty()).then(|| extension.to_ascii_lowercase())
    }

    pub fn has_allowed_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// File written to the static directory but not yet recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    /// Relative to the static directory.
    pub path: String,
}

/// Image files kept under the static directory.
///
/// Methods do blocking file I/O and are meant to run next to the diesel work
/// inside `Database::run`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes the upload as `plant_images/<uuid>.<ext>`.
    pub fn write(&self, upload: &Upload) -> io::Result<StoredFile> {
        let extension = upload.extension().unwrap_or_else(|| "bin".to_owned());
        let path = format!("{PLANT_IMAGES}/{}.{extension}", Uuid::new_v4());
        let location = self.location(&path);

        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&location, &upload.bytes)?;
        tracing::debug!(path = %location.display(), size = upload.bytes.len(), "stored image file");

        Ok(StoredFile {
            name: upload.file_name.clone(),
            path,
        })
    }

    /// Removes a stored file; a file that is already gone is not an error.
    pub fn remove(&self, relative: &str) -> io::Result<()> {
        match std::fs::remove_file(self.location(relative)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Best-effort cleanup used after a failed or completed transaction.
    pub fn discard(&self, relative: &str) {
        if let Err(err) = self.remove(relative) {
            tracing::warn!(path = relative, error = %err, "could not remove image file");
        }
    }
}
