//! Storage for generated consent PDFs

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ConsentError, ConsentResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub output_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("static/generated_pdfs"),
        }
    }
}

/// Directory of rendered consent PDFs, addressed by bare filename
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: StoreConfig,
}

impl ArtifactStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Path for `filename` inside the store. Only a single plain path
    /// component is accepted.
    pub fn path_for(&self, filename: &str) -> ConsentResult<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !filename.contains('\\') => {
                Ok(self.config.output_dir.join(name))
            }
            _ => Err(ConsentError::InvalidConfig(format!(
                "Invalid artifact filename: {:?}",
                filename
            ))),
        }
    }

    /// Write `bytes` under `filename`, replacing any previous version.
    ///
    /// The file is written to a temporary sibling first and renamed into place,
    /// so readers see either the old or the new PDF.
    pub fn write(&self, filename: &str, bytes: &[u8]) -> ConsentResult<PathBuf> {
        let path = self.path_for(filename)?;
        std::fs::create_dir_all(&self.config.output_dir)?;

        let tmp = self
            .config
            .output_dir
            .join(format!(".{}.{}.tmp", filename, std::process::id()));
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub fn read(&self, filename: &str) -> ConsentResult<Vec<u8>> {
        Ok(std::fs::read(self.path_for(filename)?)?)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path_for(filename).map_or(false, |p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(StoreConfig {
            output_dir: dir.join("generated_pdfs"),
        })
    }

    #[test]
    fn writes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.write("MRN_1_Consent_1.pdf", b"%PDF-1 first").unwrap();
        assert!(path.starts_with(store.output_dir()));
        store.write("MRN_1_Consent_1.pdf", b"%PDF-1 second").unwrap();
        assert_eq!(store.read("MRN_1_Consent_1.pdf").unwrap(), b"%PDF-1 second");

        let leftovers: Vec<_> = std::fs::read_dir(store.output_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for bad in ["../secret.pdf", "/etc/passwd", "a/b.pdf", "..", "", "a\\..\\b.pdf"] {
            assert!(store.path_for(bad).is_err(), "accepted {:?}", bad);
        }
        assert!(!store.exists("../secret.pdf"));
    }

    #[test]
    fn missing_artifact_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store(dir.path()).read("MRN_9_Consent_9.pdf"),
            Err(ConsentError::Io(_))
        ));
    }
}
