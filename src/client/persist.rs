use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSelection {
    current_site_id: Option<String>,
}

/// Local copy of the selected site, so a restarted session starts from the
/// last choice. Failures are logged and otherwise ignored; the directory is
/// the authority and the selection is reconciled on the next fetch.
#[derive(Debug, Clone)]
pub struct SelectionFile {
    path: PathBuf,
}

impl SelectionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read saved site selection: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<PersistedSelection>(&raw) {
            Ok(saved) => saved.current_site_id,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Ignoring corrupt site selection file: {}", e);
                None
            }
        }
    }

    pub fn save(&self, site_id: Option<&str>) {
        let saved = PersistedSelection {
            current_site_id: site_id.map(str::to_string),
        };
        if let Err(e) = self.write(&saved) {
            tracing::warn!(path = %self.path.display(), "Failed to save site selection: {}", e);
        }
    }

    fn write(&self, saved: &PersistedSelection) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write then rename so a crash never leaves half a file behind.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(saved)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
