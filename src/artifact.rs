use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no artifact")]
    NoArtifact,
    #[error("can't save artifact to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Holds the artifact of the most recently delivered reply.
#[derive(Debug, Default)]
pub struct ArtifactSlot {
    latest: Option<Vec<u8>>,
}

impl ArtifactSlot {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn store(&mut self, artifact: Option<Vec<u8>>) {
        self.latest = artifact;
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.latest.as_deref()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SaveError> {
        match self.latest {
            Some(ref data) => save(data, path),
            None => Err(SaveError::NoArtifact),
        }
    }
}

/// Writes `data` to `path`.
///
/// Goes through a temporary file in the destination directory, so `path` is
/// either fully written or left as it was.
pub fn save(data: &[u8], path: &Path) -> Result<(), SaveError> {
    write_atomic(data, path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(data: &[u8], path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    mark_executable(file.as_file())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn mark_executable(file: &std::fs::File) -> io::Result<()> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_: &std::fs::File) -> io::Result<()> {
    Ok(())
}
