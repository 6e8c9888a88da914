pub mod weight_archive;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub use weight_archive::{WeightArchive, WeightArchiveEntry, WeightArchiveReader};

/// Complete contents for `path`, held in a temporary file next to it until published.
///
/// Dropping a staged file without persisting it removes the temporary file.
pub(crate) struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Renames the temporary file onto the target path.
    pub(crate) fn persist(self) -> Result<()> {
        let path = self.path;
        self.tmp
            .persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to persist {}", path.display()))?;
        Ok(())
    }
}

/// Writes the contents for `path` into a temporary file in the same directory.
pub(crate) fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}

/// Writes `path` through a temporary file in the same directory, renamed into place on success.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    stage(path, write)?.persist()
}
