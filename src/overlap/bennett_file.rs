//! Persisted Bennett parameter, one value on the first line of a text file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct BennettParameterFile {
    path: PathBuf,
}

impl BennettParameterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read α. A missing file is not an error.
    pub fn read(&self) -> Result<Option<f64>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Bennett parameter file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let line = contents.lines().next().unwrap_or("").trim();
        line.parse::<f64>().map(Some).map_err(|e| Error::Parse {
            path: self.path.clone(),
            message: format!("expected a number on the first line, found '{}': {}", line, e),
        })
    }

    pub fn write(&self, alpha: f64) -> Result<()> {
        fs::write(&self.path, format!("{}\n", alpha))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let file = BennettParameterFile::new(dir.path().join("alpha"));
        file.write(0.573265415766427).unwrap();
        assert_eq!(file.read().unwrap(), Some(0.573265415766427));
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "0.573265415766427\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let file = BennettParameterFile::new(dir.path().join("absent"));
        assert_eq!(file.read().unwrap(), None);
    }

    #[test]
    fn test_only_first_line_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha");
        fs::write(&path, "1.5e-3\nignored\n").unwrap();
        assert_eq!(BennettParameterFile::new(&path).read().unwrap(), Some(1.5e-3));
    }

    #[test]
    fn test_unparsable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha");
        fs::write(&path, "not a number\n").unwrap();
        let err = BennettParameterFile::new(&path).read().unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        fs::write(&path, "").unwrap();
        assert!(BennettParameterFile::new(&path).read().is_err());
    }
}
