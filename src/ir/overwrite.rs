//! Destination overwrite policy shared by every writer.

use std::fs;
use std::path::Path;

use crate::error::CoordconvError;

/// What a writer does when its destination already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overwrite {
    /// Fail with [`CoordconvError::OutputConflict`].
    #[default]
    Refuse,
    /// Replace the file, creating missing parent directories first.
    Force,
}

impl Overwrite {
    pub fn from_force(force: bool) -> Self {
        if force {
            Overwrite::Force
        } else {
            Overwrite::Refuse
        }
    }

    /// Checks the destination before a writer creates it.
    pub(crate) fn prepare(self, path: &Path) -> Result<(), CoordconvError> {
        match self {
            Overwrite::Force => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
            }
            Overwrite::Refuse => {
                if path.is_file() {
                    return Err(CoordconvError::OutputConflict {
                        path: path.to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }
}
