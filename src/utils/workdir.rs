//! Scoped working-directory guard
//!
//! The appliance writes result files relative to the process working
//! directory, so result collection has to `chdir` into the per-test-case
//! output directory. The guard restores the previous directory on every
//! exit path, including errors and panics.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// RAII guard that changes the process working directory and restores
/// the previous one on drop.
///
/// The working directory is process-global state; hold at most one
/// guard at a time.
#[derive(Debug)]
pub struct ScopedWorkdir {
    original: PathBuf,
}

impl ScopedWorkdir {
    /// Change into `dir`, remembering the current directory.
    pub fn enter(dir: impl AsRef<Path>) -> io::Result<Self> {
        let original = env::current_dir()?;
        env::set_current_dir(dir.as_ref())?;
        debug!(
            "entered working directory {} (was {})",
            dir.as_ref().display(),
            original.display()
        );
        Ok(Self { original })
    }

    /// The directory that will be restored on drop.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for ScopedWorkdir {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.original) {
            error!(
                "failed to restore working directory {}: {}",
                self.original.display(),
                e
            );
        }
    }
}
