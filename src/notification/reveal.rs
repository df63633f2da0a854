use std::path::Path;

/// OS shell operations used to surface a referenced file.
pub trait FileOpener {
    /// Open the containing folder with `path` selected.
    fn reveal(&self, path: &Path) -> Result<(), String>;
    /// Open `path` with its default handler.
    fn open(&self, path: &Path) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Revealed,
    OpenedParent,
    /// Neither the file nor its parent exists.
    NotFound,
    /// The shell refused every attempt.
    Failed,
}

impl RevealOutcome {
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Revealed | Self::OpenedParent)
    }
}

/// Reveal `path`, degrading to its parent directory, then to a logged failure.
pub fn open_file_path_with_fallback<O: FileOpener + ?Sized>(opener: &O, path: &Path) -> RevealOutcome {
    log::info!("Opening file path {}", path.display());

    if path.exists() {
        match opener.reveal(path) {
            Ok(()) => return RevealOutcome::Revealed,
            Err(reason) => log::warn!("Reveal of {} failed: {}", path.display(), reason),
        }
    }

    let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        log::error!("{} has no parent directory to open", path.display());
        return RevealOutcome::NotFound;
    };

    if !parent.is_dir() {
        log::error!("Parent directory {} does not exist", parent.display());
        return RevealOutcome::NotFound;
    }

    match opener.open(parent) {
        Ok(()) => {
            log::info!("Opened parent directory {}", parent.display());
            RevealOutcome::OpenedParent
        }
        Err(reason) => {
            log::error!("Opening {} failed: {}", parent.display(), reason);
            RevealOutcome::Failed
        }
    }
}
