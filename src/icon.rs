//! Window and tray icon resolution.
//!
//! Icons are probed in a fixed order: packaged resource dir, the directory of
//! the executable, then the working directory. Every location may be missing.

use std::path::{Path, PathBuf};

use tauri::image::Image;
use thiserror::Error;

use crate::error::{Classified, ErrorClass};

/// Relative location of the branding icon under each probe root.
const ICON_RELATIVE_PATH: &str = "src/assets/logoTitle.png";

/// Bundle icon embedded at compile time, last resort for the tray.
pub const BUNDLED_ICON: &[u8] = include_bytes!("../icons/icon.png");

const PLACEHOLDER_SIZE: u32 = 16;

#[derive(Debug, Error)]
pub enum IconError {
    #[error("no icon found in any probe location")]
    NotFound,
    #[error("failed to read icon {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("PNG decode error: {0}")]
    Decode(String),
    #[error("unsupported PNG layout: {0}")]
    Unsupported(String),
}

impl Classified for IconError {
    fn class(&self) -> ErrorClass {
        ErrorClass::ResourceResolution
    }
}

/// Probe roots for icon lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconLocations {
    resource_dir: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
    cwd: Option<PathBuf>,
}

impl IconLocations {
    pub fn new(resource_dir: Option<PathBuf>, exe_dir: Option<PathBuf>, cwd: Option<PathBuf>) -> Self {
        Self {
            resource_dir,
            exe_dir,
            cwd,
        }
    }

    /// Roots for the running process. `resource_dir` comes from the runtime.
    pub fn from_environment(resource_dir: Option<PathBuf>) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let cwd = std::env::current_dir().ok();
        Self::new(resource_dir, exe_dir, cwd)
    }

    /// Candidate icon paths in probe order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        [&self.resource_dir, &self.exe_dir, &self.cwd]
            .into_iter()
            .flatten()
            .map(|root| root.join(ICON_RELATIVE_PATH))
            .collect()
    }

    /// First candidate that exists as a file.
    pub fn probe(&self) -> Option<PathBuf> {
        let found = self.candidates().into_iter().find(|path| path.is_file());
        match &found {
            Some(path) => log::debug!("Resolved icon at {}", path.display()),
            None => log::debug!("No icon in {} probe locations", self.candidates().len()),
        }
        found
    }
}

/// Decode PNG bytes into an RGBA Tauri image.
pub fn load_png_icon(bytes: &[u8]) -> Result<Image<'static>, IconError> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| IconError::Decode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| IconError::Decode(e.to_string()))?;
    let pixels = &buf[..info.buffer_size()];

    let rgba = match info.color_type {
        png::ColorType::Rgba => pixels.to_vec(),
        png::ColorType::Rgb => pixels
            .chunks(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => pixels
            .chunks(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(IconError::Unsupported("indexed color after expansion".to_string()));
        }
    };

    Ok(Image::new_owned(rgba, info.width, info.height))
}

pub fn load_icon_file(path: &Path) -> Result<Image<'static>, IconError> {
    let bytes = std::fs::read(path).map_err(|source| IconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_png_icon(&bytes)
}

/// Probe `locations` and decode the first icon found.
pub fn resolve_icon(locations: &IconLocations) -> Result<Image<'static>, IconError> {
    let path = locations.probe().ok_or(IconError::NotFound)?;
    load_icon_file(&path)
}

/// Fully transparent image used when nothing else decodes.
pub fn placeholder_icon() -> Image<'static> {
    let len = (PLACEHOLDER_SIZE * PLACEHOLDER_SIZE * 4) as usize;
    Image::new_owned(vec![0; len], PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
}
