//! Display sinks.
//!
//! Each camera renders to a surface named after it. A sink may also report
//! key presses; the orchestrator checks for one after every pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};

pub trait Display {
    /// Replace the contents of `surface` with `image`.
    fn show(&mut self, surface: &str, image: &RgbImage) -> Result<()>;

    /// Most recent key press, if the sink has a keyboard.
    fn poll_key(&mut self) -> Option<char> {
        None
    }

    /// Release all surfaces.
    fn close(&mut self) {}
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn show(&mut self, surface: &str, image: &RgbImage) -> Result<()> {
        (**self).show(surface, image)
    }

    fn poll_key(&mut self) -> Option<char> {
        (**self).poll_key()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Writes `{dir}/{surface}.jpg`, overwriting the previous image.
#[derive(Debug)]
pub struct ImageDirDisplay {
    dir: PathBuf,
    written: HashMap<String, u64>,
}

impl ImageDirDisplay {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output dir {}", dir.display()))?;
        Ok(Self {
            dir,
            written: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn surface_path(&self, surface: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", sanitize(surface)))
    }
}

impl Display for ImageDirDisplay {
    fn show(&mut self, surface: &str, image: &RgbImage) -> Result<()> {
        let path = self.surface_path(surface);
        // Write beside the target and rename so readers never see a partial file.
        let staging = path.with_extension("jpg.tmp");
        image
            .save_with_format(&staging, ImageFormat::Jpeg)
            .with_context(|| format!("write {}", staging.display()))?;
        std::fs::rename(&staging, &path)
            .with_context(|| format!("replace {}", path.display()))?;
        *self.written.entry(surface.to_string()).or_default() += 1;
        Ok(())
    }

    fn close(&mut self) {
        for (surface, count) in &self.written {
            log::info!(
                "surface '{}': {} images written to {}",
                surface,
                count,
                self.surface_path(surface).display()
            );
        }
    }
}

/// Headless sink that only logs what would have been shown.
#[derive(Debug, Default)]
pub struct LogDisplay {
    shown: HashMap<String, u64>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self, surface: &str) -> u64 {
        self.shown.get(surface).copied().unwrap_or(0)
    }
}

impl Display for LogDisplay {
    fn show(&mut self, surface: &str, image: &RgbImage) -> Result<()> {
        let count = self.shown.entry(surface.to_string()).or_default();
        *count += 1;
        log::debug!(
            "surface '{}': frame {} ({}x{})",
            surface,
            count,
            image.width(),
            image.height()
        );
        Ok(())
    }

    fn close(&mut self) {
        for (surface, count) in &self.shown {
            log::info!("surface '{}': {} frames shown", surface, count);
        }
    }
}

/// File-name-safe form of a surface name.
pub fn sanitize(surface: &str) -> String {
    let cleaned: String = surface
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "camera".to_string()
    } else {
        cleaned
    }
}
