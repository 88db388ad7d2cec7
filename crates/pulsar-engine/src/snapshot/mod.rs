//! Frame snapshots and where they go.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A read-back frame: tightly packed RGBA8 rows, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Snapshot {
    /// A snapshot filled with a single RGBA8 colour.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut rgba = Vec::with_capacity(count * 4);
        for _ in 0..count {
            rgba.extend_from_slice(&pixel);
        }
        Self { width, height, rgba }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = self.rgba.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Destination for exported snapshots.
pub trait SnapshotSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Writes each snapshot as a PNG file, overwriting the previous one.
#[derive(Debug, Clone)]
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for PngFileSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        let image = image::RgbaImage::from_raw(snapshot.width, snapshot.height, snapshot.rgba.clone())
            .context("snapshot pixel buffer does not match its dimensions")?;
        image
            .save_with_format(&self.path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write snapshot to {}", self.path.display()))?;
        log::info!(
            "snapshot {}x{} written to {}",
            snapshot.width,
            snapshot.height,
            self.path.display()
        );
        Ok(())
    }
}
