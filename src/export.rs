//! Flattened PNG export of the collage.

use crate::collage::Collage;
use crate::error::Result;
use crate::layout::LayoutMode;
use image::ImageFormat;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// `moment4-grid.png` / `moment4-vertical.png`
pub fn export_filename(mode: LayoutMode) -> String {
    format!("moment4-{}.png", mode.as_str())
}

/// Default export directory: the user's pictures folder, else the home
/// directory, else the working directory.
pub fn default_directory() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Encode the flattened collage as PNG. The selection is cleared first so
/// no handle chrome ends up in the picture.
pub fn render_png(collage: &mut Collage) -> Result<Vec<u8>> {
    collage.clear_selection();
    let image = collage.render();
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Create `directory` if needed.
pub fn ensure_directory_exists(directory: &Path) -> Result<PathBuf> {
    if !directory.exists() {
        log::info!("Creating export directory: {}", directory.display());
        fs::create_dir_all(directory)?;
    }
    Ok(directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf()))
}

/// Write the collage to exactly `path`.
pub fn export_file(collage: &mut Collage, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory_exists(parent)?;
    }
    let png = render_png(collage)?;
    log::info!("Saving collage to: {} ({} bytes)", path.display(), png.len());
    fs::write(path, &png)?;
    Ok(path.to_path_buf())
}

/// Write the collage into `directory` under [`export_filename`].
pub fn export_to(collage: &mut Collage, directory: &Path) -> Result<PathBuf> {
    let directory = ensure_directory_exists(directory)?;
    let path = directory.join(export_filename(collage.mode()));
    export_file(collage, &path)
}
