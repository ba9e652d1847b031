//! Captured photos, kept as self-contained PNG buffers.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// One captured frame, PNG encoded.
///
/// Cloning is cheap: the encoded bytes are shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    png: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl Photo {
    /// Encode an RGBA frame.
    pub fn from_rgba(frame: &RgbaImage) -> Result<Self> {
        let mut buf = Cursor::new(Vec::new());
        frame.write_to(&mut buf, ImageFormat::Png)?;
        Ok(Self {
            png: buf.into_inner().into(),
            width: frame.width(),
            height: frame.height(),
        })
    }

    /// Wrap already encoded image bytes (any format `image` can read).
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let frame = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_rgba(&frame)
    }

    pub fn open(path: &std::path::Path) -> Result<Self> {
        let frame = image::open(path)?.to_rgba8();
        Self::from_rgba(&frame)
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        let img = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?;
        Ok(img.to_rgba8())
    }

    /// Bytes that claim to be a PNG but are not.
    #[cfg(test)]
    pub(crate) fn corrupt_for_tests() -> Self {
        Self {
            png: Arc::from(&b"\x89PNG not really"[..]),
            width: 40,
            height: 30,
        }
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `data:image/png;base64,...`
    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&self.png))
    }

    pub fn from_data_url(url: &str) -> Result<Self> {
        let payload = url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| Error::DataUrl("expected a base64 PNG data URL".into()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::DataUrl(e.to_string()))?;
        Self::from_encoded(&bytes)
    }
}
