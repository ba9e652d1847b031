//! Configuration file support.
//!
//! Settings live in `~/.config/frame-craft/config.toml`. A missing file means
//! defaults; present values are validated and clamped into safe ranges with a
//! warning rather than rejected.
//!
//! ```toml
//! [layout]
//! photo_width = 400
//! gap = 15
//!
//! [capture]
//! countdown_seconds = 3
//! mirror = true
//! frames_dir = "~/booth-frames"
//!
//! [editor]
//! title = "MOMENT4"
//! theme = 2
//!
//! [segmentation]
//! model_path = "~/models/segformer-b0-ade.onnx"
//! prefer_gpu = true
//! ```

use crate::capture::{CaptureSettings, Facing, VideoConstraints};
use crate::collage::{CollageOptions, THEMES};
use crate::error::{Error, Result};
use crate::layout::{LayoutMetrics, LayoutMode};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub countdown_seconds: u32,
    pub mirror: bool,
    pub timer: bool,
    pub grid_overlay: bool,
    pub camera_width: u32,
    pub camera_height: u32,
    pub flash_millis: u64,
    /// Replay images from this folder instead of a camera.
    pub frames_dir: Option<PathBuf>,
    /// Device index opened by the `webcam` backend.
    pub camera_index: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 3,
            mirror: true,
            timer: false,
            grid_overlay: false,
            camera_width: 1280,
            camera_height: 720,
            flash_millis: 150,
            frames_dir: None,
            camera_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub title: String,
    pub title_font_size: f32,
    pub layout: LayoutMode,
    pub theme: usize,
    /// PNG stickers offered in the sticker menu.
    pub sticker_dir: Option<PathBuf>,
    /// TTF/OTF used for the title and text; the bundled UI font otherwise.
    pub font_path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            title: "MOMENT4".to_string(),
            title_font_size: 40.0,
            layout: LayoutMode::Grid,
            theme: 0,
            sticker_dir: None,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Falls back to the pictures folder.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub model_path: Option<PathBuf>,
    pub prefer_gpu: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            prefer_gpu: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutMetrics,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

fn clamp_f32(name: &str, value: &mut f32, min: f32, max: f32) {
    if !(min..=max).contains(&*value) {
        log::warn!("Invalid {name} {value:.1}, clamping to {min}-{max} range");
        *value = if value.is_nan() { min } else { (*value).clamp(min, max) };
    }
}

fn clamp_u32(name: &str, value: &mut u32, min: u32, max: u32) {
    if !(min..=max).contains(&*value) {
        log::warn!("Invalid {name} {value}, clamping to {min}-{max} range");
        *value = (*value).clamp(min, max);
    }
}

impl Config {
    /// Pull every value into its valid range, logging what changed.
    pub fn validate_and_clamp(&mut self) {
        let l = &mut self.layout;
        clamp_f32("photo_width", &mut l.photo_width, 50.0, 2000.0);
        clamp_f32("photo_height", &mut l.photo_height, 50.0, 2000.0);
        clamp_f32("padding", &mut l.padding, 0.0, 200.0);
        clamp_f32("gap", &mut l.gap, 0.0, 200.0);
        clamp_f32("header_height", &mut l.header_height, 0.0, 400.0);

        let c = &mut self.capture;
        clamp_u32("countdown_seconds", &mut c.countdown_seconds, 1, 10);
        clamp_u32("camera_width", &mut c.camera_width, 160, 3840);
        clamp_u32("camera_height", &mut c.camera_height, 120, 2160);
        if c.flash_millis > 1000 {
            log::warn!("Invalid flash_millis {}, clamping to 1000", c.flash_millis);
            c.flash_millis = 1000;
        }
        if c.camera_index < 0 {
            log::warn!("Invalid camera_index {}, using 0", c.camera_index);
            c.camera_index = 0;
        }

        let e = &mut self.editor;
        clamp_f32("title_font_size", &mut e.title_font_size, 8.0, 200.0);
        if e.theme >= THEMES.len() {
            log::warn!(
                "Invalid theme {}, wrapping into 0-{}",
                e.theme,
                THEMES.len() - 1
            );
            e.theme %= THEMES.len();
        }
    }

    /// `~/.config/frame-craft/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not find config directory".into()))?;
        Ok(dir.join("frame-craft").join("config.toml"))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate_and_clamp();
        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, text)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            constraints: VideoConstraints {
                width: self.capture.camera_width,
                height: self.capture.camera_height,
                facing: Facing::User,
            },
            countdown_seconds: self.capture.countdown_seconds,
            flash: Duration::from_millis(self.capture.flash_millis),
        }
    }

    pub fn collage_options(&self) -> CollageOptions {
        CollageOptions {
            metrics: self.layout,
            mode: self.editor.layout,
            theme_index: self.editor.theme,
            title: self.editor.title.clone(),
            title_size: self.editor.title_font_size,
        }
    }

    pub fn export_directory(&self) -> PathBuf {
        self.export
            .directory
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(crate::export::default_directory)
    }
}

/// Expand a leading `~/`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.layout.photo_width, 400.0);
        assert_eq!(config.capture.countdown_seconds, 3);
        assert_eq!(config.editor.title, "MOMENT4");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[layout]\ngap = 20\n\n[editor]\nlayout = \"vertical\"\ntheme = 3\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.layout.gap, 20.0);
        assert_eq!(config.layout.padding, 25.0);
        assert_eq!(config.editor.layout, LayoutMode::Vertical);
        assert_eq!(config.collage_options().theme_index, 3);
        assert!(config.capture.mirror);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[layout]\nphoto_width = 10\ngap = 999\n\n[capture]\ncountdown_seconds = 0\ncamera_index = -2\n\n[editor]\ntheme = 7\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.layout.photo_width, 50.0);
        assert_eq!(config.layout.gap, 200.0);
        assert_eq!(config.capture.countdown_seconds, 1);
        assert_eq!(config.capture.camera_index, 0);
        assert_eq!(config.editor.theme, 2);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[layout\nphoto_width = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn save_then_load_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let mut config = Config::default();
        config.capture.timer = true;
        config.segmentation.model_path = Some(PathBuf::from("/models/seg.onnx"));
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.capture.flash_millis = 90;
        config.capture.camera_width = 640;
        let s = config.capture_settings();
        assert_eq!(s.flash, Duration::from_millis(90));
        assert_eq!(s.constraints.width, 640);
        assert_eq!(s.constraints.facing, Facing::User);
    }
}
