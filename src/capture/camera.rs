//! Camera backends.
//!
//! The booth only needs "open a front-facing stream" and "give me the current
//! frame", so that is all the device traits expose. Two backends live here: a
//! synthetic test pattern and a folder of still images played back as a
//! stream. Real cameras are in the `webcam` module behind the feature of that name.

use crate::error::CameraError;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

/// Which way the requested camera faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Facing {
    /// Towards the user (selfie camera).
    #[default]
    User,
    Environment,
}

/// What the booth asks the device for. Video only, never audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            facing: Facing::User,
        }
    }
}

/// An open camera stream.
pub trait CameraDevice: Send {
    /// Current video frame, unmirrored.
    fn grab_frame(&mut self) -> Result<RgbaImage, CameraError>;

    /// Stop the stream and free the device. Must be idempotent.
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

/// Something that can open a [`CameraDevice`].
pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// Open a stream and read one frame to check it works.
///
/// If that read fails the device is released before the error is returned,
/// so a half-initialised stream is never handed out.
pub fn open_device(
    backend: &dyn CameraBackend,
    constraints: &VideoConstraints,
) -> Result<Box<dyn CameraDevice>, CameraError> {
    log::info!(
        "Opening camera '{}' at {}x{}",
        backend.name(),
        constraints.width,
        constraints.height
    );
    let mut device = backend.open(constraints)?;
    match device.grab_frame() {
        Ok(_) => Ok(device),
        Err(e) => {
            log::warn!("First camera frame failed, releasing device: {e}");
            device.release();
            Err(e)
        }
    }
}

// ── Test pattern ────────────────────────────────────────────────────────────

/// Animated colour-bar pattern; always available.
#[derive(Debug, Default)]
pub struct TestPatternCamera;

impl CameraBackend for TestPatternCamera {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn CameraDevice>, CameraError> {
        Ok(Box::new(TestPatternDevice {
            width: constraints.width.max(1),
            height: constraints.height.max(1),
            frame: 0,
            open: true,
        }))
    }
}

struct TestPatternDevice {
    width: u32,
    height: u32,
    frame: u32,
    open: bool,
}

impl CameraDevice for TestPatternDevice {
    fn grab_frame(&mut self) -> Result<RgbaImage, CameraError> {
        if !self.open {
            return Err(CameraError::Frame("stream closed".into()));
        }
        self.frame = self.frame.wrapping_add(1);
        let (w, h) = (self.width, self.height);
        // A bright marker on the left edge makes mirroring visible.
        let bar = (self.frame * 4) % w;
        Ok(RgbaImage::from_fn(w, h, |x, y| {
            if x < w / 16 {
                Rgba([255, 220, 0, 255])
            } else if x.abs_diff(bar) < 6 {
                Rgba([255, 255, 255, 255])
            } else {
                let r = (x * 255 / w) as u8;
                let g = (y * 255 / h) as u8;
                Rgba([r, g, 160, 255])
            }
        }))
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ── Image folder ────────────────────────────────────────────────────────────

/// Plays the images of a directory back as consecutive frames.
#[derive(Debug, Clone)]
pub struct FrameFolderCamera {
    dir: PathBuf,
}

impl FrameFolderCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            _ => CameraError::Unavailable(format!("{}: {e}", dir.display())),
        })?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        matches!(
                            ext.to_ascii_lowercase().as_str(),
                            "png" | "jpg" | "jpeg" | "bmp" | "webp"
                        )
                    })
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        if frames.is_empty() {
            return Err(CameraError::Unavailable(format!(
                "no images in {}",
                dir.display()
            )));
        }
        Ok(frames)
    }
}

impl CameraBackend for FrameFolderCamera {
    fn name(&self) -> &str {
        "frame-folder"
    }

    fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn CameraDevice>, CameraError> {
        let frames = Self::list_frames(&self.dir)?;
        log::debug!("Frame folder {} has {} frames", self.dir.display(), frames.len());
        Ok(Box::new(FrameFolderDevice {
            frames,
            next: 0,
            constraints: *constraints,
            open: true,
        }))
    }
}

struct FrameFolderDevice {
    frames: Vec<PathBuf>,
    next: usize,
    constraints: VideoConstraints,
    open: bool,
}

impl CameraDevice for FrameFolderDevice {
    fn grab_frame(&mut self) -> Result<RgbaImage, CameraError> {
        if !self.open {
            return Err(CameraError::Frame("stream closed".into()));
        }
        let path = &self.frames[self.next % self.frames.len()];
        self.next = self.next.wrapping_add(1);
        let img = image::open(path)
            .map_err(|e| CameraError::Frame(format!("{}: {e}", path.display())))?;
        let (w, h) = (self.constraints.width, self.constraints.height);
        if img.width() == w && img.height() == h {
            return Ok(img.to_rgba8());
        }
        Ok(img.resize_to_fill(w, h, FilterType::Triangle).to_rgba8())
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_honours_constraints() {
        let constraints = VideoConstraints {
            width: 64,
            height: 48,
            ..Default::default()
        };
        let mut dev = open_device(&TestPatternCamera, &constraints).unwrap();
        let frame = dev.grab_frame().unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
        dev.release();
        assert!(!dev.is_open());
        assert!(dev.grab_frame().is_err());
    }

    #[test]
    fn missing_folder_is_unavailable() {
        let cam = FrameFolderCamera::new("/definitely/not/here");
        let err = open_device(&cam, &VideoConstraints::default()).err().unwrap();
        assert!(matches!(err, CameraError::Unavailable(_)));
    }

    #[test]
    fn folder_frames_cycle_and_resize() {
        let dir = tempfile::tempdir().unwrap();
        for (i, shade) in [10u8, 200].iter().enumerate() {
            let img = RgbaImage::from_pixel(20, 10, Rgba([*shade, 0, 0, 255]));
            img.save(dir.path().join(format!("frame{i}.png"))).unwrap();
        }
        let constraints = VideoConstraints {
            width: 40,
            height: 20,
            ..Default::default()
        };
        let cam = FrameFolderCamera::new(dir.path());
        let mut dev = cam.open(&constraints).unwrap();
        let a = dev.grab_frame().unwrap();
        let b = dev.grab_frame().unwrap();
        let c = dev.grab_frame().unwrap();
        assert_eq!(a.dimensions(), (40, 20));
        assert_eq!(a.get_pixel(5, 5)[0], 10);
        assert_eq!(b.get_pixel(5, 5)[0], 200);
        assert_eq!(c, a);
    }

    struct BrokenBackend;

    struct BrokenDevice {
        released: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl CameraDevice for BrokenDevice {
        fn grab_frame(&mut self) -> Result<RgbaImage, CameraError> {
            Err(CameraError::Frame("no signal".into()))
        }
        fn release(&mut self) {
            self.released
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
        fn is_open(&self) -> bool {
            !self.released.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    static RELEASED: std::sync::OnceLock<std::sync::Arc<std::sync::atomic::AtomicBool>> =
        std::sync::OnceLock::new();

    impl CameraBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn open(&self, _: &VideoConstraints) -> Result<Box<dyn CameraDevice>, CameraError> {
            let flag = RELEASED.get_or_init(Default::default).clone();
            Ok(Box::new(BrokenDevice { released: flag }))
        }
    }

    #[test]
    fn failed_first_frame_releases_the_device() {
        let err = open_device(&BrokenBackend, &VideoConstraints::default())
            .err()
            .unwrap();
        assert_eq!(err, CameraError::Frame("no signal".into()));
        assert!(RELEASED
            .get()
            .unwrap()
            .load(std::sync::atomic::Ordering::SeqCst));
    }
}
