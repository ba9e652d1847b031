//! Capture side of the booth: camera stream, shutter, self-timer, photo roll.

pub mod camera;
pub mod countdown;
#[cfg(feature = "webcam")]
pub mod webcam;

pub use camera::{
    open_device, CameraBackend, CameraDevice, Facing, FrameFolderCamera, TestPatternCamera,
    VideoConstraints,
};
pub use countdown::{Countdown, CountdownEvent};
#[cfg(feature = "webcam")]
pub use webcam::OpenCvCamera;

use crate::error::{CameraError, Result};
use crate::photo::Photo;
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Photos per collage.
pub const MAX_PHOTOS: usize = 4;

/// Backend used when nothing else is asked for: a folder of stills if one is
/// given, else the real camera at `camera_index` (`webcam` feature), else
/// the test pattern.
pub fn default_backend(
    frames_dir: Option<&Path>,
    camera_index: i32,
    test_pattern: bool,
) -> Arc<dyn CameraBackend> {
    if let Some(dir) = frames_dir {
        return Arc::new(FrameFolderCamera::new(dir));
    }
    if test_pattern {
        return Arc::new(TestPatternCamera);
    }
    camera_backend(camera_index)
}

#[cfg(feature = "webcam")]
fn camera_backend(index: i32) -> Arc<dyn CameraBackend> {
    Arc::new(OpenCvCamera::new(index))
}

#[cfg(not(feature = "webcam"))]
fn camera_backend(index: i32) -> Arc<dyn CameraBackend> {
    log::debug!("Built without the webcam feature; camera {index} is not used");
    Arc::new(TestPatternCamera)
}

/// State of the camera stream as shown to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CameraStatus {
    #[default]
    Idle,
    Opening,
    Live,
    /// Persistent inline message; no automatic retry.
    Error(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSettings {
    pub constraints: VideoConstraints,
    pub countdown_seconds: u32,
    pub flash: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            constraints: VideoConstraints::default(),
            countdown_seconds: 3,
            flash: Duration::from_millis(150),
        }
    }
}

/// What pressing the shutter did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutter {
    Captured,
    CountdownStarted,
    /// Already holding [`MAX_PHOTOS`].
    Full,
}

/// Owns the camera stream and the photos taken so far.
pub struct CaptureController {
    settings: CaptureSettings,
    device: Option<Box<dyn CameraDevice>>,
    status: CameraStatus,
    photos: Vec<Photo>,
    countdown: Option<Countdown>,
    remaining: Option<u32>,
    flash_until: Option<Instant>,
    /// Mirror frames horizontally, matching the preview.
    pub mirror: bool,
    /// Delay each shot by the countdown.
    pub timer: bool,
    /// Rule-of-thirds overlay on the viewfinder.
    pub grid_overlay: bool,
}

impl CaptureController {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            device: None,
            status: CameraStatus::Idle,
            photos: Vec::with_capacity(MAX_PHOTOS),
            countdown: None,
            remaining: None,
            flash_until: None,
            mirror: true,
            timer: false,
            grid_overlay: false,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn status(&self) -> &CameraStatus {
        &self.status
    }

    /// Open `backend` synchronously. See [`Self::attach`].
    pub fn activate(&mut self, backend: &dyn CameraBackend) {
        self.status = CameraStatus::Opening;
        let result = open_device(backend, &self.settings.constraints);
        self.attach(result);
    }

    /// Mark the stream as being opened elsewhere (e.g. on a worker thread).
    pub fn begin_opening(&mut self) {
        self.status = CameraStatus::Opening;
    }

    /// Install the result of [`open_device`].
    pub fn attach(&mut self, result: std::result::Result<Box<dyn CameraDevice>, CameraError>) {
        self.release_device();
        match result {
            Ok(device) => {
                log::info!("Camera stream is live");
                self.device = Some(device);
                self.status = CameraStatus::Live;
            }
            Err(e) => {
                log::error!("Camera error: {e}");
                self.status = CameraStatus::Error(e.to_string());
            }
        }
    }

    /// Current frame for the viewfinder, mirrored when [`Self::mirror`] is on.
    pub fn preview_frame(&mut self) -> Option<RgbaImage> {
        let mirror = self.mirror;
        let device = self.device.as_mut()?;
        match device.grab_frame() {
            Ok(frame) if mirror => Some(image::imageops::flip_horizontal(&frame)),
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Dropped preview frame: {e}");
                None
            }
        }
    }

    /// Press the shutter: capture now, or start the countdown when the timer
    /// is on. `notify` receives countdown events; feed them back through
    /// [`Self::on_countdown`].
    pub fn shutter<F>(&mut self, runtime: &tokio::runtime::Handle, notify: F) -> Result<Shutter>
    where
        F: Fn(CountdownEvent) + Send + 'static,
    {
        if self.is_complete() {
            return Ok(Shutter::Full);
        }
        if self.timer {
            self.start_countdown(runtime, notify);
            return Ok(Shutter::CountdownStarted);
        }
        Ok(if self.capture_now()? {
            Shutter::Captured
        } else {
            Shutter::Full
        })
    }

    /// Start (or restart) the self-timer.
    pub fn start_countdown<F>(&mut self, runtime: &tokio::runtime::Handle, notify: F)
    where
        F: Fn(CountdownEvent) + Send + 'static,
    {
        self.cancel_countdown();
        let seconds = self.settings.countdown_seconds;
        log::debug!("Countdown started ({seconds}s)");
        self.remaining = Some(seconds);
        self.countdown = Some(Countdown::start(runtime, seconds, notify));
    }

    pub fn cancel_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
            log::debug!("Countdown cancelled");
        }
        self.remaining = None;
    }

    /// Apply a countdown event. Returns `Ok(true)` when a photo was taken.
    pub fn on_countdown(&mut self, event: CountdownEvent) -> Result<bool> {
        match event {
            CountdownEvent::Tick(n) => {
                if self.countdown.is_some() {
                    self.remaining = Some(n);
                }
                Ok(false)
            }
            CountdownEvent::Fire => {
                if self.countdown.take().is_none() {
                    // Stale event from a cancelled timer.
                    return Ok(false);
                }
                self.remaining = None;
                self.capture_now()
            }
        }
    }

    /// Seconds left on the self-timer, if running.
    pub fn countdown_remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn is_counting_down(&self) -> bool {
        self.remaining.is_some()
    }

    /// Grab, mirror, encode and append one frame.
    ///
    /// Returns `Ok(false)` without touching the camera once
    /// [`MAX_PHOTOS`] are held.
    pub fn capture_now(&mut self) -> Result<bool> {
        if self.is_complete() {
            log::debug!("Capture ignored: already holding {MAX_PHOTOS} photos");
            return Ok(false);
        }
        let Some(device) = self.device.as_mut() else {
            let e = CameraError::Unavailable("camera is not open".into());
            // An earlier open failure already explains why.
            if !matches!(self.status, CameraStatus::Error(_)) {
                self.status = CameraStatus::Error(e.to_string());
            }
            return Err(e.into());
        };
        let frame = match device.grab_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Camera error during capture: {e}");
                self.status = CameraStatus::Error(e.to_string());
                self.release_device();
                return Err(e.into());
            }
        };
        let frame = if self.mirror {
            image::imageops::flip_horizontal(&frame)
        } else {
            frame
        };
        self.photos.push(Photo::from_rgba(&frame)?);
        self.flash_until = Some(Instant::now() + self.settings.flash);
        log::info!("Captured photo {}/{}", self.photos.len(), MAX_PHOTOS);
        Ok(true)
    }

    /// Whether the capture flash should be visible at `now`.
    pub fn flash_active(&self, now: Instant) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn is_complete(&self) -> bool {
        self.photos.len() >= MAX_PHOTOS
    }

    /// Remove the photo at `index`; later photos move up one place.
    pub fn delete(&mut self, index: usize) -> Option<Photo> {
        if index >= self.photos.len() {
            return None;
        }
        log::info!("Deleted photo {}", index + 1);
        Some(self.photos.remove(index))
    }

    /// Drop every photo and any pending countdown.
    pub fn reset(&mut self) {
        self.cancel_countdown();
        self.photos.clear();
        self.flash_until = None;
    }

    /// Stop the countdown and free the camera.
    pub fn release(&mut self) {
        self.cancel_countdown();
        self.release_device();
        self.status = CameraStatus::Idle;
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            log::info!("Camera released");
        }
    }

    pub fn is_live(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_open())
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    /// A stream that dies right after its first frame.
    struct Frozen {
        released: Arc<AtomicBool>,
    }

    struct FrozenDevice {
        released: Arc<AtomicBool>,
        delivered: bool,
    }

    impl CameraDevice for FrozenDevice {
        fn grab_frame(&mut self) -> std::result::Result<RgbaImage, CameraError> {
            if std::mem::replace(&mut self.delivered, true) {
                return Err(CameraError::Frame("device disconnected".into()));
            }
            Ok(RgbaImage::new(4, 2))
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
        fn is_open(&self) -> bool {
            !self.released.load(Ordering::SeqCst)
        }
    }

    impl CameraBackend for Frozen {
        fn name(&self) -> &str {
            "frozen"
        }
        fn open(
            &self,
            _: &VideoConstraints,
        ) -> std::result::Result<Box<dyn CameraDevice>, CameraError> {
            Ok(Box::new(FrozenDevice {
                released: self.released.clone(),
                delivered: false,
            }))
        }
    }

    /// Frames whose red channel at (0, 0) is the frame number and whose left
    /// half is white.
    struct Counting {
        released: Arc<AtomicBool>,
        frames: Arc<AtomicU32>,
        fail: bool,
    }

    struct CountingDevice {
        released: Arc<AtomicBool>,
        frames: Arc<AtomicU32>,
    }

    impl CameraDevice for CountingDevice {
        fn grab_frame(&mut self) -> std::result::Result<RgbaImage, CameraError> {
            let n = self.frames.fetch_add(1, Ordering::SeqCst) as u8;
            Ok(RgbaImage::from_fn(4, 2, |x, _| {
                if x < 2 {
                    image::Rgba([255, 255, 255, 255])
                } else {
                    image::Rgba([n, 0, 0, 255])
                }
            }))
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
        fn is_open(&self) -> bool {
            !self.released.load(Ordering::SeqCst)
        }
    }

    impl CameraBackend for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn open(
            &self,
            _: &VideoConstraints,
        ) -> std::result::Result<Box<dyn CameraDevice>, CameraError> {
            if self.fail {
                return Err(CameraError::PermissionDenied);
            }
            Ok(Box::new(CountingDevice {
                released: self.released.clone(),
                frames: self.frames.clone(),
            }))
        }
    }

    fn backend(fail: bool) -> Counting {
        Counting {
            released: Arc::default(),
            frames: Arc::default(),
            fail,
        }
    }

    fn live_controller(cam: &Counting) -> CaptureController {
        let mut c = CaptureController::new(CaptureSettings::default());
        c.activate(cam);
        assert_eq!(c.status(), &CameraStatus::Live);
        c
    }

    #[test]
    fn fifth_capture_is_a_no_op() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        for _ in 0..4 {
            assert!(c.capture_now().unwrap());
        }
        let frames_before = cam.frames.load(Ordering::SeqCst);
        assert!(!c.capture_now().unwrap());
        assert_eq!(c.photos().len(), 4);
        assert_eq!(cam.frames.load(Ordering::SeqCst), frames_before);
        assert!(c.is_complete());
    }

    #[test]
    fn mirror_flips_captured_frames() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        c.mirror = true;
        c.capture_now().unwrap();
        c.mirror = false;
        c.capture_now().unwrap();

        let mirrored = c.photos()[0].decode().unwrap();
        let plain = c.photos()[1].decode().unwrap();
        assert_eq!(mirrored.get_pixel(3, 0)[1], 255);
        assert_eq!(plain.get_pixel(0, 0)[1], 255);
        assert_eq!(plain.get_pixel(3, 0)[1], 0);
    }

    #[test]
    fn delete_compacts_and_keeps_order() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        c.mirror = false;
        for _ in 0..4 {
            c.capture_now().unwrap();
        }
        let marks: Vec<u8> = c
            .photos()
            .iter()
            .map(|p| p.decode().unwrap().get_pixel(3, 0)[0])
            .collect();

        assert!(c.delete(1).is_some());
        assert!(c.delete(9).is_none());
        let after: Vec<u8> = c
            .photos()
            .iter()
            .map(|p| p.decode().unwrap().get_pixel(3, 0)[0])
            .collect();
        assert_eq!(after, vec![marks[0], marks[2], marks[3]]);
        assert!(!c.is_complete());
        assert!(c.capture_now().unwrap());
    }

    #[test]
    fn permission_denied_is_reported_not_thrown() {
        let cam = backend(true);
        let mut c = CaptureController::new(CaptureSettings::default());
        c.activate(&cam);
        assert_eq!(
            c.status(),
            &CameraStatus::Error("Camera permission denied".into())
        );
        assert!(!c.is_live());
        assert!(c.capture_now().is_err());
        assert_eq!(
            c.status(),
            &CameraStatus::Error("Camera permission denied".into())
        );
    }

    #[test]
    fn a_failed_shot_puts_the_stream_in_error() {
        let cam = Frozen {
            released: Arc::default(),
        };
        let mut c = CaptureController::new(CaptureSettings::default());
        c.activate(&cam);
        assert_eq!(c.status(), &CameraStatus::Live);

        assert!(matches!(
            c.capture_now(),
            Err(crate::error::Error::Camera(CameraError::Frame(_)))
        ));
        assert_eq!(
            c.status(),
            &CameraStatus::Error("Could not read a frame from the camera: device disconnected".into())
        );
        assert!(cam.released.load(Ordering::SeqCst));
        assert!(!c.is_live());
        assert!(c.photos().is_empty());
    }

    #[test]
    fn shooting_without_a_stream_is_an_inline_error() {
        let mut c = CaptureController::new(CaptureSettings::default());
        assert!(c.capture_now().is_err());
        assert_eq!(
            c.status(),
            &CameraStatus::Error("Camera unavailable: camera is not open".into())
        );
    }

    #[test]
    fn backend_choice_follows_the_settings() {
        let dir = std::env::temp_dir();
        assert_eq!(default_backend(Some(&dir), 0, false).name(), "frame-folder");
        assert_eq!(default_backend(Some(&dir), 0, true).name(), "frame-folder");
        assert_eq!(default_backend(None, 0, true).name(), "test-pattern");
        let expected = if cfg!(feature = "webcam") { "opencv" } else { "test-pattern" };
        assert_eq!(default_backend(None, 0, false).name(), expected);
    }

    #[test]
    fn drop_releases_the_camera() {
        let cam = backend(false);
        let c = live_controller(&cam);
        assert!(!cam.released.load(Ordering::SeqCst));
        drop(c);
        assert!(cam.released.load(Ordering::SeqCst));
    }

    #[test]
    fn capture_raises_the_flash() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        let before = Instant::now();
        c.capture_now().unwrap();
        assert!(c.flash_active(before));
        assert!(!c.flash_active(before + Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_shot_fires_after_countdown() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        c.timer = true;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notify = move |ev| {
            let _ = tx.send(ev);
        };
        let shot = c
            .shutter(&tokio::runtime::Handle::current(), notify)
            .unwrap();
        assert_eq!(shot, Shutter::CountdownStarted);
        assert_eq!(c.countdown_remaining(), Some(3));

        let mut taken = false;
        while let Some(ev) = rx.recv().await {
            taken |= c.on_countdown(ev).unwrap();
            if ev == CountdownEvent::Fire {
                break;
            }
        }
        assert!(taken);
        assert_eq!(c.photos().len(), 1);
        assert!(!c.is_counting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fire_after_cancel_is_ignored() {
        let cam = backend(false);
        let mut c = live_controller(&cam);
        c.start_countdown(&tokio::runtime::Handle::current(), |_| {});
        c.cancel_countdown();
        assert!(!c.on_countdown(CountdownEvent::Fire).unwrap());
        assert!(c.photos().is_empty());
    }
}
