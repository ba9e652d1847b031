//! Real cameras through OpenCV's `videoio` (`webcam` feature).
//!
//! OpenCV has no notion of which way a device faces, so the user-facing
//! camera is whatever sits at the configured index; index 0 is the built-in
//! front camera on laptops. The stream is video only.

use super::camera::{CameraBackend, CameraDevice, Facing, VideoConstraints};
use crate::error::CameraError;
use image::RgbaImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgproc, videoio};

/// Capture properties requested for `constraints`. The driver may pick the
/// nearest mode it supports.
pub fn capture_properties(constraints: &VideoConstraints) -> [(i32, f64); 2] {
    [
        (videoio::CAP_PROP_FRAME_WIDTH, f64::from(constraints.width)),
        (videoio::CAP_PROP_FRAME_HEIGHT, f64::from(constraints.height)),
    ]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvCamera {
    index: i32,
}

impl OpenCvCamera {
    pub fn new(index: i32) -> Self {
        Self { index }
    }
}

impl CameraBackend for OpenCvCamera {
    fn name(&self) -> &str {
        "opencv"
    }

    fn open(&self, constraints: &VideoConstraints) -> Result<Box<dyn CameraDevice>, CameraError> {
        if constraints.facing == Facing::Environment {
            log::warn!("Camera facing cannot be chosen; using device {}", self.index);
        }
        let unavailable = |e: opencv::Error| CameraError::Unavailable(e.to_string());
        let mut cap = videoio::VideoCapture::new(self.index, videoio::CAP_ANY).map_err(unavailable)?;
        if !cap.is_opened().map_err(unavailable)? {
            return Err(CameraError::Unavailable(format!(
                "camera {} could not be opened",
                self.index
            )));
        }
        for (prop, value) in capture_properties(constraints) {
            if !cap.set(prop, value).unwrap_or(false) {
                log::debug!("Camera ignored property {prop} = {value}");
            }
        }
        log::info!("Opened camera {}", self.index);
        Ok(Box::new(OpenCvDevice {
            cap: Some(cap),
            frame: Mat::default(),
        }))
    }
}

struct OpenCvDevice {
    cap: Option<videoio::VideoCapture>,
    frame: Mat,
}

impl CameraDevice for OpenCvDevice {
    fn grab_frame(&mut self) -> Result<RgbaImage, CameraError> {
        let frame_error = |e: opencv::Error| CameraError::Frame(e.to_string());
        let cap = self
            .cap
            .as_mut()
            .ok_or_else(|| CameraError::Frame("stream closed".into()))?;
        if !cap.read(&mut self.frame).map_err(frame_error)? || self.frame.empty() {
            return Err(CameraError::Frame("camera returned no frame".into()));
        }

        let mut rgba = Mat::default();
        imgproc::cvt_color_def(&self.frame, &mut rgba, imgproc::COLOR_BGR2RGBA).map_err(frame_error)?;
        let size = rgba.size().map_err(frame_error)?;
        let bytes = rgba.data_bytes().map_err(frame_error)?.to_vec();
        RgbaImage::from_raw(size.width as u32, size.height as u32, bytes)
            .ok_or_else(|| CameraError::Frame("unexpected frame layout".into()))
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            if let Err(e) = cap.release() {
                log::warn!("Camera release failed: {e}");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.cap.is_some()
    }
}

impl Drop for OpenCvDevice {
    fn drop(&mut self) {
        self.release();
    }
}
