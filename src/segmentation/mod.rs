//! Background removal.
//!
//! A [`Segmenter`] turns an image into labelled class masks. Everything not
//! on the [`BACKGROUND_LABELS`] list is kept: the kept masks are combined,
//! softened, and written into the image's alpha channel.
//!
//! [`BackgroundRemover`] is the editor-facing adapter. It toggles: an image
//! that already went through removal is restored from its saved original,
//! anything else is handed out as a [`RemovalJob`] for a worker to run. Only
//! one job is in flight at a time.

#[cfg(feature = "onnx")]
pub mod segformer;

#[cfg(feature = "onnx")]
pub use segformer::SegformerSegmenter;

use crate::collage::{Collage, ObjectId};
use crate::error::{Result, SegmentationError};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use std::sync::{Arc, Mutex};

/// Classes treated as scenery and cut away.
pub const BACKGROUND_LABELS: [&str; 12] = [
    "wall", "floor", "ceiling", "sky", "road", "building", "tree", "grass", "sidewalk", "earth",
    "mountain", "plant",
];

/// Blur radius (standard deviation, px) for the mask edge.
pub const EDGE_SOFTNESS: f32 = 4.0;

/// Where inference runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionDevice {
    #[default]
    Cpu,
    Gpu,
}

/// One class found in an image. `mask` is 255 where the class is present.
#[derive(Clone, Debug)]
pub struct Segment {
    pub label: String,
    pub mask: GrayImage,
}

/// Semantic segmentation backend.
pub trait Segmenter: Send {
    fn device(&self) -> ExecutionDevice;

    fn segment(&mut self, image: &RgbaImage) -> std::result::Result<Vec<Segment>, SegmentationError>;
}

pub fn is_background(label: &str) -> bool {
    BACKGROUND_LABELS
        .iter()
        .any(|bg| bg.eq_ignore_ascii_case(label.trim()))
}

/// Union of every non-background mask at `width`×`height`, with a soft edge.
pub fn foreground_mask(
    segments: &[Segment],
    width: u32,
    height: u32,
) -> std::result::Result<GrayImage, SegmentationError> {
    let mut kept = segments.iter().filter(|s| !is_background(&s.label)).peekable();
    if kept.peek().is_none() {
        return Err(SegmentationError::NothingToKeep);
    }

    let mut combined = GrayImage::new(width, height);
    for segment in kept {
        let resized;
        let mask = if segment.mask.dimensions() == (width, height) {
            &segment.mask
        } else {
            resized = imageops::resize(&segment.mask, width, height, FilterType::Nearest);
            &resized
        };
        for (dst, src) in combined.pixels_mut().zip(mask.pixels()) {
            dst[0] = dst[0].saturating_add(src[0]);
        }
    }
    Ok(imageops::blur(&combined, EDGE_SOFTNESS))
}

/// Multiply each pixel's alpha by the mask.
pub fn apply_alpha_mask(image: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mut out = image.clone();
    for (px, m) in out.pixels_mut().zip(mask.pixels()) {
        px[3] = ((px[3] as u16 * m[0] as u16 + 127) / 255) as u8;
    }
    out
}

/// Segment `image` and punch out its background.
pub fn remove_background(
    segmenter: &mut dyn Segmenter,
    image: &RgbaImage,
) -> std::result::Result<RgbaImage, SegmentationError> {
    let segments = segmenter.segment(image)?;
    log::debug!(
        "Segmentation found {} classes: {:?}",
        segments.len(),
        segments.iter().map(|s| s.label.as_str()).collect::<Vec<_>>()
    );
    let mask = foreground_mask(&segments, image.width(), image.height())?;
    Ok(apply_alpha_mask(image, &mask))
}

/// Shared handle to a loaded model.
pub type SharedSegmenter = Arc<Mutex<dyn Segmenter>>;

/// Model lifecycle as seen by the editor.
#[derive(Clone, Debug, Default)]
enum ModelState {
    #[default]
    Loading,
    Ready(SharedSegmenter),
    Failed(SegmentationError),
}

impl std::fmt::Debug for dyn Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Segmenter({:?})", self.device())
    }
}

/// Work handed to a background worker.
pub struct RemovalJob {
    pub id: ObjectId,
    pub original: Arc<RgbaImage>,
    segmenter: SharedSegmenter,
}

/// Finished job, to be fed back through [`BackgroundRemover::complete`].
pub struct RemovalResult {
    pub id: ObjectId,
    pub original: Arc<RgbaImage>,
    pub outcome: std::result::Result<RgbaImage, SegmentationError>,
}

impl RemovalJob {
    /// Blocking; run it off the UI thread.
    pub fn run(self) -> RemovalResult {
        let outcome = match self.segmenter.lock() {
            Ok(mut segmenter) => remove_background(&mut *segmenter, &self.original),
            Err(_) => Err(SegmentationError::Inference("segmenter lock poisoned".into())),
        };
        RemovalResult {
            id: self.id,
            original: self.original,
            outcome,
        }
    }
}

/// What a background-removal request turned into.
pub enum Removal {
    /// The selection already had its background removed; the original is back.
    Restored(ObjectId),
    /// Segmentation must run.
    Started(RemovalJob),
}

#[derive(Debug, Default)]
pub struct BackgroundRemover {
    model: ModelState,
    in_flight: Option<ObjectId>,
}

impl BackgroundRemover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segmenter<S: Segmenter + 'static>(segmenter: S) -> Self {
        let mut remover = Self::new();
        remover.model_loaded(Arc::new(Mutex::new(segmenter)));
        remover
    }

    pub fn model_loaded(&mut self, segmenter: SharedSegmenter) {
        if let Ok(s) = segmenter.lock() {
            log::info!("Segmentation model ready on {:?}", s.device());
        }
        self.model = ModelState::Ready(segmenter);
    }

    pub fn model_failed(&mut self, error: SegmentationError) {
        log::error!("Segmentation model unavailable: {error}");
        self.model = ModelState::Failed(error);
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.model, ModelState::Ready(_))
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Forget the job in flight; its result will be ignored by the caller.
    pub fn cancel(&mut self) {
        if let Some(id) = self.in_flight.take() {
            log::debug!("Abandoned background removal of {id}");
        }
    }

    /// Toggle background removal on the selected image.
    ///
    /// Restoring happens immediately. Otherwise a job is returned and the
    /// remover stays busy until [`Self::complete`] is called.
    pub fn request(&mut self, collage: &mut Collage) -> Result<Removal> {
        if self.in_flight.is_some() {
            return Err(SegmentationError::Busy.into());
        }
        let selected = collage.selected_image()?;
        if selected.has_original {
            collage.restore_original(selected.id)?;
            log::info!("Restored original of {}", selected.id);
            return Ok(Removal::Restored(selected.id));
        }
        let segmenter = match &self.model {
            ModelState::Ready(s) => s.clone(),
            ModelState::Loading => return Err(SegmentationError::NotReady.into()),
            ModelState::Failed(e) => return Err(e.clone().into()),
        };
        self.in_flight = Some(selected.id);
        log::info!("Removing background of {}", selected.id);
        Ok(Removal::Started(RemovalJob {
            id: selected.id,
            original: selected.base,
            segmenter,
        }))
    }

    /// Apply a finished job. On failure the displayed image is left as it was.
    ///
    /// A result for a job that is no longer in flight (cancelled, or
    /// superseded by a newer request) is dropped and yields `Ok(None)`.
    pub fn complete(&mut self, collage: &mut Collage, result: RemovalResult) -> Result<Option<ObjectId>> {
        if self.in_flight != Some(result.id) {
            log::debug!("Ignoring stale background removal of {}", result.id);
            return Ok(None);
        }
        self.in_flight = None;
        apply(collage, result).map(Some)
    }

    /// Run a request to completion on the calling thread.
    pub fn toggle_blocking(&mut self, collage: &mut Collage) -> Result<ObjectId> {
        match self.request(collage)? {
            Removal::Restored(id) => Ok(id),
            Removal::Started(job) => {
                let result = job.run();
                self.in_flight = None;
                apply(collage, result)
            }
        }
    }
}

fn apply(collage: &mut Collage, result: RemovalResult) -> Result<ObjectId> {
    match result.outcome {
        Ok(cutout) => {
            collage.replace_image(result.id, cutout, Some(result.original))?;
            log::info!("Background removed from {}", result.id);
            Ok(result.id)
        }
        Err(e) => {
            log::warn!("Background removal failed for {}: {e}", result.id);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collage::{CollageOptions, TextRenderer};
    use crate::error::{EditorError, Error};
    use image::{Luma, Rgba};

    /// Left half "person", right half "wall".
    struct SplitSegmenter {
        calls: usize,
    }

    impl Segmenter for SplitSegmenter {
        fn device(&self) -> ExecutionDevice {
            ExecutionDevice::Cpu
        }

        fn segment(&mut self, image: &RgbaImage) -> std::result::Result<Vec<Segment>, SegmentationError> {
            self.calls += 1;
            let (w, h) = image.dimensions();
            let half = |keep_left: bool| {
                GrayImage::from_fn(w, h, |x, _| Luma([if (x < w / 2) == keep_left { 255 } else { 0 }]))
            };
            Ok(vec![
                Segment {
                    label: "person".into(),
                    mask: half(true),
                },
                Segment {
                    label: "wall".into(),
                    mask: half(false),
                },
            ])
        }
    }

    struct FailingSegmenter;

    impl Segmenter for FailingSegmenter {
        fn device(&self) -> ExecutionDevice {
            ExecutionDevice::Gpu
        }

        fn segment(&mut self, _: &RgbaImage) -> std::result::Result<Vec<Segment>, SegmentationError> {
            Err(SegmentationError::Inference("out of memory".into()))
        }
    }

    fn photo() -> RgbaImage {
        RgbaImage::from_fn(64, 48, |x, y| Rgba([x as u8 * 3, y as u8 * 4, 77, 255]))
    }

    fn collage_with_selection() -> (Collage, ObjectId) {
        let mut c = Collage::new(CollageOptions::default(), TextRenderer::builtin().unwrap());
        c.install_photos(vec![Some(photo()), Some(photo())]);
        let id = c.slots().occupant(1).unwrap();
        c.select(Some(id));
        (c, id)
    }

    #[test]
    fn background_labels_are_cut() {
        let mut seg = SplitSegmenter { calls: 0 };
        let out = remove_background(&mut seg, &photo()).unwrap();
        assert!(out.get_pixel(16, 24)[3] > 250);
        assert!(out.get_pixel(48, 24)[3] < 5);
        assert_eq!(out.get_pixel(16, 24)[0], photo().get_pixel(16, 24)[0]);
    }

    #[test]
    fn only_scenery_means_nothing_to_keep() {
        let segments = vec![
            Segment {
                label: "sky".into(),
                mask: GrayImage::from_pixel(4, 4, Luma([255])),
            },
            Segment {
                label: "Tree".into(),
                mask: GrayImage::from_pixel(4, 4, Luma([255])),
            },
        ];
        assert_eq!(
            foreground_mask(&segments, 4, 4).unwrap_err(),
            SegmentationError::NothingToKeep
        );
    }

    #[test]
    fn overlapping_masks_saturate() {
        let segments = vec![
            Segment {
                label: "person".into(),
                mask: GrayImage::from_pixel(30, 30, Luma([200])),
            },
            Segment {
                label: "dog".into(),
                mask: GrayImage::from_pixel(15, 15, Luma([200])),
            },
        ];
        let mask = foreground_mask(&segments, 30, 30).unwrap();
        assert!(mask.get_pixel(15, 15)[0] >= 250);
    }

    #[test]
    fn toggling_twice_restores_identical_pixels() {
        let (mut c, id) = collage_with_selection();
        let before = c.object(id).unwrap().clone();
        let mut remover = BackgroundRemover::with_segmenter(SplitSegmenter { calls: 0 });

        remover.toggle_blocking(&mut c).unwrap();
        let cut = c.object(id).unwrap();
        assert!(cut.has_original());
        assert_eq!(cut.transform, before.transform);
        assert_eq!(cut.slot(), Some(1));
        assert_ne!(cut.bitmap().as_ref(), before.bitmap().as_ref());

        match remover.request(&mut c).unwrap() {
            Removal::Restored(restored) => assert_eq!(restored, id),
            Removal::Started(_) => panic!("second toggle should restore"),
        }
        let back = c.object(id).unwrap();
        assert_eq!(back.bitmap().as_ref(), before.bitmap().as_ref());
        assert!(!back.has_original());
        assert!(!remover.is_busy());
    }

    #[test]
    fn one_job_at_a_time() {
        let (mut c, _) = collage_with_selection();
        let mut remover = BackgroundRemover::with_segmenter(SplitSegmenter { calls: 0 });
        let Removal::Started(job) = remover.request(&mut c).unwrap() else {
            panic!("expected a job");
        };
        assert!(remover.is_busy());
        assert!(matches!(
            remover.request(&mut c),
            Err(Error::Segmentation(SegmentationError::Busy))
        ));
        remover.complete(&mut c, job.run()).unwrap();
        assert!(!remover.is_busy());
    }

    #[test]
    fn a_cancelled_job_does_not_touch_the_next_one() {
        let (mut c, first) = collage_with_selection();
        let mut remover = BackgroundRemover::with_segmenter(SplitSegmenter { calls: 0 });
        let Removal::Started(stale) = remover.request(&mut c).unwrap() else {
            panic!("expected a job");
        };
        let untouched = c.object(first).unwrap().bitmap().clone();
        remover.cancel();
        assert!(!remover.is_busy());

        let second = c.slots().occupant(0).unwrap();
        c.select(Some(second));
        let Removal::Started(current) = remover.request(&mut c).unwrap() else {
            panic!("expected a job");
        };

        assert_eq!(remover.complete(&mut c, stale.run()).unwrap(), None);
        assert!(remover.is_busy());
        assert!(Arc::ptr_eq(c.object(first).unwrap().bitmap(), &untouched));
        assert!(!c.object(first).unwrap().has_original());

        assert_eq!(remover.complete(&mut c, current.run()).unwrap(), Some(second));
        assert!(!remover.is_busy());
        assert!(c.object(second).unwrap().has_original());
    }

    #[test]
    fn failure_leaves_the_image_alone() {
        let (mut c, id) = collage_with_selection();
        let before = c.object(id).unwrap().bitmap().clone();
        let mut remover = BackgroundRemover::with_segmenter(FailingSegmenter);
        let err = remover.toggle_blocking(&mut c).unwrap_err();
        assert!(matches!(
            err,
            Error::Segmentation(SegmentationError::Inference(_))
        ));
        assert!(Arc::ptr_eq(c.object(id).unwrap().bitmap(), &before));
        assert!(!remover.is_busy());
    }

    #[test]
    fn model_state_gates_requests() {
        let (mut c, _) = collage_with_selection();
        let mut remover = BackgroundRemover::new();
        assert!(matches!(
            remover.request(&mut c),
            Err(Error::Segmentation(SegmentationError::NotReady))
        ));
        remover.model_failed(SegmentationError::Model("missing file".into()));
        assert!(matches!(
            remover.request(&mut c),
            Err(Error::Segmentation(SegmentationError::Model(_)))
        ));
    }

    #[test]
    fn needs_an_image_selection() {
        let (mut c, _) = collage_with_selection();
        c.clear_selection();
        let mut remover = BackgroundRemover::with_segmenter(SplitSegmenter { calls: 0 });
        assert!(matches!(
            remover.request(&mut c),
            Err(Error::Editor(EditorError::NoImageSelected))
        ));
    }
}
