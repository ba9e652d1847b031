use frame_craft::capture::{CaptureController, CaptureSettings, TestPatternCamera, VideoConstraints, MAX_PHOTOS};
use frame_craft::collage::{Collage, CollageOptions, PointerHit, TextRenderer};
use frame_craft::error::SegmentationError;
use frame_craft::export;
use frame_craft::layout::{LayoutMode, Point};
use frame_craft::segmentation::{BackgroundRemover, ExecutionDevice, Removal, Segment, Segmenter};
use frame_craft::slots::DropOutcome;
use image::{GrayImage, Luma, RgbaImage};
use tempfile::TempDir;

fn capture_four() -> CaptureController {
    let mut controller = CaptureController::new(CaptureSettings {
        constraints: VideoConstraints {
            width: 640,
            height: 480,
            ..Default::default()
        },
        ..Default::default()
    });
    controller.activate(&TestPatternCamera);
    assert!(controller.is_live());
    for _ in 0..MAX_PHOTOS {
        assert!(controller.capture_now().unwrap());
    }
    assert!(controller.is_complete());
    assert!(!controller.capture_now().unwrap());
    controller
}

async fn booth_collage() -> Collage {
    let controller = capture_four();
    let mut collage = Collage::new(CollageOptions::default(), TextRenderer::builtin().unwrap());
    collage.load_photos(controller.photos()).await;
    collage
}

#[tokio::test]
async fn grid_collage_from_captured_frames() {
    let collage = booth_collage().await;
    assert!(collage.is_ready());

    let layout = collage.layout();
    assert_eq!((layout.canvas_width, layout.canvas_height), (865.0, 735.0));
    let expected = [(25.0, 95.0), (440.0, 95.0), (25.0, 410.0), (440.0, 410.0)];
    for (slot, (x, y)) in expected.into_iter().enumerate() {
        let photo = collage.photo_in_slot(slot).unwrap();
        assert_eq!(photo.top_left(), Point::new(x, y));
        // 640 px frames scaled to the 400 px slot width.
        assert_eq!(photo.size(), (400.0, 300.0));
    }
    assert!(collage.slots().is_bijective());
}

#[tokio::test]
async fn layout_round_trip_restores_positions() {
    let mut collage = booth_collage().await;
    let before: Vec<Point> = (0..4)
        .map(|s| collage.photo_in_slot(s).unwrap().top_left())
        .collect();

    collage.set_layout(LayoutMode::Vertical);
    assert_eq!(collage.layout().canvas_width, 450.0);
    assert_eq!(collage.layout().canvas_height, 1365.0);
    assert_eq!(collage.photo_in_slot(3).unwrap().top_left(), Point::new(25.0, 1040.0));

    collage.set_layout(LayoutMode::Grid);
    let after: Vec<Point> = (0..4)
        .map(|s| collage.photo_in_slot(s).unwrap().top_left())
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn dragging_a_photo_onto_another_swaps_them() {
    let mut collage = booth_collage().await;
    let first = collage.photo_in_slot(0).unwrap().id;
    let last = collage.photo_in_slot(3).unwrap().id;

    let grab = collage.layout().slot_rect(0).center();
    assert_eq!(collage.pointer_down(grab), PointerHit::Object(first));
    collage.pointer_move(collage.layout().slot_rect(3).center());
    let outcome = collage.pointer_up();

    assert_eq!(
        outcome,
        Some(DropOutcome::Swapped {
            from: 0,
            to: 3,
            displaced: last
        })
    );
    assert_eq!(collage.photo_in_slot(3).unwrap().id, first);
    assert_eq!(collage.photo_in_slot(0).unwrap().id, last);
    assert_eq!(collage.photo_in_slot(0).unwrap().top_left(), Point::new(25.0, 95.0));
    assert!(collage.slots().is_bijective());
}

#[tokio::test]
async fn dropping_on_the_margin_snaps_back() {
    let mut collage = booth_collage().await;
    let id = collage.photo_in_slot(1).unwrap().id;

    collage.pointer_down(collage.layout().slot_rect(1).center());
    collage.pointer_move(Point::new(2.0, 2.0));
    assert_eq!(collage.pointer_up(), Some(DropOutcome::SnappedBack { slot: 1 }));
    assert_eq!(collage.photo_in_slot(1).unwrap().id, id);
    assert_eq!(collage.photo_in_slot(1).unwrap().top_left(), Point::new(440.0, 95.0));
}

#[tokio::test]
async fn decorated_collage_exports_without_selection() {
    let dir = TempDir::new().unwrap();
    let mut collage = booth_collage().await;
    collage.add_sticker(RgbaImage::from_pixel(100, 100, image::Rgba([0, 255, 0, 255])));
    assert!(collage.selected().is_some());

    let path = export::export_to(&mut collage, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "moment4-grid.png");
    assert!(collage.selected().is_none());

    let png = image::open(&path).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (865, 735));
    // Padding shows the default theme background.
    assert_eq!(png.get_pixel(3, 3), &image::Rgba([0x1a, 0x1a, 0x1a, 255]));
    // The 20 px sticker sits at the canvas centre (432.5, 367.5), above the photos.
    assert_eq!(png.get_pixel(432, 367), &image::Rgba([0, 255, 0, 255]));
    assert_ne!(png.get_pixel(432, 380), &image::Rgba([0, 255, 0, 255]));
}

/// Keeps the top half of every frame as "person".
struct TopHalf;

impl Segmenter for TopHalf {
    fn device(&self) -> ExecutionDevice {
        ExecutionDevice::Cpu
    }

    fn segment(&mut self, image: &RgbaImage) -> Result<Vec<Segment>, SegmentationError> {
        let (w, h) = image.dimensions();
        let top = GrayImage::from_fn(w, h, |_, y| Luma([if y < h / 2 { 255 } else { 0 }]));
        let bottom = GrayImage::from_fn(w, h, |_, y| Luma([if y < h / 2 { 0 } else { 255 }]));
        Ok(vec![
            Segment {
                label: "person".into(),
                mask: top,
            },
            Segment {
                label: "floor".into(),
                mask: bottom,
            },
        ])
    }
}

#[tokio::test]
async fn background_removal_keeps_the_slot_and_can_be_undone() {
    let mut collage = booth_collage().await;
    let id = collage.photo_in_slot(2).unwrap().id;
    collage.select(Some(id));

    let mut remover = BackgroundRemover::with_segmenter(TopHalf);
    let Removal::Started(job) = remover.request(&mut collage).unwrap() else {
        panic!("expected a removal job");
    };
    assert!(remover.is_busy());
    let result = tokio::task::spawn_blocking(move || job.run()).await.unwrap();
    assert_eq!(remover.complete(&mut collage, result).unwrap(), Some(id));
    assert!(!remover.is_busy());

    let photo = collage.photo_in_slot(2).unwrap();
    assert_eq!(photo.id, id);
    assert!(photo.has_original());
    assert_eq!(photo.top_left(), Point::new(25.0, 410.0));
    let cut = photo.bitmap();
    assert_eq!(cut.get_pixel(10, 10)[3], 255);
    assert_eq!(cut.get_pixel(10, cut.height() - 10)[3], 0);

    // A second request on the same photo restores it.
    collage.select(Some(id));
    assert!(matches!(remover.request(&mut collage).unwrap(), Removal::Restored(r) if r == id));
    assert!(!collage.photo_in_slot(2).unwrap().has_original());
}
