//! The collage surface: photos bound to layout slots, free decorations, and
//! the title, kept in stacking order.
//!
//! Stacking is always title at the bottom, then photos, then decorations.
//! Everything that moves a photo goes through the slot table so that no two
//! photos ever claim the same slot.

pub mod object;
pub mod render;
pub mod text;
pub mod theme;

pub use object::{Control, Controls, ImageContent, ObjectId, ObjectKind, SurfaceObject, Transform};
pub use text::{TextEffect, TextRenderer, TextSpec};
pub use theme::{theme, Theme, THEMES};

use crate::color::Color;
use crate::error::{EditorError, Result};
use crate::filters::StyleFilter;
use crate::layout::{compute_layout, Layout, LayoutMetrics, LayoutMode, Point, SLOT_COUNT};
use crate::photo::Photo;
use crate::slots::{self, DropOutcome, SlotTable};
use image::RgbaImage;
use std::sync::Arc;

/// Scale applied to freshly added stickers.
const STICKER_SCALE: f32 = 0.2;
const MIN_SCALE: f32 = 0.05;
const MAX_SCALE: f32 = 20.0;

/// Static settings for a collage.
#[derive(Clone, Debug)]
pub struct CollageOptions {
    pub metrics: LayoutMetrics,
    pub mode: LayoutMode,
    pub theme_index: usize,
    pub title: String,
    pub title_size: f32,
}

impl Default for CollageOptions {
    fn default() -> Self {
        Self {
            metrics: LayoutMetrics::default(),
            mode: LayoutMode::Grid,
            theme_index: 0,
            title: "MOMENT4".to_string(),
            title_size: 40.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragState {
    Moving { id: ObjectId, grab: Point },
    Resizing { id: ObjectId, start_dist: f32, start_scale: (f32, f32) },
    Rotating { id: ObjectId, start_angle: f32, start_pointer: f32 },
}

/// What a pointer press landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerHit {
    Nothing,
    Object(ObjectId),
    Control(ObjectId, Control),
    /// The delete handle was pressed and the decoration removed.
    Deleted(ObjectId),
}

/// Image taken from the current selection for background removal.
#[derive(Clone, Debug)]
pub struct SelectedImage {
    pub id: ObjectId,
    pub base: Arc<RgbaImage>,
    pub has_original: bool,
}

pub struct Collage {
    options: CollageOptions,
    layout: Layout,
    theme_index: usize,
    text: TextRenderer,
    /// Stacking order, bottom first.
    objects: Vec<SurfaceObject>,
    slots: SlotTable<ObjectId>,
    title: Option<ObjectId>,
    selected: Option<ObjectId>,
    drag: Option<DragState>,
    next_id: u64,
    ready: bool,
}

impl Collage {
    pub fn new(options: CollageOptions, text: TextRenderer) -> Self {
        let layout = compute_layout(options.mode, &options.metrics);
        let theme_index = options.theme_index % THEMES.len();
        let mut collage = Self {
            options,
            layout,
            theme_index,
            text,
            objects: Vec::new(),
            slots: SlotTable::new(),
            title: None,
            selected: None,
            drag: None,
            next_id: 1,
            ready: false,
        };
        collage.rebuild_title();
        collage
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn mode(&self) -> LayoutMode {
        self.layout.mode
    }

    pub fn theme(&self) -> Theme {
        theme(self.theme_index)
    }

    pub fn theme_index(&self) -> usize {
        self.theme_index
    }

    pub fn text_renderer(&self) -> &TextRenderer {
        &self.text
    }

    /// True once photos have been installed and positioned.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Objects in stacking order, bottom first.
    pub fn objects(&self) -> &[SurfaceObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&SurfaceObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut SurfaceObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn slots(&self) -> &SlotTable<ObjectId> {
        &self.slots
    }

    /// Photo currently occupying `slot`.
    pub fn photo_in_slot(&self, slot: usize) -> Option<&SurfaceObject> {
        self.slots.occupant(slot).and_then(|id| self.object(id))
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    pub fn selected_object(&self) -> Option<&SurfaceObject> {
        self.selected.and_then(|id| self.object(id))
    }

    // ── Photos ──────────────────────────────────────────────────────────────

    /// Install decoded photos, entry `i` going to slot `i`. A `None` entry
    /// leaves its slot empty and anything past the fourth is ignored. Photos
    /// from an earlier install are all removed first. Marks the surface ready.
    pub fn install_photos(&mut self, frames: Vec<Option<RgbaImage>>) {
        let old: Vec<ObjectId> = self.slots.occupied().map(|(_, id)| id).collect();
        for slot in 0..SLOT_COUNT {
            self.slots.clear(slot);
        }
        self.objects.retain(|o| !o.kind.is_photo());
        if self.selected.is_some_and(|id| old.contains(&id)) {
            self.clear_selection();
        }

        for (slot, frame) in frames.into_iter().take(SLOT_COUNT).enumerate() {
            let Some(frame) = frame else {
                continue;
            };
            let id = self.alloc_id();
            let scale = self.options.metrics.photo_width / frame.width().max(1) as f32;
            let bitmap = Arc::new(frame);
            let mut obj = SurfaceObject {
                id,
                kind: ObjectKind::Photo { slot },
                transform: Transform::at(Point::default(), scale),
                controls: Controls::NONE,
                selectable: true,
                image: Some(ImageContent {
                    base: bitmap.clone(),
                    original: None,
                    style: StyleFilter::Original,
                }),
                bitmap,
                revision: 0,
            };
            obj.set_top_left(self.layout.positions[slot]);
            self.objects.push(obj);
            self.slots.assign(slot, id);
        }
        self.restack();
        self.ready = true;
        log::info!("Collage ready with {} photos", self.slots.len());
    }

    /// Decode `photos` concurrently, then install them all at once.
    ///
    /// The surface reports not ready until every decode has finished, so a
    /// render never shows a partial set. Photos that fail to decode leave
    /// their slot empty.
    pub async fn load_photos(&mut self, photos: &[Photo]) {
        self.ready = false;
        let frames = decode_photos(photos.to_vec()).await;
        self.install_photos(frames_by_slot(frames));
    }

    fn reposition_photos(&mut self) {
        let positions = self.layout.positions;
        let placements: Vec<(usize, ObjectId)> = self.slots.occupied().collect();
        for (slot, id) in placements {
            if let Some(obj) = self.object_mut(id) {
                obj.kind = ObjectKind::Photo { slot };
                obj.set_top_left(positions[slot]);
            }
        }
    }

    /// Switch layout. Photos keep their slots; only positions change.
    pub fn set_layout(&mut self, mode: LayoutMode) {
        if mode == self.layout.mode {
            return;
        }
        log::info!("Layout: {} -> {}", self.layout.mode, mode);
        self.layout = compute_layout(mode, &self.options.metrics);
        self.reposition_photos();
        self.rebuild_title();
    }

    pub fn set_theme(&mut self, index: usize) {
        self.theme_index = index % THEMES.len();
        log::info!("Theme: {}", self.theme().name);
        self.rebuild_title();
    }

    pub fn cycle_theme(&mut self) {
        self.set_theme(self.theme_index + 1);
    }

    fn rebuild_title(&mut self) {
        if let Some(old) = self.title.take() {
            self.objects.retain(|o| o.id != old);
        }
        let spec = TextSpec {
            text: self.options.title.clone(),
            color: self.theme().text,
            size: self.options.title_size,
            bold: true,
            effect: TextEffect::None,
        };
        let id = self.alloc_id();
        let bitmap = Arc::new(self.text.render(&spec));
        self.objects.insert(
            0,
            SurfaceObject {
                id,
                kind: ObjectKind::Title,
                transform: Transform::at(self.layout.title_anchor(), 1.0),
                controls: Controls::NONE,
                selectable: false,
                image: None,
                bitmap,
                revision: 0,
            },
        );
        self.title = Some(id);
        self.restack();
    }

    /// Title bottom-most, photos above it, decorations on top; relative
    /// order inside each band is kept.
    fn restack(&mut self) {
        let band = |o: &SurfaceObject| match o.kind {
            ObjectKind::Title => 0,
            ObjectKind::Photo { .. } => 1,
            _ => 2,
        };
        self.objects.sort_by_key(band);
    }

    // ── Decorations ─────────────────────────────────────────────────────────

    fn alloc_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push_decoration(&mut self, kind: ObjectKind, bitmap: RgbaImage, transform: Transform, image: bool) -> ObjectId {
        let id = self.alloc_id();
        let bitmap = Arc::new(bitmap);
        self.objects.push(SurfaceObject {
            id,
            kind,
            transform,
            controls: Controls::DECORATION,
            selectable: true,
            image: image.then(|| ImageContent {
                base: bitmap.clone(),
                original: None,
                style: StyleFilter::Original,
            }),
            bitmap,
            revision: 0,
        });
        self.selected = Some(id);
        id
    }

    /// Add a sticker centred on the canvas at 20 % scale and select it.
    pub fn add_sticker(&mut self, image: RgbaImage) -> ObjectId {
        let center = Point::new(self.layout.canvas_width / 2.0, self.layout.canvas_height / 2.0);
        let id = self.push_decoration(
            ObjectKind::Sticker,
            image,
            Transform::at(center, STICKER_SCALE),
            true,
        );
        log::debug!("Added sticker {id}");
        id
    }

    /// Add a text decoration and select it. Blank text adds nothing.
    pub fn add_text(&mut self, spec: TextSpec) -> Option<ObjectId> {
        if spec.text.trim().is_empty() {
            return None;
        }
        let bitmap = self.text.render(&spec);
        let mut transform = Transform::at(Point::default(), 1.0);
        transform.center = Point::new(
            self.options.metrics.photo_width / 2.0 + bitmap.width() as f32 / 2.0,
            self.options.metrics.photo_height / 2.0 + bitmap.height() as f32 / 2.0,
        );
        let id = self.push_decoration(ObjectKind::Text(spec), bitmap, transform, false);
        log::debug!("Added text {id}");
        Some(id)
    }

    /// Re-render an existing text decoration with new content or styling.
    pub fn update_text(&mut self, id: ObjectId, spec: TextSpec) -> Result<()> {
        if spec.text.trim().is_empty() {
            return self.delete_object(id);
        }
        let bitmap = Arc::new(self.text.render(&spec));
        let obj = self.object_mut(id).ok_or(EditorError::UnknownObject)?;
        if !matches!(obj.kind, ObjectKind::Text(_)) {
            return Err(EditorError::NothingSelected.into());
        }
        obj.kind = ObjectKind::Text(spec);
        obj.bitmap = bitmap;
        obj.revision += 1;
        Ok(())
    }

    /// Remove a decoration. Photos and the title refuse.
    pub fn delete_object(&mut self, id: ObjectId) -> Result<()> {
        let idx = self.index_of(id).ok_or(EditorError::UnknownObject)?;
        if !self.objects[idx].kind.is_decoration() {
            return Err(EditorError::PhotoNotDeletable.into());
        }
        self.objects.remove(idx);
        if self.selected == Some(id) {
            self.selected = None;
        }
        if matches!(self.drag, Some(DragState::Moving { id: d, .. }) if d == id) {
            self.drag = None;
        }
        log::debug!("Deleted {id}");
        Ok(())
    }

    pub fn delete_selected(&mut self) -> Result<()> {
        let id = self.selected.ok_or(EditorError::NothingSelected)?;
        self.delete_object(id)
    }

    pub fn bring_to_front(&mut self, id: ObjectId) {
        if let Some(idx) = self.index_of(id) {
            let obj = self.objects.remove(idx);
            self.objects.push(obj);
            self.restack();
        }
    }

    pub fn send_to_back(&mut self, id: ObjectId) {
        if let Some(idx) = self.index_of(id) {
            let obj = self.objects.remove(idx);
            self.objects.insert(0, obj);
            self.restack();
        }
    }

    // ── Selection and pointer ───────────────────────────────────────────────

    pub fn select(&mut self, id: Option<ObjectId>) {
        self.selected = id.filter(|id| self.object(*id).is_some_and(|o| o.selectable));
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.drag = None;
    }

    /// Topmost selectable object under `p`.
    pub fn hit_test(&self, p: Point) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.selectable && o.contains(p))
            .map(|o| o.id)
    }

    /// Handle of the selected object under `p`.
    pub fn hit_control(&self, p: Point) -> Option<(ObjectId, Control)> {
        let obj = self.selected_object()?;
        obj.control_at(p).map(|c| (obj.id, c))
    }

    /// Primary button pressed at `p`.
    pub fn pointer_down(&mut self, p: Point) -> PointerHit {
        if let Some((id, control)) = self.hit_control(p) {
            let Some(obj) = self.object(id) else {
                return PointerHit::Nothing;
            };
            let center = obj.transform.center;
            match control {
                Control::Delete => {
                    return match self.delete_object(id) {
                        Ok(()) => PointerHit::Deleted(id),
                        Err(_) => PointerHit::Nothing,
                    };
                }
                Control::Resize => {
                    self.drag = Some(DragState::Resizing {
                        id,
                        start_dist: center.distance_sq(p).sqrt().max(1.0),
                        start_scale: (obj.transform.scale_x, obj.transform.scale_y),
                    });
                }
                Control::Rotate => {
                    self.drag = Some(DragState::Rotating {
                        id,
                        start_angle: obj.transform.angle,
                        start_pointer: pointer_angle(center, p),
                    });
                }
            }
            return PointerHit::Control(id, control);
        }

        match self.hit_test(p) {
            Some(id) => {
                self.selected = Some(id);
                let center = self.object(id).map(|o| o.transform.center).unwrap_or(p);
                self.drag = Some(DragState::Moving {
                    id,
                    grab: Point::new(center.x - p.x, center.y - p.y),
                });
                PointerHit::Object(id)
            }
            None => {
                self.clear_selection();
                PointerHit::Nothing
            }
        }
    }

    /// Pointer moved to `p` with the primary button held.
    pub fn pointer_move(&mut self, p: Point) {
        let Some(drag) = self.drag else {
            return;
        };
        match drag {
            DragState::Moving { id, grab } => {
                if let Some(obj) = self.object_mut(id) {
                    obj.transform.center = Point::new(p.x + grab.x, p.y + grab.y);
                }
            }
            DragState::Resizing {
                id,
                start_dist,
                start_scale,
            } => {
                if let Some(obj) = self.object_mut(id) {
                    let factor = obj.transform.center.distance_sq(p).sqrt() / start_dist;
                    obj.transform.scale_x = (start_scale.0 * factor).clamp(MIN_SCALE, MAX_SCALE);
                    obj.transform.scale_y = (start_scale.1 * factor).clamp(MIN_SCALE, MAX_SCALE);
                }
            }
            DragState::Rotating {
                id,
                start_angle,
                start_pointer,
            } => {
                if let Some(obj) = self.object_mut(id) {
                    let now = pointer_angle(obj.transform.center, p);
                    obj.transform.angle = (start_angle + now - start_pointer).rem_euclid(360.0);
                }
            }
        }
    }

    /// Primary button released. Dropping a photo runs the slot rule.
    pub fn pointer_up(&mut self) -> Option<DropOutcome<ObjectId>> {
        let DragState::Moving { id, .. } = self.drag.take()? else {
            return None;
        };
        let center = self.object(id).filter(|o| o.kind.is_photo())?.transform.center;
        self.drop_photo(id, center)
    }

    /// Resolve a photo dropped with its centre at `center`: swap into the
    /// target slot or snap back to its own.
    pub fn drop_photo(&mut self, id: ObjectId, center: Point) -> Option<DropOutcome<ObjectId>> {
        let outcome = slots::reassign(&mut self.slots, &self.layout, id, center)?;
        match outcome {
            DropOutcome::Swapped {
                from,
                to,
                displaced,
            } => log::debug!("Photo {id} slot {from} -> {to}, {displaced} -> {from}"),
            DropOutcome::Moved { from, to } => log::debug!("Photo {id} slot {from} -> {to}"),
            DropOutcome::SnappedBack { slot } => log::debug!("Photo {id} snapped back to {slot}"),
        }
        self.reposition_photos();
        Some(outcome)
    }

    // ── Image edits ─────────────────────────────────────────────────────────

    fn selected_image_mut(&mut self) -> std::result::Result<&mut SurfaceObject, EditorError> {
        let id = self.selected.ok_or(EditorError::NoImageSelected)?;
        self.object_mut(id)
            .filter(|o| o.image.is_some())
            .ok_or(EditorError::NoImageSelected)
    }

    /// Apply a style to the selected photo or sticker.
    pub fn apply_style(&mut self, style: StyleFilter) -> Result<()> {
        let background = self.theme().background;
        let obj = self.selected_image_mut()?;
        restyle(obj, style, background);
        log::debug!("Style {:?} on {}", style, obj.id);
        Ok(())
    }

    /// Mirror the selected object horizontally.
    pub fn flip_selected(&mut self) -> Result<()> {
        let id = self.selected.ok_or(EditorError::NothingSelected)?;
        let obj = self.object_mut(id).ok_or(EditorError::UnknownObject)?;
        obj.transform.flip_x = !obj.transform.flip_x;
        Ok(())
    }

    /// Unfiltered pixels of the selected image object.
    pub fn selected_image(&self) -> std::result::Result<SelectedImage, EditorError> {
        let obj = self.selected_object().ok_or(EditorError::NoImageSelected)?;
        let content = obj.image.as_ref().ok_or(EditorError::NoImageSelected)?;
        Ok(SelectedImage {
            id: obj.id,
            base: content.base.clone(),
            has_original: content.original.is_some(),
        })
    }

    /// Swap an image object's pixels in place, keeping its transform, slot
    /// and controls. `original` is remembered for [`Self::restore_original`].
    /// Any style filter is dropped.
    pub fn replace_image(
        &mut self,
        id: ObjectId,
        image: RgbaImage,
        original: Option<Arc<RgbaImage>>,
    ) -> Result<()> {
        let obj = self.object_mut(id).ok_or(EditorError::UnknownObject)?;
        if obj.image.is_none() {
            return Err(EditorError::NoImageSelected.into());
        }
        // Keep the displayed size if the new pixels differ in size.
        let (w, h) = obj.size();
        let base = Arc::new(image);
        obj.transform.scale_x = w / base.width().max(1) as f32;
        obj.transform.scale_y = h / base.height().max(1) as f32;
        obj.image = Some(ImageContent {
            base: base.clone(),
            original,
            style: StyleFilter::Original,
        });
        obj.bitmap = base;
        obj.revision += 1;
        let is_photo = obj.kind.is_photo();
        if is_photo {
            self.send_to_back(id);
        } else {
            self.bring_to_front(id);
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Put back the pixels saved by [`Self::replace_image`]. Returns
    /// `Ok(false)` if there was nothing to restore.
    pub fn restore_original(&mut self, id: ObjectId) -> Result<bool> {
        let original = self
            .object(id)
            .ok_or(EditorError::UnknownObject)?
            .image
            .as_ref()
            .and_then(|i| i.original.clone());
        let Some(original) = original else {
            return Ok(false);
        };
        let image = Arc::try_unwrap(original).unwrap_or_else(|shared| (*shared).clone());
        self.replace_image(id, image, None)?;
        Ok(true)
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Flatten everything to one image, in stacking order.
    pub fn render(&self) -> RgbaImage {
        render::flatten(self)
    }
}

fn restyle(obj: &mut SurfaceObject, style: StyleFilter, background: Color) {
    let Some(content) = obj.image.as_mut() else {
        return;
    };
    content.style = style;
    obj.bitmap = match style {
        StyleFilter::Original => content.base.clone(),
        _ => Arc::new(style.apply(&content.base, background)),
    };
    obj.revision += 1;
}

fn pointer_angle(center: Point, p: Point) -> f32 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}

/// Keep each decode result at its slot index, logging and blanking failures.
pub fn frames_by_slot(decoded: Vec<Result<RgbaImage>>) -> Vec<Option<RgbaImage>> {
    decoded
        .into_iter()
        .enumerate()
        .map(|(slot, result)| match result {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Photo for slot {slot} could not be decoded: {e}");
                None
            }
        })
        .collect()
}

/// Decode photos on the blocking pool, all at once, and wait for every one.
pub async fn decode_photos(photos: Vec<Photo>) -> Vec<Result<RgbaImage>> {
    let tasks = photos.into_iter().take(SLOT_COUNT).map(|photo| {
        tokio::task::spawn_blocking(move || photo.decode())
    });
    futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(crate::error::Error::Io(std::io::Error::other(e.to_string())))
            })
        })
        .collect()
}
