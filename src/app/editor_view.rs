//! Collage editor: toolbar plus an interactive canvas.
//!
//! The canvas draws every surface object as a textured quad through its
//! rotated corners, so what is on screen matches the exported PNG.

use super::color_image;
use crate::collage::{Collage, Control, ObjectId, ObjectKind, PointerHit, SurfaceObject, TextSpec};
use crate::color::Color;
use crate::error::Error;
use crate::filters::StyleFilter;
use crate::layout::{LayoutMode, Point};
use eframe::egui;
use std::collections::HashMap;
use std::path::PathBuf;

const SELECTION: egui::Color32 = egui::Color32::from_rgb(0, 120, 255);

pub(crate) enum EditorAction {
    None,
    Hint(String),
    Error(Error),
    RemoveBackground,
    LoadSticker(PathBuf),
    Download,
    Retake,
}

/// Screen placement of the collage canvas.
#[derive(Clone, Copy)]
struct View {
    origin: egui::Pos2,
    zoom: f32,
}

impl View {
    fn fit(outer: egui::Rect, width: f32, height: f32) -> Self {
        let zoom = (outer.width() / width).min(outer.height() / height).min(1.0);
        let size = egui::vec2(width, height) * zoom;
        Self {
            origin: outer.center() - size / 2.0,
            zoom,
        }
    }

    fn to_screen(self, p: Point) -> egui::Pos2 {
        self.origin + egui::vec2(p.x, p.y) * self.zoom
    }

    fn to_canvas(self, p: egui::Pos2) -> Point {
        let v = (p - self.origin) / self.zoom;
        Point::new(v.x, v.y)
    }
}

pub(crate) struct EditorView {
    pub(crate) session: u64,
    pub(crate) collage: Collage,
    textures: HashMap<ObjectId, (u64, egui::TextureHandle)>,
    text_input: String,
    text_color: [u8; 3],
    neon: bool,
    dragging: bool,
}

impl EditorView {
    pub(crate) fn new(session: u64, collage: Collage) -> Self {
        Self {
            session,
            collage,
            textures: HashMap::new(),
            text_input: String::new(),
            text_color: [255, 255, 255],
            neon: false,
            dragging: false,
        }
    }

    fn text_spec(&self) -> TextSpec {
        let [r, g, b] = self.text_color;
        TextSpec::decoration(self.text_input.trim(), Color::rgb(r, g, b), self.neon)
    }

    fn selected_text(&self) -> Option<ObjectId> {
        self.collage
            .selected_object()
            .filter(|o| matches!(o.kind, ObjectKind::Text(_)))
            .map(|o| o.id)
    }

    fn sync_textures(&mut self, ctx: &egui::Context) {
        let collage = &self.collage;
        self.textures.retain(|id, _| collage.object(*id).is_some());
        for obj in collage.objects() {
            let fresh = self
                .textures
                .get(&obj.id)
                .is_some_and(|(rev, _)| *rev == obj.revision());
            if fresh {
                continue;
            }
            let tex = ctx.load_texture(
                format!("object-{}", obj.id),
                color_image(obj.bitmap()),
                egui::TextureOptions::LINEAR,
            );
            self.textures.insert(obj.id, (obj.revision(), tex));
        }
    }

    pub(crate) fn ui(&mut self, ctx: &egui::Context, stickers: &[PathBuf], busy: bool) -> EditorAction {
        let mut action = EditorAction::None;
        let ready = self.collage.is_ready();

        if ready && !ctx.wants_keyboard_input() {
            let (delete, save, escape) = ctx.input(|i| {
                (
                    i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                    i.modifiers.command && i.key_pressed(egui::Key::S),
                    i.key_pressed(egui::Key::Escape),
                )
            });
            if delete && self.collage.selected().is_some() {
                if let Err(e) = self.collage.delete_selected() {
                    action = EditorAction::Error(e);
                }
            }
            if escape {
                self.collage.clear_selection();
            }
            if save {
                action = EditorAction::Download;
            }
        }

        egui::TopBottomPanel::top("editor_toolbar").show(ctx, |ui| {
            ui.add_enabled_ui(ready, |ui| {
                ui.horizontal_wrapped(|ui| {
                    if let Some(a) = self.toolbar(ui, stickers, busy) {
                        action = a;
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if !ready {
                ui.centered_and_justified(|ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Preparing photos…");
                    });
                });
                return;
            }
            self.sync_textures(ctx);
            self.canvas(ui);
        });

        action
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, stickers: &[PathBuf], busy: bool) -> Option<EditorAction> {
        let mut action = None;

        let mut mode = self.collage.mode();
        for m in LayoutMode::ALL {
            ui.selectable_value(&mut mode, m, m.as_str());
        }
        if mode != self.collage.mode() {
            self.collage.set_layout(mode);
        }
        if ui.button(format!("🎨 {}", self.collage.theme().name)).clicked() {
            self.collage.cycle_theme();
        }
        ui.separator();

        ui.menu_button("Sticker", |ui| {
            for path in stickers {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if ui.button(name).clicked() {
                    action = Some(EditorAction::LoadSticker(path.clone()));
                    ui.close_menu();
                }
            }
            if !stickers.is_empty() {
                ui.separator();
            }
            if ui.button("From file…").clicked() {
                ui.close_menu();
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Image", &["png", "jpg", "jpeg", "webp"])
                    .pick_file()
                {
                    action = Some(EditorAction::LoadSticker(path));
                }
            }
        });
        ui.separator();

        ui.add(egui::TextEdit::singleline(&mut self.text_input).hint_text("Text").desired_width(140.0));
        ui.color_edit_button_srgb(&mut self.text_color);
        ui.checkbox(&mut self.neon, "Neon");
        match self.selected_text() {
            Some(id) => {
                if ui.button("Update text").clicked() {
                    if let Err(e) = self.collage.update_text(id, self.text_spec()) {
                        action = Some(EditorAction::Error(e));
                    }
                }
            }
            None => {
                if ui.button("Add text").clicked() {
                    if self.collage.add_text(self.text_spec()).is_none() {
                        action = Some(EditorAction::Hint("Type some text first".into()));
                    }
                }
            }
        }
        ui.separator();

        let selected = self.collage.selected_object();
        let current = selected
            .and_then(|o| o.image())
            .map(|i| i.style)
            .unwrap_or(StyleFilter::Original);
        let has_image = selected.is_some_and(|o| o.image().is_some());
        let has_original = selected.is_some_and(|o| o.has_original());
        let mut style = current;
        ui.add_enabled_ui(has_image, |ui| {
            egui::ComboBox::from_id_salt("style")
                .selected_text(style.label())
                .show_ui(ui, |ui| {
                    for s in StyleFilter::ALL {
                        ui.selectable_value(&mut style, s, s.label());
                    }
                });
        });
        if style != current {
            if let Err(e) = self.collage.apply_style(style) {
                action = Some(EditorAction::Error(e));
            }
        }

        let label = if has_original { "Restore BG" } else { "Remove BG" };
        if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
            action = Some(EditorAction::RemoveBackground);
        }
        if ui.button("Mirror").clicked() {
            if let Err(e) = self.collage.flip_selected() {
                action = Some(EditorAction::Error(e));
            }
        }

        let decoration = self
            .collage
            .selected_object()
            .filter(|o| o.kind.is_decoration())
            .map(|o| o.id);
        ui.add_enabled_ui(decoration.is_some(), |ui| {
            if ui.button("Front").clicked() {
                if let Some(id) = decoration {
                    self.collage.bring_to_front(id);
                }
            }
            if ui.button("Back").clicked() {
                if let Some(id) = decoration {
                    self.collage.send_to_back(id);
                }
            }
        });
        ui.separator();

        if ui.button("💾 Download").clicked() {
            action = Some(EditorAction::Download);
        }
        if ui.button("↺ Retake").clicked() {
            action = Some(EditorAction::Retake);
        }
        action
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let layout = self.collage.layout();
        let view = View::fit(canvas_rect.shrink(12.0), layout.canvas_width, layout.canvas_height);
        let page = egui::Rect::from_min_size(
            view.origin,
            egui::vec2(layout.canvas_width, layout.canvas_height) * view.zoom,
        );

        if response.drag_started_by(egui::PointerButton::Primary) {
            let origin = ui
                .input(|i| i.pointer.press_origin())
                .or(response.hover_pos());
            if let Some(pos) = origin {
                let hit = self.collage.pointer_down(view.to_canvas(pos));
                self.dragging = !matches!(hit, PointerHit::Nothing | PointerHit::Deleted(_));
            }
        }
        if self.dragging && response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.collage.pointer_move(view.to_canvas(pos));
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) && self.dragging {
            self.dragging = false;
            self.collage.pointer_up();
        }
        if response.clicked_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                self.collage.pointer_down(view.to_canvas(pos));
                self.collage.pointer_up();
            }
        }

        painter.rect_filled(page, 0.0, self.collage.theme().background.to_egui());
        for obj in self.collage.objects() {
            if let Some((_, tex)) = self.textures.get(&obj.id) {
                painter.add(object_mesh(obj, tex.id(), view));
            }
        }
        if let Some(obj) = self.collage.selected_object() {
            draw_selection(&painter, obj, view);
        }
    }
}

fn object_mesh(obj: &SurfaceObject, texture: egui::TextureId, view: View) -> egui::Shape {
    let uvs = if obj.transform.flip_x {
        [(1.0, 0.0), (0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
    } else {
        [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
    };
    let mut mesh = egui::Mesh::with_texture(texture);
    for (corner, (u, v)) in obj.corners().into_iter().zip(uvs) {
        mesh.vertices.push(egui::epaint::Vertex {
            pos: view.to_screen(corner),
            uv: egui::pos2(u, v),
            color: egui::Color32::WHITE,
        });
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    egui::Shape::mesh(mesh)
}

fn draw_selection(painter: &egui::Painter, obj: &SurfaceObject, view: View) {
    let stroke = egui::Stroke::new(1.5, SELECTION);
    let outline: Vec<egui::Pos2> = obj.corners().into_iter().map(|p| view.to_screen(p)).collect();
    painter.add(egui::Shape::closed_line(outline, stroke));

    let radius = 7.0;
    if let Some(p) = obj.control_position(Control::Rotate) {
        let top = view.to_screen(Point::new(
            (obj.corners()[0].x + obj.corners()[1].x) / 2.0,
            (obj.corners()[0].y + obj.corners()[1].y) / 2.0,
        ));
        let handle = view.to_screen(p);
        painter.line_segment([top, handle], stroke);
        painter.circle(handle, radius, egui::Color32::WHITE, stroke);
    }
    if let Some(p) = obj.control_position(Control::Resize) {
        let handle = view.to_screen(p);
        painter.rect(
            egui::Rect::from_center_size(handle, egui::vec2(radius * 2.0, radius * 2.0)),
            2.0,
            egui::Color32::WHITE,
            stroke,
            egui::StrokeKind::Middle,
        );
    }
    if let Some(p) = obj.control_position(Control::Delete) {
        let handle = view.to_screen(p);
        painter.circle_filled(handle, radius + 1.0, egui::Color32::from_rgb(220, 50, 50));
        let d = radius * 0.5;
        let white = egui::Stroke::new(2.0, egui::Color32::WHITE);
        painter.line_segment([handle + egui::vec2(-d, -d), handle + egui::vec2(d, d)], white);
        painter.line_segment([handle + egui::vec2(-d, d), handle + egui::vec2(d, -d)], white);
    }
}
