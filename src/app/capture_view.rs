//! Capture screen: viewfinder, shutter, self-timer and the photo strip.

use super::{color_image, AppEvent, Jobs};
use crate::capture::{CameraStatus, CaptureController, Shutter, MAX_PHOTOS};
use crate::config::Config;
use crate::error::Error;
use crate::photo::Photo;
use eframe::egui;
use egui_extras::{Size, StripBuilder};
use std::time::{Duration, Instant};

const PREVIEW_INTERVAL: Duration = Duration::from_millis(33);

pub(crate) enum CaptureAction {
    None,
    Finish,
    Error(Error),
}

pub(crate) struct CaptureView {
    pub(crate) controller: CaptureController,
    preview: Option<egui::TextureHandle>,
    last_preview: Option<Instant>,
    thumbnails: Vec<(Photo, egui::TextureHandle)>,
}

impl CaptureView {
    pub(crate) fn new(config: &Config) -> Self {
        let mut controller = CaptureController::new(config.capture_settings());
        controller.mirror = config.capture.mirror;
        controller.timer = config.capture.timer;
        controller.grid_overlay = config.capture.grid_overlay;
        Self {
            controller,
            preview: None,
            last_preview: None,
            thumbnails: Vec::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.controller.reset();
        self.thumbnails.clear();
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if self
            .last_preview
            .is_some_and(|t| now.duration_since(t) < PREVIEW_INTERVAL)
        {
            return;
        }
        self.last_preview = Some(now);
        let Some(frame) = self.controller.preview_frame() else {
            return;
        };
        let image = color_image(&frame);
        match &mut self.preview {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.preview = Some(ctx.load_texture("viewfinder", image, egui::TextureOptions::LINEAR))
            }
        }
    }

    fn refresh_thumbnails(&mut self, ctx: &egui::Context) {
        let photos = self.controller.photos();
        let unchanged = photos.len() == self.thumbnails.len()
            && photos.iter().zip(&self.thumbnails).all(|(p, (t, _))| p == t);
        if unchanged {
            return;
        }
        self.thumbnails = photos
            .iter()
            .enumerate()
            .filter_map(|(i, photo)| {
                let frame = photo
                    .decode()
                    .map_err(|e| log::warn!("Thumbnail {i} failed: {e}"))
                    .ok()?;
                let small = image::imageops::thumbnail(&frame, 320, 180);
                let tex = ctx.load_texture(
                    format!("thumb-{i}"),
                    color_image(&small),
                    egui::TextureOptions::LINEAR,
                );
                Some((photo.clone(), tex))
            })
            .collect();
    }

    fn press_shutter(&mut self, jobs: &Jobs) -> CaptureAction {
        let notify = jobs.notifier();
        match self
            .controller
            .shutter(jobs.runtime(), move |ev| notify(AppEvent::Countdown(ev)))
        {
            Ok(Shutter::Full) => log::debug!("Shutter pressed with a full roll"),
            Ok(_) => {}
            Err(e) => return CaptureAction::Error(e),
        }
        CaptureAction::None
    }

    pub(crate) fn ui(&mut self, ctx: &egui::Context, jobs: &Jobs) -> CaptureAction {
        self.refresh_preview(ctx);
        self.refresh_thumbnails(ctx);
        let mut action = CaptureAction::None;

        let live = self.controller.is_live();
        let can_shoot = live && !self.controller.is_complete() && !self.controller.is_counting_down();

        let space = !ctx.wants_keyboard_input() && ctx.input(|i| i.key_pressed(egui::Key::Space));
        if space && can_shoot {
            action = self.press_shutter(jobs);
        }

        egui::SidePanel::right("capture_tools")
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Camera");
                ui.checkbox(&mut self.controller.mirror, "Mirror");
                ui.checkbox(&mut self.controller.grid_overlay, "Grid");
                let timer_label = format!("{}s timer", self.controller.settings().countdown_seconds);
                ui.checkbox(&mut self.controller.timer, timer_label);
                ui.separator();

                let shutter = ui.add_enabled(can_shoot, egui::Button::new("📸 Capture"));
                if shutter.clicked() {
                    action = self.press_shutter(jobs);
                }
                if self.controller.is_counting_down() && ui.button("Cancel timer").clicked() {
                    self.controller.cancel_countdown();
                }
                ui.separator();
                ui.label(format!(
                    "{}/{} photos",
                    self.controller.photos().len(),
                    MAX_PHOTOS
                ));
                let finish = ui.add_enabled(
                    self.controller.is_complete(),
                    egui::Button::new("Finish ▶"),
                );
                if finish.clicked() {
                    action = CaptureAction::Finish;
                }
            });

        egui::TopBottomPanel::bottom("photo_strip")
            .exact_height(150.0)
            .show(ctx, |ui| {
                let mut delete = None;
                StripBuilder::new(ui)
                    .sizes(Size::remainder(), MAX_PHOTOS)
                    .horizontal(|mut strip| {
                        for index in 0..MAX_PHOTOS {
                            strip.cell(|ui| match self.thumbnails.get(index) {
                                Some((_, tex)) => {
                                    ui.add(egui::Image::new(tex).shrink_to_fit());
                                    if ui.small_button("✕ Delete").clicked() {
                                        delete = Some(index);
                                    }
                                }
                                None => {
                                    ui.centered_and_justified(|ui| {
                                        ui.weak(format!("{}", index + 1));
                                    });
                                }
                            });
                        }
                    });
                if let Some(index) = delete {
                    self.controller.delete(index);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let rect = ui.available_rect_before_wrap();
            let painter = ui.painter_at(rect);
            painter.rect_filled(rect, 0.0, egui::Color32::from_gray(20));

            match self.controller.status() {
                CameraStatus::Error(message) => {
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        message,
                        egui::FontId::proportional(20.0),
                        egui::Color32::from_rgb(255, 110, 110),
                    );
                    return;
                }
                CameraStatus::Opening | CameraStatus::Idle => {
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Starting camera…",
                        egui::FontId::proportional(20.0),
                        egui::Color32::GRAY,
                    );
                    return;
                }
                CameraStatus::Live => {}
            }

            let Some(tex) = &self.preview else {
                return;
            };
            let view = fit_rect(rect, tex.size_vec2());
            painter.image(
                tex.id(),
                view,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );

            if self.controller.grid_overlay {
                let stroke = egui::Stroke::new(1.0, egui::Color32::from_white_alpha(90));
                for k in 1..3 {
                    let t = k as f32 / 3.0;
                    let x = egui::lerp(view.x_range(), t);
                    let y = egui::lerp(view.y_range(), t);
                    painter.line_segment([egui::pos2(x, view.top()), egui::pos2(x, view.bottom())], stroke);
                    painter.line_segment([egui::pos2(view.left(), y), egui::pos2(view.right(), y)], stroke);
                }
            }

            if let Some(n) = self.controller.countdown_remaining() {
                painter.text(
                    view.center(),
                    egui::Align2::CENTER_CENTER,
                    n.to_string(),
                    egui::FontId::proportional(view.height() / 3.0),
                    egui::Color32::from_white_alpha(220),
                );
            }

            if self.controller.flash_active(Instant::now()) {
                painter.rect_filled(view, 0.0, egui::Color32::from_white_alpha(200));
            }
        });

        if self.controller.is_live() {
            ctx.request_repaint_after(PREVIEW_INTERVAL);
        }
        action
    }
}

/// Largest rect with `size`'s aspect ratio centred in `outer`.
fn fit_rect(outer: egui::Rect, size: egui::Vec2) -> egui::Rect {
    let scale = (outer.width() / size.x).min(outer.height() / size.y);
    egui::Rect::from_center_size(outer.center(), size * scale)
}
