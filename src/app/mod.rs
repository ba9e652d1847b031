//! Desktop shell: a capture screen, then the collage editor.
//!
//! Slow work (opening the camera, decoding photos, loading the model,
//! segmentation, reading sticker files, the self-timer) runs on the tokio
//! runtime. Results come back as [`AppEvent`]s on a channel that is drained
//! at the start of every frame, so UI state is only ever touched from
//! `update`.

mod capture_view;
mod editor_view;

use crate::capture::{open_device, CameraBackend, CameraDevice, CountdownEvent};
use crate::collage::{decode_photos, frames_by_slot, Collage, TextRenderer};
use crate::config::{expand_tilde, Config};
use crate::error::{CameraError, Error, Result, SegmentationError};
use crate::export;
use crate::segmentation::{BackgroundRemover, RemovalResult, SharedSegmenter};
use capture_view::{CaptureAction, CaptureView};
use editor_view::{EditorAction, EditorView};
use eframe::egui;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Results of background work, delivered to the UI thread.
pub enum AppEvent {
    CameraOpened(std::result::Result<Box<dyn CameraDevice>, CameraError>),
    Countdown(CountdownEvent),
    PhotosDecoded {
        session: u64,
        frames: Vec<Result<RgbaImage>>,
    },
    ModelLoaded(std::result::Result<SharedSegmenter, SegmentationError>),
    RemovalFinished {
        session: u64,
        result: RemovalResult,
    },
    StickerLoaded {
        session: u64,
        image: Result<RgbaImage>,
    },
}

/// Handle for starting background work whose result comes back as an event.
#[derive(Clone)]
pub(crate) struct Jobs {
    runtime: Handle,
    tx: UnboundedSender<AppEvent>,
    ctx: egui::Context,
}

impl Jobs {
    /// Callback that posts an event and wakes the UI.
    pub(crate) fn notifier(&self) -> impl Fn(AppEvent) + Send + Sync + 'static {
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        move |event| {
            if tx.send(event).is_err() {
                log::debug!("Event dropped: UI has shut down");
            }
            ctx.request_repaint();
        }
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn spawn_blocking<F, R>(&self, job: F, wrap: fn(R) -> AppEvent)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let notify = self.notifier();
        self.runtime.spawn_blocking(move || notify(wrap(job())));
    }

    pub(crate) fn spawn<Fut>(&self, fut: Fut)
    where
        Fut: std::future::Future<Output = AppEvent> + Send + 'static,
    {
        let notify = self.notifier();
        self.runtime.spawn(async move { notify(fut.await) });
    }
}

pub struct FrameCraftApp {
    config: Config,
    backend: Arc<dyn CameraBackend>,
    text: TextRenderer,
    jobs: Jobs,
    events: UnboundedReceiver<AppEvent>,
    capture: CaptureView,
    editor: Option<EditorView>,
    remover: BackgroundRemover,
    stickers: Vec<PathBuf>,
    /// Bumped on every new editor session; stale results are dropped.
    session: u64,
    /// Short guidance line in the status bar.
    hint: Option<String>,
    /// Dismissable alert (model failures).
    alert: Option<String>,
}

impl FrameCraftApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Handle,
        config: Config,
        backend: Arc<dyn CameraBackend>,
        text: TextRenderer,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let jobs = Jobs {
            runtime,
            tx,
            ctx: cc.egui_ctx.clone(),
        };
        let stickers = config
            .editor
            .sticker_dir
            .as_deref()
            .map(|dir| list_stickers(&expand_tilde(dir)))
            .unwrap_or_default();

        let mut app = Self {
            capture: CaptureView::new(&config),
            config,
            backend,
            text,
            jobs,
            events,
            editor: None,
            remover: BackgroundRemover::new(),
            stickers,
            session: 0,
            hint: None,
            alert: None,
        };
        app.load_model();
        app.open_camera();
        app
    }

    #[cfg(feature = "onnx")]
    fn load_model(&mut self) {
        use crate::segmentation::SegformerSegmenter;
        use std::sync::Mutex;

        let Some(path) = self.config.segmentation.model_path.as_deref().map(expand_tilde) else {
            self.remover.model_failed(SegmentationError::Model(
                "no model_path configured under [segmentation]".into(),
            ));
            return;
        };
        let prefer_gpu = self.config.segmentation.prefer_gpu;
        self.jobs.spawn_blocking(
            move || {
                SegformerSegmenter::load(&path, prefer_gpu)
                    .map(|s| Arc::new(Mutex::new(s)) as SharedSegmenter)
            },
            AppEvent::ModelLoaded,
        );
    }

    #[cfg(not(feature = "onnx"))]
    fn load_model(&mut self) {
        self.remover.model_failed(SegmentationError::Model(
            "this build has no segmentation backend (enable the `onnx` feature)".into(),
        ));
    }

    fn open_camera(&mut self) {
        self.capture.controller.begin_opening();
        let backend = self.backend.clone();
        let constraints = self.capture.controller.settings().constraints;
        self.jobs.spawn_blocking(
            move || open_device(backend.as_ref(), &constraints),
            AppEvent::CameraOpened,
        );
    }

    /// Route an error to the surface its family belongs on.
    fn report(&mut self, err: Error) {
        match err {
            Error::Segmentation(e) => self.alert = Some(e.to_string()),
            Error::Editor(e) => self.hint = Some(e.to_string()),
            // Shown inline on the viewfinder through the camera status.
            Error::Camera(e) => log::error!("{e}"),
            other => {
                log::error!("{other}");
                self.hint = Some(other.to_string());
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::CameraOpened(result) => {
                if self.editor.is_some() {
                    // Finished before the stream came up.
                    if let Ok(mut device) = result {
                        device.release();
                    }
                } else {
                    self.capture.controller.attach(result);
                }
            }
            AppEvent::Countdown(event) => {
                if let Err(e) = self.capture.controller.on_countdown(event) {
                    self.report(e);
                }
            }
            AppEvent::PhotosDecoded { session, frames } => {
                if let Some(editor) = self.editor_for(session) {
                    editor.collage.install_photos(frames_by_slot(frames));
                }
            }
            AppEvent::ModelLoaded(Ok(segmenter)) => self.remover.model_loaded(segmenter),
            AppEvent::ModelLoaded(Err(e)) => self.remover.model_failed(e),
            AppEvent::RemovalFinished { session, result } => {
                // Results from a retaken session are dropped.
                let Some(editor) = self.editor.as_mut().filter(|e| e.session == session) else {
                    log::debug!("Dropping background removal from session {session}");
                    return;
                };
                if let Err(e) = self.remover.complete(&mut editor.collage, result) {
                    self.report(e);
                }
            }
            AppEvent::StickerLoaded { session, image } => match image {
                Ok(image) => {
                    if let Some(editor) = self.editor_for(session) {
                        editor.collage.add_sticker(image);
                    }
                }
                Err(e) => self.report(e),
            },
        }
    }

    fn editor_for(&mut self, session: u64) -> Option<&mut EditorView> {
        self.editor.as_mut().filter(|e| e.session == session)
    }

    /// Leave the capture screen with the photos taken so far.
    fn finish_capture(&mut self) {
        let photos = self.capture.controller.photos().to_vec();
        self.capture.controller.release();
        self.session += 1;
        let session = self.session;
        log::info!("Editing {} photos (session {session})", photos.len());

        let collage = Collage::new(self.config.collage_options(), self.text.clone());
        self.editor = Some(EditorView::new(session, collage));
        self.jobs.spawn(async move {
            AppEvent::PhotosDecoded {
                session,
                frames: decode_photos(photos).await,
            }
        });
    }

    /// Throw the collage away and go back to the camera.
    fn retake(&mut self) {
        log::info!("Retake: discarding collage");
        self.editor = None;
        self.remover.cancel();
        self.capture.reset();
        self.hint = None;
        self.open_camera();
    }

    fn remove_background(&mut self) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let session = editor.session;
        let result = self.remover.request(&mut editor.collage);
        match result {
            Ok(crate::segmentation::Removal::Restored(_)) => self.hint = None,
            Ok(crate::segmentation::Removal::Started(job)) => {
                self.hint = Some("Removing background…".into());
                self.jobs.spawn_blocking(
                    move || (session, job.run()),
                    |(session, result)| AppEvent::RemovalFinished { session, result },
                );
            }
            Err(e) => self.report(e),
        }
    }

    fn load_sticker(&mut self, path: PathBuf) {
        let session = self.session;
        self.jobs.spawn_blocking(
            move || {
                let image = image::open(&path)
                    .map(|img| img.to_rgba8())
                    .map_err(Error::from);
                (session, image)
            },
            |(session, image)| AppEvent::StickerLoaded { session, image },
        );
    }

    fn download(&mut self) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let name = export::export_filename(editor.collage.mode());
        let picked = rfd::FileDialog::new()
            .set_directory(self.config.export_directory())
            .set_file_name(&name)
            .add_filter("PNG image", &["png"])
            .save_file();
        let Some(path) = picked else {
            return;
        };
        let result = export::export_file(&mut editor.collage, &path);
        match result {
            Ok(path) => self.hint = Some(format!("Saved {}", path.display())),
            Err(e) => self.report(e),
        }
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(hint) = &self.hint {
                    ui.label(hint);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let model = if self.remover.is_busy() {
                        "segmenting…"
                    } else if self.remover.is_ready() {
                        "model ready"
                    } else {
                        "no model"
                    };
                    ui.weak(model);
                });
            });
        });
    }

    fn alert_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alert.clone() else {
            return;
        };
        egui::Window::new("Background removal")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.alert = None;
                }
            });
    }
}

impl eframe::App for FrameCraftApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.status_bar(ctx);
        self.alert_window(ctx);

        if let Some(editor) = self.editor.as_mut() {
            let action = editor.ui(ctx, &self.stickers, self.remover.is_busy());
            match action {
                EditorAction::None => {}
                EditorAction::Hint(msg) => self.hint = Some(msg),
                EditorAction::Error(e) => self.report(e),
                EditorAction::RemoveBackground => self.remove_background(),
                EditorAction::LoadSticker(path) => self.load_sticker(path),
                EditorAction::Download => self.download(),
                EditorAction::Retake => self.retake(),
            }
        } else {
            match self.capture.ui(ctx, &self.jobs) {
                CaptureAction::None => {}
                CaptureAction::Finish => self.finish_capture(),
                CaptureAction::Error(e) => self.report(e),
            }
        }
    }
}

/// PNG files of `dir`, sorted by name.
pub fn list_stickers(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::warn!("Sticker directory {} is not readable", dir.display());
        return Vec::new();
    };
    let mut stickers: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    stickers.sort();
    log::debug!("Found {} stickers in {}", stickers.len(), dir.display());
    stickers
}

/// Open the window and run until it is closed.
pub fn run(
    runtime: Handle,
    config: Config,
    backend: Arc<dyn CameraBackend>,
    text: TextRenderer,
) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_title("frame-craft"),
        ..Default::default()
    };
    eframe::run_native(
        "frame-craft",
        options,
        Box::new(move |cc| Ok(Box::new(FrameCraftApp::new(cc, runtime, config, backend, text)))),
    )
}

pub(crate) fn color_image(img: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [img.width() as usize, img.height() as usize],
        img.as_raw(),
    )
}
