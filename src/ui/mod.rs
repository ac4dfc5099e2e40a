use std::{sync::Arc, time::Instant};

use crossbeam_channel::Receiver;
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::{AppConfig, CONNECTOR_STROKE, LANDMARK_STROKE},
    controller::{Controller, Readiness},
    display::StatusPanel,
    error::AppError,
    model_download::ModelDownloadEvent,
    pipeline::{
        Canvas, InferenceWorker, InitEvent, NokhwaCapture, RecognizerBackend, select_camera,
        start_recognizer,
    },
};

mod download;
mod main_view;
mod render_util;

const WINDOW_TITLE: &str = "Gesture Recognizer App";

pub fn launch_ui(app: &mut App, config: AppConfig) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(WINDOW_TITLE.into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    controller: Controller<NokhwaCapture, InferenceWorker>,
    worker: Option<InferenceWorker>,
    init_rx: Receiver<InitEvent>,
    init: InitProgress,
    canvas: Canvas,
    status: StatusPanel,
    notice: Option<String>,
    video_image: Option<Arc<RenderImage>>,
    video_stamp: Option<Instant>,
    canvas_image: Option<Arc<RenderImage>>,
    canvas_revision: Option<u64>,
}

struct InitProgress {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
}

impl AppView {
    fn new(config: AppConfig) -> Self {
        let capture = NokhwaCapture::new(select_camera(config.camera_index));
        let (worker, init_rx) = start_recognizer(RecognizerBackend::from_config(&config));

        Self {
            controller: Controller::new(capture),
            worker: Some(worker),
            init_rx,
            init: InitProgress::new(),
            canvas: Canvas::new(
                config.canvas_width,
                config.canvas_height,
                CONNECTOR_STROKE,
                LANDMARK_STROKE,
            ),
            status: StatusPanel::default(),
            notice: None,
            video_image: None,
            video_stamp: None,
            canvas_image: None,
            canvas_revision: None,
        }
    }

    fn poll_init_events(&mut self) {
        while let Ok(event) = self.init_rx.try_recv() {
            match event {
                InitEvent::Download(event) => self.init.apply(event),
                InitEvent::Ready => {
                    self.init.message = "Gesture recognizer ready".to_string();
                    match self.worker.take() {
                        Some(worker) => self.controller.on_initialized(Ok(worker)),
                        None => log::warn!("recognizer reported ready twice"),
                    }
                }
                InitEvent::Failed(reason) => {
                    self.init.error = Some(reason.clone());
                    self.worker = None;
                    self.controller
                        .on_initialized(Err(AppError::Initialization(reason)));
                }
            }
        }
    }

    fn toggle_predictions(&mut self) {
        match self.controller.toggle() {
            Ok(()) => self.notice = None,
            Err(err) => {
                log::warn!("toggle rejected: {err}");
                self.notice = Some(err.to_string());
            }
        }
    }

    fn needs_next_frame(&self) -> bool {
        self.controller.state().is_active() || *self.controller.readiness() == Readiness::Loading
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        self.poll_init_events();

        if let Err(err) = self
            .controller
            .tick(Instant::now(), &mut self.canvas, &mut self.status)
        {
            self.notice = Some(err.to_string());
        }
        self.refresh_images(window, cx);

        if self.needs_next_frame() {
            cx.defer_in(window, |_, _, cx| {
                cx.notify();
            });
        }

        self.render_main(cx)
    }
}
