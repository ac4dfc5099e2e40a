use std::time::Instant;

use crate::{
    display::StatusDisplay,
    error::AppError,
    pipeline::{CaptureSource, DrawingSurface, InferenceDispatch},
    render_loop::{LoopState, RenderLoop},
    types::Frame,
};

pub const ENABLE_LABEL: &str = "ENABLE PREDICTIONS";
pub const DISABLE_LABEL: &str = "DISABLE PREDICTIONS";

/// Readiness gate for the recognizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Loading,
    Ready,
    Failed(String),
}

/// Owns the toggle and the render loop behind it.
///
/// The capture source is held until the recognizer is ready; only then is a
/// render loop built around it.
pub struct Controller<C: CaptureSource, D: InferenceDispatch> {
    readiness: Readiness,
    camera_available: bool,
    pending_capture: Option<C>,
    render_loop: Option<RenderLoop<C, D>>,
}

impl<C: CaptureSource, D: InferenceDispatch> Controller<C, D> {
    pub fn new(capture: C) -> Self {
        Self {
            readiness: Readiness::Loading,
            camera_available: capture.is_available(),
            pending_capture: Some(capture),
            render_loop: None,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Called once when recognizer initialization resolves.
    pub fn on_initialized(&mut self, outcome: Result<D, AppError>) {
        if self.readiness != Readiness::Loading {
            log::warn!("recognizer initialized twice, ignoring");
            return;
        }

        match outcome {
            Ok(dispatch) => match self.pending_capture.take() {
                Some(capture) => {
                    log::info!("gesture recognizer ready");
                    self.render_loop = Some(RenderLoop::new(capture, dispatch));
                    self.readiness = Readiness::Ready;
                }
                None => {
                    self.readiness = Readiness::Failed("capture source missing".to_string());
                }
            },
            Err(err) => {
                log::error!("{err}");
                let reason = match err {
                    AppError::Initialization(reason) => reason,
                    other => other.to_string(),
                };
                self.readiness = Readiness::Failed(reason);
            }
        }
    }

    pub fn state(&self) -> LoopState {
        self.render_loop
            .as_ref()
            .map_or(LoopState::Idle, RenderLoop::state)
    }

    /// Flips between running and stopped.
    ///
    /// Before the recognizer is ready this is rejected with `Precondition`; after
    /// a failed initialization with `Initialization`. Neither changes state.
    pub fn toggle(&mut self) -> Result<(), AppError> {
        match &self.readiness {
            Readiness::Loading => return Err(AppError::Precondition),
            Readiness::Failed(reason) => return Err(AppError::Initialization(reason.clone())),
            Readiness::Ready => {}
        }
        let Some(render_loop) = self.render_loop.as_mut() else {
            return Err(AppError::Precondition);
        };

        if render_loop.state().is_active() {
            render_loop.stop();
            Ok(())
        } else {
            render_loop.start()
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.state().is_active() {
            DISABLE_LABEL
        } else {
            ENABLE_LABEL
        }
    }

    /// The toggle is hidden on hosts without a camera.
    pub fn toggle_visible(&self) -> bool {
        self.camera_available
    }

    pub fn tick(
        &mut self,
        now: Instant,
        surface: &mut dyn DrawingSurface,
        status: &mut dyn StatusDisplay,
    ) -> Result<(), AppError> {
        match self.render_loop.as_mut() {
            Some(render_loop) => render_loop.tick(now, surface, status),
            None => Ok(()),
        }
    }

    pub fn preview_frame(&self) -> Option<&Frame> {
        self.render_loop.as_ref()?.preview_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        display::StatusPanel,
        render_loop::tests::{FakeCapture, FakeDispatch, RecordingSurface, frame, hand},
    };

    struct NoCamera;

    impl CaptureSource for NoCamera {
        type Stream = <FakeCapture as CaptureSource>::Stream;

        fn is_available(&self) -> bool {
            false
        }

        fn acquire(&mut self) -> Result<Self::Stream, AppError> {
            Err(AppError::Acquisition("no camera available".to_string()))
        }

        fn release(&mut self, _stream: Self::Stream) {}
    }

    #[test]
    fn toggle_before_ready_is_rejected_without_state_change() {
        let mut controller = Controller::<_, FakeDispatch>::new(FakeCapture::default());
        assert_eq!(controller.toggle(), Err(AppError::Precondition));
        assert_eq!(
            AppError::Precondition.to_string(),
            "Please wait for gestureRecognizer to load"
        );
        assert_eq!(controller.state(), LoopState::Idle);
        assert_eq!(controller.toggle_label(), ENABLE_LABEL);
    }

    #[test]
    fn failed_initialization_keeps_toggle_inert() {
        let capture = FakeCapture::default();
        let acquired = capture.acquired.clone();
        let mut controller = Controller::<_, FakeDispatch>::new(capture);
        controller.on_initialized(Err(AppError::Initialization("model missing".to_string())));

        assert_eq!(
            controller.readiness(),
            &Readiness::Failed("model missing".to_string())
        );
        assert_eq!(
            controller.toggle(),
            Err(AppError::Initialization("model missing".to_string()))
        );
        assert_eq!(acquired.get(), 0);
        assert_eq!(controller.state(), LoopState::Idle);
    }

    #[test]
    fn toggle_starts_and_stops_with_matching_labels() {
        let capture = FakeCapture::default();
        let feed = capture.feed.clone();
        let released = capture.released.clone();
        let mut controller = Controller::new(capture);
        controller.on_initialized(Ok(FakeDispatch::default()));
        assert_eq!(controller.readiness(), &Readiness::Ready);

        controller.toggle().expect("start");
        assert_eq!(controller.state(), LoopState::Starting);
        assert_eq!(controller.toggle_label(), DISABLE_LABEL);

        feed.borrow_mut().frame = Some(frame());
        let mut surface = RecordingSurface::default();
        let mut status = StatusPanel::default();
        controller
            .tick(Instant::now(), &mut surface, &mut status)
            .expect("tick");
        assert_eq!(controller.state(), LoopState::Running);
        assert!(controller.preview_frame().is_some());

        controller.toggle().expect("stop");
        assert_eq!(controller.state(), LoopState::Stopped);
        assert_eq!(controller.toggle_label(), ENABLE_LABEL);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn ticks_draw_results_once_ready() {
        let capture = FakeCapture::default();
        let feed = capture.feed.clone();
        let dispatch = FakeDispatch::default();
        let mut controller = Controller::new(capture);
        controller.on_initialized(Ok(dispatch.clone()));
        controller.toggle().expect("start");
        feed.borrow_mut().frame = Some(frame());

        let mut surface = RecordingSurface::default();
        let mut status = StatusPanel::default();
        controller
            .tick(Instant::now(), &mut surface, &mut status)
            .expect("tick");
        dispatch.answer_last(Ok(hand("ILoveYou", 0.5, "Left")));
        controller
            .tick(Instant::now(), &mut surface, &mut status)
            .expect("tick");

        assert_eq!(
            status.text(),
            "GestureRecognizer: ILoveYou\n Confidence: 50.00%\n Handedness: Left"
        );
    }

    #[test]
    fn toggle_is_hidden_without_a_camera() {
        let controller = Controller::<_, FakeDispatch>::new(NoCamera);
        assert!(!controller.toggle_visible());
        assert!(Controller::<_, FakeDispatch>::new(FakeCapture::default()).toggle_visible());
    }
}
