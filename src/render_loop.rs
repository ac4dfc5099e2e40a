use std::time::Instant;

use crate::{
    display::{StatusDisplay, status_text},
    error::{AppError, InferenceError},
    pipeline::{
        CaptureSource, DrawingSurface, FrameStream, HAND_CONNECTIONS, InferenceDispatch,
        InferenceJob, InferenceReply,
    },
    types::{DetectionResult, Frame},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Starting,
    Running,
    Stopped,
}

impl LoopState {
    /// Whether a session is live and the view should keep ticking.
    pub fn is_active(self) -> bool {
        matches!(self, LoopState::Starting | LoopState::Running)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub inference_failures: u64,
    pub stale_discarded: u64,
}

/// Millisecond timestamps that never go backwards, across sessions too.
#[derive(Debug)]
struct CycleClock {
    origin: Instant,
    last_ms: u64,
}

impl CycleClock {
    fn new(origin: Instant) -> Self {
        Self { origin, last_ms: 0 }
    }

    fn stamp(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin).as_millis() as u64;
        self.last_ms = self.last_ms.max(elapsed);
        self.last_ms
    }
}

struct Session<S> {
    id: u64,
    running: bool,
    stream: Option<S>,
}

/// Drives capture, inference and drawing, one cycle per `tick`.
///
/// A cycle is: read the newest frame, submit it with a timestamp, and once the
/// reply comes back redraw the surface and status from it. Only one inference
/// call is outstanding at any time, replies that belong to a stopped session are
/// dropped without drawing.
pub struct RenderLoop<C: CaptureSource, D: InferenceDispatch> {
    capture: C,
    dispatch: D,
    state: LoopState,
    session: Option<Session<C::Stream>>,
    next_session_id: u64,
    next_cycle: u64,
    in_flight: Option<(u64, u64)>,
    clock: CycleClock,
    preview: Option<Frame>,
    stats: LoopStats,
}

impl<C: CaptureSource, D: InferenceDispatch> RenderLoop<C, D> {
    pub fn new(capture: C, dispatch: D) -> Self {
        Self {
            capture,
            dispatch,
            state: LoopState::Idle,
            session: None,
            next_session_id: 1,
            next_cycle: 1,
            in_flight: None,
            clock: CycleClock::new(Instant::now()),
            preview: None,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    #[cfg(test)]
    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// The frame the camera is currently showing, while a session is live.
    pub fn preview_frame(&self) -> Option<&Frame> {
        self.preview.as_ref()
    }

    fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.running)
    }

    /// Opens the capture source and enters `Starting`. A no-op while a session
    /// is already live.
    pub fn start(&mut self) -> Result<(), AppError> {
        if self.state.is_active() {
            return Ok(());
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        self.state = LoopState::Starting;

        match self.capture.acquire() {
            Ok(stream) => {
                log::info!("session {id} started, waiting for first frame");
                self.session = Some(Session {
                    id,
                    running: true,
                    stream: Some(stream),
                });
                Ok(())
            }
            Err(err) => {
                log::error!("session {id} could not start: {err}");
                self.session = None;
                self.state = LoopState::Stopped;
                Err(err)
            }
        }
    }

    /// Ends the live session and releases the capture stream. Returns whether
    /// there was anything to stop.
    pub fn stop(&mut self) -> bool {
        let Some(session) = self.session.as_mut().filter(|session| session.running) else {
            return false;
        };
        session.running = false;
        let id = session.id;
        if let Some(stream) = session.stream.take() {
            self.capture.release(stream);
        }

        self.state = LoopState::Stopped;
        self.preview = None;
        log::info!("session {id} stopped");
        log::debug!("loop stats after session {id}: {:?}", self.stats);
        true
    }

    /// Runs one scheduling step. Call once per rendered frame.
    ///
    /// Returns an `Acquisition` error when the capture stream dies; the session
    /// is already stopped by then.
    pub fn tick(
        &mut self,
        now: Instant,
        surface: &mut dyn DrawingSurface,
        status: &mut dyn StatusDisplay,
    ) -> Result<(), AppError> {
        while let Some(reply) = self.dispatch.poll() {
            self.handle_reply(reply, surface, status);
        }

        if !self.is_running() {
            return Ok(());
        }

        let latest = match self
            .session
            .as_mut()
            .and_then(|session| session.stream.as_mut())
            .map(|stream| stream.latest_frame())
        {
            Some(Ok(frame)) => frame,
            Some(Err(reason)) => return Err(self.fail_session(reason)),
            None => return Ok(()),
        };
        let Some(frame) = latest else {
            return Ok(());
        };

        if self.state == LoopState::Starting {
            log::info!("first frame received ({}x{})", frame.width, frame.height);
            self.state = LoopState::Running;
        }

        if self.in_flight.is_none() {
            self.begin_cycle(frame.clone(), now, surface, status);
        }
        self.preview = Some(frame);
        Ok(())
    }

    fn begin_cycle(
        &mut self,
        frame: Frame,
        now: Instant,
        surface: &mut dyn DrawingSurface,
        status: &mut dyn StatusDisplay,
    ) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let job = InferenceJob {
            session: session.id,
            cycle: self.next_cycle,
            frame,
            timestamp_ms: self.clock.stamp(now),
        };
        let key = (job.session, job.cycle);
        self.next_cycle += 1;

        match self.dispatch.submit(job) {
            Ok(()) => {
                self.in_flight = Some(key);
                self.stats.cycles_started += 1;
            }
            Err(err) => self.present_failure(&err, surface, status),
        }
    }

    fn handle_reply(
        &mut self,
        reply: InferenceReply,
        surface: &mut dyn DrawingSurface,
        status: &mut dyn StatusDisplay,
    ) {
        if self.in_flight == Some((reply.session, reply.cycle)) {
            self.in_flight = None;
        }

        let current = self
            .session
            .as_ref()
            .is_some_and(|session| session.running && session.id == reply.session);
        if !current {
            self.stats.stale_discarded += 1;
            log::debug!(
                "discarding result of cycle {} from session {}",
                reply.cycle,
                reply.session
            );
            return;
        }

        self.stats.cycles_completed += 1;
        match reply.outcome {
            Ok(result) => present_result(&result, surface, status),
            Err(err) => self.present_failure(&err, surface, status),
        }
    }

    fn present_failure(
        &mut self,
        err: &InferenceError,
        surface: &mut dyn DrawingSurface,
        status: &mut dyn StatusDisplay,
    ) {
        self.stats.inference_failures += 1;
        log::warn!("{err}");
        surface.clear();
        status.hide();
    }

    fn fail_session(&mut self, reason: String) -> AppError {
        log::error!("capture stream failed: {reason}");
        self.stop();
        AppError::Acquisition(reason)
    }
}

impl<C: CaptureSource, D: InferenceDispatch> Drop for RenderLoop<C, D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn present_result(
    result: &DetectionResult,
    surface: &mut dyn DrawingSurface,
    status: &mut dyn StatusDisplay,
) {
    log::trace!("drawing {} hand(s)", result.hand_count());
    surface.clear();
    for landmarks in &result.landmarks {
        surface.draw_connectors(landmarks, HAND_CONNECTIONS);
        surface.draw_landmarks(landmarks);
    }

    match status_text(result) {
        Some(text) => status.show(&text),
        None => status.hide(),
    }
}
