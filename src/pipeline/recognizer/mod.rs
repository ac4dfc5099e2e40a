mod common;
mod gesture;
mod ort;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};

use crate::{
    config::AppConfig,
    error::InferenceError,
    model_download::{ModelDownloadEvent, handpose_model_path},
    types::{DetectionResult, Frame},
};

pub use self::ort::OrtRecognizer;

/// Boundary around the recognition model. Implementations may block; they are
/// only ever called from the inference worker thread.
pub trait InferenceAdapter: Send + 'static {
    fn infer(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<DetectionResult, InferenceError>;
}

#[derive(Debug)]
pub struct InferenceJob {
    pub session: u64,
    pub cycle: u64,
    pub frame: Frame,
    pub timestamp_ms: u64,
}

#[derive(Debug)]
pub struct InferenceReply {
    pub session: u64,
    pub cycle: u64,
    pub outcome: Result<DetectionResult, InferenceError>,
}

/// Asynchronous request/response access to an adapter.
///
/// `submit` must not block; the answer shows up later through `poll`.
pub trait InferenceDispatch {
    fn submit(&mut self, job: InferenceJob) -> Result<(), InferenceError>;
    fn poll(&mut self) -> Option<InferenceReply>;
}

#[derive(Debug)]
pub enum InitEvent {
    Download(ModelDownloadEvent),
    Ready,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    model_path: PathBuf,
    min_hand_confidence: f32,
}

impl RecognizerBackend {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model_path: handpose_model_path(&config.model_dir),
            min_hand_confidence: config.min_hand_confidence,
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_path.clone()
    }

    pub fn min_hand_confidence(&self) -> f32 {
        self.min_hand_confidence
    }
}

/// Starts the worker for the ORT-backed recognizer. Model preparation happens
/// on the worker thread; progress and readiness arrive on the returned receiver.
pub fn start_recognizer(backend: RecognizerBackend) -> (InferenceWorker, Receiver<InitEvent>) {
    log::info!("starting ORT handpose backend");
    InferenceWorker::spawn(move |on_download| OrtRecognizer::prepare(&backend, on_download))
}

/// Owns the thread that runs the adapter, one job at a time.
pub struct InferenceWorker {
    job_tx: Option<Sender<InferenceJob>>,
    reply_rx: Receiver<InferenceReply>,
    handle: Option<thread::JoinHandle<()>>,
    outstanding: Option<(u64, u64)>,
}

impl InferenceWorker {
    pub fn spawn<A, F>(init: F) -> (Self, Receiver<InitEvent>)
    where
        A: InferenceAdapter,
        F: FnOnce(&mut dyn FnMut(ModelDownloadEvent)) -> anyhow::Result<A> + Send + 'static,
    {
        let (job_tx, job_rx) = bounded::<InferenceJob>(1);
        let (reply_tx, reply_rx) = unbounded::<InferenceReply>();
        let (init_tx, init_rx) = unbounded();

        let handle = thread::spawn(move || {
            let adapter = {
                let mut forward = |event: ModelDownloadEvent| {
                    let _ = init_tx.send(InitEvent::Download(event));
                };
                init(&mut forward)
            };

            match adapter {
                Ok(adapter) => {
                    let _ = init_tx.send(InitEvent::Ready);
                    run_worker_loop(adapter, job_rx, reply_tx);
                }
                Err(err) => {
                    log::error!("failed to initialize gesture recognizer: {err:?}");
                    let _ = init_tx.send(InitEvent::Failed(format!("{err:#}")));
                }
            }
        });

        let worker = Self {
            job_tx: Some(job_tx),
            reply_rx,
            handle: Some(handle),
            outstanding: None,
        };
        (worker, init_rx)
    }

    #[cfg(test)]
    pub fn wait_reply(&mut self, timeout: Duration) -> Option<InferenceReply> {
        self.reply_rx.recv_timeout(timeout).ok()
    }
}

impl InferenceDispatch for InferenceWorker {
    fn submit(&mut self, job: InferenceJob) -> Result<(), InferenceError> {
        let Some(tx) = self.job_tx.as_ref() else {
            return Err(InferenceError("inference worker is shut down".to_string()));
        };
        let key = (job.session, job.cycle);
        tx.try_send(job)
            .map_err(|err| InferenceError(format!("inference worker rejected job: {err}")))?;
        self.outstanding = Some(key);
        Ok(())
    }

    /// A worker that went away with a job outstanding answers that job with a
    /// failure, so callers never wait on it forever.
    fn poll(&mut self) -> Option<InferenceReply> {
        match self.reply_rx.try_recv() {
            Ok(reply) => {
                if self.outstanding == Some((reply.session, reply.cycle)) {
                    self.outstanding = None;
                }
                Some(reply)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let (session, cycle) = self.outstanding.take()?;
                log::error!("inference worker exited with cycle {cycle} outstanding");
                Some(InferenceReply {
                    session,
                    cycle,
                    outcome: Err(InferenceError("inference worker exited".to_string())),
                })
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

const SLOW_INFERENCE: Duration = Duration::from_millis(250);

fn run_worker_loop<A: InferenceAdapter>(
    mut adapter: A,
    job_rx: Receiver<InferenceJob>,
    reply_tx: Sender<InferenceReply>,
) {
    while let Ok(job) = job_rx.recv() {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            adapter.infer(&job.frame, job.timestamp_ms)
        }))
        .unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            log::error!("recognizer panicked on cycle {}: {reason}", job.cycle);
            Err(InferenceError(format!("recognizer panicked: {reason}")))
        });
        let elapsed = started.elapsed();
        if elapsed > SLOW_INFERENCE {
            log::debug!("inference for cycle {} took {elapsed:?}", job.cycle);
        }

        // The frame is released here, before the reply is published.
        drop(job.frame);

        let reply = InferenceReply {
            session: job.session,
            cycle: job.cycle,
            outcome,
        };
        if reply_tx.send(reply).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Category, NormalizedLandmark};

    const WAIT: Duration = Duration::from_secs(5);

    struct EchoAdapter;

    /// Panics on the first call, then behaves like `EchoAdapter`.
    pub(crate) struct PanicOnceAdapter {
        pub calls: u32,
    }

    impl InferenceAdapter for PanicOnceAdapter {
        fn infer(
            &mut self,
            frame: &Frame,
            timestamp_ms: u64,
        ) -> Result<DetectionResult, InferenceError> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("tensor shape mismatch");
            }
            EchoAdapter.infer(frame, timestamp_ms)
        }
    }

    impl InferenceAdapter for EchoAdapter {
        fn infer(
            &mut self,
            frame: &Frame,
            timestamp_ms: u64,
        ) -> Result<DetectionResult, InferenceError> {
            if frame.width == 0 {
                return Err(InferenceError("empty frame".to_string()));
            }
            Ok(DetectionResult {
                landmarks: vec![vec![NormalizedLandmark::default(); 21]],
                gestures: vec![vec![Category::new(0, "Victory", timestamp_ms as f32 / 1000.0)]],
                handedness: vec![vec![Category::new(1, "Right", 1.0)]],
            })
        }
    }

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; width as usize * 4],
            width,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    fn wait_ready(init_rx: &Receiver<InitEvent>) -> InitEvent {
        loop {
            match init_rx.recv_timeout(WAIT).expect("init event") {
                InitEvent::Download(_) => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn replies_carry_job_identity_and_outcome() {
        let (mut worker, init_rx) = InferenceWorker::spawn(|_| Ok(EchoAdapter));
        assert!(matches!(wait_ready(&init_rx), InitEvent::Ready));

        worker
            .submit(InferenceJob {
                session: 3,
                cycle: 7,
                frame: frame(4),
                timestamp_ms: 500,
            })
            .expect("submit");
        let reply = worker.wait_reply(WAIT).expect("reply");
        assert_eq!((reply.session, reply.cycle), (3, 7));
        let result = reply.outcome.expect("detection");
        assert_eq!(result.gestures[0][0].score, 0.5);

        worker
            .submit(InferenceJob {
                session: 3,
                cycle: 8,
                frame: frame(0),
                timestamp_ms: 516,
            })
            .expect("submit");
        let reply = worker.wait_reply(WAIT).expect("reply");
        assert_eq!(reply.cycle, 8);
        assert!(reply.outcome.is_err());
    }

    #[test]
    fn download_events_are_forwarded_before_ready() {
        let (_worker, init_rx) = InferenceWorker::spawn(|on_download| {
            on_download(ModelDownloadEvent::AlreadyPresent);
            Ok(EchoAdapter)
        });
        assert!(matches!(
            init_rx.recv_timeout(WAIT),
            Ok(InitEvent::Download(ModelDownloadEvent::AlreadyPresent))
        ));
        assert!(matches!(init_rx.recv_timeout(WAIT), Ok(InitEvent::Ready)));
    }

    #[test]
    fn failed_initialization_is_reported_and_jobs_are_rejected() {
        let (mut worker, init_rx) =
            InferenceWorker::spawn::<EchoAdapter, _>(|_| Err(anyhow::anyhow!("model missing")));
        match wait_ready(&init_rx) {
            InitEvent::Failed(reason) => assert!(reason.contains("model missing")),
            other => panic!("unexpected init event: {other:?}"),
        }

        let job = |cycle| InferenceJob {
            session: 1,
            cycle,
            frame: frame(1),
            timestamp_ms: 0,
        };
        // Nothing consumes jobs: the first may still be buffered, the second cannot be.
        let _ = worker.submit(job(1));
        let err = worker.submit(job(2)).unwrap_err();
        assert!(err.0.contains("rejected"));
        assert!(worker.poll().is_none());
    }

    #[test]
    fn adapter_panic_becomes_a_failed_reply_and_worker_survives() {
        let (mut worker, init_rx) = InferenceWorker::spawn(|_| Ok(PanicOnceAdapter { calls: 0 }));
        assert!(matches!(wait_ready(&init_rx), InitEvent::Ready));

        let job = |cycle| InferenceJob {
            session: 1,
            cycle,
            frame: frame(2),
            timestamp_ms: cycle * 16,
        };
        worker.submit(job(1)).expect("submit");
        let reply = worker.wait_reply(WAIT).expect("reply");
        assert_eq!(reply.cycle, 1);
        let err = reply.outcome.unwrap_err();
        assert!(err.0.contains("tensor shape mismatch"));

        worker.submit(job(2)).expect("worker still accepts jobs");
        let reply = worker.wait_reply(WAIT).expect("reply");
        assert_eq!(reply.cycle, 2);
        assert!(reply.outcome.is_ok());
    }

    #[test]
    fn vanished_worker_fails_the_outstanding_job() {
        let (job_tx, _job_rx) = bounded::<InferenceJob>(1);
        let (reply_tx, reply_rx) = unbounded::<InferenceReply>();
        drop(reply_tx);
        let mut worker = InferenceWorker {
            job_tx: Some(job_tx),
            reply_rx,
            handle: None,
            outstanding: None,
        };
        assert!(worker.poll().is_none());

        worker
            .submit(InferenceJob {
                session: 4,
                cycle: 9,
                frame: frame(1),
                timestamp_ms: 0,
            })
            .expect("submit");
        let reply = worker.poll().expect("failure reply");
        assert_eq!((reply.session, reply.cycle), (4, 9));
        assert!(reply.outcome.is_err());
        assert!(worker.poll().is_none());
    }
}
