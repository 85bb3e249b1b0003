//! Asynchronous rasterization with a generation gate.
//!
//! The pipeline owns one worker thread. Jobs go to it over a channel and
//! generation-tagged outcomes come back over another, drained only by the UI
//! thread in [`RenderPipeline::poll`]. An outcome is published only if its
//! generation is still the latest one; anything older is dropped.

use crate::renderer::{Backend, RenderError, RenderResult};
use crate::snapshot::{PixelBuffer, RasterSnapshot, SnapshotSlot, buffer_size};
use kurbo::Size;
use pinchview_core::{ContentKey, SourceDocument};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work handed to the render thread.
struct RenderJob {
    generation: u64,
    key: ContentKey,
    text: Arc<str>,
    width: u32,
    height: u32,
}

/// Result handed back to the UI thread.
struct RenderOutcome {
    generation: u64,
    key: ContentKey,
    result: RenderResult<PixelBuffer>,
}

/// What [`RenderPipeline::poll`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A new snapshot is live.
    Published { generation: u64 },
    /// The latest render failed; the previous snapshot (if any) is kept.
    Failed { generation: u64, error: RenderError },
}

/// Turns source documents into a cached raster on a background thread.
pub struct RenderPipeline {
    generation: u64,
    /// Latest generation, shared so the worker can skip superseded jobs.
    latest: Arc<AtomicU64>,
    torn_down: Arc<AtomicBool>,
    submitted: Option<SourceDocument>,
    in_progress: bool,
    view_size: Size,
    slot: SnapshotSlot,
    /// Events produced outside of `poll`, reported on the next call.
    deferred: Vec<RenderEvent>,
    job_tx: Option<Sender<RenderJob>>,
    outcome_rx: Receiver<RenderOutcome>,
    _worker: Option<JoinHandle<()>>,
}

impl RenderPipeline {
    /// Start a pipeline and its worker thread.
    pub fn new<B: Backend>(backend: B) -> RenderResult<Self> {
        let (job_tx, job_rx) = channel::<RenderJob>();
        let (outcome_tx, outcome_rx) = channel::<RenderOutcome>();
        let latest = Arc::new(AtomicU64::new(0));
        let torn_down = Arc::new(AtomicBool::new(false));

        let worker = {
            let latest = Arc::clone(&latest);
            let torn_down = Arc::clone(&torn_down);
            thread::Builder::new()
                .name("pinchview-render".to_string())
                .spawn(move || run_worker(backend, job_rx, outcome_tx, latest, torn_down))
                .map_err(|e| RenderError::Worker(format!("Failed to spawn render thread: {}", e)))?
        };

        Ok(Self {
            generation: 0,
            latest,
            torn_down,
            submitted: None,
            in_progress: false,
            view_size: Size::ZERO,
            slot: SnapshotSlot::new(),
            deferred: Vec::new(),
            job_tx: Some(job_tx),
            outcome_rx,
            _worker: Some(worker),
        })
    }

    /// Submit a document for rendering.
    ///
    /// A document with the same content key as the last submission is a
    /// no-op. Returns whether a render was scheduled.
    pub fn set_source(&mut self, source: SourceDocument) -> bool {
        if self.is_torn_down() {
            log::warn!("set_source on a torn-down pipeline");
            return false;
        }
        if self.submitted_key() == Some(source.key()) {
            log::debug!("Source {:?} unchanged, skipping render", source.key());
            return false;
        }
        self.submitted = Some(source);
        self.schedule()
    }

    /// Change the raster bounds. Re-renders the current source at the new size.
    pub fn set_view_size(&mut self, size: Size) -> bool {
        if size == self.view_size {
            return false;
        }
        self.view_size = size;
        if self.submitted.is_some() && !self.is_torn_down() {
            self.schedule()
        } else {
            false
        }
    }

    fn schedule(&mut self) -> bool {
        let Some(source) = self.submitted.as_ref() else {
            return false;
        };
        let (key, text) = (source.key(), source.shared_text());
        self.generation += 1;
        self.latest.store(self.generation, Ordering::Release);

        let (width, height) = buffer_size(self.view_size);
        let job = RenderJob {
            generation: self.generation,
            key,
            text,
            width,
            height,
        };
        let sent = self.job_tx.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        if sent {
            log::debug!(
                "Scheduled render generation {} at {}x{}",
                self.generation,
                width,
                height
            );
            self.in_progress = true;
        } else {
            log::error!("Render worker is gone, cannot schedule generation {}", self.generation);
            self.in_progress = false;
            self.deferred.push(RenderEvent::Failed {
                generation: self.generation,
                error: RenderError::Worker("render thread exited".to_string()),
            });
        }
        sent
    }

    /// Drain finished renders. Call once per frame on the UI thread.
    pub fn poll(&mut self) -> Vec<RenderEvent> {
        let mut events = std::mem::take(&mut self.deferred);
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => events.extend(self.apply_outcome(outcome)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.extend(self.worker_lost());
                    break;
                }
            }
        }
        events
    }

    /// Block until the latest render lands or `timeout` passes.
    ///
    /// For hosts without a frame loop (batch export, tests). Never call this
    /// from a UI thread that has frames to draw.
    pub fn wait(&mut self, timeout: Duration) -> Vec<RenderEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.poll();
        while self.in_progress {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.outcome_rx.recv_timeout(remaining) {
                Ok(outcome) => events.extend(self.apply_outcome(outcome)),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    events.extend(self.worker_lost());
                    break;
                }
            }
        }
        events
    }

    /// Generation gate: only the latest generation may publish.
    fn apply_outcome(&mut self, outcome: RenderOutcome) -> Option<RenderEvent> {
        if self.is_torn_down() || outcome.generation != self.generation {
            log::debug!(
                "Discarding stale render generation {} (latest {})",
                outcome.generation,
                self.generation
            );
            return None;
        }
        self.in_progress = false;

        match outcome.result {
            Ok(pixels) => {
                log::info!(
                    "Published snapshot generation {} ({}x{})",
                    outcome.generation,
                    pixels.width(),
                    pixels.height()
                );
                let snapshot = RasterSnapshot::new(pixels, outcome.generation, outcome.key);
                // Old snapshot released only now that its replacement is live
                drop(self.slot.publish(snapshot));
                Some(RenderEvent::Published {
                    generation: outcome.generation,
                })
            }
            Err(error) => {
                log::warn!("Render generation {} failed: {}", outcome.generation, error);
                Some(RenderEvent::Failed {
                    generation: outcome.generation,
                    error,
                })
            }
        }
    }

    fn worker_lost(&mut self) -> Option<RenderEvent> {
        self.job_tx = None;
        if !self.in_progress || self.is_torn_down() {
            return None;
        }
        log::error!("Render worker exited with generation {} in flight", self.generation);
        self.in_progress = false;
        Some(RenderEvent::Failed {
            generation: self.generation,
            error: RenderError::Worker("render thread exited".to_string()),
        })
    }

    /// Detach the worker and release the snapshot.
    ///
    /// A render still running finishes on its own; its result is dropped.
    pub fn shutdown(&mut self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("Render pipeline shutting down at generation {}", self.generation);
        // Closing the job channel lets the worker exit after its current job
        self.job_tx = None;
        self._worker = None;
        while self.outcome_rx.try_recv().is_ok() {}
        self.in_progress = false;
        self.submitted = None;
        self.deferred.clear();
        self.slot.clear();
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_rendering(&self) -> bool {
        self.in_progress
    }

    pub fn snapshot(&self) -> Option<&Arc<RasterSnapshot>> {
        self.slot.current()
    }

    pub fn has_snapshot(&self) -> bool {
        !self.slot.is_empty()
    }

    /// Key of the most recent submission, rendered or not.
    pub fn submitted_key(&self) -> Option<ContentKey> {
        self.submitted.as_ref().map(SourceDocument::key)
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<B: Backend>(
    backend: B,
    jobs: Receiver<RenderJob>,
    outcomes: Sender<RenderOutcome>,
    latest: Arc<AtomicU64>,
    torn_down: Arc<AtomicBool>,
) {
    log::debug!("Render worker started");
    while let Ok(mut job) = jobs.recv() {
        // Only the newest queued job matters
        while let Ok(newer) = jobs.try_recv() {
            job = newer;
        }
        if torn_down.load(Ordering::Acquire) {
            break;
        }
        if job.generation < latest.load(Ordering::Acquire) {
            log::debug!("Skipping superseded render generation {}", job.generation);
            continue;
        }

        let result = render_job(&backend, &job);
        let outcome = RenderOutcome {
            generation: job.generation,
            key: job.key,
            result,
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    log::debug!("Render worker exiting");
}

/// Parse and rasterize, converting backend panics into errors.
fn render_job<B: Backend>(backend: &B, job: &RenderJob) -> RenderResult<PixelBuffer> {
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
        let document = backend.parse(&job.text)?;
        backend.rasterize(&document, job.width, job.height)
    }));
    rendered.unwrap_or_else(|payload| {
        Err(RenderError::Rasterize(format!(
            "backend panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Fills the buffer with the first byte of the source and counts calls.
    #[derive(Clone, Default)]
    struct CountingBackend {
        rasterize_calls: Arc<AtomicUsize>,
        sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl Backend for CountingBackend {
        type Document = String;

        fn parse(&self, source: &str) -> RenderResult<String> {
            if source.contains("malformed") {
                return Err(RenderError::Parse("unexpected token".to_string()));
            }
            Ok(source.to_string())
        }

        fn rasterize(&self, document: &String, width: u32, height: u32) -> RenderResult<PixelBuffer> {
            self.rasterize_calls.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push((width, height));
            if document.contains("explode") {
                panic!("rasterizer blew up");
            }
            let mut buffer = PixelBuffer::new(width, height)?;
            let fill = document.as_bytes().first().copied().unwrap_or(0);
            buffer.data_mut().fill(fill);
            Ok(buffer)
        }
    }

    /// Blocks on sources named "slow" until released.
    struct GatedBackend {
        started: Sender<String>,
        release: Receiver<()>,
    }

    impl Backend for GatedBackend {
        type Document = String;

        fn parse(&self, source: &str) -> RenderResult<String> {
            Ok(source.to_string())
        }

        fn rasterize(&self, document: &String, width: u32, height: u32) -> RenderResult<PixelBuffer> {
            let _ = self.started.send(document.clone());
            if document == "slow" {
                let _ = self.release.recv();
            }
            PixelBuffer::new(width, height)
        }
    }

    fn pipeline() -> (RenderPipeline, CountingBackend) {
        let backend = CountingBackend::default();
        let mut pipeline = RenderPipeline::new(backend.clone()).unwrap();
        pipeline.set_view_size(Size::new(8.0, 6.0));
        (pipeline, backend)
    }

    #[test]
    fn test_identical_source_rendered_once() {
        let (mut pipeline, backend) = pipeline();
        assert!(pipeline.set_source(SourceDocument::new("<svg>A</svg>")));
        assert!(!pipeline.set_source(SourceDocument::new("<svg>A</svg>")));
        pipeline.wait(TIMEOUT);
        assert!(!pipeline.set_source(SourceDocument::new("<svg>A</svg>")));
        pipeline.wait(TIMEOUT);

        assert_eq!(backend.rasterize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.generation(), 1);
        assert!(pipeline.has_snapshot());
    }

    #[test]
    fn test_publish_sets_snapshot_and_clears_progress() {
        let (mut pipeline, _backend) = pipeline();
        assert!(!pipeline.is_rendering());
        pipeline.set_source(SourceDocument::new("Z"));
        assert!(pipeline.is_rendering());

        let events = pipeline.wait(TIMEOUT);
        assert_eq!(events, vec![RenderEvent::Published { generation: 1 }]);
        assert!(!pipeline.is_rendering());

        let snapshot = pipeline.snapshot().unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (8, 6));
        assert_eq!(snapshot.pixels().pixel(0, 0), Some([b'Z'; 4]));
    }

    #[test]
    fn test_stale_outcome_never_overwrites_newer() {
        let (mut pipeline, _backend) = pipeline();
        let a = SourceDocument::new("A");
        let b = SourceDocument::new("B");
        pipeline.set_source(a.clone());
        pipeline.set_source(b.clone());
        assert_eq!(pipeline.generation(), 2);

        // B lands first, then A's late result
        let b_event = pipeline.apply_outcome(RenderOutcome {
            generation: 2,
            key: b.key(),
            result: PixelBuffer::new(1, 1),
        });
        let a_event = pipeline.apply_outcome(RenderOutcome {
            generation: 1,
            key: a.key(),
            result: PixelBuffer::new(1, 1),
        });

        assert_eq!(b_event, Some(RenderEvent::Published { generation: 2 }));
        assert_eq!(a_event, None);
        assert_eq!(pipeline.snapshot().unwrap().key(), b.key());
    }

    #[test]
    fn test_superseded_render_result_is_inert() {
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel();
        let mut pipeline = RenderPipeline::new(GatedBackend {
            started: started_tx,
            release: release_rx,
        })
        .unwrap();
        pipeline.set_view_size(Size::new(4.0, 4.0));

        let fast = SourceDocument::new("fast");
        pipeline.set_source(SourceDocument::new("slow"));
        assert_eq!(started_rx.recv_timeout(TIMEOUT).unwrap(), "slow");

        pipeline.set_source(fast.clone());
        release_tx.send(()).unwrap();

        let events = pipeline.wait(TIMEOUT);
        assert_eq!(events, vec![RenderEvent::Published { generation: 2 }]);
        assert_eq!(pipeline.snapshot().unwrap().key(), fast.key());
    }

    #[test]
    fn test_parse_failure_keeps_previous_snapshot() {
        let (mut pipeline, _backend) = pipeline();
        pipeline.set_source(SourceDocument::new("good"));
        pipeline.wait(TIMEOUT);
        let good_key = pipeline.snapshot().unwrap().key();

        pipeline.set_source(SourceDocument::new("malformed"));
        let events = pipeline.wait(TIMEOUT);

        assert!(matches!(
            events.as_slice(),
            [RenderEvent::Failed {
                generation: 2,
                error: RenderError::Parse(_)
            }]
        ));
        assert!(!pipeline.is_rendering());
        assert_eq!(pipeline.snapshot().unwrap().key(), good_key);
    }

    #[test]
    fn test_backend_panic_becomes_error() {
        let (mut pipeline, _backend) = pipeline();
        pipeline.set_source(SourceDocument::new("explode"));
        let events = pipeline.wait(TIMEOUT);

        match events.as_slice() {
            [RenderEvent::Failed {
                error: RenderError::Rasterize(message),
                ..
            }] => assert!(message.contains("rasterizer blew up")),
            other => panic!("unexpected events: {:?}", other),
        }
        assert!(!pipeline.has_snapshot());

        // The worker survives and keeps serving jobs
        pipeline.set_source(SourceDocument::new("after"));
        assert_eq!(
            pipeline.wait(TIMEOUT),
            vec![RenderEvent::Published { generation: 2 }]
        );
    }

    #[test]
    fn test_zero_view_renders_one_by_one() {
        let backend = CountingBackend::default();
        let mut pipeline = RenderPipeline::new(backend.clone()).unwrap();
        pipeline.set_source(SourceDocument::new("x"));
        pipeline.wait(TIMEOUT);
        assert_eq!(backend.sizes.lock().unwrap().as_slice(), &[(1, 1)]);
    }

    #[test]
    fn test_resize_rerenders_current_source() {
        let (mut pipeline, backend) = pipeline();
        pipeline.set_source(SourceDocument::new("x"));
        pipeline.wait(TIMEOUT);

        assert!(!pipeline.set_view_size(Size::new(8.0, 6.0)));
        assert!(pipeline.set_view_size(Size::new(16.0, 12.0)));
        pipeline.wait(TIMEOUT);

        assert_eq!(backend.rasterize_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.snapshot().unwrap().width(), 16);
    }

    #[test]
    fn test_shutdown_releases_snapshot() {
        let (mut pipeline, _backend) = pipeline();
        pipeline.set_source(SourceDocument::new("x"));
        pipeline.wait(TIMEOUT);
        let reader = Arc::clone(pipeline.snapshot().unwrap());

        pipeline.set_source(SourceDocument::new("y"));
        pipeline.shutdown();

        assert!(!pipeline.has_snapshot());
        assert!(!pipeline.is_rendering());
        assert!(!pipeline.set_source(SourceDocument::new("z")));
        assert!(pipeline.poll().is_empty());
        // Only the outstanding reader keeps the old pixels alive
        assert_eq!(Arc::strong_count(&reader), 1);
    }
}
