//! Conversion orchestration.
//!
//! [`Orchestrator::run`] drives one conversion end to end: it announces the
//! start, runs the codec on a blocking thread while relaying its progress,
//! stores the output, and announces completion or failure. Every run emits
//! exactly one terminal event (progress 100, or a failure event) and nothing
//! after it.

use parking_lot::Mutex;
use serde::Serialize;
use sq_codec::{output_file_name, Codec, ProgressSender};
use sq_core::{ArtifactId, ArtifactStore, Error, ProgressBroadcaster, ProgressEvent, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Overall progress reported before the codec starts.
const STARTED: f32 = 10.0;
/// The codec's own 0-100 scale is mapped onto this band of overall progress.
const CODEC_BAND: (f32, f32) = (30.0, 90.0);

/// Summary of a completed conversion, as returned to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub id: ArtifactId,
    pub download_url: String,
    pub original_size: usize,
    pub result_size: usize,
    /// Relative size reduction, e.g. `"42.3%"`. Negative when the output grew.
    pub ratio: String,
    pub content_type: String,
    pub file_name: String,
}

/// Runs codecs and publishes their progress on the shared broadcaster.
pub struct Orchestrator {
    progress: Arc<ProgressBroadcaster>,
    store: ArtifactStore,
    timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(progress: Arc<ProgressBroadcaster>, store: ArtifactStore) -> Self {
        Self {
            progress,
            store,
            timeout: None,
        }
    }

    /// Abort conversions that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Convert `source` with `codec`, store the output and return its summary.
    ///
    /// Fails with the codec's error (after publishing a failure event) when
    /// the conversion fails or times out. Nothing is stored on failure.
    pub async fn run(
        &self,
        codec: Arc<dyn Codec>,
        source: Vec<u8>,
        display_name: &str,
    ) -> Result<ConversionResult> {
        let started = Instant::now();
        let codec_name = codec.name();
        let original_size = source.len();

        let gate = Arc::new(ProgressGate::new(self.progress.clone()));
        gate.publish(STARTED, &format!("Starting {codec_name} conversion"));

        let reporter = gate.clone();
        let sender = ProgressSender::new(move |pct, step| reporter.publish(codec_band(pct), step));
        let task = tokio::task::spawn_blocking(move || codec.convert(&source, &sender));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(gate.fail(Error::Timeout {
                        secs: limit.as_secs(),
                    }))
                }
            },
            None => task.await,
        };

        let encoded = match joined {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(e)) => return Err(gate.fail(e)),
            Err(e) => {
                return Err(gate.fail(Error::Internal(format!(
                    "{codec_name} conversion task failed: {e}"
                ))))
            }
        };

        let file_name = output_file_name(display_name, encoded.extension);
        let content_type = encoded.content_type.to_string();
        let result_size = encoded.data.len();
        let id = self
            .store
            .put(encoded.data, content_type.clone(), file_name.clone());

        gate.finish(ProgressEvent::new(100.0, "Conversion complete"));

        let ratio = compression_ratio(original_size, result_size);
        tracing::info!(
            codec = codec_name,
            artifact_id = %id,
            original_size,
            result_size,
            ratio = %ratio,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion complete"
        );

        Ok(ConversionResult {
            id,
            download_url: download_url(&id),
            original_size,
            result_size,
            ratio,
            content_type,
            file_name,
        })
    }
}

/// Relative download path for a stored artifact.
pub fn download_url(id: &ArtifactId) -> String {
    format!("/api/download/{id}")
}

/// `(original - result) / original` as a percentage with one decimal.
pub fn compression_ratio(original: usize, result: usize) -> String {
    if original == 0 {
        return "0.0%".to_string();
    }
    let saved = (original as f64 - result as f64) / original as f64 * 100.0;
    format!("{saved:.1}%")
}

fn codec_band(pct: f32) -> f32 {
    let (lo, hi) = CODEC_BAND;
    let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
    lo + pct / 100.0 * (hi - lo)
}

// ---------------------------------------------------------------------------
// ProgressGate
// ---------------------------------------------------------------------------

/// Per-run publisher that keeps progress non-decreasing and drops anything
/// reported after the terminal event.
struct ProgressGate {
    bus: Arc<ProgressBroadcaster>,
    state: Mutex<GateState>,
}

struct GateState {
    last: f32,
    closed: bool,
}

impl ProgressGate {
    fn new(bus: Arc<ProgressBroadcaster>) -> Self {
        Self {
            bus,
            state: Mutex::new(GateState {
                last: 0.0,
                closed: false,
            }),
        }
    }

    fn publish(&self, progress: f32, step: &str) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.last = state.last.max(progress);
        self.bus.publish(ProgressEvent::new(state.last, step));
    }

    fn finish(&self, event: ProgressEvent) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.bus.publish(event);
    }

    fn fail(&self, error: Error) -> Error {
        tracing::warn!(error = %error, "Conversion failed");
        self.finish(ProgressEvent::failed("Conversion failed", error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_codec::Encoded;
    use std::collections::HashSet;
    use tokio::sync::broadcast::Receiver;

    /// Reports the given steps, then returns `output_len` bytes.
    struct SteppingCodec {
        steps: Vec<f32>,
        output_len: usize,
    }

    impl Codec for SteppingCodec {
        fn name(&self) -> &'static str {
            "stepping"
        }

        fn convert(&self, _input: &[u8], progress: &ProgressSender) -> Result<Encoded> {
            for step in &self.steps {
                progress.send(*step, "working");
            }
            Ok(Encoded {
                data: vec![7u8; self.output_len],
                content_type: "image/jpeg",
                extension: "jpg",
            })
        }
    }

    struct FailingCodec;

    impl Codec for FailingCodec {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn convert(&self, _input: &[u8], progress: &ProgressSender) -> Result<Encoded> {
            progress.send(40.0, "half way");
            Err(Error::codec("failing", "corrupt input"))
        }
    }

    /// Sleeps, then keeps reporting as if nothing happened.
    struct SlowCodec;

    impl Codec for SlowCodec {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn convert(&self, _input: &[u8], progress: &ProgressSender) -> Result<Encoded> {
            std::thread::sleep(Duration::from_millis(200));
            progress.send(100.0, "late");
            Ok(Encoded {
                data: vec![1],
                content_type: "application/pdf",
                extension: "pdf",
            })
        }
    }

    fn setup() -> (Orchestrator, Arc<ProgressBroadcaster>, ArtifactStore) {
        let bus = Arc::new(ProgressBroadcaster::new(1024));
        let store = ArtifactStore::default();
        (Orchestrator::new(bus.clone(), store.clone()), bus, store)
    }

    fn drain(rx: &mut Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn stepping(steps: &[f32], output_len: usize) -> Arc<dyn Codec> {
        Arc::new(SteppingCodec {
            steps: steps.to_vec(),
            output_len,
        })
    }

    #[tokio::test]
    async fn success_publishes_ordered_events_ending_at_100() {
        let (orchestrator, bus, store) = setup();
        let mut rx = bus.subscribe();

        let result = orchestrator
            .run(stepping(&[0.0, 50.0, 100.0], 577), vec![0u8; 1000], "photo.png")
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.first().unwrap().progress, STARTED);
        assert_eq!(events.last().unwrap().progress, 100.0);
        assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert!(events.iter().all(|e| !e.is_failure()));
        assert_eq!(events.iter().filter(|e| e.progress == 100.0).count(), 1);

        assert_eq!(result.original_size, 1000);
        assert_eq!(result.result_size, 577);
        assert_eq!(result.ratio, "42.3%");
        assert_eq!(result.file_name, "photo.jpg");
        assert_eq!(result.content_type, "image/jpeg");
        assert_eq!(result.download_url, format!("/api/download/{}", result.id));

        let record = store.peek(&result.id).unwrap();
        assert_eq!(record.size(), 577);
        assert_eq!(record.display_name, "photo.jpg");
    }

    #[tokio::test]
    async fn codec_progress_is_rescaled_into_band() {
        let (orchestrator, bus, _store) = setup();
        let mut rx = bus.subscribe();

        orchestrator
            .run(stepping(&[0.0, 50.0, 100.0], 1), vec![1], "a.png")
            .await
            .unwrap();

        let seen: Vec<f32> = drain(&mut rx).iter().map(|e| e.progress).collect();
        assert_eq!(seen, vec![10.0, 30.0, 60.0, 90.0, 100.0]);
    }

    #[tokio::test]
    async fn regressing_codec_progress_is_held_steady() {
        let (orchestrator, bus, _store) = setup();
        let mut rx = bus.subscribe();

        orchestrator
            .run(stepping(&[80.0, 20.0, 100.0], 1), vec![1], "a.png")
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    }

    #[tokio::test]
    async fn failure_publishes_exactly_one_terminal_event() {
        let (orchestrator, bus, store) = setup();
        let mut rx = bus.subscribe();

        let err = orchestrator
            .run(Arc::new(FailingCodec), vec![1, 2, 3], "a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));

        let events = drain(&mut rx);
        let failures: Vec<_> = events.iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert!(events.last().unwrap().is_failure());
        assert_eq!(events.last().unwrap().progress, 0.0);
        assert!(failures[0].error.as_deref().unwrap().contains("corrupt input"));
        assert!(events.iter().all(|e| e.progress != 100.0));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn timeout_fails_and_silences_late_progress() {
        let (orchestrator, bus, store) = setup();
        let orchestrator = orchestrator.with_timeout(Some(Duration::from_millis(20)));
        let mut rx = bus.subscribe();

        let err = orchestrator
            .run(Arc::new(SlowCodec), vec![1], "doc.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        // Let the abandoned codec thread finish and try to report.
        tokio::time::sleep(Duration::from_millis(400)).await;

        let events = drain(&mut rx);
        assert!(events.last().unwrap().is_failure());
        assert_eq!(events.iter().filter(|e| e.is_failure()).count(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn runs_without_listeners() {
        let (orchestrator, bus, _store) = setup();
        assert_eq!(bus.listener_count(), 0);

        let result = orchestrator
            .run(stepping(&[100.0], 10), vec![0u8; 20], "x.png")
            .await
            .unwrap();
        assert_eq!(result.ratio, "50.0%");
    }

    #[tokio::test]
    async fn concurrent_runs_get_unique_retrievable_ids() {
        let (orchestrator, bus, store) = setup();
        let orchestrator = Arc::new(orchestrator);
        let mut rx = bus.subscribe();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..12 {
            let orchestrator = orchestrator.clone();
            tasks.spawn(async move {
                orchestrator
                    .run(stepping(&[25.0, 75.0, 100.0], i + 1), vec![0u8; 64], "in.png")
                    .await
            });
        }

        let mut ids = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap().unwrap();
            assert!(store.get(&result.id).is_ok());
            ids.insert(result.id);
        }
        assert_eq!(ids.len(), 12);

        let completions = drain(&mut rx)
            .into_iter()
            .filter(|e| e.progress == 100.0)
            .count();
        assert_eq!(completions, 12);
    }

    #[test]
    fn ratio_formatting() {
        assert_eq!(compression_ratio(1000, 577), "42.3%");
        assert_eq!(compression_ratio(100, 100), "0.0%");
        assert_eq!(compression_ratio(100, 150), "-50.0%");
        assert_eq!(compression_ratio(0, 10), "0.0%");
        assert_eq!(compression_ratio(3, 0), "100.0%");
    }
}
