//! Progress reporting from inside a codec.

/// Sender for reporting codec progress.
///
/// Wraps a callback that receives a percentage (0.0 -- 100.0) of the codec's
/// own work and a short step description. Codecs run on a blocking thread, so
/// the callback must not block.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn forwards_reports_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sender = ProgressSender::new(move |p, step| {
            sink.lock().unwrap().push((p, step.to_string()));
        });

        sender.send(25.0, "Decoded");
        sender.send(100.0, "Done");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (25.0, "Decoded".to_string()));
        assert_eq!(seen[1].0, 100.0);
    }

    #[test]
    fn noop_accepts_reports() {
        ProgressSender::noop().send(50.0, "ignored");
    }
}
