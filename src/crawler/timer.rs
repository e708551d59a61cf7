use std::time::Instant;

/// Drop-guard timer that records an operation's duration when it goes out
/// of scope, on every exit path
pub struct ScopedTimer {
    operation: String,
    started: Instant,
}

impl ScopedTimer {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::trace!("{} started", operation);
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        tracing::debug!(
            "{} finished in {:.2}s",
            self.operation,
            self.started.elapsed().as_secs_f64()
        );
    }
}
