//! Thread-safe capture of compiler stderr.
//!
//! Chunks may arrive from any thread between `register` and `unregister`;
//! appends outside that window are discarded. The audit materializes the
//! buffer once via `snapshot`.

use std::sync::Mutex;

#[derive(Debug, Default)]
struct CaptureState {
    capturing: bool,
    buffer: String,
}

#[derive(Debug, Default)]
pub struct CompilationCapture {
    state: Mutex<CaptureState>,
}

impl CompilationCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting chunks. The buffer is cleared so a capture window
    /// always starts empty.
    pub fn register(&self) {
        let mut state = self.lock();
        state.capturing = true;
        state.buffer.clear();
    }

    /// Stop accepting chunks; the captured text stays readable.
    pub fn unregister(&self) {
        self.lock().capturing = false;
    }

    /// Append a chunk if a capture window is open; otherwise discard it.
    pub fn append(&self, chunk: &str) {
        let mut state = self.lock();
        if state.capturing {
            state.buffer.push_str(chunk);
        }
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> String {
        self.lock().buffer.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CaptureState> {
        // A panic while holding the lock leaves the buffer intact; keep
        // going with whatever was captured.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn appends_only_inside_capture_window() {
        let capture = CompilationCapture::new();
        capture.append("before\n");
        capture.register();
        capture.append("during\n");
        capture.unregister();
        capture.append("after\n");
        assert_eq!(capture.snapshot(), "during\n");
    }

    #[test]
    fn register_resets_previous_window() {
        let capture = CompilationCapture::new();
        capture.register();
        capture.append("first\n");
        capture.unregister();
        capture.register();
        capture.append("second\n");
        capture.unregister();
        assert_eq!(capture.snapshot(), "second\n");
    }

    #[test]
    fn concurrent_appends_preserve_every_chunk() {
        let capture = Arc::new(CompilationCapture::new());
        capture.register();

        let mut handles = Vec::new();
        for t in 0..4 {
            let capture = Arc::clone(&capture);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    capture.append(&format!("e: [kapt] worker {} error {}\n", t, i));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        capture.unregister();

        let snapshot = capture.snapshot();
        assert_eq!(snapshot.lines().count(), 200);
        assert!(snapshot.lines().all(|l| l.starts_with("e: [kapt] worker")));
    }
}
