use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use log::error;

use crate::error::ScolioResult;
use crate::types::RotationSample;

/// A producer of device-rotation readings.
///
/// `spawn` starts a background worker that pushes samples into `sample_sender`
/// at roughly `interval` until `shutdown` is raised or the receiver goes away.
/// A source that cannot deliver (no hardware, no permission, broker down)
/// returns `ScolioError::SensorUnavailable` instead of a worker.
pub trait MotionSource: Send {
    fn name(&self) -> &str;

    fn spawn(
        &self,
        interval: Duration,
        sample_sender: Sender<RotationSample>,
        shutdown: Arc<AtomicBool>,
    ) -> ScolioResult<SourceWorker>;
}

/// Background worker of a motion source.
pub struct SourceWorker {
    handle: Option<JoinHandle<()>>,
    stopper: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceWorker {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
            stopper: None,
        }
    }

    /// Extra action run on stop to unblock the worker (e.g. closing a network connection).
    pub fn with_stopper<F>(mut self, stopper: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.stopper = Some(Box::new(stopper));
        self
    }

    /// Wakes the worker and waits for it to exit. The caller raises the shutdown flag first.
    pub fn stop(&mut self) {
        if let Some(stopper) = self.stopper.take() {
            stopper();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Motion source worker panicked");
            }
        }
    }

    /// Lets the worker run to completion on its own without waiting for it.
    pub fn detach(mut self) {
        self.stopper = None;
        self.handle = None;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for SourceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
