use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::{info, warn};

use super::source::{MotionSource, SourceWorker};
use crate::error::{ScolioError, ScolioResult};
use crate::types::RotationSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An active sensor subscription. Dropping it stops the producer.
struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<RotationSample>,
    shutdown: Arc<AtomicBool>,
    worker: SourceWorker,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.worker.stop();
        info!("Sensor subscription {} stopped", self.id);
    }
}

/// Wraps a motion source and owns at most one live subscription to it.
pub struct OrientationSampler {
    source: Box<dyn MotionSource>,
    channel_capacity: usize,
    next_id: u64,
    active: Option<Subscription>,
}

impl OrientationSampler {
    pub fn new(source: Box<dyn MotionSource>, channel_capacity: usize) -> Self {
        Self {
            source,
            channel_capacity: channel_capacity.max(1),
            next_id: 1,
            active: None,
        }
    }

    /// Starts delivering samples every `interval_ms`. An existing subscription is stopped first.
    pub fn start(&mut self, interval_ms: u64) -> ScolioResult<SubscriptionId> {
        if interval_ms == 0 {
            return Err(ScolioError::InvalidInput("sensor interval must be positive".to_string()));
        }

        if let Some(old) = self.active.take() {
            info!("Replacing sensor subscription {}", old.id);
            drop(old);
        }

        let (sender, receiver) = bounded(self.channel_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = self
            .source
            .spawn(Duration::from_millis(interval_ms), sender, Arc::clone(&shutdown))?;

        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        info!(
            "Sensor subscription {} started on {} source every {}ms",
            id,
            self.source.name(),
            interval_ms
        );

        self.active = Some(Subscription {
            id,
            receiver,
            shutdown,
            worker,
        });
        Ok(id)
    }

    /// Stops the given subscription. Returns false if it is not the active one.
    pub fn stop(&mut self, id: SubscriptionId) -> bool {
        if self.active_id() == Some(id) {
            self.active = None;
            true
        } else {
            warn!("Sensor subscription {} is not active", id);
            false
        }
    }

    pub fn stop_all(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_id(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Takes every sample delivered since the last call.
    ///
    /// Fails with `SensorUnavailable` once the producer has died and nothing is left to read;
    /// the dead subscription is released at that point.
    pub fn drain(&mut self) -> ScolioResult<Vec<RotationSample>> {
        let Some(active) = &self.active else {
            return Ok(Vec::new());
        };

        let mut samples = Vec::new();
        let mut disconnected = false;
        loop {
            match active.receiver.try_recv() {
                Ok(sample) => samples.push(sample),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected && samples.is_empty() {
            if let Some(dead) = self.active.take() {
                warn!("Sensor stream of subscription {} ended", dead.id);
            }
            return Err(ScolioError::SensorUnavailable("sensor stream ended".to_string()));
        }
        Ok(samples)
    }

    /// Latest delivered sample, discarding older ones.
    pub fn latest(&mut self) -> ScolioResult<Option<RotationSample>> {
        Ok(self.drain()?.pop())
    }
}

impl Drop for OrientationSampler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
