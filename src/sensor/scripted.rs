use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};

use super::source::{MotionSource, SourceWorker};
use crate::error::{ScolioError, ScolioResult};
use crate::types::RotationSample;

/// What one `spawn` call does.
#[derive(Debug, Clone, Copy)]
pub enum Run {
    /// 每毫秒发一个样本，直到关闭
    UntilShutdown,
    /// 立即送出 n 个样本后流结束
    Dies(usize),
}

/// Test source that follows a per-spawn script; spawning past the end of the script fails.
#[derive(Clone)]
pub struct ScriptedMotionSource {
    beta_deg: f64,
    runs: Arc<Mutex<VecDeque<Run>>>,
}

impl ScriptedMotionSource {
    pub fn new(beta_deg: f64, runs: &[Run]) -> Self {
        Self {
            beta_deg,
            runs: Arc::new(Mutex::new(runs.iter().copied().collect())),
        }
    }
}

impl MotionSource for ScriptedMotionSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn spawn(
        &self,
        _interval: Duration,
        sample_sender: Sender<RotationSample>,
        shutdown: Arc<AtomicBool>,
    ) -> ScolioResult<SourceWorker> {
        let run = self.runs.lock().unwrap().pop_front();
        let beta = self.beta_deg;

        match run {
            None => Err(ScolioError::SensorUnavailable("scripted source exhausted".to_string())),
            Some(Run::Dies(count)) => {
                for i in 0..count {
                    sample_sender.send(RotationSample::new(0.0, beta, 0.0, i as i64)).unwrap();
                }
                drop(sample_sender);
                Ok(SourceWorker::new(thread::spawn(|| {})))
            }
            Some(Run::UntilShutdown) => {
                let handle = thread::spawn(move || {
                    let mut t = 0;
                    while !shutdown.load(Ordering::Relaxed) {
                        let sample = RotationSample::new(0.0, beta, 0.0, t);
                        if let Err(TrySendError::Disconnected(_)) = sample_sender.try_send(sample) {
                            break;
                        }
                        t += 1;
                        thread::sleep(Duration::from_millis(1));
                    }
                });
                Ok(SourceWorker::new(handle))
            }
        }
    }
}
