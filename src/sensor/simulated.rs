use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info};
use rand::Rng;

use super::source::{MotionSource, SourceWorker};
use crate::error::{ScolioError, ScolioResult};
use crate::types::RotationSample;
use crate::utils::now_millis;

/// 软件模拟的姿态传感器，倾角可随时修改，用于无手机时调试和测试
#[derive(Clone)]
pub struct SimulatedMotionSource {
    tilt: Arc<Mutex<[f64; 3]>>, // alpha, beta, gamma (度)
    noise_deg: f64,
    available: bool,
    running_workers: Arc<AtomicUsize>,
}

impl SimulatedMotionSource {
    pub fn new(noise_deg: f64) -> Self {
        Self {
            tilt: Arc::new(Mutex::new([0.0; 3])),
            noise_deg: noise_deg.max(0.0),
            available: true,
            running_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 模拟没有传感器/权限被拒绝
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0.0)
        }
    }

    pub fn set_tilt(&self, alpha_deg: f64, beta_deg: f64, gamma_deg: f64) {
        let mut tilt = self.tilt.lock().unwrap_or_else(|p| p.into_inner());
        *tilt = [alpha_deg, beta_deg, gamma_deg];
    }

    pub fn tilt(&self) -> [f64; 3] {
        *self.tilt.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// 当前仍在运行的采样线程数量
    pub fn running_workers(&self) -> usize {
        self.running_workers.load(Ordering::SeqCst)
    }

    fn read(&self) -> RotationSample {
        let [alpha, beta, gamma] = self.tilt();
        if self.noise_deg > 0.0 {
            let mut rng = rand::rng();
            let n = self.noise_deg;
            RotationSample::new(
                alpha + rng.random_range(-n..=n),
                beta + rng.random_range(-n..=n),
                gamma + rng.random_range(-n..=n),
                now_millis(),
            )
        } else {
            RotationSample::new(alpha, beta, gamma, now_millis())
        }
    }
}

impl MotionSource for SimulatedMotionSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn spawn(
        &self,
        interval: Duration,
        sample_sender: Sender<RotationSample>,
        shutdown: Arc<AtomicBool>,
    ) -> ScolioResult<SourceWorker> {
        if !self.available {
            return Err(ScolioError::SensorUnavailable(
                "simulated sensor is disabled".to_string(),
            ));
        }

        let source = self.clone();
        source.running_workers.fetch_add(1, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name("motion-simulated".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    match sample_sender.try_send(source.read()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => debug!("Sample channel full, dropping reading"),
                        Err(TrySendError::Disconnected(_)) => {
                            info!("Sample channel disconnected, simulated sensor exiting");
                            break;
                        }
                    }
                }
                source.running_workers.fetch_sub(1, Ordering::SeqCst);
            });

        match handle {
            Ok(handle) => Ok(SourceWorker::new(handle)),
            Err(e) => {
                self.running_workers.fetch_sub(1, Ordering::SeqCst);
                Err(ScolioError::SensorUnavailable(format!("failed to start sensor thread: {}", e)))
            }
        }
    }
}
