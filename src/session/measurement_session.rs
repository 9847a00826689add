use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::state::{SessionEvent, SessionState};
use crate::calibration::CalibrationEngine;
use crate::error::{ScolioError, ScolioResult};
use crate::sensor::{OrientationSampler, SubscriptionId};
use crate::storage::Repository;
use crate::types::{Measurement, RotationAxis, SpinalLocation};
use crate::utils::{generate_record_id, now_iso8601};

/// One visit to the measuring screen for a single patient.
///
/// Owns the sensor subscription for its whole lifetime; it is released on
/// save, close, or drop, and replaced on every (re)calibration.
pub struct MeasurementSession {
    patient_id: String,
    state: SessionState,
    engine: CalibrationEngine,
    sampler: OrientationSampler,
    repository: Arc<dyn Repository>,
    interval_ms: u64,
    subscription: Option<SubscriptionId>,
}

impl std::fmt::Debug for MeasurementSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementSession")
            .field("patient_id", &self.patient_id)
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("interval_ms", &self.interval_ms)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl MeasurementSession {
    pub fn open(
        patient_id: &str,
        mut sampler: OrientationSampler,
        axis: RotationAxis,
        interval_ms: u64,
        repository: Arc<dyn Repository>,
    ) -> ScolioResult<Self> {
        if repository.get_patient(patient_id)?.is_none() {
            return Err(ScolioError::NotFound(patient_id.to_string()));
        }

        let subscription = sampler.start(interval_ms)?;
        info!("Measurement session opened for patient {} ({} axis)", patient_id, axis);

        Ok(Self {
            patient_id: patient_id.to_string(),
            state: SessionState::Uncalibrated,
            engine: CalibrationEngine::new(axis),
            sampler,
            repository,
            interval_ms,
            subscription: Some(subscription),
        })
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    /// Angle currently on display, if calibrated and a sample has arrived since.
    pub fn current_angle(&self) -> Option<f64> {
        self.engine.current_angle()
    }

    /// Feeds the newest pending sample into the engine and returns the displayed angle.
    ///
    /// Fails with `SensorUnavailable` for as long as the sensor stream is down;
    /// readings taken before the stream ended are discarded.
    pub fn pump(&mut self) -> ScolioResult<Option<f64>> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        self.require_live()?;

        match self.sampler.latest() {
            Ok(Some(sample)) => {
                self.engine.observe(&sample);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Sensor lost during measurement for patient {}: {}", self.patient_id, e);
                self.subscription = None;
                self.engine.forget_reading();
                return Err(e);
            }
        }
        Ok(self.engine.current_angle())
    }

    pub fn calibrate(&mut self) -> ScolioResult<f64> {
        let next = self.state.transition(SessionEvent::Calibrate)?;
        self.apply_calibration(next)
    }

    pub fn recalibrate(&mut self) -> ScolioResult<f64> {
        let next = self.state.transition(SessionEvent::Recalibrate)?;
        self.apply_calibration(next)
    }

    /// 等待传感器稳定后自动校准
    pub fn auto_calibrate(&mut self, settle: Duration) -> ScolioResult<f64> {
        thread::sleep(settle);
        self.wait_for_reading()?;
        self.calibrate()
    }

    pub fn start_measurement(&mut self) -> ScolioResult<()> {
        let next = self.state.transition(SessionEvent::StartMeasurement)?;
        self.pump()?;
        self.state = next;
        info!("Measurement started for patient {}", self.patient_id);
        Ok(())
    }

    /// Saves the angle on display right now and ends the session.
    ///
    /// On a storage failure nothing is committed and the session stays in `Measuring`.
    pub fn save(&mut self, location: SpinalLocation, notes: Option<&str>) -> ScolioResult<Measurement> {
        let next = self.state.transition(SessionEvent::Save)?;
        self.pump()?;
        let angle = self.engine.snapshot_angle()?;

        let measurement = Measurement::new(
            generate_record_id(),
            now_iso8601(),
            angle,
            location,
            notes.map(str::to_string),
        );

        if let Err(e) = self.repository.add_measurement(&self.patient_id, &measurement) {
            warn!("Saving measurement for patient {} failed: {}", self.patient_id, e);
            return Err(e);
        }

        self.release_sensor();
        self.state = next;
        info!(
            "Saved {}° {} measurement ({}) for patient {}",
            measurement.angle,
            measurement.location,
            measurement.severity(),
            self.patient_id
        );
        Ok(measurement)
    }

    pub fn cancel(&mut self) -> ScolioResult<()> {
        self.state = self.state.transition(SessionEvent::Cancel)?;
        info!("Measurement cancelled for patient {}", self.patient_id);
        Ok(())
    }

    /// Leaves the session. A session that was not saved ends as `Cancelled`.
    pub fn close(&mut self) -> SessionState {
        if let Ok(next) = self.state.transition(SessionEvent::Close) {
            self.state = next;
        }
        self.release_sensor();
        self.state
    }

    pub fn has_live_subscription(&self) -> bool {
        self.sampler.is_active()
    }

    fn require_live(&self) -> ScolioResult<()> {
        if self.sampler.is_active() {
            Ok(())
        } else {
            Err(ScolioError::SensorUnavailable(
                "sensor stream lost, calibrate again to reconnect".to_string(),
            ))
        }
    }

    /// 稳定期过后还没有读数，再多等几个采样周期
    fn wait_for_reading(&mut self) -> ScolioResult<()> {
        let wait = Duration::from_millis(self.interval_ms.saturating_mul(20));
        let poll = Duration::from_millis(self.interval_ms.clamp(1, 100));
        let started = Instant::now();

        self.pump()?;
        while self.engine.last_reading().is_none() && started.elapsed() < wait {
            thread::sleep(poll);
            self.pump()?;
        }
        Ok(())
    }

    fn apply_calibration(&mut self, next: SessionState) -> ScolioResult<f64> {
        let live = self.sampler.is_active()
            && match self.pump() {
                Ok(_) => true,
                Err(e) => {
                    warn!("Sensor stream ended before calibration: {}", e);
                    false
                }
            };

        if !live {
            info!("Reconnecting sensor for patient {}", self.patient_id);
            self.engine.forget_reading();
            self.subscription = Some(self.sampler.start(self.interval_ms)?);
            self.wait_for_reading()?;
        }

        if self.engine.last_reading().is_none() {
            return Err(ScolioError::SensorUnavailable("no rotation sample received yet".to_string()));
        }

        // 新订阅建立成功后才提交偏移量
        match self.sampler.start(self.interval_ms) {
            Ok(id) => self.subscription = Some(id),
            Err(e) => {
                warn!("Resubscribing sensor failed, calibration not applied: {}", e);
                self.subscription = None;
                self.engine.forget_reading();
                return Err(e);
            }
        }

        let reading = self.engine.calibrate_current()?;
        self.state = next;
        Ok(reading)
    }

    fn release_sensor(&mut self) {
        if let Some(id) = self.subscription.take() {
            if self.sampler.is_active() {
                self.sampler.stop(id);
            }
        }
    }
}

impl Drop for MeasurementSession {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.close();
        }
    }
}
