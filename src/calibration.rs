use log::{debug, info};

use crate::error::{ScolioError, ScolioResult};
use crate::types::{RotationAxis, RotationSample};

/// Converts raw rotation readings into a calibrated angle.
///
/// Calibration captures the current reading of one axis as the offset; every
/// later reading of that same axis is shown as `round(|reading - offset|)`,
/// so the phone's own resting tilt is nulled out and left/right tilt both
/// read as a positive magnitude.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    axis: RotationAxis,
    offset: Option<f64>,
    last_reading: Option<f64>,
    current_angle: Option<f64>,
}

impl CalibrationEngine {
    pub fn new(axis: RotationAxis) -> Self {
        Self {
            axis,
            offset: None,
            last_reading: None,
            current_angle: None,
        }
    }

    pub fn axis(&self) -> RotationAxis {
        self.axis
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn is_calibrated(&self) -> bool {
        self.offset.is_some()
    }

    /// Latest raw reading of the engine's axis.
    pub fn last_reading(&self) -> Option<f64> {
        self.last_reading
    }

    /// Angle computed from the latest sample observed since the last calibration.
    pub fn current_angle(&self) -> Option<f64> {
        self.current_angle
    }

    /// 记录最新读数，已校准时同时更新角度
    pub fn observe(&mut self, sample: &RotationSample) -> Option<f64> {
        let reading = sample.axis_value(self.axis);
        self.last_reading = Some(reading);
        if let Some(offset) = self.offset {
            self.current_angle = Some(angle_between(reading, offset));
        }
        self.current_angle
    }

    pub fn calibrate(&mut self, raw_reading: f64) {
        self.offset = Some(raw_reading);
        // 旧偏移下算出的角度作废，等下一个样本重新计算
        self.current_angle = None;
        info!("Calibrated {} axis at {:.2}°", self.axis, raw_reading);
    }

    /// Calibrates at the latest observed reading.
    pub fn calibrate_current(&mut self) -> ScolioResult<f64> {
        let reading = self.last_reading.ok_or_else(|| {
            ScolioError::SensorUnavailable("no rotation sample received yet".to_string())
        })?;
        self.calibrate(reading);
        Ok(reading)
    }

    pub fn compute_angle(&self, sample: &RotationSample) -> ScolioResult<f64> {
        let offset = self.offset.ok_or(ScolioError::Uncalibrated)?;
        let angle = angle_between(sample.axis_value(self.axis), offset);
        debug!("{} {:.2}° -> {}°", self.axis, sample.axis_value(self.axis), angle);
        Ok(angle)
    }

    /// 传感器断开后丢弃旧读数，偏移量保留
    pub fn forget_reading(&mut self) {
        self.last_reading = None;
        self.current_angle = None;
    }

    /// Angle of the latest reading, computed now if no sample arrived since calibration.
    pub fn snapshot_angle(&self) -> ScolioResult<f64> {
        let offset = self.offset.ok_or(ScolioError::Uncalibrated)?;
        match (self.current_angle, self.last_reading) {
            (Some(angle), _) => Ok(angle),
            (None, Some(reading)) => Ok(angle_between(reading, offset)),
            (None, None) => Err(ScolioError::SensorUnavailable(
                "no rotation sample received yet".to_string(),
            )),
        }
    }
}

/// 整数度
fn angle_between(reading: f64, offset: f64) -> f64 {
    (reading - offset).abs().round()
}
