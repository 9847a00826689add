pub mod source;
pub mod sampler;
pub mod simulated;
pub mod mqtt;
#[cfg(test)]
pub(crate) mod scripted;

pub use source::{MotionSource, SourceWorker};
pub use sampler::{OrientationSampler, SubscriptionId};
pub use simulated::SimulatedMotionSource;
pub use mqtt::MqttMotionSource;

use crate::config::{AppConfig, SensorSourceKind};

/// 根据配置创建采样器
pub fn build_sampler(config: &AppConfig) -> OrientationSampler {
    let source: Box<dyn MotionSource> = match config.sensor.source {
        SensorSourceKind::Mqtt => Box::new(MqttMotionSource::new(config.mqtt.clone())),
        SensorSourceKind::Simulated => Box::new(SimulatedMotionSource::new(config.sensor.simulated_noise_deg)),
    };
    OrientationSampler::new(source, config.channels.sample_channel_capacity)
}
