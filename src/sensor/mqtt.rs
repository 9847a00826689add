use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use dotenv::dotenv;
use log::{debug, error, info, warn};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;

use super::source::{MotionSource, SourceWorker};
use crate::config::MqttConfig;
use crate::error::{ScolioError, ScolioResult};
use crate::types::RotationSample;
use crate::utils::{format_timestamp, now_millis};

/// 手机端通过 MQTT 转发的 DeviceMotion 数据，角度单位为弧度
#[derive(Deserialize)]
struct DeviceMotionPayload {
    rotation: Option<RotationRadians>,
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct RotationRadians {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

/// Motion source fed by a phone bridge publishing DeviceMotion events over MQTT.
pub struct MqttMotionSource {
    config: MqttConfig,
}

impl MqttMotionSource {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    fn build_options(&self) -> MqttOptions {
        dotenv().ok(); // 加载 .env 文件

        let mut mqtt_options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker.clone(),
            self.config.port,
        );

        if let (Ok(user), Ok(pass)) = (env::var("MQTT_USER"), env::var("MQTT_PASS")) {
            mqtt_options.set_credentials(user, pass);
        }

        mqtt_options.set_keep_alive(Duration::from_secs(self.config.keep_alive.max(1) as u64));
        mqtt_options
    }
}

impl MotionSource for MqttMotionSource {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn spawn(
        &self,
        interval: Duration,
        sample_sender: Sender<RotationSample>,
        shutdown: Arc<AtomicBool>,
    ) -> ScolioResult<SourceWorker> {
        let (client, mut connection) = Client::new(self.build_options(), 10);
        client
            .subscribe(self.config.topic.clone(), QoS::AtMostOnce)
            .map_err(|e| ScolioError::SensorUnavailable(format!("MQTT subscribe failed: {}", e)))?;

        let topic = self.config.topic.clone();
        let thread_shutdown = Arc::clone(&shutdown);
        let (ready_sender, ready_receiver) = bounded::<Result<(), String>>(1);

        let handle = thread::Builder::new()
            .name("motion-mqtt".to_string())
            .spawn(move || {
                let mut ready_sender = Some(ready_sender);
                let mut last_forwarded: Option<Instant> = None;

                for event in connection.iter() {
                    // 检查关闭信号
                    if thread_shutdown.load(Ordering::Relaxed) {
                        info!("MQTT motion thread received shutdown signal, exiting");
                        break;
                    }

                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("MQTT motion source connected");
                            if let Some(tx) = ready_sender.take() {
                                let _ = tx.send(Ok(()));
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                            // 按采样间隔限流
                            if last_forwarded.is_some_and(|t| t.elapsed() < interval) {
                                continue;
                            }
                            match parse_motion_payload(&publish.payload) {
                                Ok(Some(sample)) => match sample_sender.try_send(sample) {
                                    Ok(()) => {
                                        debug!(
                                            "Rotation sample - alpha: {:.2}, beta: {:.2}, gamma: {:.2}, time: {}",
                                            sample.alpha_deg,
                                            sample.beta_deg,
                                            sample.gamma_deg,
                                            format_timestamp(sample.timestamp)
                                        );
                                        last_forwarded = Some(Instant::now());
                                    }
                                    Err(TrySendError::Full(_)) => debug!("Sample channel full, dropping reading"),
                                    Err(TrySendError::Disconnected(_)) => {
                                        info!("Sample channel disconnected, MQTT motion thread exiting");
                                        break;
                                    }
                                },
                                Ok(None) => {} // 没有 rotation 字段
                                Err(e) => warn!("Invalid motion data: {}", e),
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            match ready_sender.take() {
                                Some(tx) => {
                                    let _ = tx.send(Err(e.to_string()));
                                }
                                None => error!("MQTT connection error: {}", e),
                            }
                            break;
                        }
                    }
                }
            })
            .map_err(|e| ScolioError::SensorUnavailable(format!("failed to start MQTT thread: {}", e)))?;

        let stop_client = client.clone();
        let worker = SourceWorker::new(handle).with_stopper(move || {
            let _ = stop_client.disconnect();
        });

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let failure = match ready_receiver.recv_timeout(timeout) {
            Ok(Ok(())) => return Ok(worker),
            Ok(Err(e)) => format!("cannot reach broker {}:{}: {}", self.config.broker, self.config.port, e),
            Err(RecvTimeoutError::Timeout) => format!(
                "no answer from broker {}:{} within {}ms",
                self.config.broker, self.config.port, self.config.connect_timeout_ms
            ),
            Err(RecvTimeoutError::Disconnected) => "MQTT thread exited before connecting".to_string(),
        };

        shutdown.store(true, Ordering::Relaxed);
        if worker.is_finished() {
            drop(worker);
        } else {
            // 线程卡在连接中，下一个事件到达时会看到关闭信号自行退出
            let _ = client.disconnect();
            worker.detach();
        }
        Err(ScolioError::SensorUnavailable(failure))
    }
}

fn parse_motion_payload(payload: &[u8]) -> Result<Option<RotationSample>, String> {
    let payload_str = std::str::from_utf8(payload).map_err(|e| format!("Invalid UTF-8: {}", e))?;

    let motion = serde_json::from_str::<DeviceMotionPayload>(payload_str)
        .map_err(|e| format!("JSON parsing error: {}", e))?;

    Ok(motion.rotation.map(|r| {
        RotationSample::from_radians(r.alpha, r.beta, r.gamma, motion.timestamp.unwrap_or_else(now_millis))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_converts_radians_to_degrees() {
        let payload = br#"{"rotation":{"alpha":0.0,"beta":0.5235987755982988,"gamma":-1.5707963267948966},"timestamp":1700000000000}"#;
        let sample = parse_motion_payload(payload).unwrap().unwrap();

        assert!((sample.beta_deg - 30.0).abs() < 1e-9);
        assert!((sample.gamma_deg + 90.0).abs() < 1e-9);
        assert_eq!(sample.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_parse_skips_events_without_rotation() {
        let payload = br#"{"acceleration":{"x":0.1,"y":0.0,"z":9.8}}"#;
        assert_eq!(parse_motion_payload(payload).unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_motion_payload(b"not json").is_err());
        assert!(parse_motion_payload(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_unreachable_broker_is_sensor_unavailable() {
        let config = MqttConfig {
            broker: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_ms: 2000,
            ..MqttConfig::default()
        };
        let source = MqttMotionSource::new(config);
        let (tx, _rx) = bounded(4);

        let result = source.spawn(Duration::from_millis(100), tx, Arc::new(AtomicBool::new(false)));
        assert!(matches!(result, Err(ScolioError::SensorUnavailable(_))));
    }
}
