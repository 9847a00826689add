use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::RotationAxis;

/// 应用配置管理模块
/// 集中管理所有配置项，提供默认值和配置验证

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub storage: StorageConfig,
    pub mqtt: MqttConfig,
    pub channels: ChannelConfig,
}

/// 传感器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub update_interval_ms: u64,
    /// 打开测量会话后等待传感器稳定再自动校准
    pub settle_delay_ms: u64,
    pub axis: RotationAxis,
    pub source: SensorSourceKind,
    pub simulated_noise_deg: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorSourceKind {
    Mqtt,
    Simulated,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub blob_key: String,
    pub auto_create_dir: bool,
}

/// MQTT配置，手机端把 DeviceMotion 数据发布到 topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub keep_alive: u16,
    pub connect_timeout_ms: u64,
}

/// 通道配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub sample_channel_capacity: usize,
    pub storage_task_channel_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 100,
            settle_delay_ms: 500,
            axis: RotationAxis::Beta,
            source: SensorSourceKind::Mqtt,
            simulated_noise_deg: 0.2,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/scoliobuddy.db".to_string(),
            blob_key: "@scoliobuddy_patients".to_string(),
            auto_create_dir: true,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "scoliobuddy_client".to_string(),
            topic: "device/motion".to_string(),
            keep_alive: 5,
            connect_timeout_ms: 3000,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            sample_channel_capacity: 256,
            storage_task_channel_capacity: 100,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.update_interval_ms == 0 {
            return Err(ConfigError::ValidationError("Sensor update interval must be positive".to_string()));
        }

        if self.sensor.simulated_noise_deg < 0.0 {
            return Err(ConfigError::ValidationError("Simulated noise must not be negative".to_string()));
        }

        if self.storage.blob_key.trim().is_empty() {
            return Err(ConfigError::ValidationError("Storage key must not be empty".to_string()));
        }

        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::ValidationError("MQTT topic must not be empty".to_string()));
        }

        if self.channels.sample_channel_capacity == 0 || self.channels.storage_task_channel_capacity == 0 {
            return Err(ConfigError::ValidationError("Channel capacity must be positive".to_string()));
        }

        Ok(())
    }

    /// 获取数据库文件路径
    pub fn get_database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.path)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// 文件不存在或无效时使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self {
                config: AppConfig::default(),
                config_path: Some(path.to_path_buf()),
            };
        }

        match Self::load_from_file(path) {
            Ok(manager) => {
                info!("Loaded config from {}", path.display());
                manager
            }
            Err(e) => {
                warn!("Failed to load config {}: {}, using defaults", path.display(), e);
                Self::new()
            }
        }
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// 保存配置
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            self.config.save_to_file(path)?;
        }
        Ok(())
    }

    /// 保存配置到指定文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.config.save_to_file(path)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
