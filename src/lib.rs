pub mod app;
pub mod calibration;
pub mod config;
pub mod error;
pub mod logger;
pub mod sensor;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

pub use calibration::CalibrationEngine;
pub use config::{AppConfig, ConfigManager};
pub use error::{ScolioError, ScolioResult};
pub use sensor::{OrientationSampler, SubscriptionId};
pub use session::{MeasurementSession, SessionState};
pub use storage::{Repository, StorageService};
