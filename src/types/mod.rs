pub mod rotation_sample;
pub mod measurement;
pub mod patient;
pub mod tasks;

pub use rotation_sample::{RotationSample, RotationAxis};
pub use measurement::{Measurement, SpinalLocation, Severity};
pub use patient::Patient;
pub use tasks::StorageTask;
