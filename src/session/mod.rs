pub mod state;
pub mod measurement_session;

pub use state::{SessionEvent, SessionState};
pub use measurement_session::MeasurementSession;
