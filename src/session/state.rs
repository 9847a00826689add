use crate::error::{ScolioError, ScolioResult};

/// Measurement session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uncalibrated,
    CalibratedIdle,
    Measuring,
    Saved,
    /// Left without saving.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Calibrate,
    Recalibrate,
    StartMeasurement,
    Save,
    Cancel,
    Close,
}

impl SessionEvent {
    fn action(&self) -> &'static str {
        match self {
            SessionEvent::Calibrate => "calibrate",
            SessionEvent::Recalibrate => "recalibrate",
            SessionEvent::StartMeasurement => "start measurement",
            SessionEvent::Save => "save",
            SessionEvent::Cancel => "cancel",
            SessionEvent::Close => "close",
        }
    }
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Saved | SessionState::Cancelled)
    }

    /// 状态栏显示的文字
    pub fn status_text(&self) -> &'static str {
        match self {
            SessionState::Uncalibrated => "Not Calibrated",
            SessionState::CalibratedIdle => "Calibrated",
            SessionState::Measuring => "Measuring...",
            SessionState::Saved => "Saved",
            SessionState::Cancelled => "Cancelled",
        }
    }

    /// The state reached by applying `event`, or why the event is not allowed here.
    pub fn transition(self, event: SessionEvent) -> ScolioResult<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Uncalibrated | CalibratedIdle, Calibrate) => Ok(CalibratedIdle),
            (CalibratedIdle, Recalibrate) => Ok(CalibratedIdle),
            (Uncalibrated, Recalibrate | StartMeasurement) => Err(ScolioError::Uncalibrated),
            (CalibratedIdle, StartMeasurement) => Ok(Measuring),
            (Measuring, Save) => Ok(Saved),
            (Measuring, Cancel) => Ok(CalibratedIdle),
            (Saved | Cancelled, Close) => Ok(self),
            (_, Close) => Ok(Cancelled),
            (state, event) => Err(ScolioError::Precondition {
                action: event.action(),
                state: state.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uncalibrated => "uncalibrated",
            SessionState::CalibratedIdle => "calibrated-idle",
            SessionState::Measuring => "measuring",
            SessionState::Saved => "saved",
            SessionState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use SessionEvent::*;
    use SessionState::*;

    const ALL_STATES: [SessionState; 5] = [Uncalibrated, CalibratedIdle, Measuring, Saved, Cancelled];

    #[test]
    fn test_happy_path() {
        let state = Uncalibrated.transition(Calibrate).unwrap();
        assert_eq!(state, CalibratedIdle);
        let state = state.transition(Recalibrate).unwrap();
        assert_eq!(state, CalibratedIdle);
        let state = state.transition(StartMeasurement).unwrap();
        assert_eq!(state, Measuring);
        assert_eq!(state.transition(Cancel).unwrap(), CalibratedIdle);
        assert_eq!(state.transition(Save).unwrap(), Saved);
    }

    #[test]
    fn test_start_requires_calibration() {
        assert_matches!(Uncalibrated.transition(StartMeasurement), Err(ScolioError::Uncalibrated));
        assert_matches!(Uncalibrated.transition(Recalibrate), Err(ScolioError::Uncalibrated));
        assert_matches!(Measuring.transition(StartMeasurement), Err(ScolioError::Precondition { .. }));
    }

    #[test]
    fn test_save_only_while_measuring() {
        for state in ALL_STATES {
            let result = state.transition(Save);
            if state == Measuring {
                assert_eq!(result.unwrap(), Saved);
            } else {
                assert_matches!(result, Err(ScolioError::Precondition { action: "save", .. }));
            }
        }
    }

    #[test]
    fn test_no_calibration_while_measuring_or_finished() {
        for state in [Measuring, Saved, Cancelled] {
            assert_matches!(state.transition(Calibrate), Err(ScolioError::Precondition { .. }));
        }
    }

    #[test]
    fn test_close_ends_every_state() {
        for state in ALL_STATES {
            let closed = state.transition(Close).unwrap();
            assert!(closed.is_terminal());
        }
        assert_eq!(Saved.transition(Close).unwrap(), Saved);
        assert_eq!(Measuring.transition(Close).unwrap(), Cancelled);
    }

    #[test]
    fn test_terminal_states_reject_everything_but_close() {
        for state in [Saved, Cancelled] {
            for event in [Calibrate, Recalibrate, StartMeasurement, Save, Cancel] {
                assert!(state.transition(event).is_err());
            }
        }
    }

    #[test]
    fn test_precondition_message_names_state() {
        let err = CalibratedIdle.transition(Save).unwrap_err();
        assert_eq!(err.to_string(), "Cannot save while session is calibrated-idle");
    }
}
