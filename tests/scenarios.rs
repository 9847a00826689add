use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::NaiveDate;

use scoliobuddy::calibration::CalibrationEngine;
use scoliobuddy::config::StorageConfig;
use scoliobuddy::error::ScolioError;
use scoliobuddy::sensor::{OrientationSampler, SimulatedMotionSource};
use scoliobuddy::session::{MeasurementSession, SessionState};
use scoliobuddy::storage::{Repository, StorageService};
use scoliobuddy::types::{Patient, RotationAxis, RotationSample, SpinalLocation};

fn beta(value: f64) -> RotationSample {
    RotationSample::new(0.0, value, 0.0, 0)
}

fn patient(name: &str) -> Patient {
    Patient::new(name, NaiveDate::from_ymd_opt(2010, 9, 1).unwrap(), None).unwrap()
}

fn wait_until<F: FnMut(&mut MeasurementSession) -> bool>(session: &mut MeasurementSession, mut done: F) {
    for _ in 0..500 {
        session.pump().unwrap();
        if done(session) {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("session never reached the expected condition");
}

#[test]
fn calibrated_reading_is_zero_and_angles_are_rounded_distances() {
    let mut engine = CalibrationEngine::new(RotationAxis::Beta);
    engine.calibrate(-3.4);
    assert_eq!(engine.compute_angle(&beta(-3.4)).unwrap(), 0.0);
    assert_eq!(engine.compute_angle(&beta(4.2)).unwrap(), 8.0);
    assert_eq!(engine.compute_angle(&beta(-9.0)).unwrap(), 6.0);
}

#[test]
fn full_measurement_scenario_reaches_repository() {
    let service = StorageService::spawn_in_memory("@scoliobuddy_patients", 8).unwrap();
    let repo: Arc<dyn Repository> = Arc::new(service.client());
    let mia = patient("Mia");
    repo.save_patient(&mia).unwrap();

    let source = SimulatedMotionSource::new(0.0);
    source.set_tilt(0.0, 12.3, 0.0);
    let sampler = OrientationSampler::new(Box::new(source.clone()), 256);
    let mut session = MeasurementSession::open(&mia.id, sampler, RotationAxis::Beta, 2, repo.clone()).unwrap();

    assert_matches!(session.start_measurement(), Err(ScolioError::Uncalibrated));

    wait_until(&mut session, |s| s.engine().last_reading().is_some());
    session.calibrate().unwrap();
    wait_until(&mut session, |s| s.current_angle() == Some(0.0));

    source.set_tilt(0.0, 27.3, 0.0);
    wait_until(&mut session, |s| s.current_angle() == Some(15.0));

    assert_matches!(
        session.save(SpinalLocation::Lumbar, None),
        Err(ScolioError::Precondition { .. })
    );
    session.start_measurement().unwrap();
    let saved = session.save(SpinalLocation::Lumbar, Some("standing")).unwrap();

    assert_eq!(session.state(), SessionState::Saved);
    assert_eq!(source.running_workers(), 0);

    let stored = repo.get_patient(&mia.id).unwrap().unwrap();
    assert_eq!(stored.measurements.len(), 1);
    assert_eq!(stored.measurements[0].angle, 15.0);
    assert_eq!(stored.measurements[0].location, "Lumbar");
    assert_eq!(stored.measurements[0], saved);
}

#[test]
fn back_to_back_measurements_persist_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        path: dir.path().join("patients.db").to_string_lossy().into_owned(),
        ..StorageConfig::default()
    };
    let service = StorageService::spawn_duckdb(&config, 4).unwrap();
    let repo: Arc<dyn Repository> = Arc::new(service.client());
    let mia = patient("Mia");
    repo.save_patient(&mia).unwrap();

    let source = SimulatedMotionSource::new(0.0);
    let mut ids = Vec::new();
    for tilt in [4.0, 11.0] {
        source.set_tilt(0.0, 0.0, 0.0);
        let sampler = OrientationSampler::new(Box::new(source.clone()), 256);
        let mut session = MeasurementSession::open(&mia.id, sampler, RotationAxis::Beta, 2, repo.clone()).unwrap();
        wait_until(&mut session, |s| s.engine().last_reading().is_some());
        session.calibrate().unwrap();
        source.set_tilt(0.0, tilt, 0.0);
        wait_until(&mut session, |s| s.current_angle() == Some(tilt));
        session.start_measurement().unwrap();
        ids.push(session.save(SpinalLocation::Thoracic, None).unwrap().id);
    }

    let stored = repo.get_patient(&mia.id).unwrap().unwrap();
    let angles: Vec<f64> = stored.measurements.iter().map(|m| m.angle).collect();
    let stored_ids: Vec<String> = stored.measurements.iter().map(|m| m.id.clone()).collect();
    assert_eq!(angles, vec![4.0, 11.0]);
    assert_eq!(stored_ids, ids);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn unknown_patient_measurement_leaves_storage_untouched() {
    let service = StorageService::spawn_in_memory("@scoliobuddy_patients", 8).unwrap();
    let repo = service.client();
    let mia = patient("Mia");
    repo.save_patient(&mia).unwrap();
    let before = repo.get_all_patients().unwrap();

    let source = SimulatedMotionSource::new(0.0);
    let sampler = OrientationSampler::new(Box::new(source), 8);
    let result = MeasurementSession::open("nobody", sampler, RotationAxis::Beta, 5, Arc::new(repo.clone()));
    assert_matches!(result, Err(ScolioError::NotFound(_)));
    assert_eq!(repo.get_all_patients().unwrap(), before);
}
