use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};

use super::commands::{Command, SessionCommand, HELP};
use crate::config::AppConfig;
use crate::error::{ScolioError, ScolioResult};
use crate::sensor::{build_sampler, OrientationSampler};
use crate::session::{MeasurementSession, SessionState};
use crate::storage::Repository;
use crate::types::{Patient, Severity};

/// 在后台线程读取标准输入，每行发送到通道；输入结束时通道断开
pub fn spawn_stdin_reader(capacity: usize) -> io::Result<Receiver<String>> {
    let (line_sender, line_receiver) = bounded(capacity.max(1));

    thread::Builder::new().name("stdin".to_string()).spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_sender.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader exiting");
    })?;

    Ok(line_receiver)
}

type SamplerFactory = Box<dyn Fn(&AppConfig) -> OrientationSampler + Send>;

/// Text front end: patient list and the measuring screen.
pub struct Console {
    config: AppConfig,
    repository: Arc<dyn Repository>,
    make_sampler: SamplerFactory,
    session: Option<MeasurementSession>,
    last_angle: Option<f64>,
}

impl Console {
    pub fn new(config: AppConfig, repository: Arc<dyn Repository>) -> Self {
        Self::with_sampler_factory(config, repository, Box::new(build_sampler))
    }

    /// 自定义传感器来源，每次进入测量页面调用一次
    pub fn with_sampler_factory(
        config: AppConfig,
        repository: Arc<dyn Repository>,
        make_sampler: SamplerFactory,
    ) -> Self {
        Self {
            config,
            repository,
            make_sampler,
            session: None,
            last_angle: None,
        }
    }

    pub fn session(&self) -> Option<&MeasurementSession> {
        self.session.as_ref()
    }

    /// Runs until `quit` or until the line channel closes.
    pub fn run<W: Write>(&mut self, lines: Receiver<String>, out: &mut W) -> io::Result<()> {
        let tick = Duration::from_millis(self.config.sensor.update_interval_ms.max(1));
        writeln!(out, "ScolioBuddy ready, type 'help' for commands")?;

        loop {
            match lines.recv_timeout(tick) {
                Ok(line) => {
                    if !self.handle_line(&line, out)? {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.tick(out)?,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Input closed, leaving console");
                    break;
                }
            }
        }

        self.leave_session();
        Ok(())
    }

    /// Returns `false` when the console should stop.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<bool> {
        if line.trim().is_empty() {
            return Ok(true);
        }

        if self.session.is_some() {
            match SessionCommand::parse(line) {
                Ok(command) => self.handle_session_command(command, out)?,
                Err(e) => writeln!(out, "{}", e)?,
            }
            return Ok(true);
        }

        match Command::parse(line) {
            Ok(Command::Quit) => return Ok(false),
            Ok(command) => {
                if let Err(e) = self.handle_command(command, out) {
                    warn!("Command '{}' failed: {}", line.trim(), e);
                    writeln!(out, "{}", e)?;
                }
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
        Ok(true)
    }

    /// 测量中定期拉取传感器数据，角度变化时输出
    pub fn tick<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        match session.pump() {
            Ok(Some(angle)) if self.last_angle != Some(angle) => {
                self.last_angle = Some(angle);
                debug!("Angle changed to {}°", angle);
                if session.state() == SessionState::Measuring {
                    writeln!(out, "{}° ({})", angle, Severity::classify(angle))?;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Sensor stream failed: {}", e);
                writeln!(out, "{}", e)?;
                self.leave_session();
            }
        }
        Ok(())
    }

    fn handle_command<W: Write>(&mut self, command: Command, out: &mut W) -> ScolioResult<()> {
        match command {
            Command::Patients => {
                let patients = self.repository.get_all_patients()?;
                if patients.is_empty() {
                    write_out(out, "No patients yet")?;
                }
                for patient in &patients {
                    write_out(out, &patient_line(patient))?;
                }
            }
            Command::Add { name, date_of_birth } => {
                let patient = Patient::new(&name, date_of_birth, None)?;
                self.repository.save_patient(&patient)?;
                info!("Added patient {} ({})", patient.name, patient.id);
                write_out(out, &format!("Added {}", patient_line(&patient)))?;
            }
            Command::Show { id } => {
                let patient = self
                    .repository
                    .get_patient(&id)?
                    .ok_or(ScolioError::NotFound(id))?;
                write_out(out, &patient_details(&patient))?;
            }
            Command::Delete { id } => {
                if self.repository.get_patient(&id)?.is_none() {
                    return Err(ScolioError::NotFound(id));
                }
                self.repository.delete_patient(&id)?;
                info!("Deleted patient {}", id);
                write_out(out, &format!("Deleted {}", id))?;
            }
            Command::Measure { id } => self.open_session(&id, out)?,
            Command::Help => write_out(out, HELP)?,
            Command::Quit => {}
        }
        Ok(())
    }

    fn open_session<W: Write>(&mut self, id: &str, out: &mut W) -> ScolioResult<()> {
        let sensor = &self.config.sensor;
        let mut session = MeasurementSession::open(
            id,
            (self.make_sampler)(&self.config),
            sensor.axis,
            sensor.update_interval_ms,
            Arc::clone(&self.repository),
        )?;

        // 进入测量页面后等待稳定再自动校准，失败时保留未校准状态
        match session.auto_calibrate(Duration::from_millis(sensor.settle_delay_ms)) {
            Ok(offset) => write_out(out, &format!("Calibrated (offset {:.1}°)", offset))?,
            Err(e) => {
                warn!("Auto calibration failed: {}", e);
                write_out(out, &format!("{}, type 'calibrate' to retry", e))?;
            }
        }
        write_out(out, &format!("Status: {}", session.state().status_text()))?;

        self.last_angle = None;
        self.session = Some(session);
        Ok(())
    }

    fn handle_session_command<W: Write>(&mut self, command: SessionCommand, out: &mut W) -> io::Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let result = match command {
            SessionCommand::Calibrate => {
                let outcome = if session.state() == SessionState::Uncalibrated {
                    session.calibrate()
                } else {
                    session.recalibrate()
                };
                outcome.map(|offset| format!("Calibrated (offset {:.1}°)", offset))
            }
            SessionCommand::Start => session
                .start_measurement()
                .map(|_| session.state().status_text().to_string()),
            SessionCommand::Save { location, notes } => {
                match session.save(location, notes.as_deref()) {
                    Ok(m) => {
                        writeln!(out, "Saved {}° {} ({})", m.angle, m.location, m.severity())?;
                        self.leave_session();
                        return Ok(());
                    }
                    Err(e) => Err(e),
                }
            }
            SessionCommand::Cancel => session
                .cancel()
                .map(|_| session.state().status_text().to_string()),
            SessionCommand::Angle => match session.pump() {
                Ok(Some(angle)) => Ok(format!("{}° ({})", angle, Severity::classify(angle))),
                Ok(None) => Ok("--".to_string()),
                Err(e) => {
                    error!("Sensor stream failed: {}", e);
                    writeln!(out, "{}", e)?;
                    self.leave_session();
                    return Ok(());
                }
            },
            SessionCommand::Exit => {
                self.leave_session();
                writeln!(out, "Measurement closed")?;
                return Ok(());
            }
        };

        match result {
            Ok(message) => writeln!(out, "{}", message),
            Err(e) => {
                warn!("Session command failed: {}", e);
                writeln!(out, "{}", e)
            }
        }
    }

    fn leave_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            let state = session.close();
            info!("Left measurement for patient {} ({})", session.patient_id(), state);
        }
        self.last_angle = None;
    }
}

fn write_out<W: Write>(out: &mut W, text: &str) -> ScolioResult<()> {
    writeln!(out, "{}", text).map_err(|e| ScolioError::InvalidInput(format!("output failed: {}", e)))
}

fn patient_line(patient: &Patient) -> String {
    let mut line = format!(
        "{}  {}  DOB {}  {}",
        patient.id,
        patient.name,
        patient.date_of_birth,
        patient.measurement_summary()
    );
    if let Some(latest) = patient.latest_measurement() {
        line.push_str(&format!("  latest {}° {}", latest.angle, latest.location));
    }
    line
}

fn patient_details(patient: &Patient) -> String {
    let mut text = format!(
        "{}\nDOB: {}\nAdded: {}\n{}",
        patient.name,
        patient.date_of_birth,
        patient.created_at,
        patient.measurement_summary()
    );
    for m in patient.history() {
        let region = m.spinal_location().map(|l| l.region()).unwrap_or("unknown region");
        text.push_str(&format!(
            "\n  {}  {}°  {} ({})  {}",
            m.date,
            m.angle,
            m.location,
            region,
            m.severity()
        ));
        if let Some(notes) = &m.notes {
            text.push_str(&format!("  \"{}\"", notes));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorSourceKind;
    use crate::storage::StorageService;
    use chrono::NaiveDate;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sensor.source = SensorSourceKind::Simulated;
        config.sensor.simulated_noise_deg = 0.0;
        config.sensor.update_interval_ms = 5;
        config.sensor.settle_delay_ms = 20;
        config
    }

    fn run_script(console: &mut Console, script: &[&str]) -> String {
        let (sender, receiver) = bounded(script.len().max(1));
        for line in script {
            sender.send(line.to_string()).unwrap();
        }
        drop(sender);

        let mut out = Vec::new();
        console.run(receiver, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_add_and_list_patients() {
        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(service.client());
        let mut console = Console::new(test_config(), repo.clone());

        let output = run_script(&mut console, &["add Mia van Dijk 2011-05-14", "patients", "add 2011-05-14"]);

        let patients = repo.get_all_patients().unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].name, "Mia van Dijk");
        assert_eq!(patients[0].date_of_birth, "05/14/2011");
        assert!(output.contains("0 measurements"));
        assert!(output.contains("Please enter patient name"));
    }

    #[test]
    fn test_measure_and_save_flow() {
        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(service.client());
        let patient = Patient::new("Mia", NaiveDate::from_ymd_opt(2011, 5, 14).unwrap(), None).unwrap();
        repo.save_patient(&patient).unwrap();

        let mut console = Console::new(test_config(), repo.clone());
        let measure = format!("measure {}", patient.id);
        let output = run_script(&mut console, &[&measure, "start", "save thoracic first check", "patients"]);

        assert!(output.contains("Calibrated"), "{}", output);
        assert!(output.contains("Saved 0° Thoracic (normal)"), "{}", output);
        assert!(console.session().is_none());

        let stored = repo.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(stored.measurement_count(), 1);
        assert_eq!(stored.measurements[0].notes.as_deref(), Some("first check"));
    }

    #[test]
    fn test_session_rejects_save_before_start() {
        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(service.client());
        let patient = Patient::new("Mia", NaiveDate::from_ymd_opt(2011, 5, 14).unwrap(), None).unwrap();
        repo.save_patient(&patient).unwrap();

        let mut console = Console::new(test_config(), repo.clone());
        let measure = format!("measure {}", patient.id);
        let output = run_script(&mut console, &[&measure, "save lumbar", "exit"]);

        assert!(output.contains("Cannot save while session is calibrated-idle"), "{}", output);
        assert!(output.contains("Measurement closed"));
        assert_eq!(repo.get_patient(&patient.id).unwrap().unwrap().measurement_count(), 0);
    }

    #[test]
    fn test_unknown_patient_commands() {
        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let mut console = Console::new(test_config(), Arc::new(service.client()));

        let output = run_script(&mut console, &["show 404", "measure 404", "delete 404"]);
        assert_eq!(output.matches("Patient not found: 404").count(), 3);
        assert!(console.session().is_none());
    }

    #[test]
    fn test_quit_stops_before_remaining_lines() {
        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(service.client());
        let mut console = Console::new(test_config(), repo.clone());

        run_script(&mut console, &["quit", "add Mia 2011-05-14"]);
        assert!(repo.get_all_patients().unwrap().is_empty());
    }

    #[test]
    fn test_angle_reports_lost_sensor_and_leaves_session() {
        use crate::sensor::scripted::{Run, ScriptedMotionSource};

        let service = StorageService::spawn_in_memory("@test", 8).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(service.client());
        let patient = Patient::new("Mia", NaiveDate::from_ymd_opt(2011, 5, 14).unwrap(), None).unwrap();
        repo.save_patient(&patient).unwrap();

        // 自动校准后重新订阅的流没有任何样本就结束了
        let factory: SamplerFactory = Box::new(|_config: &AppConfig| {
            let source = ScriptedMotionSource::new(20.0, &[Run::UntilShutdown, Run::Dies(0)]);
            OrientationSampler::new(Box::new(source), 256)
        });
        let mut console = Console::with_sampler_factory(test_config(), repo.clone(), factory);

        let measure = format!("measure {}", patient.id);
        let output = run_script(&mut console, &[&measure, "angle", "save lumbar"]);

        assert!(output.contains("Calibrated"), "{}", output);
        assert!(output.contains("Sensor unavailable"), "{}", output);
        assert!(output.contains("unknown command 'save'"), "{}", output);
        assert!(console.session().is_none());
        assert_eq!(repo.get_patient(&patient.id).unwrap().unwrap().measurement_count(), 0);
    }
}
