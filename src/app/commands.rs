use chrono::NaiveDate;

use crate::error::{ScolioError, ScolioResult};
use crate::types::SpinalLocation;
use crate::utils::parse_date_of_birth;

/// 病人列表页面的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Patients,
    Add { name: String, date_of_birth: NaiveDate },
    Show { id: String },
    Delete { id: String },
    Measure { id: String },
    Help,
    Quit,
}

/// 测量页面的命令
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Calibrate,
    Start,
    Save { location: SpinalLocation, notes: Option<String> },
    Cancel,
    Angle,
    Exit,
}

fn usage(text: &str) -> ScolioError {
    ScolioError::InvalidInput(format!("usage: {}", text))
}

impl Command {
    pub fn parse(line: &str) -> ScolioResult<Self> {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_lowercase();

        match keyword.as_str() {
            "patients" | "list" => Ok(Command::Patients),
            "add" => {
                // 名字可以包含空格，最后一个词是出生日期
                let rest: Vec<&str> = words.collect();
                let (date, name) = rest.split_last().ok_or_else(|| usage("add <name> <YYYY-MM-DD>"))?;
                if name.is_empty() {
                    return Err(ScolioError::InvalidInput("Please enter patient name".to_string()));
                }
                Ok(Command::Add {
                    name: name.join(" "),
                    date_of_birth: parse_date_of_birth(date)?,
                })
            }
            "show" => Ok(Command::Show { id: single_id(words, "show <id>")? }),
            "delete" => Ok(Command::Delete { id: single_id(words, "delete <id>")? }),
            "measure" => Ok(Command::Measure { id: single_id(words, "measure <id>")? }),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err(ScolioError::InvalidInput("empty command".to_string())),
            other => Err(ScolioError::InvalidInput(format!("unknown command '{}'", other))),
        }
    }
}

impl SessionCommand {
    pub fn parse(line: &str) -> ScolioResult<Self> {
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_lowercase();

        match keyword.as_str() {
            "calibrate" | "recalibrate" => Ok(SessionCommand::Calibrate),
            "start" => Ok(SessionCommand::Start),
            "save" => {
                let location = words
                    .next()
                    .ok_or_else(|| usage("save <cervical|thoracic|lumbar> [notes...]"))?
                    .parse()?;
                let notes: Vec<&str> = words.collect();
                let notes = if notes.is_empty() { None } else { Some(notes.join(" ")) };
                Ok(SessionCommand::Save { location, notes })
            }
            "cancel" => Ok(SessionCommand::Cancel),
            "angle" => Ok(SessionCommand::Angle),
            "exit" | "back" | "quit" => Ok(SessionCommand::Exit),
            "" => Err(ScolioError::InvalidInput("empty command".to_string())),
            other => Err(ScolioError::InvalidInput(format!("unknown command '{}'", other))),
        }
    }
}

fn single_id<'a>(mut words: impl Iterator<Item = &'a str>, text: &str) -> ScolioResult<String> {
    match (words.next(), words.next()) {
        (Some(id), None) => Ok(id.to_string()),
        _ => Err(usage(text)),
    }
}

pub const HELP: &str = "\
commands:
  patients                     list patients
  add <name> <YYYY-MM-DD>      add a patient
  show <id>                    patient details and history
  delete <id>                  delete a patient
  measure <id>                 open a measurement session
  quit
in a session:
  calibrate | start | save <location> [notes...] | cancel | angle | exit";
