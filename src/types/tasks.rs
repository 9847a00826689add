use crossbeam_channel::Sender;

use super::{Measurement, Patient};
use crate::error::ScolioResult;

/// Storage task enumeration, processed one at a time by the storage thread
pub enum StorageTask {
    GetAllPatients {
        response_sender: Sender<ScolioResult<Vec<Patient>>>,
    },
    GetPatient {
        id: String,
        response_sender: Sender<ScolioResult<Option<Patient>>>,
    },
    SavePatient {
        patient: Patient,
        response_sender: Sender<ScolioResult<()>>,
    },
    DeletePatient {
        id: String,
        response_sender: Sender<ScolioResult<()>>,
    },
    AddMeasurement {
        patient_id: String,
        measurement: Measurement,
        response_sender: Sender<ScolioResult<()>>,
    },
}

impl StorageTask {
    pub fn name(&self) -> &'static str {
        match self {
            StorageTask::GetAllPatients { .. } => "get_all_patients",
            StorageTask::GetPatient { .. } => "get_patient",
            StorageTask::SavePatient { .. } => "save_patient",
            StorageTask::DeletePatient { .. } => "delete_patient",
            StorageTask::AddMeasurement { .. } => "add_measurement",
        }
    }
}
