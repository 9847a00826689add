use log::{info, warn};

use super::store::BlobStore;
use crate::error::{ScolioError, ScolioResult};
use crate::types::{Measurement, Patient};

/// Patient collection kept as one JSON blob under a single key.
///
/// Every write reads the whole collection, updates it in memory and writes
/// it back. Callers must not run two writes against the same store at once;
/// the storage thread guarantees that.
pub struct PatientStore<S: BlobStore> {
    store: S,
    key: String,
}

impl<S: BlobStore> PatientStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn get_all_patients(&self) -> ScolioResult<Vec<Patient>> {
        match self.store.get_item(&self.key)? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_patient(&self, id: &str) -> ScolioResult<Option<Patient>> {
        Ok(self.get_all_patients()?.into_iter().find(|p| p.id == id))
    }

    /// Inserts the patient, or replaces the stored one with the same id in place.
    pub fn save_patient(&mut self, patient: Patient) -> ScolioResult<()> {
        let mut patients = self.get_all_patients()?;
        match patients.iter().position(|p| p.id == patient.id) {
            Some(index) => patients[index] = patient,
            None => patients.push(patient),
        }
        self.write(&patients)
    }

    pub fn delete_patient(&mut self, id: &str) -> ScolioResult<()> {
        let mut patients = self.get_all_patients()?;
        let before = patients.len();
        patients.retain(|p| p.id != id);
        if patients.len() == before {
            warn!("Delete requested for unknown patient {}", id);
        }
        self.write(&patients)
    }

    pub fn add_measurement(&mut self, patient_id: &str, measurement: Measurement) -> ScolioResult<()> {
        let mut patients = self.get_all_patients()?;
        let patient = patients
            .iter_mut()
            .find(|p| p.id == patient_id)
            .ok_or_else(|| ScolioError::NotFound(patient_id.to_string()))?;

        info!(
            "Adding {} measurement of {}° to patient {}",
            measurement.location, measurement.angle, patient_id
        );
        patient.measurements.push(measurement);
        self.write(&patients)
    }

    fn write(&mut self, patients: &[Patient]) -> ScolioResult<()> {
        let data = serde_json::to_string(patients)?;
        self.store.set_item(&self.key, &data)
    }
}
