use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use log::{error, info};

use super::handlers::run_storage_handler;
use super::manager::DuckDbStore;
use super::patients::PatientStore;
use super::store::{BlobStore, MemoryStore};
use crate::config::StorageConfig;
use crate::error::{ScolioError, ScolioResult};
use crate::types::{Measurement, Patient, StorageTask};

/// Read/write contract for patient records used by the measurement session.
pub trait Repository: Send + Sync {
    /// Patients in insertion order.
    fn get_all_patients(&self) -> ScolioResult<Vec<Patient>>;

    fn get_patient(&self, id: &str) -> ScolioResult<Option<Patient>>;

    /// Upsert by id.
    fn save_patient(&self, patient: &Patient) -> ScolioResult<()>;

    fn delete_patient(&self, id: &str) -> ScolioResult<()>;

    /// Appends a measurement; `NotFound` if the patient does not exist.
    fn add_measurement(&self, patient_id: &str, measurement: &Measurement) -> ScolioResult<()>;
}

/// Handle to the storage thread. Cheap to clone; every call is queued behind earlier ones.
#[derive(Clone, Debug)]
pub struct StorageClient {
    task_sender: Sender<StorageTask>,
}

impl StorageClient {
    fn request<T>(&self, build: impl FnOnce(Sender<ScolioResult<T>>) -> StorageTask) -> ScolioResult<T> {
        let (response_sender, response_receiver) = bounded(1);
        let task = build(response_sender);
        let name = task.name();

        self.task_sender
            .send(task)
            .map_err(|_| ScolioError::Persistence("storage thread is not running".to_string()))?;

        response_receiver
            .recv()
            .map_err(|_| ScolioError::Persistence(format!("storage thread dropped {} request", name)))?
    }
}

impl Repository for StorageClient {
    fn get_all_patients(&self) -> ScolioResult<Vec<Patient>> {
        self.request(|response_sender| StorageTask::GetAllPatients { response_sender })
    }

    fn get_patient(&self, id: &str) -> ScolioResult<Option<Patient>> {
        self.request(|response_sender| StorageTask::GetPatient {
            id: id.to_string(),
            response_sender,
        })
    }

    fn save_patient(&self, patient: &Patient) -> ScolioResult<()> {
        self.request(|response_sender| StorageTask::SavePatient {
            patient: patient.clone(),
            response_sender,
        })
    }

    fn delete_patient(&self, id: &str) -> ScolioResult<()> {
        self.request(|response_sender| StorageTask::DeletePatient {
            id: id.to_string(),
            response_sender,
        })
    }

    fn add_measurement(&self, patient_id: &str, measurement: &Measurement) -> ScolioResult<()> {
        self.request(|response_sender| StorageTask::AddMeasurement {
            patient_id: patient_id.to_string(),
            measurement: measurement.clone(),
            response_sender,
        })
    }
}

/// Owns the storage thread. Dropping it stops the thread after the current task.
#[derive(Debug)]
pub struct StorageService {
    client: StorageClient,
    shutdown_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StorageService {
    /// Spawns the storage thread. The store is opened inside the thread; open errors are returned here.
    pub fn spawn<S, F>(open_store: F, blob_key: String, task_capacity: usize) -> ScolioResult<Self>
    where
        S: BlobStore + 'static,
        F: FnOnce() -> ScolioResult<S> + Send + 'static,
    {
        let (task_sender, task_receiver) = bounded(task_capacity.max(1));
        let (ready_sender, ready_receiver) = bounded::<ScolioResult<()>>(1);
        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown_signal);

        let handle = thread::Builder::new()
            .name("storage".to_string())
            .spawn(move || {
                // 在存储线程中打开数据库连接
                let store = match open_store() {
                    Ok(store) => store,
                    Err(e) => {
                        error!("Storage handler thread: Failed to open store: {}", e);
                        let _ = ready_sender.send(Err(e));
                        return;
                    }
                };
                let _ = ready_sender.send(Ok(()));
                run_storage_handler(task_receiver, PatientStore::new(store, blob_key), thread_shutdown);
            })
            .map_err(|e| ScolioError::Persistence(format!("failed to start storage thread: {}", e)))?;

        let opened = ready_receiver
            .recv()
            .unwrap_or_else(|_| Err(ScolioError::Persistence("storage thread exited during startup".to_string())));
        if let Err(e) = opened {
            let _ = handle.join();
            return Err(e);
        }

        Ok(Self {
            client: StorageClient { task_sender },
            shutdown_signal,
            handle: Some(handle),
        })
    }

    pub fn spawn_duckdb(config: &StorageConfig, task_capacity: usize) -> ScolioResult<Self> {
        let store_config = config.clone();
        Self::spawn(
            move || DuckDbStore::open(&store_config),
            config.blob_key.clone(),
            task_capacity,
        )
    }

    pub fn spawn_in_memory(blob_key: &str, task_capacity: usize) -> ScolioResult<Self> {
        Self::spawn(|| Ok(MemoryStore::new()), blob_key.to_string(), task_capacity)
    }

    pub fn client(&self) -> StorageClient {
        self.client.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => info!("Storage thread shut down gracefully"),
                Err(e) => error!("Storage thread panicked: {:?}", e),
            }
        }
    }
}

impl Drop for StorageService {
    fn drop(&mut self) {
        self.stop();
    }
}
