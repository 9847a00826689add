use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::patients::PatientStore;
use super::store::BlobStore;
use crate::error::ScolioResult;
use crate::types::StorageTask;

/// 存储线程主循环：任务按到达顺序逐个执行，写操作不会交错
pub fn run_storage_handler<S: BlobStore>(
    task_receiver: Receiver<StorageTask>,
    mut patients: PatientStore<S>,
    shutdown_signal: Arc<AtomicBool>,
) {
    info!("Storage handler thread started");

    while !shutdown_signal.load(Ordering::Relaxed) {
        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => handle_task(&mut patients, task),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // 超时，继续循环检查关闭信号
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                info!("Storage handler: Task channel disconnected, exiting");
                break;
            }
        }
    }

    // 关闭前把已排队的任务处理完，排队中的调用方都能拿到结果
    let mut drained = 0;
    while let Ok(task) = task_receiver.try_recv() {
        handle_task(&mut patients, task);
        drained += 1;
    }
    if drained > 0 {
        info!("Storage handler: finished {} queued tasks before exit", drained);
    }

    info!("Storage handler thread exiting gracefully");
}

fn handle_task<S: BlobStore>(patients: &mut PatientStore<S>, task: StorageTask) {
    let name = task.name();
    debug!("Storage handler: running {}", name);

    match task {
        StorageTask::GetAllPatients { response_sender } => {
            reply(name, &response_sender, patients.get_all_patients());
        }
        StorageTask::GetPatient { id, response_sender } => {
            reply(name, &response_sender, patients.get_patient(&id));
        }
        StorageTask::SavePatient { patient, response_sender } => {
            reply(name, &response_sender, patients.save_patient(patient));
        }
        StorageTask::DeletePatient { id, response_sender } => {
            reply(name, &response_sender, patients.delete_patient(&id));
        }
        StorageTask::AddMeasurement { patient_id, measurement, response_sender } => {
            reply(name, &response_sender, patients.add_measurement(&patient_id, measurement));
        }
    }
}

fn reply<T>(name: &str, response_sender: &Sender<ScolioResult<T>>, result: ScolioResult<T>) {
    if let Err(e) = &result {
        error!("Storage handler: {} failed: {}", name, e);
    }
    if response_sender.send(result).is_err() {
        // 调用方已放弃等待，结果已经落盘或失败，不影响存储状态
        warn!("Storage handler: caller of {} is gone, result dropped", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Patient;
    use chrono::NaiveDate;
    use crossbeam_channel::bounded;

    #[test]
    fn test_queued_tasks_are_answered_after_shutdown() {
        let (task_sender, task_receiver) = bounded(4);
        let (save_sender, save_receiver) = bounded(1);
        let (list_sender, list_receiver) = bounded(1);
        let patient = Patient::new("Mia", NaiveDate::from_ymd_opt(2011, 5, 14).unwrap(), None).unwrap();

        task_sender
            .send(StorageTask::SavePatient {
                patient: patient.clone(),
                response_sender: save_sender,
            })
            .unwrap();
        task_sender
            .send(StorageTask::GetAllPatients { response_sender: list_sender })
            .unwrap();

        // 关闭信号已经置位，循环一次都不会进入
        let shutdown = Arc::new(AtomicBool::new(true));
        run_storage_handler(task_receiver, PatientStore::new(MemoryStore::new(), "@test"), shutdown);

        assert_eq!(save_receiver.try_recv().unwrap(), Ok(()));
        assert_eq!(list_receiver.try_recv().unwrap(), Ok(vec![patient]));
    }
}
