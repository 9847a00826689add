use std::io;
use std::sync::Arc;

use log::{error, info};

use scoliobuddy::app::{spawn_stdin_reader, Console};
use scoliobuddy::config::ConfigManager;
use scoliobuddy::logger;
use scoliobuddy::storage::StorageService;

const CONFIG_FILE: &str = "scoliobuddy.toml";

fn main() {
    logger::init_logger();
    info!("Application starting");

    let config = ConfigManager::load_or_default(CONFIG_FILE).get_config().clone();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Patient data file: {}", config.get_database_path().display());

    // 存储线程独占数据库连接，所有读写按顺序执行
    let storage = match StorageService::spawn_duckdb(
        &config.storage,
        config.channels.storage_task_channel_capacity,
    ) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open patient storage: {}", e);
            std::process::exit(1);
        }
    };

    let lines = match spawn_stdin_reader(16) {
        Ok(lines) => lines,
        Err(e) => {
            error!("Failed to start input thread: {}", e);
            std::process::exit(1);
        }
    };

    let mut console = Console::new(config, Arc::new(storage.client()));
    if let Err(e) = console.run(lines, &mut io::stdout()) {
        error!("Console failed: {}", e);
    }

    // 先关闭测量会话释放传感器，再停止存储线程
    drop(console);
    info!("Console closed, shutting down storage");
    storage.shutdown();
}
