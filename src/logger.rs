use chrono::Local;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// 初始化日志，RUST_LOG 未设置时默认 info
pub fn init_logger() {
    init_logger_with_filter("info");
}

fn init_logger_with_filter(default_filter: &str) {
    let result = Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let level_color = match record.level() {
                Level::Error => "\x1b[31m\x1b[1m", // 红色
                Level::Warn => "\x1b[33m\x1b[1m",  // 黄色
                Level::Info => "\x1b[32m\x1b[1m",  // 绿色
                Level::Debug => "\x1b[36m\x1b[1m", // 青色
                Level::Trace => "\x1b[90m\x1b[1m", // 灰色
            };
            writeln!(
                buf,
                "{}{} {:<5}\x1b[0m [{}:{}] {}",
                time,
                level_color,
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .try_init();

    // 重复初始化时保留已有的 logger
    if let Err(e) = result {
        log::debug!("Logger already initialized: {}", e);
    }
}
