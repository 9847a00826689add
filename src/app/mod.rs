pub mod commands;
pub mod console;

pub use commands::{Command, SessionCommand};
pub use console::{spawn_stdin_reader, Console};
