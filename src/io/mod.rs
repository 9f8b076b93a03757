pub mod config_io;
pub mod database;
pub mod fs;
pub mod kv;
pub mod lock;
pub mod watcher;
