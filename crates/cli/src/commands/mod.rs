mod config;
mod watch;

pub use config::run_check_config;
pub use watch::{run_watch, WatchArgs};
