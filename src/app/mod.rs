//! Application orchestration module

pub mod execution;
pub mod initialization;

pub use execution::{render_config, run_backlog, run_command, run_send, SendStats};
pub use initialization::{backlog_store, client_options, configure_logging, load_configuration};
