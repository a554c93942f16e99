//! CLI module containing argument parsing and event input

pub mod args;
pub mod input;

pub use args::{Args, BacklogAction, Command, ConfigAction};
pub use input::{read_events, EventLine, InputSummary};
