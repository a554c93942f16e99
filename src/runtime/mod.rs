//! Runtime Context
//!
//! Session identity and configuration shared by every producer and the
//! transport. Created once per client; only the page id, tags and user id
//! change afterwards.

pub mod context;
pub mod id;

pub use context::{ContextOptions, RuntimeContext, SharedContext};
pub use id::gen_id;
