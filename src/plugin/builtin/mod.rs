//! Built-in Producers
//!
//! Host-neutral producers shipped with rumkit. Each keeps its own state and
//! undoes everything it installed on teardown.

pub mod console;
pub mod error;
pub mod lifecycle;
pub mod route;
pub mod urls;

pub use console::{ConsolePlugin, CONSOLE_PLUGIN_NAME};
pub use error::{ErrorPlugin, ErrorReporter, SourceLocation, ERROR_PLUGIN_NAME};
pub use lifecycle::{LifecyclePlugin, LIFECYCLE_PLUGIN_NAME};
pub use route::{Navigation, NavigationKind, Navigator, RoutePlugin, ROUTE_PLUGIN_NAME};
pub use urls::sanitize_url;
