// Tessera node host: owns the store, dispatches the consensus lifecycle to
// the active protocol version and switches versions in place.
pub mod activation;
pub mod app;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;

pub use app::{TesseraApp, QUERY_APP_VERSION};
pub use config::{ConfigError, DbBackend, NodeConfig};
pub use error::NodeError;
pub use hooks::HookSlots;
pub use logging::init_logging;
