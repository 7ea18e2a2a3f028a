//! HTTP handlers: the informational page, the knock flow, the frps plugin
//! endpoint and health.

pub mod health;
pub mod knock;
pub mod plugin;
pub mod root;

pub use self::health::health;
pub use self::knock::knock;
pub use self::plugin::handler;
pub use self::root::root;
