//! The single entry point every CLI hook event passes through: normalize,
//! run pre-core plugin handlers, delegate to the workflow engine, run
//! post-core observers, broadcast. See [`dispatcher::HookDispatcher`].

pub mod dispatcher;
pub mod event;
pub mod plugin;
pub mod response;

pub use dispatcher::HookDispatcher;
pub use event::{HookEvent, HookEventType};
pub use plugin::PluginHandler;
pub use response::HookResponse;
