//! Interception worker for courtside.
//!
//! A long-lived process independent of any single page instance. It
//! installs and activates versioned cache generations, intercepts every
//! outgoing request, and decides per request class whether to serve from
//! the persistent cache store, go to network, or fall back to a stale
//! entry. Control messages, background-sync triggers, and push payloads
//! arrive over the same event loop.

pub mod control;
pub mod hooks;
pub mod routes;
pub mod run;
pub mod worker;

pub use control::{ControlCommand, ControlMessage, ControlReply};
pub use hooks::Notification;
pub use routes::RouteClass;
pub use run::WorkerEvent;
pub use worker::{InterceptedRequest, InterceptionWorker, LifecycleState, ResponseSource, ServedResponse};
