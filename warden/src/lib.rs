//! warden library
//!
//! Exposes the services and the router so integration tests can drive
//! them without a listening socket.

pub mod api;
pub mod app_state;
pub mod clock;
pub mod http;
pub mod init_telemetry;
pub mod services;
pub mod settings;
pub mod stop_flag;
pub mod store;

pub use app_state::{AppState, SharedAppState};
