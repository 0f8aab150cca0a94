pub mod accounts;
pub mod api_server;
pub mod authorization;
pub mod credentials;
pub mod interval;
pub mod store;
