pub mod authorization;
pub mod principal;
pub mod settings;
pub mod utils;
