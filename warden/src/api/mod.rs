pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod test_utils;


#[cfg(test)]
mod permission_flow_tests;
