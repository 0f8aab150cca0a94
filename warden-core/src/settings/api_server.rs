use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[allow(unused)]
#[readonly::make]
pub struct ApiServer {
    pub bind_address: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ApiServer {
    fn default() -> Self {
        ApiServer {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}
