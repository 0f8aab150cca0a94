use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AuthorizationSettings {
    /// YAML file replacing the built-in ceiling and role defaults
    #[serde(default)]
    pub policy_path: Option<String>,
    /// Deny every non-read action of the lowest role without looking at
    /// its permission document
    #[serde(default = "default_floor_rule")]
    pub floor_rule: bool,
}

fn default_floor_rule() -> bool {
    true
}

impl Default for AuthorizationSettings {
    fn default() -> Self {
        Self {
            policy_path: None,
            floor_rule: default_floor_rule(),
        }
    }
}
