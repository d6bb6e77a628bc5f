//! Ingress document generated from route mappings when the agent runs in
//! config-file mode.

use burrow_common::RouteMapping;
use serde::{Deserialize, Serialize};

/// Service answering every request that matches no route.
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

/// One entry of the agent's `ingress:` list. The catch-all has no hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
}

/// The YAML document passed to the agent with `--config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressDocument {
    pub ingress: Vec<IngressRule>,
}

impl IngressDocument {
    /// One rule per route, in input order, terminated by the catch-all.
    #[must_use]
    pub fn from_routes(routes: &[RouteMapping]) -> Self {
        let ingress = routes
            .iter()
            .map(|r| IngressRule {
                hostname: Some(r.hostname.clone()),
                service: r.service.clone(),
            })
            .chain(std::iter::once(IngressRule {
                hostname: None,
                service: CATCH_ALL_SERVICE.to_string(),
            }))
            .collect();
        Self { ingress }
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
