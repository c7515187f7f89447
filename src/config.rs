use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Capability flags for one configured endpoint.
///
/// Transaction-only endpoints are kept out of the generic pool so that
/// bulk queries never burn the rate limit of the providers reserved for
/// sending transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointRoles {
    #[serde(default)]
    pub generic: bool,
    #[serde(default)]
    pub transaction_only: bool,
    #[serde(default)]
    pub push_capable: bool,
}

/// One externally configured network access point to the ledger network.
///
/// Immutable after load; the pool only ever reads these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub roles: EndpointRoles,
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField {
                field: "name".to_string(),
            });
        }
        if !self.url.starts_with("http://")
            && !self.url.starts_with("https://")
            && !self.url.starts_with("ws://")
            && !self.url.starts_with("wss://")
        {
            return Err(ConfigError::InvalidRpcUrl {
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

/// Loads endpoint definitions from a JSON file.
pub fn load_endpoints(path: &str) -> Result<Vec<EndpointConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.to_string(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_string(),
                msg: e.to_string(),
            }
        }
    })?;
    parse_endpoints(&raw)
}

/// Parses endpoint definitions from a JSON string.
pub fn parse_endpoints(raw: &str) -> Result<Vec<EndpointConfig>, ConfigError> {
    let endpoints: Vec<EndpointConfig> =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
            field: "endpoints".to_string(),
            reason: e.to_string(),
        })?;

    for endpoint in &endpoints {
        endpoint.validate()?;
    }
    Ok(endpoints)
}
