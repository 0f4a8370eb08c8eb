use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

/// A monitored domain, with optional per-domain overrides of the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    pub domain: String,
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub status: Option<u16>,
    /// Carried from the config file, not evaluated yet.
    #[serde(default)]
    pub cert_expiration: bool,
}

impl Target {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: None,
            endpoint: None,
            status: None,
            cert_expiration: false,
        }
    }

    /// Resolves the overrides against `defaults` into a probe request.
    pub fn job(&self, defaults: &Defaults) -> Job {
        Job {
            domain: self.domain.clone(),
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| defaults.endpoint.clone()),
            expected_status: self.status.unwrap_or(defaults.status),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.domain)
    }
}

/// Endpoint and expected status applied to targets without their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub endpoint: String,
    pub status: u16,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            endpoint: "/".to_string(),
            status: 200,
        }
    }
}

/// One probe request, with the effective endpoint and status already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub domain: String,
    pub endpoint: String,
    pub expected_status: u16,
}

/// Result of one probe of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub domain: String,
    pub ok: bool,
    pub last_check: String,
}

impl Outcome {
    /// Builds an outcome stamped with the current local time.
    pub fn now(domain: impl Into<String>, ok: bool) -> Self {
        Self {
            domain: domain.into(),
            ok,
            last_check: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_uses_defaults_without_overrides() {
        let defaults = Defaults::default();
        let job = Target::new("example.com").job(&defaults);

        assert_eq!(job.endpoint, "/");
        assert_eq!(job.expected_status, 200);
    }

    #[test]
    fn test_job_prefers_target_overrides() {
        let defaults = Defaults {
            endpoint: "/health".to_string(),
            status: 204,
        };
        let target = Target {
            endpoint: Some("/status".to_string()),
            status: Some(503),
            ..Target::new("example.com")
        };
        let job = target.job(&defaults);

        assert_eq!(job.domain, "example.com");
        assert_eq!(job.endpoint, "/status");
        assert_eq!(job.expected_status, 503);
    }

    #[test]
    fn test_outcome_serializes_to_flat_json() {
        let outcome = Outcome {
            domain: "example.com".to_string(),
            ok: false,
            last_check: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();

        assert_eq!(
            json,
            r#"{"domain":"example.com","ok":false,"last_check":"2024-01-01T00:00:00Z"}"#
        );
    }
}
