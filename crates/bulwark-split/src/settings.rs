//! Planner settings.
//!
//! Job-level choices (requests, hint, serializer, failure mode) live in
//! [`bulwark_core::JobConfig`]. Deployment-level knobs that apply to every
//! job a planner runs are loaded here from the environment.

use std::time::Duration;

use bulwark_core::Error;

use crate::error::Result;

/// Default bound on a single access-request resolution.
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Deployment settings for a [`crate::planner::SplitPlanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerSettings {
    /// Upper bound on one `register_request` call. A resolution that takes
    /// longer is treated as failed.
    pub resolution_timeout: Duration,
    /// Abort planning on the first failed resolution instead of excluding it.
    pub fail_fast: bool,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
            fail_fast: false,
        }
    }
}

impl PlannerSettings {
    /// Sets the per-resolution timeout.
    #[must_use]
    pub const fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    /// Sets fail-fast resolution.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Loads settings from environment variables.
    ///
    /// Supported env vars:
    /// - `BULWARK_RESOLUTION_TIMEOUT_MS` (default 30000, must be > 0)
    /// - `BULWARK_RESOLUTION_FAIL_FAST` (default false)
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(ms) = env_u64(&lookup, "BULWARK_RESOLUTION_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(Error::configuration(
                    "BULWARK_RESOLUTION_TIMEOUT_MS must be greater than zero",
                )
                .into());
            }
            settings.resolution_timeout = Duration::from_millis(ms);
        }
        if let Some(fail_fast) = env_bool(&lookup, "BULWARK_RESOLUTION_FAIL_FAST")? {
            settings.fail_fast = fail_fast;
        }

        Ok(settings)
    }
}

fn env_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(lookup, name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::configuration(format!("{name} must be a u64: {e}")).into())
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(lookup, name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::configuration(format!("{name} must be a boolean (true/false/1/0)")).into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let settings = PlannerSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, PlannerSettings::default());
        assert!(!settings.fail_fast);
    }

    #[test]
    fn env_overrides_are_parsed() {
        let settings = PlannerSettings::from_lookup(lookup(&[
            ("BULWARK_RESOLUTION_TIMEOUT_MS", "250"),
            ("BULWARK_RESOLUTION_FAIL_FAST", "yes"),
        ]))
        .unwrap();
        assert_eq!(settings.resolution_timeout, Duration::from_millis(250));
        assert!(settings.fail_fast);
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings =
            PlannerSettings::from_lookup(lookup(&[("BULWARK_RESOLUTION_TIMEOUT_MS", "  ")]))
                .unwrap();
        assert_eq!(settings.resolution_timeout, DEFAULT_RESOLUTION_TIMEOUT);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for vars in [
            [("BULWARK_RESOLUTION_TIMEOUT_MS", "soon")],
            [("BULWARK_RESOLUTION_TIMEOUT_MS", "0")],
            [("BULWARK_RESOLUTION_FAIL_FAST", "maybe")],
        ] {
            let err = PlannerSettings::from_lookup(lookup(&vars)).unwrap_err();
            assert!(err.is_configuration(), "{err}");
        }
    }
}
