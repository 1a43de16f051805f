//! Orbit configuration stored in `orbit.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::shell::ShellDialect;

/// Default config file name, looked up in the starting directory.
pub const DEFAULT_CONFIG_FILE: &str = "orbit.toml";

/// Orbit configuration (TOML).
///
/// Missing fields default to values that work against the public Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrbitConfig {
    /// Model name passed to the reasoning service.
    pub model: String,

    /// Base URL of the Generative Language API.
    pub base_url: String,

    /// Environment variable holding the API credential.
    pub api_key_env: String,

    /// Timeout for a single planning request in seconds.
    pub request_timeout_secs: u64,

    /// Shell used for plan commands.
    pub shell: ShellSetting,

    /// How `DANGEROUS` commands are gated.
    pub risk_policy: RiskPolicy,

    /// Kill a shell step after this many seconds. Unset means wait forever.
    pub step_timeout_secs: Option<u64>,
}

/// Shell selection; `auto` picks the host's native shell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShellSetting {
    #[default]
    Auto,
    Posix,
    PowerShell,
}

impl ShellSetting {
    pub fn dialect(self) -> ShellDialect {
        match self {
            Self::Auto => ShellDialect::host(),
            Self::Posix => ShellDialect::Posix,
            Self::PowerShell => ShellDialect::PowerShell,
        }
    }
}

/// Gate applied to commands classified `DANGEROUS`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskPolicy {
    /// Run everything; assessment is informational only.
    Allow,
    /// Ask for a second, per-step confirmation.
    #[default]
    Confirm,
    /// Never run dangerous commands.
    Block,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 120,
            shell: ShellSetting::Auto,
            risk_policy: RiskPolicy::Confirm,
            step_timeout_secs: None,
        }
    }
}

impl OrbitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow!("base_url must be an http(s) URL"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("api_key_env must be non-empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.step_timeout_secs == Some(0) {
            return Err(anyhow!("step_timeout_secs must be > 0 when set"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Read the credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(anyhow!(
                "{} is not set; export it before starting orbit",
                self.api_key_env
            )),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OrbitConfig::default()`.
pub fn load_config(path: &Path) -> Result<OrbitConfig> {
    if !path.exists() {
        let cfg = OrbitConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OrbitConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, OrbitConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orbit.toml");
        fs::write(
            &path,
            "model = \"gemini-2.5-pro\"\nshell = \"powershell\"\nrisk_policy = \"block\"\nstep_timeout_secs = 600\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.model, "gemini-2.5-pro");
        assert_eq!(cfg.shell.dialect(), ShellDialect::PowerShell);
        assert_eq!(cfg.risk_policy, RiskPolicy::Block);
        assert_eq!(cfg.step_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orbit.toml");
        fs::write(&path, "request_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orbit.toml");
        fs::write(&path, "risk_policy = \"yolo\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_credential_names_variable() {
        let cfg = OrbitConfig {
            api_key_env: "ORBIT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..OrbitConfig::default()
        };
        let err = cfg.api_key().unwrap_err();
        assert!(err.to_string().contains("ORBIT_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
