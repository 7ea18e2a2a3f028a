//! JSON configuration document.
//!
//! The file layout is shared with existing deployments, hence the mixed key
//! casing (`BindAddress`, `Channel`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};

pub const DEFAULT_CONFIG_FILE: &str = "frp.otp.json";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Reject requests that reference a channel missing from `Channel`.
    #[serde(default)]
    pub enforce: bool,
    /// Issuer domain used when enrolling new channel secrets.
    #[serde(default)]
    pub domain: String,
    #[serde(rename = "BindAddress", default)]
    pub bind_address: Option<String>,
    #[serde(rename = "Channel", default)]
    pub channels: BTreeMap<String, ChannelConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AccessModel {
    /// Connections need a static whitelist entry or a recent knock.
    #[default]
    Enforced,
    /// Connections are let through without IP checks.
    Bypass,
}

impl From<String> for AccessModel {
    fn from(model: String) -> Self {
        if model.eq_ignore_ascii_case("bypass") {
            Self::Bypass
        } else {
            Self::Enforced
        }
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "status", default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: AccessModel,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("secret", &"***")
            .field("issuer", &self.issuer)
            .field("whitelist", &self.whitelist)
            .field("blacklist", &self.blacklist)
            .finish()
    }
}

impl Config {
    /// Parse a configuration document.
    ///
    /// # Errors
    /// Returns an error if the document is not valid JSON or has no channels.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid configuration JSON")?;

        if config.channels.is_empty() {
            bail!("No channels configured");
        }

        Ok(config)
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails [`Config::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_json(&json).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Bind address, preferring `override_address` over the file setting.
    #[must_use]
    pub fn bind_address(&self, override_address: Option<&str>) -> String {
        override_address
            .or(self.bind_address.as_deref())
            .filter(|address| !address.is_empty())
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "enforce": true,
        "domain": "example.com",
        "BindAddress": "127.0.0.1:7200",
        "Channel": {
            "web": {
                "status": true,
                "model": "enforced",
                "secret": "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ",
                "issuer": "example.com",
                "whitelist": ["10.0.0.1"],
                "blacklist": ["6.6.6.6"],
                "notify": [{"name": "mail", "action": "knock", "config": {}}]
            },
            "ssh": {"status": false, "model": "Bypass"}
        }
    }"#;

    #[test]
    fn parses_channels() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert!(config.enforce);
        assert_eq!(config.domain, "example.com");
        assert_eq!(config.channels.len(), 2);

        let web = &config.channels["web"];
        assert!(web.enabled);
        assert_eq!(web.model, AccessModel::Enforced);
        assert_eq!(web.whitelist, vec!["10.0.0.1".to_string()]);
        assert_eq!(web.blacklist, vec!["6.6.6.6".to_string()]);

        let ssh = &config.channels["ssh"];
        assert!(!ssh.enabled);
        assert_eq!(ssh.model, AccessModel::Bypass);
        assert!(ssh.secret.is_empty());
    }

    #[test]
    fn unknown_model_is_enforced() {
        assert_eq!(AccessModel::from("strict".to_string()), AccessModel::Enforced);
        assert_eq!(AccessModel::from(String::new()), AccessModel::Enforced);
        assert_eq!(AccessModel::from("BYPASS".to_string()), AccessModel::Bypass);
    }

    #[test]
    fn empty_channel_list_is_rejected() {
        let result = Config::from_json(r#"{"enforce": true, "Channel": {}}"#);
        assert!(result.is_err());
        assert!(Config::from_json("{}").is_err());
    }

    #[test]
    fn invalid_json_is_rejected() {
        let result = Config::from_json("{not json");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Invalid configuration JSON"));
        }
    }

    #[test]
    fn bind_address_precedence() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.bind_address(None), "127.0.0.1:7200");
        assert_eq!(config.bind_address(Some("[::1]:9000")), "[::1]:9000");

        let config = Config::default();
        assert_eq!(config.bind_address(None), DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn debug_hides_secret() {
        let config = Config::from_json(SAMPLE).unwrap();
        let debug = format!("{:?}", config.channels["web"]);
        assert!(!debug.contains("GEZDGNBV"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn load_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(SAMPLE.as_bytes())?;

        let config = Config::load(file.path())?;
        assert_eq!(config.channels.len(), 2);

        let missing = Config::load(Path::new("/nonexistent/frp.otp.json"));
        assert!(missing.is_err());
        Ok(())
    }
}
