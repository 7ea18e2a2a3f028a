//! Channels known to the plugin, built once at startup.

use crate::{
    config::{AccessModel, ChannelConfig, Config},
    ledger::AccessLedger,
    totp,
};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{info, warn};

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

/// One proxied service and its access state.
#[derive(Debug)]
pub struct Channel {
    name: String,
    enabled: bool,
    model: AccessModel,
    secret: SecretString,
    issuer: String,
    ledger: AccessLedger,
}

impl Channel {
    #[must_use]
    pub fn new(name: &str, config: &ChannelConfig) -> Self {
        Self {
            name: name.to_string(),
            enabled: config.enabled,
            model: config.model,
            secret: SecretString::from(config.secret.clone()),
            issuer: config.issuer.clone(),
            ledger: AccessLedger::new(config.whitelist.clone(), config.blacklist.clone()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn model(&self) -> AccessModel {
        self.model
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub const fn ledger(&self) -> &AccessLedger {
        &self.ledger
    }

    /// Check a submitted passcode against this channel's secret.
    #[must_use]
    pub fn verify_code(&self, code: &str, now: i64) -> bool {
        let Ok(at) = u64::try_from(now) else {
            return false;
        };

        totp::verify(self.secret.expose_secret(), code, at)
    }

    fn has_usable_secret(&self) -> bool {
        totp::decode_secret(self.secret.expose_secret()).is_some()
    }
}

/// Channel lookup plus the policy for names that are not configured.
#[derive(Debug, Default)]
pub struct Registry {
    enforce: bool,
    channels: HashMap<String, Channel>,
}

impl Registry {
    #[must_use]
    pub fn new(enforce: bool, channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            enforce,
            channels: channels
                .into_iter()
                .map(|channel| (channel.name.clone(), channel))
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let registry = Self::new(
            config.enforce,
            config
                .channels
                .iter()
                .map(|(name, channel)| Channel::new(name, channel)),
        );

        for channel in registry.channels.values() {
            if channel.enabled && !channel.has_usable_secret() {
                warn!(
                    "channel {} has no valid base32 secret, knocks will always fail",
                    channel.name
                );
            }
        }

        info!(
            "loaded {} channel(s), enforce: {}",
            registry.channels.len(),
            registry.enforce
        );

        registry
    }

    #[must_use]
    pub const fn enforce(&self) -> bool {
        self.enforce
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Sweep expired entries from every channel, returning the total removed.
    pub fn sweep(&self, now: i64) -> usize {
        self.channels
            .values()
            .map(|channel| channel.ledger.sweep(now))
            .sum()
    }
}
