//! Knock flow: turn a passcode submission into a ledger decision.

use crate::{ledger::Block, registry::Channel};
use tracing::{debug, info, warn};

/// How long a successful knock keeps the source IP allowed.
pub const GRANT_SECONDS: i64 = 300;

/// Ban step applied per failed or blocked knock.
pub const PUNISH_STEP_SECONDS: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnockOutcome {
    /// No code yet, show the form.
    Challenge,
    /// Code did not verify; the block on the IP now ends at `blocked_until`.
    Rejected { blocked_until: i64 },
    /// Code verified; the IP may connect until `allowed_until`.
    Granted { allowed_until: i64 },
    /// IP is serving a ban, which was extended to `blocked_until`.
    Blocked { blocked_until: i64 },
    /// IP is on the static blacklist.
    Blacklisted,
}

/// Run one knock from `ip` against `channel` at `now`.
pub fn knock(channel: &Channel, ip: &str, code: Option<&str>, now: i64) -> KnockOutcome {
    let ledger = channel.ledger();

    match ledger.is_blocked(ip, now) {
        Some(Block::Permanent) => {
            debug!("knock on {} from blacklisted {}", channel.name(), ip);
            return KnockOutcome::Blacklisted;
        }
        Some(Block::Until(_)) => {
            let blocked_until = ledger.punish(ip, now, PUNISH_STEP_SECONDS);
            warn!(
                "knock on {} from blocked {}, ban extended to {}",
                channel.name(),
                ip,
                blocked_until
            );
            return KnockOutcome::Blocked { blocked_until };
        }
        None => {}
    }

    let Some(code) = code.filter(|code| !code.is_empty()) else {
        return KnockOutcome::Challenge;
    };

    if channel.verify_code(code, now) {
        let allowed_until = now + GRANT_SECONDS;
        ledger.grant(ip, allowed_until);
        info!("knock on {} from {} accepted", channel.name(), ip);
        KnockOutcome::Granted { allowed_until }
    } else {
        let blocked_until = ledger.punish(ip, now, PUNISH_STEP_SECONDS);
        info!(
            "knock on {} from {} rejected, blocked until {}",
            channel.name(),
            ip,
            blocked_until
        );
        KnockOutcome::Rejected { blocked_until }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{config::ChannelConfig, totp};

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const T0: i64 = 1_700_000_000;

    fn web() -> Channel {
        Channel::new(
            "web",
            &ChannelConfig {
                enabled: true,
                secret: SECRET.to_string(),
                blacklist: vec!["6.6.6.6".to_string()],
                ..ChannelConfig::default()
            },
        )
    }

    fn wrong_code(now: i64) -> String {
        let valid: Vec<String> = [now - 30, now, now + 30]
            .iter()
            .filter_map(|&t| totp::generate(SECRET, u64::try_from(t).unwrap()))
            .collect();
        (0..1_000_000)
            .map(|n| format!("{n:06}"))
            .find(|code| !valid.contains(code))
            .unwrap()
    }

    #[test]
    fn empty_code_shows_challenge() {
        let web = web();
        assert_eq!(knock(&web, "1.2.3.4", None, T0), KnockOutcome::Challenge);
        assert_eq!(knock(&web, "1.2.3.4", Some(""), T0), KnockOutcome::Challenge);
        assert_eq!(web.ledger().block_expiry("1.2.3.4"), None);
    }

    #[test]
    fn valid_code_grants() {
        let web = web();
        let code = totp::generate(SECRET, u64::try_from(T0).unwrap()).unwrap();

        assert_eq!(
            knock(&web, "1.2.3.4", Some(&code), T0),
            KnockOutcome::Granted {
                allowed_until: T0 + GRANT_SECONDS
            }
        );
        assert!(web.ledger().is_allowed("1.2.3.4", T0 + GRANT_SECONDS - 1));
        assert!(!web.ledger().is_allowed("1.2.3.4", T0 + GRANT_SECONDS));
    }

    #[test]
    fn invalid_codes_escalate_until_blocked() {
        let web = web();
        let code = wrong_code(T0);

        assert_eq!(
            knock(&web, "1.2.3.4", Some(&code), T0),
            KnockOutcome::Rejected { blocked_until: T0 + 10 }
        );
        assert_eq!(
            knock(&web, "1.2.3.4", Some(&code), T0),
            KnockOutcome::Rejected { blocked_until: T0 + 20 }
        );
        assert_eq!(
            knock(&web, "1.2.3.4", Some(&code), T0),
            KnockOutcome::Rejected { blocked_until: T0 + 30 }
        );

        // the grace margin keeps the form usable until the ban exceeds a minute
        for _ in 0..4 {
            knock(&web, "1.2.3.4", Some(&code), T0);
        }
        assert_eq!(web.ledger().block_expiry("1.2.3.4"), Some(T0 + 70));

        // blocked now: even a valid code is not evaluated, the ban grows by 30 steps
        let valid = totp::generate(SECRET, u64::try_from(T0).unwrap()).unwrap();
        assert_eq!(
            knock(&web, "1.2.3.4", Some(&valid), T0),
            KnockOutcome::Blocked {
                blocked_until: T0 + 70 + 300
            }
        );
        assert!(!web.ledger().is_allowed("1.2.3.4", T0));
    }

    #[test]
    fn blacklisted_ip_never_touches_ledger() {
        let web = web();
        let code = totp::generate(SECRET, u64::try_from(T0).unwrap()).unwrap();

        assert_eq!(
            knock(&web, "6.6.6.6", Some(&code), T0),
            KnockOutcome::Blacklisted
        );
        assert_eq!(web.ledger().block_expiry("6.6.6.6"), None);
        assert_eq!(web.ledger().allow_expiry("6.6.6.6"), None);
    }
}
