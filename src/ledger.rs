//! Per-channel access ledger.
//!
//! Static white/black lists are fixed at startup. The dynamic allow and block
//! maps record an expiry (unix seconds) per IP; an entry stops counting once
//! `now >= expiry` but is only removed by [`AccessLedger::sweep`].

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A dynamic block only counts for the knock page while it runs longer than
/// this past `now`.
pub const BLOCK_GRACE_SECONDS: i64 = 60;

/// Rapid retries below this remaining ban time escalate linearly.
const ESCALATION_THRESHOLD_SECONDS: i64 = 60;

/// Multiplier applied to the step when probing resumes deep into a ban.
const DEEP_BAN_MULTIPLIER: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    /// IP is on the static blacklist.
    Permanent,
    /// IP is in the dynamic block map until the given unix time.
    Until(i64),
}

impl Block {
    /// Expiry as reported to callers, `0` for a permanent block.
    #[must_use]
    pub const fn expiry(self) -> i64 {
        match self {
            Self::Permanent => 0,
            Self::Until(expiry) => expiry,
        }
    }
}

#[derive(Debug, Default)]
struct Dynamic {
    allow: HashMap<String, i64>,
    block: HashMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct AccessLedger {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    dynamic: RwLock<Dynamic>,
}

impl AccessLedger {
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        Self {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
            dynamic: RwLock::new(Dynamic::default()),
        }
    }

    /// Whether a connection from `ip` may pass at `now`.
    ///
    /// The static whitelist wins over everything; the blacklist and an active
    /// block win over an active grant.
    pub fn is_allowed(&self, ip: &str, now: i64) -> bool {
        if self.whitelist.contains(ip) {
            return true;
        }

        if self.blacklist.contains(ip) {
            return false;
        }

        let dynamic = self.dynamic.read();

        if dynamic.block.get(ip).is_some_and(|&expiry| now < expiry) {
            return false;
        }

        dynamic.allow.get(ip).is_some_and(|&expiry| now < expiry)
    }

    /// Block state of `ip` as seen by the knock page.
    ///
    /// Dynamic blocks that end within [`BLOCK_GRACE_SECONDS`] are not reported.
    pub fn is_blocked(&self, ip: &str, now: i64) -> Option<Block> {
        if self.blacklist.contains(ip) {
            return Some(Block::Permanent);
        }

        self.dynamic
            .read()
            .block
            .get(ip)
            .copied()
            .filter(|&expiry| expiry > now + BLOCK_GRACE_SECONDS)
            .map(Block::Until)
    }

    /// Allow `ip` until `expiry`, replacing any previous grant.
    pub fn grant(&self, ip: &str, expiry: i64) {
        self.dynamic.write().allow.insert(ip.to_string(), expiry);

        debug!("granted {} until {}", ip, expiry);
    }

    /// Extend or start a block on `ip` and return the new expiry.
    ///
    /// A retry while less than a minute of the ban remains adds one `step`; a
    /// retry deeper into the ban adds `step * 30`.
    pub fn punish(&self, ip: &str, now: i64, step: i64) -> i64 {
        let mut dynamic = self.dynamic.write();

        let expiry = match dynamic.block.get(ip).copied() {
            Some(current) if current > now => {
                if current - now < ESCALATION_THRESHOLD_SECONDS {
                    current + step
                } else {
                    current + step * DEEP_BAN_MULTIPLIER
                }
            }
            _ => now + step,
        };

        dynamic.block.insert(ip.to_string(), expiry);
        drop(dynamic);

        debug!("blocked {} until {}", ip, expiry);

        expiry
    }

    /// Drop every allow and block entry that expired before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: i64) -> usize {
        let mut dynamic = self.dynamic.write();

        let before = dynamic.allow.len() + dynamic.block.len();
        dynamic.allow.retain(|_, expiry| *expiry >= now);
        dynamic.block.retain(|_, expiry| *expiry >= now);

        before - dynamic.allow.len() - dynamic.block.len()
    }

    /// Raw block-map expiry for `ip`, expired or not.
    pub fn block_expiry(&self, ip: &str) -> Option<i64> {
        self.dynamic.read().block.get(ip).copied()
    }

    /// Raw allow-map expiry for `ip`, expired or not.
    pub fn allow_expiry(&self, ip: &str) -> Option<i64> {
        self.dynamic.read().allow.get(ip).copied()
    }
}
