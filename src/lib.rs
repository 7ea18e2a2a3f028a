//! # frp-otp (TOTP knock authorization for frp)
//!
//! `frp-otp` is an [frp](https://github.com/fatedier/frp) server plugin that
//! keeps proxied services closed until the visitor proves possession of a
//! time-based one-time password.
//!
//! ## Knock flow
//!
//! A visitor opens `/knock?channel=<name>` and submits the current 6 digit code
//! for that channel. A valid code grants the source IP access to the channel for
//! five minutes. Invalid codes punish the source IP with a block that grows with
//! every failure and escalates sharply once the visitor keeps knocking while
//! already blocked.
//!
//! ## Plugin endpoint
//!
//! `frps` calls `POST /handler` for `Login`, `NewProxy`, `CloseProxy`, `Ping`,
//! `NewWorkConn` and `NewUserConn`. Only `NewProxy` and `NewUserConn` are
//! policed: a proxy must map to a configured, enabled channel, and a user
//! connection is only accepted from an IP the channel currently allows.
//!
//! ## State
//!
//! Grants and blocks live in memory only, one lock per channel. Expired entries
//! are swept every five minutes and on `SIGHUP`.

pub mod api;
pub mod cli;
pub mod config;
pub mod knock;
pub mod ledger;
pub mod plugin;
pub mod registry;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
