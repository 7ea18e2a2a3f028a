use crate::cli::{
    actions::{key, server, Action},
    commands::{ARG_BIND, ARG_CHANNEL, ARG_CONFIG, ARG_QR, CMD_KEY, CMD_SERVER, DEFAULT_QR_FILE},
};
use crate::config::DEFAULT_CONFIG_FILE;
use anyhow::{bail, Result};
use std::path::PathBuf;

fn config_path(matches: &clap::ArgMatches) -> PathBuf {
    matches
        .get_one::<String>(ARG_CONFIG)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// # Errors
/// Returns an error if the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        None => Ok(Action::Server(server::Args {
            config: config_path(matches),
            bind: matches.get_one::<String>(ARG_BIND).cloned(),
        })),
        Some((CMD_SERVER, sub)) => Ok(Action::Server(server::Args {
            config: config_path(sub),
            bind: sub.get_one::<String>(ARG_BIND).cloned(),
        })),
        Some((CMD_KEY, sub)) => Ok(Action::Key(key::Args {
            config: config_path(sub),
            channel: sub.get_one::<String>(ARG_CHANNEL).cloned(),
            qr: sub
                .get_one::<String>(ARG_QR)
                .map_or_else(|| PathBuf::from(DEFAULT_QR_FILE), PathBuf::from),
        })),
        Some((other, _)) => bail!("unknown command: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn dispatch(args: &[&str]) -> Result<Action> {
        let matches = commands::new().try_get_matches_from(args)?;
        handler(&matches)
    }

    #[test]
    fn no_subcommand_runs_server() -> Result<()> {
        temp_env::with_vars(
            [("FRP_OTP_CONFIG", None::<&str>), ("FRP_OTP_BIND", None)],
            || -> Result<()> {
                let action = dispatch(&["frp-otp", "--bind", "127.0.0.1:9000"])?;
                let Action::Server(args) = action else {
                    panic!("expected server action");
                };
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
                assert_eq!(args.bind.as_deref(), Some("127.0.0.1:9000"));
                Ok(())
            },
        )
    }

    #[test]
    fn server_subcommand_reads_config() -> Result<()> {
        temp_env::with_vars(
            [("FRP_OTP_CONFIG", None::<&str>), ("FRP_OTP_BIND", None)],
            || -> Result<()> {
                let action = dispatch(&["frp-otp", "server", "-c", "/etc/otp.json"])?;
                let Action::Server(args) = action else {
                    panic!("expected server action");
                };
                assert_eq!(args.config, PathBuf::from("/etc/otp.json"));
                assert_eq!(args.bind, None);
                Ok(())
            },
        )
    }

    #[test]
    fn server_subcommand_reads_bind() -> Result<()> {
        temp_env::with_vars(
            [("FRP_OTP_CONFIG", None::<&str>), ("FRP_OTP_BIND", None)],
            || -> Result<()> {
                for args in [
                    ["frp-otp", "server", "--bind", "127.0.0.1:9000"],
                    ["frp-otp", "-b", "127.0.0.1:9000", "server"],
                ] {
                    let Action::Server(server) = dispatch(&args)? else {
                        panic!("expected server action");
                    };
                    assert_eq!(server.bind.as_deref(), Some("127.0.0.1:9000"));
                }
                Ok(())
            },
        )
    }

    #[test]
    fn key_subcommand() -> Result<()> {
        temp_env::with_vars([("FRP_OTP_CONFIG", None::<&str>)], || -> Result<()> {
            let action = dispatch(&["frp-otp", "key", "web"])?;
            let Action::Key(args) = action else {
                panic!("expected key action");
            };
            assert_eq!(args.channel.as_deref(), Some("web"));
            assert_eq!(args.qr, PathBuf::from(DEFAULT_QR_FILE));
            assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
            Ok(())
        })
    }
}
