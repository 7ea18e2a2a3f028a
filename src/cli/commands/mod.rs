pub mod logging;

use crate::config::DEFAULT_CONFIG_FILE;
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_CONFIG: &str = "config";
pub const ARG_BIND: &str = "bind";
pub const ARG_CHANNEL: &str = "channel";
pub const ARG_QR: &str = "qr";

pub const CMD_SERVER: &str = "server";
pub const CMD_KEY: &str = "key";

pub const DEFAULT_QR_FILE: &str = "qr-code.png";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("frp-otp")
        .about("TOTP knock authorization for frp")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_CONFIG)
                .short('c')
                .long("config")
                .help("Path to the JSON configuration file")
                .default_value(DEFAULT_CONFIG_FILE)
                .env("FRP_OTP_CONFIG")
                .global(true),
        )
        .arg(
            Arg::new(ARG_BIND)
                .short('b')
                .long("bind")
                .help("Address to listen on, overrides BindAddress from the configuration")
                .env("FRP_OTP_BIND")
                .global(true),
        )
        .subcommand(Command::new(CMD_SERVER).about("Run the knock and plugin HTTP service (default)"))
        .subcommand(
            Command::new(CMD_KEY)
                .about("Generate a TOTP secret and QR code for a channel")
                .arg(
                    Arg::new(ARG_CHANNEL)
                        .help("Channel to enroll, lists configured channels when omitted"),
                )
                .arg(
                    Arg::new(ARG_QR)
                        .long("qr")
                        .help("Where to write the QR code PNG")
                        .default_value(DEFAULT_QR_FILE),
                ),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "frp-otp");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("TOTP knock authorization for frp".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("FRP_OTP_CONFIG", None::<&str>),
                ("FRP_OTP_BIND", None),
                ("FRP_OTP_LOG_LEVEL", None),
            ],
            || {
                let matches = new().get_matches_from(vec!["frp-otp"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG).cloned(),
                    Some(DEFAULT_CONFIG_FILE.to_string())
                );
                assert_eq!(matches.get_one::<String>(ARG_BIND), None);
                assert_eq!(matches.subcommand_name(), None);
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("FRP_OTP_CONFIG", Some("/etc/frp/otp.json")),
                ("FRP_OTP_BIND", Some("127.0.0.1:7200")),
                ("FRP_OTP_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["frp-otp"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG).cloned(),
                    Some("/etc/frp/otp.json".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_BIND).cloned(),
                    Some("127.0.0.1:7200".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("FRP_OTP_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["frp-otp"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars([("FRP_OTP_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["frp-otp".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_key_subcommand() {
        temp_env::with_vars([("FRP_OTP_CONFIG", None::<&str>)], || {
            let matches = new().get_matches_from(vec![
                "frp-otp", "key", "web", "--qr", "/tmp/web.png", "-c", "custom.json",
            ]);

            let Some((name, sub)) = matches.subcommand() else {
                panic!("expected a subcommand");
            };
            assert_eq!(name, CMD_KEY);
            assert_eq!(
                sub.get_one::<String>(ARG_CHANNEL).cloned(),
                Some("web".to_string())
            );
            assert_eq!(
                sub.get_one::<String>(ARG_QR).cloned(),
                Some("/tmp/web.png".to_string())
            );
            assert_eq!(
                sub.get_one::<String>(ARG_CONFIG).cloned(),
                Some("custom.json".to_string())
            );
        });
    }

    #[test]
    fn test_key_defaults() {
        let matches = new().get_matches_from(vec!["frp-otp", "key"]);
        let Some(sub) = matches.subcommand_matches(CMD_KEY) else {
            panic!("expected key subcommand");
        };
        assert_eq!(sub.get_one::<String>(ARG_CHANNEL), None);
        assert_eq!(
            sub.get_one::<String>(ARG_QR).cloned(),
            Some(DEFAULT_QR_FILE.to_string())
        );
    }
}
