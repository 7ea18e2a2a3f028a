use crate::{config::Config, totp::Enrollment};
use anyhow::{Context, Result};
use std::{fmt::Write as _, fs, path::PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
    pub channel: Option<String>,
    pub qr: PathBuf,
}

/// Execute the key action: print a fresh secret for a channel and write its QR code.
/// # Errors
/// Returns an error if the configuration can't be loaded or the QR code can't be written.
pub fn execute(args: &Args) -> Result<()> {
    let config = Config::load(&args.config)?;

    let Some((name, channel)) = args
        .channel
        .as_deref()
        .and_then(|name| config.channels.get_key_value(name))
    else {
        print!("{}", channel_list(&config, args.channel.as_deref()));
        return Ok(());
    };

    let issuer = if config.domain.is_empty() {
        channel.issuer.as_str()
    } else {
        config.domain.as_str()
    };
    let account = account_name(name, &config.domain);

    debug!("Generating secret for channel {}", name);

    let enrollment = Enrollment::generate(issuer, &account)?;

    let png = enrollment.qr_png()?;
    fs::write(&args.qr, png)
        .with_context(|| format!("Failed to write QR code to {}", args.qr.display()))?;

    info!("QR code written to {}", args.qr.display());

    print!("{}", summary(&enrollment, &args.qr));

    Ok(())
}

fn account_name(channel: &str, domain: &str) -> String {
    if domain.is_empty() {
        channel.to_string()
    } else {
        format!("{channel}@{domain}")
    }
}

fn channel_list(config: &Config, requested: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(requested) = requested {
        let _ = writeln!(out, "Channel '{requested}' is not configured.");
    }

    let _ = writeln!(out, "Configured channels:");
    for name in config.channels.keys() {
        let _ = writeln!(out, "  {name}");
    }

    out
}

fn summary(enrollment: &Enrollment, qr: &std::path::Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Issuer:  {}", enrollment.issuer().unwrap_or_default());
    let _ = writeln!(out, "Account: {}", enrollment.account_name());
    let _ = writeln!(out, "Secret:  {}", enrollment.secret_base32());
    let _ = writeln!(out, "URL:     {}", enrollment.url());
    let _ = writeln!(out, "QR code: {}", qr.display());
    let _ = writeln!(
        out,
        "\nCopy the secret into the channel's \"secret\" field to activate it."
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "enforce": true,
        "domain": "example.com",
        "Channel": {
            "web": { "status": true },
            "ssh": { "status": false }
        }
    }"#;

    #[test]
    fn account_includes_domain() {
        assert_eq!(account_name("web", "example.com"), "web@example.com");
        assert_eq!(account_name("web", ""), "web");
    }

    #[test]
    fn unknown_channel_lists_configured_ones() -> Result<()> {
        let config = Config::from_json(CONFIG)?;
        let listing = channel_list(&config, Some("db"));

        assert!(listing.contains("'db' is not configured"));
        assert!(listing.contains("  ssh\n"));
        assert!(listing.contains("  web\n"));
        Ok(())
    }

    #[test]
    fn writes_qr_code_for_channel() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("frp.otp.json");
        fs::File::create(&config_path)?.write_all(CONFIG.as_bytes())?;
        let qr = dir.path().join("qr.png");

        execute(&Args {
            config: config_path.clone(),
            channel: Some("web".to_string()),
            qr: qr.clone(),
        })?;

        let png = fs::read(&qr)?;
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        // the config file is left untouched
        assert_eq!(fs::read_to_string(&config_path)?, CONFIG);
        Ok(())
    }

    #[test]
    fn missing_channel_writes_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("frp.otp.json");
        fs::write(&config_path, CONFIG)?;
        let qr = dir.path().join("qr.png");

        execute(&Args {
            config: config_path,
            channel: None,
            qr: qr.clone(),
        })?;

        assert!(!qr.exists());
        Ok(())
    }
}
