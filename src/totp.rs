//! TOTP verification and enrollment.
//!
//! Codes are 6 digits over 30-second steps using HMAC-SHA512, accepted one
//! step either side of the current one.

use anyhow::{anyhow, Result};
use rand::RngCore;
use totp_rs::{Algorithm, Secret, TOTP};

pub const DIGITS: usize = 6;
pub const STEP_SECONDS: u64 = 30;
pub const SKEW: u8 = 1;

/// Random secret length used by [`Enrollment::generate`].
const SECRET_SIZE: usize = 32;

fn normalize_secret(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Decode a base32 secret as written in the configuration file.
#[must_use]
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let normalized = normalize_secret(secret);
    if normalized.is_empty() {
        return None;
    }

    Secret::Encoded(normalized).to_bytes().ok()
}

fn totp(secret: Vec<u8>, issuer: Option<String>, account_name: String) -> TOTP {
    TOTP::new_unchecked(
        Algorithm::SHA512,
        DIGITS,
        SKEW,
        STEP_SECONDS,
        secret,
        issuer,
        account_name,
    )
}

/// Check `code` against `secret` at unix time `at`.
///
/// Anything that is not exactly six ASCII digits, or a secret that does not
/// decode, is simply not valid.
#[must_use]
pub fn verify(secret: &str, code: &str, at: u64) -> bool {
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let Some(bytes) = decode_secret(secret) else {
        return false;
    };

    totp(bytes, None, String::new()).check(code, at)
}

/// Code for `secret` at unix time `at`, if the secret decodes.
#[must_use]
pub fn generate(secret: &str, at: u64) -> Option<String> {
    decode_secret(secret).map(|bytes| totp(bytes, None, String::new()).generate(at))
}

/// A freshly provisioned channel secret.
pub struct Enrollment {
    totp: TOTP,
}

impl Enrollment {
    /// Generate a random secret for `account_name`, labelled with `issuer`.
    ///
    /// # Errors
    /// Returns an error if the issuer or account name cannot be used in an
    /// `otpauth://` URL.
    pub fn generate(issuer: &str, account_name: &str) -> Result<Self> {
        let mut secret = vec![0u8; SECRET_SIZE];
        rand::thread_rng().fill_bytes(&mut secret);

        let totp = TOTP::new(
            Algorithm::SHA512,
            DIGITS,
            SKEW,
            STEP_SECONDS,
            secret,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))?;

        Ok(Self { totp })
    }

    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.totp.issuer.as_deref()
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.totp.account_name
    }

    #[must_use]
    pub fn secret_base32(&self) -> String {
        self.totp.get_secret_base32()
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.totp.get_url()
    }

    /// QR code of [`Enrollment::url`] as PNG bytes.
    ///
    /// # Errors
    /// Returns an error if the QR image cannot be rendered.
    pub fn qr_png(&self) -> Result<Vec<u8>> {
        self.totp
            .get_qr_png()
            .map_err(|e| anyhow!("QR gen error: {e}"))
    }
}
