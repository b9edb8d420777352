//! RFC 6238 time-based one-time passwords (SHA-1, as authenticator apps expect)
use base32::Alphabet;
use chrono::{DateTime, Utc};
use totp_lite::{Sha1, totp_custom};

use crate::{crypto, error::CryptoError, two_factor::TwoFactorConfig};

const SECRET_ALPHABET: Alphabet = Alphabet::RFC4648 { padding: false };

/// 160-bit secrets, the RFC 4226 recommendation
const SECRET_BYTES: usize = 20;

/// A new TOTP enrollment, returned to the user once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpEnrollment {
    /// Base32 secret for manual entry
    pub secret: String,
    /// `otpauth://` URI for QR codes
    pub provisioning_uri: String,
}

#[derive(Debug, Clone)]
pub struct TotpGenerator {
    issuer: String,
    step_secs: u64,
    digits: u32,
    skew_steps: u64,
}

impl TotpGenerator {
    pub fn new(config: &TwoFactorConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            step_secs: config.totp_step_secs.max(1),
            digits: config.totp_digits,
            skew_steps: config.totp_skew_steps,
        }
    }

    pub fn generate_secret(&self) -> Result<String, CryptoError> {
        let bytes = crypto::random_bytes(SECRET_BYTES)?;
        Ok(base32::encode(SECRET_ALPHABET, &bytes))
    }

    /// Format: `otpauth://totp/Issuer:account?secret=...&issuer=Issuer&...`
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> String {
        let issuer = urlencoding::encode(&self.issuer);
        format!(
            "otpauth://totp/{issuer}:{}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={}&period={}",
            urlencoding::encode(account),
            self.digits,
            self.step_secs,
        )
    }

    pub fn enroll(&self, account: &str) -> Result<TotpEnrollment, CryptoError> {
        let secret = self.generate_secret()?;
        let provisioning_uri = self.provisioning_uri(&secret, account);
        Ok(TotpEnrollment {
            secret,
            provisioning_uri,
        })
    }

    pub fn step_at(&self, at: DateTime<Utc>) -> u64 {
        u64::try_from(at.timestamp()).unwrap_or(0) / self.step_secs
    }

    /// The code for a given time step.
    pub fn code_for_step(&self, secret: &str, step: u64) -> Result<String, CryptoError> {
        let key = decode_secret(secret)?;
        Ok(totp_custom::<Sha1>(
            self.step_secs,
            self.digits,
            &key,
            step * self.step_secs,
        ))
    }

    pub fn code_at(&self, secret: &str, at: DateTime<Utc>) -> Result<String, CryptoError> {
        self.code_for_step(secret, self.step_at(at))
    }

    /// Find the time step within the skew window whose code equals `code`.
    pub fn matching_step(
        &self,
        secret: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>, CryptoError> {
        let code = code.trim();
        if code.len() != self.digits as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        let current = self.step_at(now);
        let first = current.saturating_sub(self.skew_steps);
        let last = current + self.skew_steps;

        let mut matched = None;
        for step in first..=last {
            let expected = self.code_for_step(secret, step)?;
            if crypto::constant_time_compare(expected.as_bytes(), code.as_bytes()) {
                matched = Some(step);
            }
        }
        Ok(matched)
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, CryptoError> {
    base32::decode(SECRET_ALPHABET, secret.trim_end_matches('='))
        .filter(|bytes| !bytes.is_empty())
        .ok_or(CryptoError::InvalidSecret)
}
