// caisse/src/monetico/mac.rs

//! HMAC-SHA1 over the Monetico field string, keyed by the merchant's
//! 20-byte secret.

use crate::errors::AppError;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const KEY_LEN: usize = 20;

/// Merchant MAC key, held as a keyed HMAC state ready to clone per message.
#[derive(Clone)]
pub struct MacKey(HmacSha1);

impl std::fmt::Debug for MacKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("MacKey([REDACTED])")
  }
}

impl MacKey {
  /// Parses the 40-hex-character key as configured. Whitespace anywhere is
  /// ignored; anything else that is not exactly 40 hex digits is rejected.
  pub fn from_hex(raw: &str) -> Result<Self, AppError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() != KEY_LEN * 2 || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
      return Err(AppError::Config(
        "MONETICO_KEY must be exactly 40 hexadecimal characters".to_string(),
      ));
    }
    let mut bytes = [0u8; KEY_LEN];
    hex::decode_to_slice(&compact, &mut bytes)
      .map_err(|e| AppError::Config(format!("MONETICO_KEY is not valid hex: {}", e)))?;
    let mac = <HmacSha1 as Mac>::new_from_slice(&bytes)
      .map_err(|e| AppError::Config(format!("MONETICO_KEY rejected: {}", e)))?;
    Ok(MacKey(mac))
  }

  fn hmac(&self, message: &str) -> HmacSha1 {
    let mut mac = self.0.clone();
    mac.update(message.as_bytes());
    mac
  }
}

/// Uppercase hex HMAC-SHA1 of `message`.
pub fn compute(key: &MacKey, message: &str) -> String {
  hex::encode_upper(key.hmac(message).finalize().into_bytes())
}

/// Checks `candidate` against the MAC of `message` in constant time.
/// Surrounding whitespace and letter case in `candidate` are ignored.
pub fn verify(key: &MacKey, message: &str, candidate: &str) -> bool {
  let Ok(candidate_bytes) = hex::decode(candidate.trim()) else {
    return false;
  };
  key.hmac(message).verify_slice(&candidate_bytes).is_ok()
}

/// First characters of a MAC, for logs.
pub fn redact(mac: &str) -> String {
  let prefix: String = mac.trim().chars().take(8).collect();
  format!("{}…", prefix)
}
