//! Keyed integrity tags (HMAC-SHA256) over a holder's canonical bytes.
//!
//! Signing is optional system-wide: a [`Signer`] built without a key reports
//! `is_enabled() == false` and every `sign` call fails with
//! `KeyNotInitialized`.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{MetrixError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Anything that can present a canonical byte form to sign.
pub trait Signable {
    fn canonical_bytes(&self) -> Result<Vec<u8>>;
}

/// HMAC-SHA256 signer. Cheap to clone; the key is shared.
#[derive(Clone, Default)]
pub struct Signer {
    key: Option<Arc<[u8]>>,
}

impl Signer {
    /// Signer with `key`. An empty key disables signing.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        let key = key.as_ref();
        if key.is_empty() {
            return Self::disabled();
        }
        Self {
            key: Some(Arc::from(key)),
        }
    }

    pub fn disabled() -> Self {
        Self { key: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub fn sign<S: Signable + ?Sized>(&self, holder: &S) -> Result<Vec<u8>> {
        let mac = self.mac_over(holder)?;
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Recompute and compare in constant time. Propagates `sign` failures.
    pub fn verify<S: Signable + ?Sized>(&self, holder: &S, signature: &[u8]) -> Result<bool> {
        let mac = self.mac_over(holder)?;
        Ok(mac.verify_slice(signature).is_ok())
    }

    fn mac_over<S: Signable + ?Sized>(&self, holder: &S) -> Result<HmacSha256> {
        let key = self.key.as_deref().ok_or(MetrixError::KeyNotInitialized)?;
        let bytes = holder
            .canonical_bytes()
            .map_err(|e| MetrixError::Digest(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| MetrixError::Digest(e.to_string()))?;
        mac.update(&bytes);
        Ok(mac)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// `signing:` config section shared by server and agent.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    #[serde(default)]
    pub key: Option<String>,
}

impl SigningConfig {
    pub fn signer(&self) -> Signer {
        match self.key.as_deref() {
            Some(k) => Signer::new(k),
            None => Signer::disabled(),
        }
    }
}
