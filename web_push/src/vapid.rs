//! Voluntary Application Server Identification for Web Push (VAPID)
//! according to [RFC 8292](https://www.rfc-editor.org/rfc/rfc8292), plus
//! the per-audience cache of signed tokens and reusable local key pairs.

use std::sync::{Arc, PoisonError};
use std::time::SystemTime;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;

use crate::entropy::{Entropy, EntropyRng, OsEntropy};
use crate::error::{Error, Result};
use crate::{jwt, prefix, unix_seconds, VapidPusher, LOCAL_PUBLIC_KEY_LEN};

/// One cache entry per audience: the full Authorization header value and
/// the local key pair shared by every subscription on that push service
/// until the token expires. Entries are immutable once published;
/// replacement swaps the whole `Arc` so readers never observe a partially
/// minted entry.
pub(crate) struct ReusableKey {
    pub(crate) vapid: String,
    pub(crate) local_secret: SecretKey,
    pub(crate) local_public: [u8; LOCAL_PUBLIC_KEY_LEN],
    pub(crate) exp: SystemTime,
}

impl<C> VapidPusher<C> {
    /// Resolves the VAPID authorization header and local key pair for the
    /// audience of `endpoint`, minting and caching fresh material when the
    /// cached entry is missing or about to expire.
    pub(crate) fn cached_keys(&self, endpoint: &str, now: SystemTime) -> Result<Arc<ReusableKey>> {
        let (audience, _) = prefix::parse_scheme_host(endpoint)?;

        if self.vapid_token_ttl.is_zero() {
            // Caching disabled: fresh token and key pair per call.
            return Ok(Arc::new(self.mint(audience, now)?));
        }

        // Regenerate the token some time before it actually expires, so the
        // push service still sees it as valid when the request arrives.
        let threshold = now + self.vapid_ttl_buffer;
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(audience) {
                if threshold < entry.exp {
                    return Ok(Arc::clone(entry));
                }
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have raced ahead while we upgraded.
        if let Some(entry) = cache.get(audience) {
            if threshold < entry.exp {
                return Ok(Arc::clone(entry));
            }
        }
        let entry = Arc::new(self.mint(audience, now)?);
        cache.insert(audience.to_owned(), Arc::clone(&entry));
        Ok(entry)
    }

    fn mint(&self, audience: &str, now: SystemTime) -> Result<ReusableKey> {
        let local_secret = random_secret(self.rand.as_ref())?;
        let point = local_secret.public_key().to_encoded_point(false);
        let mut local_public = [0u8; LOCAL_PUBLIC_KEY_LEN];
        local_public.copy_from_slice(point.as_bytes());

        let exp = now + self.vapid_token_ttl + self.vapid_ttl_buffer;
        let mut rng = EntropyRng(self.rand.as_ref());
        let token = jwt::sign_es256(
            &self.vapid_signing_key,
            &mut rng,
            &self.b64,
            audience,
            &self.subject,
            unix_seconds(exp),
        )?;

        let mut vapid = String::with_capacity(8 + token.len() + self.vapid_public_header_part.len());
        vapid.push_str("vapid t=");
        vapid.push_str(&token);
        vapid.push_str(&self.vapid_public_header_part);

        Ok(ReusableKey {
            vapid,
            local_secret,
            local_public,
            exp,
        })
    }
}

/// Rejection-samples the entropy source until the bytes form a valid
/// non-zero P-256 scalar.
pub(crate) fn random_secret(rand: &dyn Entropy) -> Result<SecretKey> {
    let mut bytes = [0u8; 32];
    loop {
        rand.fill(&mut bytes)
            .map_err(|err| Error::Encryption(Box::new(err)))?;
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return Ok(secret);
        }
    }
}

/// Creates a new private and public VAPID key pair, base64 url-encoded
/// without padding.
pub fn generate_vapid_keys() -> Result<(String, String)> {
    let secret = random_secret(&OsEntropy)?;
    let public = secret.public_key().to_encoded_point(false);
    Ok((
        URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        URL_SAFE_NO_PAD.encode(public.as_bytes()),
    ))
}
