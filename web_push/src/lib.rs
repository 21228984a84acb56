//! This crate implements the application-server side of "Generic Event
//! Delivery Using Http Push" (web-push) according to
//! [RFC 8030](https://www.rfc-editor.org/rfc/rfc8030), with payload
//! encryption per [RFC 8291](https://www.rfc-editor.org/rfc/rfc8291) /
//! [RFC 8188](https://www.rfc-editor.org/rfc/rfc8188) and VAPID
//! authentication per [RFC 8292](https://www.rfc-editor.org/rfc/rfc8292).
//!
//! It is built for high-throughput senders: one [`VapidPusher`] is created
//! per VAPID credential set and then shared across threads for the lifetime
//! of the process. Signed VAPID tokens and the local ECDH key pair are
//! cached per audience (push service), and the per-subscription key
//! agreement can optionally be cached on the [`Subscription`] record
//! itself, so repeated sends skip both ECDH and the first HKDF step.
//!
//! # Example
//!
//! ```no_run
//! use web_push_fast::{PushOptions, Subscription, VapidPusher};
//!
//! // Placeholders for your VAPID key pair, generated once with
//! // `generate_vapid_keys`. Keep the private key out of your source tree
//! // in real projects!
//! const VAPID_PUBLIC: &str = "";
//! const VAPID_PRIVATE: &str = "";
//!
//! async fn push(
//!     message: &[u8],
//!     subscription: &mut Subscription,
//! ) -> Result<(), web_push_fast::Error> {
//!     let pusher = VapidPusher::new("push@example.com", VAPID_PUBLIC, VAPID_PRIVATE)?;
//!     let response = pusher
//!         .send(message, subscription, &PushOptions::default())
//!         .await?;
//!     println!("pushed: {}", response.status());
//!     Ok(())
//! }
//! ```

mod base64_;
mod entropy;
mod error;
mod jwt;
mod prefix;
mod transport;
mod vapid;


pub use http;
pub use p256;

pub use crate::entropy::{Entropy, OsEntropy};
pub use crate::error::{Error, Result};
pub use crate::prefix::{parse_host, parse_scheme_host};
pub use crate::transport::{HyperTransport, Transport};
pub use crate::vapid::generate_vapid_keys;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{GeneralPurpose, URL_SAFE_NO_PAD};
use base64::Engine;
use hkdf::Hkdf;
use http::{header, Method, Request, Response};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::vapid::ReusableKey;

/// Hard upper bound on the record size accepted by push services.
pub const MAX_RECORD_SIZE: usize = ece_fast::MAX_RECORD_SIZE;

const AUTH_SECRET_LEN: usize = 16;
const P256DH_LEN: usize = 65;
pub(crate) const LOCAL_PUBLIC_KEY_LEN: usize = 65;

const WEBPUSH_INFO: &[u8] = b"WebPush: info\0";
const WEBPUSH_INFO_LEN: usize = 14;

const HEADER_LEN: usize = ece_fast::SALT_LEN + ece_fast::RS_LEN + 1 + LOCAL_PUBLIC_KEY_LEN;
// Smallest complete record: header, padding delimiter and GCM tag.
const MIN_RECORD_SIZE: usize = HEADER_LEN + 1 + ece_fast::TAG_LEN;

/// Keys are the base64 encoded values from `PushSubscription.getKey()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    pub auth: String,
    pub p256dh: String,
}

/// Cached per-subscription key material, written back by the pusher when
/// local secret caching is enabled. Callers that persist subscriptions can
/// store it alongside and present it again on later sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalKey {
    /// Local public key, uncompressed SEC1 form.
    #[serde(rename = "p")]
    pub public: String,
    /// Input keying material derived from the ECDH agreement.
    #[serde(rename = "m", default)]
    pub ikm: String,
    /// Creation timestamp in unix milliseconds, used for checking
    /// expiration.
    #[serde(rename = "a")]
    pub at: i64,
}

/// A `PushSubscription` object from the Push API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    pub keys: Keys,
    #[serde(rename = "lk", default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<LocalKey>,
}

/// Urgency of a push message as understood by push services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl Urgency {
    /// The header value for this urgency.
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }

    /// Maps a header value back to an urgency. Unknown names map to `None`
    /// so callers can drop them without failing the whole send.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "very-low" => Some(Urgency::VeryLow),
            "low" => Some(Urgency::Low),
            "normal" => Some(Urgency::Normal),
            "high" => Some(Urgency::High),
            _ => None,
        }
    }
}

/// Per-notification parameters.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Value of the TTL header, in seconds.
    pub ttl: u32,
    /// Urgency header; omitted when unset.
    pub urgency: Option<Urgency>,
    /// Topic header to collapse a pending message; omitted when empty.
    pub topic: String,
    /// Target record size for padding, overriding the pusher default for
    /// this call. Zero keeps the default.
    pub record_size: usize,
}

/// Long-lived web push sender holding VAPID credentials, policy knobs and
/// the per-audience token cache. Safe for concurrent use from any thread.
pub struct VapidPusher<C = HyperTransport> {
    client: C,
    subject: String,
    vapid_signing_key: SigningKey,
    vapid_public_header_part: String,
    vapid_token_ttl: Duration,
    vapid_ttl_buffer: Duration,
    local_secret_ttl_fn: Option<Box<dyn Fn() -> Duration + Send + Sync>>,
    rand: Box<dyn Entropy>,
    b64: GeneralPurpose,
    record_size: usize,
    max_record_size: usize,
    cache: RwLock<HashMap<String, Arc<ReusableKey>>>,
}

impl VapidPusher {
    /// Creates a [`VapidPusher`] with default policy and the default
    /// transport. The subject is prefixed with `mailto:` unless it already
    /// starts with `mailto:` or `https:`.
    pub fn new(
        subject: impl Into<String>,
        vapid_public_key: &str,
        vapid_private_key: &str,
    ) -> Result<Self> {
        Self::builder(subject, vapid_public_key, vapid_private_key).build()
    }

    /// Returns a [`PusherBuilder`] for configuring policy before
    /// construction.
    pub fn builder(
        subject: impl Into<String>,
        vapid_public_key: &str,
        vapid_private_key: &str,
    ) -> PusherBuilder {
        PusherBuilder {
            client: HyperTransport::default(),
            subject: subject.into(),
            vapid_public_key: vapid_public_key.to_owned(),
            vapid_private_key: vapid_private_key.to_owned(),
            vapid_token_ttl: Duration::from_secs(60 * 60),
            vapid_ttl_buffer: Duration::from_secs(10 * 60),
            local_secret_ttl_fn: None,
            rand: Box::new(OsEntropy),
            b64: URL_SAFE_NO_PAD,
            record_size: 0,
            max_record_size: MAX_RECORD_SIZE,
        }
    }
}

/// Configures and validates a [`VapidPusher`].
pub struct PusherBuilder<C = HyperTransport> {
    client: C,
    subject: String,
    vapid_public_key: String,
    vapid_private_key: String,
    vapid_token_ttl: Duration,
    vapid_ttl_buffer: Duration,
    local_secret_ttl_fn: Option<Box<dyn Fn() -> Duration + Send + Sync>>,
    rand: Box<dyn Entropy>,
    b64: GeneralPurpose,
    record_size: usize,
    max_record_size: usize,
}

impl<C> PusherBuilder<C> {
    /// Replaces the HTTP transport used by [`VapidPusher::send`].
    pub fn with_client<C2>(self, client: C2) -> PusherBuilder<C2> {
        PusherBuilder {
            client,
            subject: self.subject,
            vapid_public_key: self.vapid_public_key,
            vapid_private_key: self.vapid_private_key,
            vapid_token_ttl: self.vapid_token_ttl,
            vapid_ttl_buffer: self.vapid_ttl_buffer,
            local_secret_ttl_fn: self.local_secret_ttl_fn,
            rand: self.rand,
            b64: self.b64,
            record_size: self.record_size,
            max_record_size: self.max_record_size,
        }
    }

    /// Sets the lifetime of cached VAPID tokens. Zero disables both token
    /// caching and local key pair reuse: every call mints fresh material.
    pub fn with_vapid_token_ttl(mut self, ttl: Duration) -> Self {
        self.vapid_token_ttl = ttl;
        self
    }

    /// Sets the slack added to the `exp` claim and subtracted when deciding
    /// whether a cached token needs a refresh, so tokens are still valid
    /// when they reach the push service.
    pub fn with_vapid_ttl_buffer(mut self, buffer: Duration) -> Self {
        self.vapid_ttl_buffer = buffer;
        self
    }

    /// Enables reuse of the per-subscription local key material for `ttl`.
    /// The pusher writes the generated [`LocalKey`] back into the
    /// subscription; persist it to skip ECDH on later sends. Zero disables
    /// reuse.
    pub fn with_local_secret_ttl(self, ttl: Duration) -> Self {
        if ttl.is_zero() {
            let mut this = self;
            this.local_secret_ttl_fn = None;
            this
        } else {
            self.with_local_secret_ttl_fn(move || ttl)
        }
    }

    /// Like [`PusherBuilder::with_local_secret_ttl`] with a dynamic
    /// lifetime supplier.
    pub fn with_local_secret_ttl_fn(
        mut self,
        ttl_fn: impl Fn() -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.local_secret_ttl_fn = Some(Box::new(ttl_fn));
        self
    }

    /// Replaces the entropy source used for salts, ephemeral keys and
    /// signing entropy.
    pub fn with_rand(mut self, rand: impl Entropy + 'static) -> Self {
        self.rand = Box::new(rand);
        self
    }

    /// Replaces the base64 engine used on the encoding hot path. The engine
    /// must produce the url-safe unpadded form.
    pub fn with_base64_engine(mut self, engine: GeneralPurpose) -> Self {
        self.b64 = engine;
        self
    }

    /// Sets the default target record size; records shorter than the target
    /// are padded up to it. Zero disables padding.
    pub fn with_record_size(mut self, record_size: usize) -> Self {
        self.record_size = record_size;
        self
    }

    /// Sets the maximum allowed record length. Zero disables the check;
    /// other values are clamped to what push services accept.
    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Validates the configuration and key material and builds the pusher.
    pub fn build(self) -> Result<VapidPusher<C>> {
        // Push services reject tokens expiring more than 24 hours out.
        if self.vapid_token_ttl + self.vapid_ttl_buffer > Duration::from_secs(24 * 60 * 60) {
            return Err(Error::Config(
                "vapid token ttl plus buffer must not exceed 24 hours".into(),
            ));
        }
        if !base64_::is_url_safe_no_pad(&self.b64) {
            return Err(Error::Config(
                "base64 engine must encode url-safe without padding".into(),
            ));
        }

        let private = base64_::decode(&self.vapid_private_key)?;
        if private.len() != 32 {
            return Err(Error::Config(format!(
                "vapid private key must be 32 bytes, got {}",
                private.len()
            )));
        }
        let vapid_signing_key = SigningKey::from_slice(&private)
            .map_err(|err| Error::Config(format!("invalid vapid private key: {err}")))?;

        let public = base64_::decode(&self.vapid_public_key)?;
        if public.len() != LOCAL_PUBLIC_KEY_LEN {
            return Err(Error::Config(format!(
                "vapid public key must be {LOCAL_PUBLIC_KEY_LEN} bytes, got {}",
                public.len()
            )));
        }
        let mut vapid_public_header_part = String::from(", k=");
        vapid_public_header_part.push_str(&self.b64.encode(&public));

        let subject = if self.subject.starts_with("mailto:") || self.subject.starts_with("https:")
        {
            self.subject
        } else {
            format!("mailto:{}", self.subject)
        };

        let max_record_size = match self.max_record_size {
            0 => 0,
            n => n.clamp(MIN_RECORD_SIZE, MAX_RECORD_SIZE),
        };

        Ok(VapidPusher {
            client: self.client,
            subject,
            vapid_signing_key,
            vapid_public_header_part,
            vapid_token_ttl: self.vapid_token_ttl,
            vapid_ttl_buffer: self.vapid_ttl_buffer,
            local_secret_ttl_fn: self.local_secret_ttl_fn,
            rand: self.rand,
            b64: self.b64,
            record_size: self.record_size.min(MAX_RECORD_SIZE),
            max_record_size,
            cache: RwLock::new(HashMap::new()),
        })
    }
}

impl<C> VapidPusher<C> {
    /// Whether VAPID tokens and local key pairs are cached per audience.
    pub fn is_vapid_token_caching_enabled(&self) -> bool {
        !self.vapid_token_ttl.is_zero()
    }

    /// Whether per-subscription local key material is reused.
    pub fn is_local_secret_caching_enabled(&self) -> bool {
        self.local_secret_ttl_fn.is_some()
    }

    /// Returns the `Authorization` header value for the audience of
    /// `endpoint`, minting one if needed. Should only be used for
    /// debugging and logging.
    pub fn gen_auth_header(&self, endpoint: &str) -> Result<String> {
        Ok(self.cached_keys(endpoint, SystemTime::now())?.vapid.clone())
    }

    /// Encrypts `message` for the subscription and assembles the HTTP POST
    /// request for its endpoint. The request can be executed with any HTTP
    /// client; [`VapidPusher::send`] does so with the configured transport.
    ///
    /// When local secret caching is enabled the derived key material is
    /// written back into `subscription.local_key`.
    pub fn prepare(
        &self,
        message: &[u8],
        subscription: &mut Subscription,
        options: &PushOptions,
    ) -> Result<Request<Vec<u8>>> {
        let now = SystemTime::now();
        let keys = self.cached_keys(&subscription.endpoint, now)?;

        let record_len = HEADER_LEN + message.len() + 1 + ece_fast::TAG_LEN;
        if self.max_record_size != 0 && record_len > self.max_record_size {
            return Err(Error::MessageTooLarge);
        }
        let target = match options.record_size {
            0 => self.record_size,
            n => n.min(MAX_RECORD_SIZE),
        };
        let pad_len = target.saturating_sub(record_len);

        let (local_public, ikm) = self.local_material(&keys, subscription, now)?;

        let mut salt = [0u8; ece_fast::SALT_LEN];
        self.rand
            .fill(&mut salt)
            .map_err(|err| Error::Encryption(Box::new(err)))?;

        let record = ece_fast::encrypt(ikm, salt, local_public, message, pad_len)?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(subscription.endpoint.as_str())
            .header(header::CONTENT_ENCODING, "aes128gcm")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header("TTL", options.ttl)
            .header(header::AUTHORIZATION, keys.vapid.as_str());
        if let Some(urgency) = options.urgency {
            builder = builder.header("Urgency", urgency.as_str());
        }
        if !options.topic.is_empty() {
            builder = builder.header("Topic", options.topic.as_str());
        }
        Ok(builder.body(record)?)
    }

    /// Resolves the local public key and input keying material for this
    /// send: from the subscription's cached [`LocalKey`] when fresh,
    /// otherwise via ECDH against the subscription's `p256dh` key.
    fn local_material(
        &self,
        keys: &ReusableKey,
        subscription: &mut Subscription,
        now: SystemTime,
    ) -> Result<([u8; LOCAL_PUBLIC_KEY_LEN], [u8; 32])> {
        if let (Some(ttl_fn), Some(local_key)) =
            (&self.local_secret_ttl_fn, &subscription.local_key)
        {
            let expired_before = unix_millis(now).saturating_sub(ttl_fn().as_millis() as i64);
            if local_key.at > expired_before && !local_key.ikm.is_empty() {
                let mut public = [0u8; LOCAL_PUBLIC_KEY_LEN];
                base64_::decode_exact(&local_key.public, &mut public)?;
                let mut ikm = [0u8; 32];
                base64_::decode_exact(&local_key.ikm, &mut ikm)?;
                return Ok((public, ikm));
            }
        }

        let mut auth_secret = [0u8; AUTH_SECRET_LEN];
        base64_::decode_exact(&subscription.keys.auth, &mut auth_secret)?;
        let mut ua_public = [0u8; P256DH_LEN];
        base64_::decode_exact(&subscription.keys.p256dh, &mut ua_public)?;

        let ua_key = p256::PublicKey::from_sec1_bytes(&ua_public)
            .map_err(|err| Error::Encryption(Box::new(err)))?;
        let shared =
            p256::ecdh::diffie_hellman(keys.local_secret.to_nonzero_scalar(), ua_key.as_affine());
        let ikm = derive_ikm(&auth_secret, &shared, &ua_public, &keys.local_public);

        if self.local_secret_ttl_fn.is_some() {
            subscription.local_key = Some(LocalKey {
                public: self.b64.encode(keys.local_public),
                ikm: self.b64.encode(ikm),
                at: unix_millis(now),
            });
        }
        Ok((keys.local_public, ikm))
    }
}

impl<C: Transport> VapidPusher<C> {
    /// Prepares and sends a push notification to the subscription's
    /// endpoint. The response is returned as-is; interpreting status codes
    /// (and dropping gone subscriptions) is up to the caller. Dropping the
    /// returned future cancels the transport call.
    pub async fn send(
        &self,
        message: &[u8],
        subscription: &mut Subscription,
        options: &PushOptions,
    ) -> Result<Response<C::Body>> {
        let request = self.prepare(message, subscription, options)?;
        self.client.execute(request).await
    }
}

fn derive_ikm(
    auth_secret: &[u8; AUTH_SECRET_LEN],
    shared: &p256::ecdh::SharedSecret,
    ua_public: &[u8; P256DH_LEN],
    local_public: &[u8; LOCAL_PUBLIC_KEY_LEN],
) -> [u8; 32] {
    let mut info = [0u8; WEBPUSH_INFO_LEN + P256DH_LEN + LOCAL_PUBLIC_KEY_LEN];
    info[..WEBPUSH_INFO_LEN].copy_from_slice(WEBPUSH_INFO);
    info[WEBPUSH_INFO_LEN..WEBPUSH_INFO_LEN + P256DH_LEN].copy_from_slice(ua_public);
    info[WEBPUSH_INFO_LEN + P256DH_LEN..].copy_from_slice(local_public);

    let hk = Hkdf::<Sha256>::new(Some(auth_secret.as_slice()), shared.raw_secret_bytes().as_ref());
    let mut ikm = [0u8; 32];
    hk.expand(&info, &mut ikm)
        .expect("okm length is always 32 bytes, cannot be too large");

    ikm
}

/// User-agent side decryption of a push record, mainly useful for tests and
/// for building reference receivers.
pub fn decrypt(
    record: &[u8],
    ua_secret: &p256::SecretKey,
    auth_secret: &[u8; AUTH_SECRET_LEN],
) -> Result<Vec<u8>> {
    if record.len() < MIN_RECORD_SIZE {
        return Err(Error::Encryption(Box::new(
            ece_fast::Error::RecordLengthInvalid,
        )));
    }
    let keyid_len = record[ece_fast::SALT_LEN + ece_fast::RS_LEN] as usize;
    if keyid_len != LOCAL_PUBLIC_KEY_LEN {
        return Err(Error::Encryption(Box::new(
            ece_fast::Error::KeyIdLengthInvalid,
        )));
    }
    let keyid_offset = ece_fast::SALT_LEN + ece_fast::RS_LEN + 1;
    let mut local_public = [0u8; LOCAL_PUBLIC_KEY_LEN];
    local_public.copy_from_slice(&record[keyid_offset..keyid_offset + LOCAL_PUBLIC_KEY_LEN]);

    let local_key = p256::PublicKey::from_sec1_bytes(&local_public)
        .map_err(|err| Error::Encryption(Box::new(err)))?;
    let shared = p256::ecdh::diffie_hellman(ua_secret.to_nonzero_scalar(), local_key.as_affine());

    let ua_point = ua_secret.public_key().to_encoded_point(false);
    let mut ua_public = [0u8; P256DH_LEN];
    ua_public.copy_from_slice(ua_point.as_bytes());

    let ikm = derive_ikm(auth_secret, &shared, &ua_public, &local_public);
    Ok(ece_fast::decrypt(ikm, record)?)
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}
