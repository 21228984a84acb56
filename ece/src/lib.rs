//! Single-record "aes128gcm" encrypted content coding according to
//! [RFC 8188](https://www.rfc-editor.org/rfc/rfc8188). Web push payloads
//! (RFC 8291) always fit one record, so multi-record framing is not
//! supported here.

#[cfg(test)]
mod tests;

use aes_gcm::{aead::consts::U12, AeadInPlace, Aes128Gcm, KeyInit, Nonce, Tag};
use hkdf::Hkdf;
use sha2::Sha256;

pub const SALT_LEN: usize = 16;
pub const RS_LEN: usize = 4;
pub const TAG_LEN: usize = 16;

/// Record size written into the header of every record. Deployed user
/// agents expect this constant rather than the actual record length.
pub const MAX_RECORD_SIZE: usize = 4096;

const PADDING_DELIMITER: u8 = 0x02;

#[derive(Debug)]
pub enum Error {
    KeyIdLengthInvalid,
    RecordLengthInvalid,
    PaddingInvalid,
    Aes128Gcm,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

fn derive_key<IKM: AsRef<[u8]>>(salt: [u8; SALT_LEN], ikm: IKM) -> aes_gcm::Key<Aes128Gcm> {
    let info = b"Content-Encoding: aes128gcm\0";
    let mut okm = [0u8; 16];
    let hk = Hkdf::<Sha256>::new(Some(&salt), ikm.as_ref());
    hk.expand(info, &mut okm)
        .expect("okm length is always 16, impossible for it to be too large");

    aes_gcm::Key::<Aes128Gcm>::from(okm)
}

fn derive_nonce<IKM: AsRef<[u8]>>(salt: [u8; SALT_LEN], ikm: IKM) -> Nonce<U12> {
    // Single-record payloads only, so the sequence number is always zero
    // and the RFC 8188 XOR step is the identity.
    let info = b"Content-Encoding: nonce\0";
    let mut okm = [0u8; 12];
    let hk = Hkdf::<Sha256>::new(Some(salt.as_ref()), ikm.as_ref());
    hk.expand(info, &mut okm)
        .expect("okm length is always 12, impossible for it to be too large");

    Nonce::from(okm)
}

/// Seals `message` into a complete aes128gcm record consisting of the
/// header (salt, record size, keyid), the ciphertext of
/// `message || 0x02 || zero padding` and the GCM tag. `pad_len` zero bytes
/// of padding are appended after the delimiter.
///
/// The whole record lives in one backing allocation and the data region is
/// sealed in place.
pub fn encrypt<IKM: AsRef<[u8]>, KI: AsRef<[u8]>>(
    ikm: IKM,
    salt: [u8; SALT_LEN],
    keyid: KI,
    message: &[u8],
    pad_len: usize,
) -> Result<Vec<u8>, Error> {
    let keyid = keyid.as_ref();
    let keyid_len: u8 = keyid
        .len()
        .try_into()
        .map_err(|_| Error::KeyIdLengthInvalid)?;

    let header_len = SALT_LEN + RS_LEN + 1 + keyid.len();
    let data_len = message.len() + 1 + pad_len;
    let record_len = header_len + data_len + TAG_LEN;

    let mut record = vec![0u8; record_len];
    record[..SALT_LEN].copy_from_slice(&salt);
    record[SALT_LEN..SALT_LEN + RS_LEN].copy_from_slice(&(MAX_RECORD_SIZE as u32).to_be_bytes());
    record[SALT_LEN + RS_LEN] = keyid_len;
    record[SALT_LEN + RS_LEN + 1..header_len].copy_from_slice(keyid);
    record[header_len..header_len + message.len()].copy_from_slice(message);
    record[header_len + message.len()] = PADDING_DELIMITER;

    let key = derive_key(salt, ikm.as_ref());
    let nonce = derive_nonce(salt, ikm.as_ref());
    let tag_offset = record_len - TAG_LEN;
    let tag = Aes128Gcm::new(&key)
        .encrypt_in_place_detached(&nonce, b"", &mut record[header_len..tag_offset])
        .map_err(|_| Error::Aes128Gcm)?;
    record[tag_offset..].copy_from_slice(&tag);

    Ok(record)
}

/// Opens a single aes128gcm record produced by [`encrypt`], stripping the
/// padding delimiter and any trailing zero padding.
pub fn decrypt<IKM: AsRef<[u8]>>(ikm: IKM, record: &[u8]) -> Result<Vec<u8>, Error> {
    if record.len() < SALT_LEN + RS_LEN + 1 {
        return Err(Error::RecordLengthInvalid);
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&record[..SALT_LEN]);
    let keyid_len = record[SALT_LEN + RS_LEN] as usize;
    let data_offset = SALT_LEN + RS_LEN + 1 + keyid_len;
    if record.len() < data_offset + 1 + TAG_LEN {
        return Err(Error::RecordLengthInvalid);
    }

    let key = derive_key(salt, ikm.as_ref());
    let nonce = derive_nonce(salt, ikm.as_ref());
    let (data, tag) = record[data_offset..].split_at(record.len() - data_offset - TAG_LEN);
    let mut data = data.to_vec();
    Aes128Gcm::new(&key)
        .decrypt_in_place_detached(&nonce, b"", &mut data, Tag::from_slice(tag))
        .map_err(|_| Error::Aes128Gcm)?;

    while data.last() == Some(&0) {
        data.pop();
    }
    match data.pop() {
        Some(PADDING_DELIMITER) => Ok(data),
        _ => Err(Error::PaddingInvalid),
    }
}
