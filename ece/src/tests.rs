use super::*;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use once_cell::sync::Lazy;

macro_rules! DECODE {
    ($e:expr) => {
        Lazy::new(|| {
            let decoded = URL_SAFE_NO_PAD.decode($e).unwrap();
            decoded.try_into().unwrap()
        })
    };
}

mod rfc8188_example1 {
    use super::*;

    const PLAINTEXT: &[u8] = b"I am the walrus";
    const KEYID: &[u8] = b"";
    const IKM: Lazy<[u8; 16]> = DECODE!("yqdlZ-tYemfogSmv7Ws5PQ");
    const SALT: Lazy<[u8; 16]> = DECODE!("I1BsxtFttlv3u_Oo94xnmw");
    const PRK: Lazy<[u8; 32]> = DECODE!("zyeH5phsIsgUyd4oiSEIy35x-gIi4aM7y0hCF8mwn9g");
    const CEK: Lazy<[u8; 16]> = DECODE!("_wniytB-ofscZDh4tbSjHw");
    const NONCE: Lazy<[u8; 12]> = DECODE!("Bcs8gkIRKLI8GeI8");

    const ENCRYPTED: Lazy<[u8; 53]> =
        DECODE!("I1BsxtFttlv3u_Oo94xnmwAAEAAA-NAVub2qFgBEuQKRapoZu-IxkIva3MEB1PD-ly8Thjg");

    #[test]
    fn test_prk_generation() {
        let (prk, _) = Hkdf::<Sha256>::extract(Some(&*SALT), &*IKM);
        assert_eq!(prk.as_slice(), &*PRK);
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(
            &derive_key(*SALT, *IKM),
            aes_gcm::Key::<Aes128Gcm>::from_slice(&*CEK)
        );
    }

    #[test]
    fn test_nonce_derivation() {
        assert_eq!(derive_nonce(*SALT, *IKM), Nonce::from(*NONCE));
    }

    #[test]
    fn test_encryption() {
        let encrypted = encrypt(*IKM, *SALT, KEYID, PLAINTEXT, 0).unwrap();

        assert_eq!(encrypted.len(), ENCRYPTED.len());
        assert_eq!(encrypted[..16], ENCRYPTED[..16]);
        assert_eq!(
            u32::from_be_bytes(encrypted[16..20].try_into().unwrap()),
            MAX_RECORD_SIZE as u32
        );
        assert_eq!(encrypted, &ENCRYPTED[..]);
    }

    #[test]
    fn test_decryption() {
        assert_eq!(decrypt(*IKM, &*ENCRYPTED).unwrap(), PLAINTEXT);
    }
}

mod record {
    use super::*;

    const IKM: [u8; 32] = [7; 32];
    const SALT: [u8; 16] = [3; 16];
    const KEYID: [u8; 65] = [4; 65];

    #[test]
    fn test_roundtrip() {
        let record = encrypt(IKM, SALT, KEYID, b"hello there", 0).unwrap();
        assert_eq!(record.len(), 16 + 4 + 1 + 65 + 11 + 1 + 16);
        assert_eq!(record[20], 65);
        assert_eq!(&record[21..86], &KEYID);
        assert_eq!(decrypt(IKM, &record).unwrap(), b"hello there");
    }

    #[test]
    fn test_padding_extends_record() {
        let unpadded = encrypt(IKM, SALT, KEYID, b"tiny", 0).unwrap();
        let padded = encrypt(IKM, SALT, KEYID, b"tiny", 100).unwrap();
        assert_eq!(padded.len(), unpadded.len() + 100);
        assert_eq!(decrypt(IKM, &padded).unwrap(), b"tiny");
    }

    #[test]
    fn test_empty_message() {
        let record = encrypt(IKM, SALT, KEYID, b"", 0).unwrap();
        assert_eq!(record.len(), 86 + 1 + 16);
        assert_eq!(decrypt(IKM, &record).unwrap(), b"");
    }

    #[test]
    fn test_keyid_too_long() {
        let keyid = [0u8; 256];
        assert!(matches!(
            encrypt(IKM, SALT, &keyid[..], b"x", 0),
            Err(Error::KeyIdLengthInvalid)
        ));
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let mut record = encrypt(IKM, SALT, KEYID, b"hello there", 0).unwrap();
        let last = record.len() - 1;
        record[last] ^= 0xff;
        assert!(matches!(decrypt(IKM, &record), Err(Error::Aes128Gcm)));
    }

    #[test]
    fn test_wrong_ikm_rejected() {
        let record = encrypt(IKM, SALT, KEYID, b"hello there", 0).unwrap();
        assert!(matches!(decrypt([8; 32], &record), Err(Error::Aes128Gcm)));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let record = encrypt(IKM, SALT, KEYID, b"hello there", 0).unwrap();
        assert!(matches!(
            decrypt(IKM, &record[..30]),
            Err(Error::RecordLengthInvalid)
        ));
    }
}
