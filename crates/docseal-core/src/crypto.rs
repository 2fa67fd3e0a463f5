//! Signature verification primitives.
//!
//! Parses institution public keys (PEM or DER), fingerprints them and checks
//! signatures. Every entry point here is total: malformed input is reported
//! as `false` / [`SignatureCheck::Invalid`], never as a panic or an error.
//!
//! - RSA: PSS padding, SHA-256 with MGF1-SHA-256, maximum salt length.
//! - EC (P-256, P-384): ECDSA over a SHA-256 digest, DER or fixed-width
//!   signatures.

use std::fmt;

use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Signature algorithms an institution may register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "RSA_2048")]
    Rsa2048,
    #[serde(rename = "RSA_4096")]
    Rsa4096,
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[serde(rename = "ECDSA_P384")]
    EcdsaP384,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Rsa2048,
        Algorithm::Rsa4096,
        Algorithm::EcdsaP256,
        Algorithm::EcdsaP384,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Rsa2048 => "RSA_2048",
            Algorithm::Rsa4096 => "RSA_4096",
            Algorithm::EcdsaP256 => "ECDSA_P256",
            Algorithm::EcdsaP384 => "ECDSA_P384",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "algorithm",
                value: s.to_string(),
            })
    }

    /// The key family this algorithm belongs to.
    pub fn family(&self) -> KeyFamily {
        match self {
            Algorithm::Rsa2048 | Algorithm::Rsa4096 => KeyFamily::Rsa,
            Algorithm::EcdsaP256 | Algorithm::EcdsaP384 => KeyFamily::Ec,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public key family, the granularity at which claims are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyFamily {
    Rsa,
    Ec,
}

/// SHA-256 fingerprint of a canonically encoded public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Outcome of evaluating a signature against stored key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The signature matches the message under the key.
    Valid,
    /// The signature was evaluated and does not match (or is not a signature).
    Invalid,
    /// The key material could not be parsed, so nothing was evaluated.
    Unreadable,
}

/// What a parsed public key turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub family: KeyFamily,
    /// Modulus size for RSA, field size for EC.
    pub bits: usize,
    /// SubjectPublicKeyInfo DER re-encoded from the parsed key.
    pub canonical_der: Vec<u8>,
}

enum ParsedKey {
    Rsa(RsaPublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl ParsedKey {
    fn parse(bytes: &[u8]) -> Option<Self> {
        match std::str::from_utf8(bytes) {
            Ok(text) if text.trim_start().starts_with("-----BEGIN") => {
                Self::parse_pem(text.trim())
            }
            _ => Self::parse_der(bytes),
        }
    }

    fn parse_pem(pem: &str) -> Option<Self> {
        use rsa::pkcs1::DecodeRsaPublicKey;

        if let Ok(key) = <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_pem(pem) {
            return Some(Self::Rsa(key));
        }
        if let Ok(key) = RsaPublicKey::from_pkcs1_pem(pem) {
            return Some(Self::Rsa(key));
        }
        if let Ok(key) = <p256::PublicKey as p256::pkcs8::DecodePublicKey>::from_public_key_pem(pem)
        {
            return Some(Self::P256(key));
        }
        <p384::PublicKey as p384::pkcs8::DecodePublicKey>::from_public_key_pem(pem)
            .ok()
            .map(Self::P384)
    }

    fn parse_der(der: &[u8]) -> Option<Self> {
        use rsa::pkcs1::DecodeRsaPublicKey;

        if let Ok(key) = <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_der(der) {
            return Some(Self::Rsa(key));
        }
        if let Ok(key) = RsaPublicKey::from_pkcs1_der(der) {
            return Some(Self::Rsa(key));
        }
        if let Ok(key) = <p256::PublicKey as p256::pkcs8::DecodePublicKey>::from_public_key_der(der)
        {
            return Some(Self::P256(key));
        }
        <p384::PublicKey as p384::pkcs8::DecodePublicKey>::from_public_key_der(der)
            .ok()
            .map(Self::P384)
    }

    fn family(&self) -> KeyFamily {
        match self {
            ParsedKey::Rsa(_) => KeyFamily::Rsa,
            ParsedKey::P256(_) | ParsedKey::P384(_) => KeyFamily::Ec,
        }
    }

    fn bits(&self) -> usize {
        match self {
            ParsedKey::Rsa(key) => key.n().bits(),
            ParsedKey::P256(_) => 256,
            ParsedKey::P384(_) => 384,
        }
    }

    fn canonical_der(&self) -> Option<Vec<u8>> {
        let der = match self {
            ParsedKey::Rsa(key) => rsa::pkcs8::EncodePublicKey::to_public_key_der(key)
                .ok()?
                .as_bytes()
                .to_vec(),
            ParsedKey::P256(key) => p256::pkcs8::EncodePublicKey::to_public_key_der(key)
                .ok()?
                .as_bytes()
                .to_vec(),
            ParsedKey::P384(key) => p384::pkcs8::EncodePublicKey::to_public_key_der(key)
                .ok()?
                .as_bytes()
                .to_vec(),
        };
        Some(der)
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let digest = Sha256::digest(message);
        match self {
            ParsedKey::Rsa(key) => verify_rsa_pss(key, &digest, signature),
            ParsedKey::P256(key) => verify_p256(key, &digest, signature),
            ParsedKey::P384(key) => verify_p384(key, &digest, signature),
        }
    }
}

/// Largest PSS salt the modulus allows with a SHA-256 digest.
pub fn pss_max_salt_len(key: &RsaPublicKey) -> usize {
    let em_bits = key.n().bits().saturating_sub(1);
    let em_len = (em_bits + 7) / 8;
    em_len.saturating_sub(<Sha256 as Digest>::output_size() + 2)
}

fn verify_rsa_pss(key: &RsaPublicKey, digest: &[u8], signature: &[u8]) -> bool {
    let scheme = Pss::new_with_salt::<Sha256>(pss_max_salt_len(key));
    key.verify(scheme, digest, signature).is_ok()
}

fn verify_p256(key: &p256::PublicKey, digest: &[u8], signature: &[u8]) -> bool {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::{Signature, VerifyingKey};

    let Ok(sig) = Signature::from_der(signature).or_else(|_| Signature::from_slice(signature))
    else {
        return false;
    };
    VerifyingKey::from(key).verify_prehash(digest, &sig).is_ok()
}

fn verify_p384(key: &p384::PublicKey, digest: &[u8], signature: &[u8]) -> bool {
    use p384::ecdsa::signature::hazmat::PrehashVerifier;
    use p384::ecdsa::{Signature, VerifyingKey};

    let Ok(sig) = Signature::from_der(signature).or_else(|_| Signature::from_slice(signature))
    else {
        return false;
    };
    VerifyingKey::from(key).verify_prehash(digest, &sig).is_ok()
}

/// Parse key material and report its family, size and canonical encoding.
pub fn inspect(bytes: &[u8]) -> Option<KeyInfo> {
    let key = ParsedKey::parse(bytes)?;
    Some(KeyInfo {
        family: key.family(),
        bits: key.bits(),
        canonical_der: key.canonical_der()?,
    })
}

/// Check that `bytes` is a parseable public key of the claimed family.
pub fn validate_public_key(bytes: &[u8], algorithm: Algorithm) -> bool {
    ParsedKey::parse(bytes).is_some_and(|key| key.family() == algorithm.family())
}

/// SHA-256 over the canonical SPKI encoding of the key.
///
/// PEM and DER renditions of the same key share a fingerprint. Bytes that do
/// not parse as a supported key are hashed as-is.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let canonical = ParsedKey::parse(bytes).and_then(|key| key.canonical_der());
    let digest = Sha256::digest(canonical.as_deref().unwrap_or(bytes));
    Fingerprint(digest.into())
}

/// Evaluate a signature, distinguishing unreadable keys from mismatches.
pub fn check(key_bytes: &[u8], message: &[u8], signature: &[u8]) -> SignatureCheck {
    match ParsedKey::parse(key_bytes) {
        None => SignatureCheck::Unreadable,
        Some(key) if key.verify(message, signature) => SignatureCheck::Valid,
        Some(_) => SignatureCheck::Invalid,
    }
}

/// Verify a signature; any failure, including unparseable input, is `false`.
pub fn verify(key_bytes: &[u8], message: &[u8], signature: &[u8]) -> bool {
    check(key_bytes, message, signature) == SignatureCheck::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn rsa_keypair() -> (RsaPrivateKey, Vec<u8>) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, pem.into_bytes())
    }

    fn rsa_sign(private: &RsaPrivateKey, message: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(message);
        let salt = pss_max_salt_len(&private.to_public_key());
        private
            .sign_with_rng(
                &mut rand::thread_rng(),
                Pss::new_with_salt::<Sha256>(salt),
                &digest,
            )
            .unwrap()
    }

    fn p256_keypair() -> (p256::ecdsa::SigningKey, Vec<u8>) {
        let signing = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let public = p256::PublicKey::from(signing.verifying_key());
        let pem =
            p256::pkcs8::EncodePublicKey::to_public_key_pem(&public, p256::pkcs8::LineEnding::LF)
                .unwrap();
        (signing, pem.into_bytes())
    }

    fn p256_sign(signing: &p256::ecdsa::SigningKey, message: &[u8]) -> Vec<u8> {
        use p256::ecdsa::signature::hazmat::PrehashSigner;
        let sig: p256::ecdsa::Signature = signing.sign_prehash(&Sha256::digest(message)).unwrap();
        sig.to_der().as_bytes().to_vec()
    }

    fn p384_keypair() -> (p384::ecdsa::SigningKey, Vec<u8>) {
        let signing = p384::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let public = p384::PublicKey::from(signing.verifying_key());
        let pem =
            p384::pkcs8::EncodePublicKey::to_public_key_pem(&public, p384::pkcs8::LineEnding::LF)
                .unwrap();
        (signing, pem.into_bytes())
    }

    fn p384_sign(signing: &p384::ecdsa::SigningKey, message: &[u8]) -> Vec<u8> {
        use p384::ecdsa::signature::hazmat::PrehashSigner;
        let sig: p384::ecdsa::Signature = signing.sign_prehash(&Sha256::digest(message)).unwrap();
        sig.to_der().as_bytes().to_vec()
    }

    #[test]
    fn test_rsa_sign_verify() {
        let (private, pem) = rsa_keypair();
        let message = b"3f2a9c";
        let signature = rsa_sign(&private, message);

        assert!(verify(&pem, message, &signature));
        assert!(!verify(&pem, b"3f2a9d", &signature));
    }

    #[test]
    fn test_p256_sign_verify() {
        let (signing, pem) = p256_keypair();
        let message = b"document hash";
        let signature = p256_sign(&signing, message);

        assert!(verify(&pem, message, &signature));
        assert!(!verify(&pem, b"other hash", &signature));
    }

    #[test]
    fn test_p384_sign_verify_with_sha256() {
        let (signing, pem) = p384_keypair();
        let message = b"document hash";
        let signature = p384_sign(&signing, message);

        assert_eq!(check(&pem, message, &signature), SignatureCheck::Valid);
    }

    #[test]
    fn test_fixed_width_ecdsa_signature_accepted() {
        use p256::ecdsa::signature::hazmat::PrehashSigner;
        let (signing, pem) = p256_keypair();
        let sig: p256::ecdsa::Signature = signing.sign_prehash(&Sha256::digest(b"m")).unwrap();

        assert!(verify(&pem, b"m", &sig.to_bytes()));
    }

    #[test]
    fn test_signature_under_other_key_fails() {
        let (signing, _) = p256_keypair();
        let (_, other_pem) = p256_keypair();
        let signature = p256_sign(&signing, b"m");

        assert_eq!(check(&other_pem, b"m", &signature), SignatureCheck::Invalid);
    }

    #[test]
    fn test_validate_public_key_family() {
        let (_, rsa_pem) = rsa_keypair();
        let (_, ec_pem) = p256_keypair();

        assert!(validate_public_key(&rsa_pem, Algorithm::Rsa2048));
        assert!(validate_public_key(&rsa_pem, Algorithm::Rsa4096));
        assert!(!validate_public_key(&rsa_pem, Algorithm::EcdsaP256));
        assert!(validate_public_key(&ec_pem, Algorithm::EcdsaP384));
        assert!(!validate_public_key(&ec_pem, Algorithm::Rsa2048));
    }

    #[test]
    fn test_validate_public_key_fails_closed() {
        assert!(!validate_public_key(b"", Algorithm::Rsa2048));
        assert!(!validate_public_key(
            b"-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----",
            Algorithm::EcdsaP256
        ));
        assert!(!validate_public_key(&[0xff; 91], Algorithm::EcdsaP256));
    }

    #[test]
    fn test_unreadable_key_is_distinct_from_invalid_signature() {
        assert_eq!(check(b"not a key", b"m", b"sig"), SignatureCheck::Unreadable);
        assert!(!verify(b"not a key", b"m", b"sig"));
    }

    #[test]
    fn test_fingerprint_stable_across_encodings() {
        let (signing, pem) = p256_keypair();
        let public = p256::PublicKey::from(signing.verifying_key());
        let der = p256::pkcs8::EncodePublicKey::to_public_key_der(&public).unwrap();

        let mut padded = pem.clone();
        padded.extend_from_slice(b"\n\n");

        assert_eq!(fingerprint(&pem), fingerprint(der.as_bytes()));
        assert_eq!(fingerprint(&pem), fingerprint(&padded));
    }

    #[test]
    fn test_inspect_reports_size() {
        let (_, rsa_pem) = rsa_keypair();
        let (_, ec_pem) = p384_keypair();

        let rsa_info = inspect(&rsa_pem).unwrap();
        assert_eq!(rsa_info.family, KeyFamily::Rsa);
        assert_eq!(rsa_info.bits, 2048);

        let ec_info = inspect(&ec_pem).unwrap();
        assert_eq!(ec_info.family, KeyFamily::Ec);
        assert_eq!(ec_info.bits, 384);
    }

    #[test]
    fn test_algorithm_parse_roundtrip() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::parse(alg.as_str()).unwrap(), alg);
        }
        assert!(Algorithm::parse("DSA_1024").is_err());
    }

    #[test]
    fn test_fingerprint_hex_roundtrip() {
        let fp = fingerprint(b"anything");
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
    }

    proptest! {
        #[test]
        fn fingerprint_is_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(fingerprint(&bytes), fingerprint(&bytes));
        }

        #[test]
        fn verify_never_panics_on_garbage(
            key in prop::collection::vec(any::<u8>(), 0..128),
            sig in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            prop_assert!(!verify(&key, b"message", &sig));
        }

        #[test]
        fn single_bit_tamper_is_rejected(byte in 0usize..64, bit in 0u8..8) {
            let (signing, pem) = p256_keypair();
            let mut signature = p256_sign(&signing, b"payload");
            let index = byte % signature.len();
            signature[index] ^= 1 << bit;
            prop_assert!(!verify(&pem, b"payload", &signature));
        }
    }
}
