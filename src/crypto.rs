//! Hash and signature discipline shared by the builder and the updater.
//!
//! Releases are authenticated by signing the binary's SHA-256 digest
//! rather than the binary itself, decoupling verification from transport:
//! the same manifest signature covers a delta-reconstructed candidate and
//! a full download.

use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Constant-time check that `bytes` hashes to `expected`.
pub fn verify_sha256(bytes: &[u8], expected: &[u8]) -> bool {
    let digest = sha256(bytes);
    digest[..].ct_eq(expected).into()
}

/// Sign a raw 32-byte digest with PKCS#1 v1.5, SHA-256 as the inner hash
/// algorithm identifier.
pub fn sign_digest(key: &RsaPrivateKey, digest: &[u8]) -> Result<Vec<u8>, rsa::Error> {
    key.sign(Pkcs1v15Sign::new::<Sha256>(), digest)
}

/// Verify `signature` over the SHA-256 of `bytes`.
///
/// Permissive when unconfigured: with no public key every candidate
/// verifies, so unsigned deployments keep working. An absent signature
/// only fails when a key is present.
pub fn verify_signature(
    key: Option<&RsaPublicKey>,
    bytes: &[u8],
    signature: Option<&[u8]>,
) -> bool {
    let Some(key) = key else {
        return true;
    };
    let Some(signature) = signature else {
        return false;
    };
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &sha256(bytes), signature)
        .is_ok()
}
