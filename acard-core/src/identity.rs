//! Credential identity: certificate public-key bytes and the exact-match verifier.

use sha2::{Digest, Sha256};
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

/// Public-key bytes taken from an X.509 certificate (DER SubjectPublicKeyInfo).
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Credential(bytes.into())
    }

    /// Credential that never matches anything. Used when the local certificate cannot be read.
    pub fn empty() -> Self {
        Credential(Vec::new())
    }

    /// Extract the SubjectPublicKeyInfo from a DER certificate.
    pub fn from_certificate_der(der: &[u8]) -> Result<Self, IdentityError> {
        let cert = Certificate::from_der(der)?;
        Self::from_certificate(&cert)
    }

    /// Extract the SubjectPublicKeyInfo from a PEM certificate.
    pub fn from_certificate_pem(pem: impl AsRef<[u8]>) -> Result<Self, IdentityError> {
        let cert = Certificate::from_pem(pem)?;
        Self::from_certificate(&cert)
    }

    fn from_certificate(cert: &Certificate) -> Result<Self, IdentityError> {
        let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
        Ok(Credential(spki))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short hex digest for logs. Key bytes themselves are never logged.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("len", &self.0.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// True iff `presented` is byte-for-byte equal to a non-empty `local`.
/// Lengths are compared first; a mismatch never inspects the bytes.
pub fn matches(presented: &Credential, local: &Credential) -> bool {
    if local.is_empty() || presented.len() != local.len() {
        return false;
    }
    presented.as_bytes() == local.as_bytes()
}

/// Supplies this application's own credential. Called on every authentication event;
/// implementations must not cache across calls and degrade to [`Credential::empty`] on failure.
pub trait IdentityProvider: Send + Sync {
    fn local_credential(&self) -> Credential;
}

impl IdentityProvider for Credential {
    fn local_credential(&self) -> Credential {
        self.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid certificate: {0}")]
    Certificate(#[from] x509_cert::der::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_is_reflexive() {
        let c = Credential::new(vec![1, 2, 3]);
        assert!(matches(&c, &c));
    }

    #[test]
    fn matches_rejects_length_mismatch() {
        let local = Credential::new(vec![1, 2, 3]);
        let presented = Credential::new(vec![1, 2, 3, 4]);
        assert!(!matches(&presented, &local));
        assert!(!matches(&local, &presented));
    }

    #[test]
    fn matches_rejects_single_byte_mutation() {
        let local = Credential::new(vec![0x30, 0x59, 0x30, 0x13]);
        for i in 0..local.len() {
            let mut bytes = local.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            assert!(!matches(&Credential::new(bytes), &local), "byte {i}");
        }
    }

    #[test]
    fn empty_local_never_matches() {
        assert!(!matches(&Credential::empty(), &Credential::empty()));
        assert!(!matches(&Credential::new(vec![1]), &Credential::empty()));
    }

    #[test]
    fn extracts_public_key_from_der_and_pem() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["acard.local".to_string()]).unwrap();
        let expected = Credential::new(key_pair.public_key_der());

        let from_der = Credential::from_certificate_der(cert.der()).unwrap();
        assert_eq!(from_der, expected);

        let from_pem = Credential::from_certificate_pem(cert.pem()).unwrap();
        assert_eq!(from_pem, expected);
        assert!(matches(&from_pem, &from_der));
    }

    #[test]
    fn garbage_certificate_is_an_error() {
        assert!(Credential::from_certificate_der(&[0x30, 0x03, 0x01]).is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let c = Credential::new(vec![9; 32]);
        assert_eq!(c.fingerprint().len(), 16);
        assert_eq!(c.fingerprint(), Credential::new(vec![9; 32]).fingerprint());
        assert_ne!(c.fingerprint(), Credential::new(vec![8; 32]).fingerprint());
    }
}
