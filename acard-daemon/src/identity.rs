//! Local credential from the signing certificate on disk. Re-read on every authentication so a
//! rotated certificate takes effect without a restart.

use std::path::PathBuf;

use acard_core::{Credential, IdentityProvider};

const PEM_MARKER: &[u8] = b"-----BEGIN";

pub struct CertificateFile {
    path: PathBuf,
}

impl CertificateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> anyhow::Result<Credential> {
        let bytes = std::fs::read(&self.path)?;
        let credential = if bytes.starts_with(PEM_MARKER) {
            Credential::from_certificate_pem(&bytes)?
        } else {
            Credential::from_certificate_der(&bytes)?
        };
        Ok(credential)
    }
}

impl IdentityProvider for CertificateFile {
    fn local_credential(&self) -> Credential {
        match self.load() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read signing certificate");
                Credential::empty()
            }
        }
    }
}
