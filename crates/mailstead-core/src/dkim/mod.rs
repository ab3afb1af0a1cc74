//! DKIM signing-key generation
//!
//! Produces an RSA keypair and its DNS-publishable TXT value for a
//! domain. Generation strategies are tried in order: the opendkim-genkey
//! tool first, then an in-process RSA fallback. When every strategy
//! fails the outcome is Unavailable and callers persist a disabled key
//! record instead of aborting domain creation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

/// RSA key size for generated DKIM keys
const KEY_BITS: usize = 2048;

/// Result of a key-generation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum KeygenOutcome {
    /// Usable key material
    Ready {
        private_key_pem: String,
        public_key_txt: String,
    },
    /// Every strategy failed; persist as a disabled key record
    Unavailable { reason: String },
}

impl KeygenOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, KeygenOutcome::Ready { .. })
    }
}

/// Key material produced by a single strategy
struct KeyMaterial {
    private_key_pem: String,
    public_key_txt: String,
}

/// DKIM key generator for one selector
pub struct DkimGenerator {
    selector: String,
}

impl DkimGenerator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Generate key material for a domain, trying each strategy in order
    pub async fn generate(&self, domain: &str) -> KeygenOutcome {
        match self.generate_with_opendkim(domain).await {
            Ok(material) => {
                info!(domain, selector = %self.selector, "Generated DKIM key via opendkim-genkey");
                return KeygenOutcome::Ready {
                    private_key_pem: material.private_key_pem,
                    public_key_txt: material.public_key_txt,
                };
            }
            Err(e) => {
                warn!(domain, error = %e, "opendkim-genkey unavailable, falling back to in-process generation");
            }
        }

        match self.generate_with_rsa().await {
            Ok(material) => {
                info!(domain, selector = %self.selector, "Generated DKIM key in process");
                KeygenOutcome::Ready {
                    private_key_pem: material.private_key_pem,
                    public_key_txt: material.public_key_txt,
                }
            }
            Err(e) => {
                warn!(domain, error = %e, "All DKIM key generation strategies failed");
                KeygenOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run opendkim-genkey in a scoped temporary directory.
    /// The directory and the key files it holds are removed on every
    /// exit path when the guard drops.
    async fn generate_with_opendkim(&self, domain: &str) -> anyhow::Result<KeyMaterial> {
        let dir = TempDir::new()?;

        let output = Command::new("opendkim-genkey")
            .arg("-b")
            .arg(KEY_BITS.to_string())
            .arg("-d")
            .arg(domain)
            .arg("-s")
            .arg(&self.selector)
            .arg("-D")
            .arg(dir.path())
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!(
                "opendkim-genkey exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let private_key_pem =
            tokio::fs::read_to_string(dir.path().join(format!("{}.private", self.selector)))
                .await?;
        let txt_file =
            tokio::fs::read_to_string(dir.path().join(format!("{}.txt", self.selector))).await?;

        let public_key_txt = parse_genkey_txt(&txt_file)
            .ok_or_else(|| anyhow::anyhow!("Malformed opendkim-genkey TXT output"))?;

        Ok(KeyMaterial {
            private_key_pem,
            public_key_txt,
        })
    }

    /// In-process RSA keypair plus manual TXT assembly
    async fn generate_with_rsa(&self) -> anyhow::Result<KeyMaterial> {
        tokio::task::spawn_blocking(|| {
            let mut rng = rand::thread_rng();
            let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
            let public_key = RsaPublicKey::from(&private_key);

            let private_key_pem = private_key.to_pkcs8_pem(LineEnding::LF)?.to_string();
            let public_der = public_key.to_public_key_der()?;
            let public_key_txt =
                format!("v=DKIM1; k=rsa; p={}", BASE64.encode(public_der.as_bytes()));

            Ok(KeyMaterial {
                private_key_pem,
                public_key_txt,
            })
        })
        .await?
    }
}

/// Extract the TXT value from an opendkim-genkey zone-file snippet.
///
/// The file looks like:
/// `mail._domainkey IN TXT ( "v=DKIM1; h=sha256; k=rsa; " "p=MIIB..." ) ; ...`
/// and the value is the concatenation of the quoted segments.
fn parse_genkey_txt(contents: &str) -> Option<String> {
    let mut value = String::new();
    let mut rest = contents;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let end = after.find('"')?;
        value.push_str(&after[..end]);
        rest = &after[end + 1..];
    }
    if value.contains("v=DKIM1") {
        Some(value)
    } else {
        None
    }
}

/// The (enabled, private key, TXT value) triple to persist for an
/// outcome; Unavailable maps to a disabled record with empty material
pub fn outcome_fields(outcome: &KeygenOutcome) -> (bool, String, String) {
    match outcome {
        KeygenOutcome::Ready {
            private_key_pem,
            public_key_txt,
        } => (true, private_key_pem.clone(), public_key_txt.clone()),
        KeygenOutcome::Unavailable { .. } => (false, String::new(), String::new()),
    }
}
