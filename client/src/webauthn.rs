//! Local authentication primitive.
//!
//! The platform authenticator is consumed as an opaque capability: given a
//! challenge it either returns a signed assertion or `None` when the user
//! dismissed the prompt or no credential matched. A software-backed
//! implementation is provided for tests and development tooling.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use moonvault_program::{PublicKey, SignatureBytes};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};

/// A signed assertion produced by the local authenticator.
#[derive(Debug, Clone)]
pub struct Assertion {
    /// Raw 64-byte signature over the challenge
    pub signature: Vec<u8>,
    /// Authenticator metadata blob
    pub authenticator_data: Vec<u8>,
    /// Client data JSON carrying the encoded challenge
    pub client_data_json: Vec<u8>,
    /// Credential id the authenticator picked, when it reports one
    pub credential_id: Option<String>,
}

impl Assertion {
    /// The signature as the fixed-width wire type.
    pub fn signature_bytes(&self) -> Result<SignatureBytes> {
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| ClientError::Validation("assertion signature must be 64 bytes".into()))?;
        Ok(SignatureBytes(bytes))
    }
}

/// The local authentication primitive.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Request an assertion over `challenge`.
    ///
    /// `credential_id` restricts the prompt to one registered credential;
    /// `allow_discovery` lets the user pick from all resident credentials
    /// instead. Returns `Ok(None)` when the user cancelled or no
    /// credential matched; callers surface that as an explicit
    /// cancellation, never a generic failure.
    async fn get_assertion(
        &self,
        credential_id: Option<&str>,
        challenge: &[u8],
        allow_discovery: bool,
    ) -> Result<Option<Assertion>>;
}

/// Software authenticator holding one P-256 credential in memory.
///
/// Signs challenges directly with a deterministic key; used by the test
/// suites and local tooling where no platform authenticator exists.
pub struct SoftwareAuthenticator {
    key: SigningKey,
    credential_id: String,
    relying_party: String,
}

impl SoftwareAuthenticator {
    /// Create an authenticator from a fixed key seed.
    pub fn new(seed: [u8; 32], credential_id: impl Into<String>) -> Result<Self> {
        let key = SigningKey::from_slice(&seed)
            .map_err(|e| ClientError::AuthenticationFailed(e.to_string()))?;
        Ok(Self {
            key,
            credential_id: credential_id.into(),
            relying_party: "moonvault.app".to_string(),
        })
    }

    /// The compressed public key of the held credential.
    pub fn public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(true);
        let bytes: [u8; 33] = point
            .as_bytes()
            .try_into()
            .expect("compressed SEC1 point is 33 bytes");
        PublicKey(bytes)
    }

    /// The credential id of the held credential.
    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }
}

#[async_trait]
impl Authenticator for SoftwareAuthenticator {
    async fn get_assertion(
        &self,
        credential_id: Option<&str>,
        challenge: &[u8],
        _allow_discovery: bool,
    ) -> Result<Option<Assertion>> {
        if let Some(requested) = credential_id {
            if requested != self.credential_id {
                // No matching credential behaves like a dismissed prompt.
                return Ok(None);
            }
        }

        let signature: Signature = self.key.sign(challenge);

        let client_data = serde_json::json!({
            "type": "webauthn.get",
            "challenge": URL_SAFE_NO_PAD.encode(challenge),
            "origin": format!("https://{}", self.relying_party),
        });

        // rpIdHash, then flags (user present), then the counter
        let mut authenticator_data = Vec::with_capacity(37);
        authenticator_data.extend_from_slice(&Sha256::digest(self.relying_party.as_bytes()));
        authenticator_data.push(0x01);
        authenticator_data.extend_from_slice(&[0, 0, 0, 0]);

        Ok(Some(Assertion {
            signature: signature.to_bytes().to_vec(),
            authenticator_data,
            client_data_json: serde_json::to_vec(&client_data)?,
            credential_id: Some(self.credential_id.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;

    #[tokio::test]
    async fn test_assertion_signs_challenge() {
        let auth = SoftwareAuthenticator::new([7; 32], "cred-1").unwrap();
        let assertion = auth
            .get_assertion(None, b"approve:proposal_1,timestamp:1700000000", true)
            .await
            .unwrap()
            .expect("assertion");

        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&auth.public_key().0).unwrap();
        let signature = p256::ecdsa::Signature::from_slice(&assertion.signature).unwrap();
        key.verify(b"approve:proposal_1,timestamp:1700000000", &signature)
            .unwrap();
        assert_eq!(assertion.credential_id.as_deref(), Some("cred-1"));
        assert_eq!(assertion.authenticator_data.len(), 37);
    }

    #[tokio::test]
    async fn test_mismatched_credential_id_yields_none() {
        let auth = SoftwareAuthenticator::new([7; 32], "cred-1").unwrap();
        let result = auth.get_assertion(Some("cred-2"), b"msg", false).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_signature_bytes_round_trip() {
        let auth = SoftwareAuthenticator::new([7; 32], "cred-1").unwrap();
        let assertion = auth.get_assertion(None, b"msg", true).await.unwrap().unwrap();
        assert!(assertion.signature_bytes().is_ok());
    }
}
