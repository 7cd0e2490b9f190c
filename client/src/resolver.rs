//! Credential resolution.
//!
//! A locally produced credential id may arrive hex encoded, base64
//! encoded, or not at all. Resolution builds the set of equivalent
//! encodings, asks the directory about each in order, and falls back to
//! the wallet's sole registered guardian when nothing matches. The
//! encoding shim is a lookup-retry strategy over byte identity, not a
//! security boundary: the on-ledger validator still checks the actual
//! public key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::directory::DirectoryApi;
use crate::error::{ClientError, Result};
use crate::types::GuardianInfo;

/// Equivalent encodings of a credential id, original first, deduplicated
/// in order.
pub fn credential_id_variations(credential_id: &str) -> Vec<String> {
    let mut variations = vec![credential_id.to_string()];

    // Hex-looking ids also get their base64 re-encoding.
    let is_hex = !credential_id.is_empty()
        && credential_id.len() % 2 == 0
        && credential_id.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        if let Ok(bytes) = hex::decode(credential_id) {
            variations.push(BASE64.encode(bytes));
        }
    }

    // Anything base64-decodable also gets its hex reinterpretation.
    if let Ok(bytes) = BASE64.decode(credential_id) {
        variations.push(hex::encode(bytes));
    }

    let mut seen = HashSet::new();
    variations.retain(|v| seen.insert(v.clone()));
    variations
}

/// Resolves credential ids to registered guardians via the directory.
pub struct CredentialResolver {
    directory: Arc<dyn DirectoryApi>,
    /// Last successfully resolved raw id, reused when a later assertion
    /// omits the credential id. Avoids repeated resolution only; never
    /// affects correctness.
    last_credential: Mutex<Option<String>>,
}

impl CredentialResolver {
    /// Create a resolver over a directory handle.
    pub fn new(directory: Arc<dyn DirectoryApi>) -> Self {
        Self {
            directory,
            last_credential: Mutex::new(None),
        }
    }

    /// Resolve a credential id (or the cached one) to a guardian record.
    ///
    /// # Errors
    /// [`ClientError::CredentialNotRegistered`] when no encoding matches
    /// and the wallet has anything other than exactly one registered
    /// guardian.
    pub async fn resolve(
        &self,
        credential_id: Option<&str>,
        wallet_address: &str,
    ) -> Result<GuardianInfo> {
        let raw = match credential_id {
            Some(id) => Some(id.to_string()),
            None => self.last_credential.lock().await.clone(),
        };

        if let Some(raw) = raw {
            for variation in credential_id_variations(&raw) {
                debug!("Trying credential encoding: {}", variation);
                if let Some(info) = self
                    .directory
                    .get_wallet_by_credential_id(&variation)
                    .await?
                {
                    info!(
                        "Credential resolved to guardian {} via encoding {}",
                        info.guardian_id, variation
                    );
                    *self.last_credential.lock().await = Some(raw);
                    return Ok(info);
                }
            }
        }

        // Fallback: a wallet with exactly one registered guardian is
        // unambiguous even without a credential match.
        let guardians = self
            .directory
            .get_credentials_by_wallet(wallet_address)
            .await?;
        if guardians.len() == 1 {
            warn!(
                "Credential did not match any directory entry; accepting the \
                 wallet's sole registered guardian"
            );
            let info = guardians.into_iter().next().expect("length checked");
            *self.last_credential.lock().await = Some(info.credential_id.clone());
            return Ok(info);
        }

        Err(ClientError::CredentialNotRegistered)
    }

    /// The cached raw credential id, if a resolution has succeeded.
    pub async fn cached_credential(&self) -> Option<String> {
        self.last_credential.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use test_case::test_case;

    #[test]
    fn test_variations_for_hex_id() {
        let variations = credential_id_variations("deadbeef");
        assert_eq!(variations[0], "deadbeef");
        // Base64 of de ad be ef
        assert!(variations.contains(&"3q2+7w==".to_string()));
    }

    #[test]
    fn test_variations_for_base64_id() {
        let variations = credential_id_variations("3q2+7w==");
        assert_eq!(variations[0], "3q2+7w==");
        assert!(variations.contains(&"deadbeef".to_string()));
    }

    /// Hex and base64 spellings of the same bytes both surface the
    /// canonical pair, so either spelling resolves to the same guardian.
    #[test]
    fn test_variations_are_encoding_invariant() {
        let from_hex: HashSet<String> =
            credential_id_variations("deadbeef").into_iter().collect();
        let from_b64: HashSet<String> =
            credential_id_variations("3q2+7w==").into_iter().collect();
        for spelling in ["deadbeef", "3q2+7w=="] {
            assert!(from_hex.contains(spelling));
            assert!(from_b64.contains(spelling));
        }
    }

    #[test_case("" ; "empty id")]
    #[test_case("abc" ; "odd length hex")]
    #[test_case("!!not-an-encoding!!" ; "opaque id")]
    fn test_variations_always_include_original(raw: &str) {
        let variations = credential_id_variations(raw);
        assert_eq!(variations[0], raw);
    }

    #[test]
    fn test_variations_deduplicate() {
        // "00" decodes as both hex and base64; candidates stay unique.
        let variations = credential_id_variations("00");
        let unique: HashSet<&String> = variations.iter().collect();
        assert_eq!(unique.len(), variations.len());
    }

    /// Directory fake with a fixed credential table.
    struct FakeDirectory {
        records: Vec<GuardianInfo>,
        lookups: StdMutex<Vec<String>>,
    }

    impl FakeDirectory {
        fn new(records: Vec<GuardianInfo>) -> Self {
            Self {
                records,
                lookups: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DirectoryApi for FakeDirectory {
        async fn get_wallet_by_credential_id(
            &self,
            credential_id: &str,
        ) -> Result<Option<GuardianInfo>> {
            self.lookups
                .lock()
                .unwrap()
                .push(credential_id.to_string());
            Ok(self
                .records
                .iter()
                .find(|r| r.credential_id == credential_id)
                .cloned())
        }

        async fn get_credentials_by_wallet(&self, _wallet: &str) -> Result<Vec<GuardianInfo>> {
            Ok(self.records.clone())
        }

        async fn add_signer_to_proposal(&self, _w: &str, _p: u64, _s: &str) -> Result<()> {
            Ok(())
        }

        async fn update_proposal_status(&self, _w: &str, _p: u64, _s: &str) -> Result<()> {
            Ok(())
        }
    }

    fn guardian(credential_id: &str, guardian_id: u64) -> GuardianInfo {
        GuardianInfo {
            wallet_address: "11".repeat(32),
            guardian_id,
            credential_id: credential_id.to_string(),
            credential_id_base64: None,
            guardian_public_key: None,
            name: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_direct_match() {
        let resolver = CredentialResolver::new(Arc::new(FakeDirectory::new(vec![guardian(
            "deadbeef", 1,
        )])));
        let info = resolver.resolve(Some("deadbeef"), "w").await.unwrap();
        assert_eq!(info.guardian_id, 1);
        assert_eq!(resolver.cached_credential().await.as_deref(), Some("deadbeef"));
    }

    /// The directory stores hex; the authenticator reported base64.
    #[tokio::test]
    async fn test_resolve_via_reencoding() {
        let resolver = CredentialResolver::new(Arc::new(FakeDirectory::new(vec![guardian(
            "deadbeef", 2,
        )])));
        let info = resolver.resolve(Some("3q2+7w=="), "w").await.unwrap();
        assert_eq!(info.guardian_id, 2);
    }

    /// Scenario: no encoding matches but exactly one guardian exists.
    #[tokio::test]
    async fn test_resolve_sole_guardian_fallback() {
        let resolver = CredentialResolver::new(Arc::new(FakeDirectory::new(vec![guardian(
            "othercred", 3,
        )])));
        let info = resolver.resolve(Some("deadbeef"), "w").await.unwrap();
        assert_eq!(info.guardian_id, 3);
    }

    /// Scenario: no match and two guardians must fail closed.
    #[tokio::test]
    async fn test_resolve_ambiguous_fallback_fails() {
        let resolver = CredentialResolver::new(Arc::new(FakeDirectory::new(vec![
            guardian("cred-a", 1),
            guardian("cred-b", 2),
        ])));
        let result = resolver.resolve(Some("deadbeef"), "w").await;
        assert!(matches!(
            result,
            Err(ClientError::CredentialNotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_resolve_uses_cached_credential() {
        let directory = Arc::new(FakeDirectory::new(vec![guardian("deadbeef", 1)]));
        let resolver = CredentialResolver::new(directory.clone());

        resolver.resolve(Some("deadbeef"), "w").await.unwrap();
        // Second resolution without a credential id reuses the cache.
        let info = resolver.resolve(None, "w").await.unwrap();
        assert_eq!(info.guardian_id, 1);
        assert!(directory
            .lookups
            .lock()
            .unwrap()
            .iter()
            .all(|l| l == "deadbeef" || l == "3q2+7w=="));
    }
}
