//! Sender credential bindings and resolution
//!
//! A [`CredentialStore`] is built once from configuration at process start and
//! shared read-only by every request. Resolution trims the claimed sender,
//! compares it case-insensitively against the bindings in declaration order,
//! and falls back to the generic relay account when one is configured.

use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::config::BulkmailConfig;
use crate::error::DeliveryError;

/// A relay password or app token
///
/// `Debug` output is redacted so secrets never reach the logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret for handing to the relay
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// An authorized sender address and the relay account it authenticates as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderBinding {
    /// Sender address as it appears in the `From` header
    pub address: String,

    /// Relay login; defaults to `address`
    #[serde(default)]
    pub account: Option<String>,

    /// Relay secret for this account
    #[serde(default)]
    pub secret: Option<Secret>,
}

impl SenderBinding {
    /// Create a binding that logs in with the sender address itself
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            account: None,
            secret: Some(Secret::new(secret)),
        }
    }

    /// Use a login distinct from the sender address
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    fn matches(&self, address: &str) -> bool {
        self.address.trim().to_lowercase() == address.to_lowercase()
    }

    fn login(&self) -> String {
        self.account
            .clone()
            .unwrap_or_else(|| self.address.trim().to_string())
    }
}

/// Generic relay account used for senders without their own binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackAccount {
    /// Relay login
    pub account: String,

    /// Relay secret
    #[serde(default)]
    pub secret: Option<Secret>,

    /// `From` address used for fallback sends; the claimed sender when unset
    #[serde(default)]
    pub address: Option<String>,
}

/// Where a resolved credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// A per-sender binding
    Binding,
    /// The generic fallback account
    Fallback,
}

/// Credentials chosen for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    /// Relay login
    pub account: String,
    /// Relay secret
    pub secret: Secret,
    /// Authenticated address written to the `From` header
    pub identity: String,
    /// Binding or fallback
    pub source: CredentialSource,
}

/// The sender a caller claims, split into address and optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedSender {
    /// Bare address, trimmed
    pub address: String,
    /// Display name from a `Name <addr>` form
    pub name: Option<String>,
}

impl ClaimedSender {
    /// Parse a raw `from` value
    ///
    /// Accepts both a bare address and the `Name <addr>` mailbox form. Values
    /// that are not valid mailboxes are kept verbatim after trimming.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<Mailbox>() {
            Ok(mailbox) => Self {
                address: mailbox.email.to_string(),
                name: mailbox.name.filter(|name| !name.trim().is_empty()),
            },
            Err(_) => Self {
                address: trimmed.to_string(),
                name: None,
            },
        }
    }
}

/// Read-only table of sender credentials
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    bindings: Vec<SenderBinding>,
    fallback: Option<FallbackAccount>,
}

impl CredentialStore {
    /// Build a store from explicit bindings
    #[must_use]
    pub const fn new(bindings: Vec<SenderBinding>, fallback: Option<FallbackAccount>) -> Self {
        Self { bindings, fallback }
    }

    /// Build a store from loaded configuration
    #[must_use]
    pub fn from_config(config: &BulkmailConfig) -> Self {
        Self::new(config.senders.clone(), config.fallback.clone())
    }

    /// Authorized sender addresses in declaration order
    pub fn senders(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|binding| binding.address.trim())
    }

    /// Whether a generic fallback account is configured
    #[must_use]
    pub const fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Resolve the credentials for a claimed sender
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Unauthorized`] when nothing matches and no fallback exists
    /// - [`DeliveryError::CredentialMisconfigured`] when the matching entry has no secret
    pub fn resolve(&self, from: &str) -> Result<ResolvedCredential, DeliveryError> {
        let claimed = ClaimedSender::parse(from);

        if let Some(binding) = self.bindings.iter().find(|b| b.matches(&claimed.address)) {
            let secret = usable(binding.secret.as_ref()).ok_or_else(|| {
                DeliveryError::CredentialMisconfigured {
                    sender: binding.address.trim().to_string(),
                }
            })?;

            return Ok(ResolvedCredential {
                account: binding.login(),
                secret,
                identity: binding.address.trim().to_string(),
                source: CredentialSource::Binding,
            });
        }

        if let Some(fallback) = &self.fallback {
            let secret = usable(fallback.secret.as_ref()).ok_or_else(|| {
                DeliveryError::CredentialMisconfigured {
                    sender: fallback.account.clone(),
                }
            })?;

            return Ok(ResolvedCredential {
                account: fallback.account.clone(),
                secret,
                identity: fallback
                    .address
                    .clone()
                    .unwrap_or_else(|| claimed.address.clone()),
                source: CredentialSource::Fallback,
            });
        }

        Err(DeliveryError::Unauthorized {
            sender: claimed.address,
        })
    }
}

fn usable(secret: Option<&Secret>) -> Option<Secret> {
    secret.filter(|s| !s.is_blank()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryErrorKind;

    fn store() -> CredentialStore {
        CredentialStore::new(
            vec![
                SenderBinding::new("owner@domain.com", "owner-secret"),
                SenderBinding::new("sales@domain.com", "sales-secret")
                    .with_account("sales-login"),
            ],
            None,
        )
    }

    #[test]
    fn test_resolve_exact_match() {
        let credential = store().resolve("owner@domain.com").unwrap();
        assert_eq!(credential.account, "owner@domain.com");
        assert_eq!(credential.secret.expose(), "owner-secret");
        assert_eq!(credential.identity, "owner@domain.com");
        assert_eq!(credential.source, CredentialSource::Binding);
    }

    #[test]
    fn test_resolve_trims_and_ignores_case() {
        let credential = store().resolve("  Sales@Domain.COM \n").unwrap();
        assert_eq!(credential.account, "sales-login");
        assert_eq!(credential.identity, "sales@domain.com");
    }

    #[test]
    fn test_resolve_mailbox_form() {
        let credential = store().resolve("Owner Team <owner@domain.com>").unwrap();
        assert_eq!(credential.identity, "owner@domain.com");
    }

    #[test]
    fn test_first_declared_binding_wins() {
        let store = CredentialStore::new(
            vec![
                SenderBinding::new("dup@domain.com", "first"),
                SenderBinding::new("DUP@domain.com", "second"),
            ],
            None,
        );
        let credential = store.resolve("dup@domain.com").unwrap();
        assert_eq!(credential.secret.expose(), "first");
    }

    #[test]
    fn test_unknown_sender_unauthorized() {
        let err = store().resolve("stranger@domain.com").unwrap_err();
        assert_eq!(err.kind(), DeliveryErrorKind::Unauthorized);
    }

    #[test]
    fn test_missing_secret_misconfigured() {
        let store = CredentialStore::new(
            vec![SenderBinding {
                address: "owner@domain.com".into(),
                account: None,
                secret: Some(Secret::new("   ")),
            }],
            None,
        );
        let err = store.resolve("owner@domain.com").unwrap_err();
        assert_eq!(err.kind(), DeliveryErrorKind::CredentialMisconfigured);
    }

    #[test]
    fn test_fallback_used_for_unknown_sender() {
        let store = CredentialStore::new(
            vec![SenderBinding::new("owner@domain.com", "owner-secret")],
            Some(FallbackAccount {
                account: "relay-user".into(),
                secret: Some(Secret::new("relay-pass")),
                address: None,
            }),
        );

        let credential = store.resolve("stranger@domain.com").unwrap();
        assert_eq!(credential.source, CredentialSource::Fallback);
        assert_eq!(credential.account, "relay-user");
        assert_eq!(credential.identity, "stranger@domain.com");

        // A binding still takes precedence over the fallback
        let credential = store.resolve("owner@domain.com").unwrap();
        assert_eq!(credential.source, CredentialSource::Binding);
    }

    #[test]
    fn test_fallback_identity_override() {
        let store = CredentialStore::new(
            vec![],
            Some(FallbackAccount {
                account: "relay-user".into(),
                secret: Some(Secret::new("relay-pass")),
                address: Some("noreply@domain.com".into()),
            }),
        );
        let credential = store.resolve("someone@else.com").unwrap();
        assert_eq!(credential.identity, "noreply@domain.com");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        let binding = SenderBinding::new("owner@domain.com", "hunter2");
        assert!(!format!("{binding:?}").contains("hunter2"));
    }

    #[test]
    fn test_senders_in_declaration_order() {
        let binding = store();
        let senders: Vec<_> = binding.senders().collect();
        assert_eq!(senders, vec!["owner@domain.com", "sales@domain.com"]);
    }

    #[test]
    fn test_claimed_sender_parse() {
        let claimed = ClaimedSender::parse("Alice <alice@example.com>");
        assert_eq!(claimed.address, "alice@example.com");
        assert_eq!(claimed.name.as_deref(), Some("Alice"));

        let claimed = ClaimedSender::parse(" not a mailbox ");
        assert_eq!(claimed.address, "not a mailbox");
        assert_eq!(claimed.name, None);
    }
}
