// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Linked identities and the last-identity unlink rule.
//!
//! A user may hold several identities (wallets, email, Telegram, ...). An
//! unlink is only allowed while the user still holds more than one distinct
//! identity kind, counting embedded wallets as a wallet and the profile
//! email as an email link even when they are not explicit links.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;

pub const CANNOT_UNLINK_LAST: &str = "Cannot unlink the last remaining account.";
pub const ACCOUNT_NOT_LINKED: &str = "Account is not linked.";

/// Kind of a linked identity, as reported in the provider's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentityKind {
    Wallet,
    Email,
    Telegram,
    Other(String),
}

impl IdentityKind {
    pub fn as_str(&self) -> &str {
        match self {
            IdentityKind::Wallet => "wallet",
            IdentityKind::Email => "email",
            IdentityKind::Telegram => "telegram",
            IdentityKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for IdentityKind {
    fn from(value: &str) -> Self {
        match value {
            "wallet" => IdentityKind::Wallet,
            "email" => IdentityKind::Email,
            "telegram" => IdentityKind::Telegram,
            other => IdentityKind::Other(other.to_string()),
        }
    }
}

impl From<String> for IdentityKind {
    fn from(value: String) -> Self {
        IdentityKind::from(value.as_str())
    }
}

impl From<IdentityKind> for String {
    fn from(kind: IdentityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identity attached to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedIdentity {
    Wallet {
        address: String,
        chain_type: Option<String>,
        wallet_client_type: Option<String>,
        /// Provider-managed wallet rather than an explicit link.
        embedded: bool,
    },
    Email {
        address: String,
        /// Profile email that is not an explicit link.
        implicit: bool,
    },
    Telegram {
        telegram_user_id: String,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Other {
        kind: String,
        identifier: String,
    },
}

impl LinkedIdentity {
    pub fn kind(&self) -> IdentityKind {
        match self {
            LinkedIdentity::Wallet { .. } => IdentityKind::Wallet,
            LinkedIdentity::Email { .. } => IdentityKind::Email,
            LinkedIdentity::Telegram { .. } => IdentityKind::Telegram,
            LinkedIdentity::Other { kind, .. } => IdentityKind::from(kind.as_str()),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            LinkedIdentity::Wallet { address, .. } => address,
            LinkedIdentity::Email { address, .. } => address,
            LinkedIdentity::Telegram {
                telegram_user_id, ..
            } => telegram_user_id,
            LinkedIdentity::Other { identifier, .. } => identifier,
        }
    }

    /// True for identities the user holds without having linked them
    /// explicitly.
    pub fn is_embedded(&self) -> bool {
        match self {
            LinkedIdentity::Wallet { embedded, .. } => *embedded,
            LinkedIdentity::Email { implicit, .. } => *implicit,
            _ => false,
        }
    }

    /// Wallet addresses and emails compare case-insensitively.
    pub fn matches(&self, target: &UnlinkTarget) -> bool {
        if self.kind() != target.kind {
            return false;
        }
        match self {
            LinkedIdentity::Wallet { .. } | LinkedIdentity::Email { .. } => {
                self.identifier().eq_ignore_ascii_case(target.identifier.trim())
            }
            _ => self.identifier() == target.identifier.trim(),
        }
    }
}

/// Number of distinct identity kinds the user holds.
pub fn effective_kind_count(identities: &[LinkedIdentity]) -> usize {
    identities
        .iter()
        .map(LinkedIdentity::kind)
        .collect::<HashSet<_>>()
        .len()
}

/// Whether removing one identity still leaves the user with at least one.
pub fn can_unlink(identities: &[LinkedIdentity]) -> bool {
    effective_kind_count(identities) > 1
}

/// The identity a client asks to unlink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct UnlinkTarget {
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "wallet")]
    pub kind: IdentityKind,
    #[schema(example = "0xABC1230000000000000000000000000000000DEF")]
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlinkError {
    #[error("{kind} identity {identifier} is not linked")]
    NotLinked { kind: IdentityKind, identifier: String },

    #[error("unlinking would leave the user without an identity")]
    LastRemainingIdentity,
}

impl From<UnlinkError> for ApiError {
    fn from(err: UnlinkError) -> Self {
        match err {
            UnlinkError::NotLinked { .. } => ApiError::not_found(ACCOUNT_NOT_LINKED),
            UnlinkError::LastRemainingIdentity => ApiError::conflict(CANNOT_UNLINK_LAST),
        }
    }
}

/// Refuse an unlink that targets an unknown identity or would remove the
/// user's last identity kind.
pub fn authorize_unlink(
    identities: &[LinkedIdentity],
    target: &UnlinkTarget,
) -> Result<(), UnlinkError> {
    if !identities.iter().any(|identity| identity.matches(target)) {
        return Err(UnlinkError::NotLinked {
            kind: target.kind.clone(),
            identifier: target.identifier.clone(),
        });
    }
    if !can_unlink(identities) {
        return Err(UnlinkError::LastRemainingIdentity);
    }
    Ok(())
}

// =============================================================================
// Provider user object
// =============================================================================

/// One entry of the provider's `linkedAccounts` list.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_client_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub telegram_user_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ProviderAccount {
    fn into_identity(self, embedded: bool) -> Option<LinkedIdentity> {
        match self.kind.as_str() {
            "wallet" => Some(LinkedIdentity::Wallet {
                address: non_empty(self.address)?,
                chain_type: self.chain_type,
                wallet_client_type: self.wallet_client_type,
                embedded,
            }),
            "email" => Some(LinkedIdentity::Email {
                address: non_empty(self.address)?,
                implicit: false,
            }),
            "telegram" => Some(LinkedIdentity::Telegram {
                telegram_user_id: self.telegram_user_id.and_then(id_string)?,
                username: self.username,
                first_name: self.first_name,
                last_name: self.last_name,
            }),
            "" => None,
            _ => {
                let identifier = non_empty(self.address)
                    .or(non_empty(self.subject))
                    .or(non_empty(self.username))?;
                Some(LinkedIdentity::Other {
                    kind: self.kind,
                    identifier,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ProfileEmail {
    pub address: String,
}

/// The provider's user object as the client holds it.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub linked_accounts: Vec<ProviderAccount>,
    #[serde(default)]
    pub embedded_wallets: Vec<ProviderAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ProfileEmail>,
}

impl UserProfile {
    /// Every identity the user holds: explicit links, embedded wallets,
    /// and the profile email when it is not already linked.
    pub fn identities(&self) -> Vec<LinkedIdentity> {
        let mut identities: Vec<LinkedIdentity> = Vec::new();

        let explicit = self
            .linked_accounts
            .iter()
            .cloned()
            .filter_map(|account| account.into_identity(false));
        let embedded = self.embedded_wallets.iter().cloned().filter_map(|mut wallet| {
            wallet.kind = IdentityKind::Wallet.to_string();
            wallet.into_identity(true)
        });

        for identity in explicit.chain(embedded) {
            let duplicate = identities.iter().any(|seen| {
                seen.kind() == identity.kind()
                    && seen.identifier().eq_ignore_ascii_case(identity.identifier())
            });
            if !duplicate {
                identities.push(identity);
            }
        }

        if let Some(address) = self
            .email
            .as_ref()
            .map(|email| email.address.trim())
            .filter(|address| !address.is_empty())
        {
            let linked = identities
                .iter()
                .any(|identity| identity.kind() == IdentityKind::Email);
            if !linked {
                identities.push(LinkedIdentity::Email {
                    address: address.to_string(),
                    implicit: true,
                });
            }
        }

        identities
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn id_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
