//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and
//! values. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// FileName
// ============================================================================

/// The name of a document within the synchronized directory
///
/// File names are the identity of a [`CloudFile`](super::file::CloudFile):
/// unique within the directory, never empty, and never containing a path
/// separator. Hidden files (leading dot) are valid names but are excluded
/// from batch uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    /// Create a validated FileName
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidName` if the name is empty or contains
    /// a `/` or NUL byte.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidName(
                "name must not be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\0') {
            return Err(DomainError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the name denotes a hidden file (leading dot)
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with('.')
    }

    /// Returns the file extension, if any, without the leading dot
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let trimmed = self.0.trim_start_matches('.');
        trimmed.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl Display for FileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// A content fingerprint (hex-encoded SHA-256)
///
/// Two documents with equal fingerprints are considered to have identical
/// content; fingerprint inequality is what makes two versions of the same
/// file *divergent*.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Create a Fingerprint from an existing hex digest string
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidFingerprint` unless the string is
    /// exactly 64 lowercase hex characters.
    pub fn new(digest: impl Into<String>) -> Result<Self, DomainError> {
        let digest = digest.into();
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidFingerprint(digest));
        }
        Ok(Self(digest.to_lowercase()))
    }

    /// Compute the fingerprint of a byte buffer
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Returns the digest as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VersionId
// ============================================================================

/// Identifier of a single immutable file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Create a new random VersionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a VersionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for VersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VersionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid VersionId: {e}")))
    }
}

// ============================================================================
// IdentityToken
// ============================================================================

/// Opaque token identifying the remote store account
///
/// Comparable for equality only. A change of token means the user signed
/// out and back in with a different account; every in-flight operation is
/// then invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(String);

impl IdentityToken {
    /// Create a validated IdentityToken
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidToken` if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        if token.is_empty() {
            return Err(DomainError::InvalidToken);
        }
        Ok(Self(token))
    }

    /// Returns the token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdentityToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RemoteUrl
// ============================================================================

/// Location of an item inside the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteUrl(String);

impl RemoteUrl {
    /// Create a validated RemoteUrl
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUrl` if the URL is empty.
    pub fn new(url: impl Into<String>) -> Result<Self, DomainError> {
        let url = url.into();
        if url.is_empty() {
            return Err(DomainError::InvalidUrl(url));
        }
        Ok(Self(url))
    }

    /// Returns the URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
