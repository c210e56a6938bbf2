//! Strongly-typed identifiers used across the dispatch pipeline.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Identifier of a tenant (owner of one processor configuration).
///
/// Tenants are free-form names chosen by the host application, so this wraps a
/// string rather than a UUID. Surrounding whitespace is trimmed and the empty
/// string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

/// Identifier of an event, unique within its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse an identifier, trimming whitespace and rejecting empty input.
            pub fn parse(value: impl AsRef<str>) -> DomainResult<Self> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!(
                        "{}: must not be empty",
                        $name
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(EventId, "EventId");

impl EventId {
    /// Generate a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}
