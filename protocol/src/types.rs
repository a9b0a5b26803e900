//! # Core Types
//!
//! Identities and amounts shared by every SYNTHEX component.
//!
//! Amounts are 256-bit unsigned integers in the smallest denomination of the
//! asset they measure. Nothing in the protocol ever uses floating point; the
//! only rounding that happens is integer truncation inside the collateral
//! formula, and that rounding is part of the protocol's observable behavior.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use primitive_types::U256;

/// An amount of stable asset, synthetic token, or raw oracle price.
pub type Amount = U256;

/// Sequential vault identifier. `0` means "no vault".
pub type VaultId = u64;

/// The identity of a principal or service.
///
/// Principals are opaque strings; hex-encoded public keys in a real
/// deployment, human-readable handles on devnet and in tests. Comparison is
/// exact; no case folding or checksum normalization is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a raw identity string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The all-empty address. Used as the owner of the zero-valued vault
    /// returned for ids that were never created.
    pub fn zero() -> Self {
        Self(String::new())
    }

    /// Returns `true` for the empty address.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Serde adapter that writes a [`U256`] as a base-10 string.
///
/// The default `primitive-types` representation is `0x`-prefixed hex, which
/// is unfriendly for JSON clients that want to read balances. Deserializing
/// accepts a decimal string or a plain JSON integer.
///
/// ```ignore
/// #[serde(with = "synthex_protocol::types::decimal")]
/// pub amount: U256,
/// ```
pub mod decimal {
    use super::U256;
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        struct DecimalVisitor;

        impl<'de> Visitor<'de> for DecimalVisitor {
            type Value = U256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a base-10 unsigned integer as a string or number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
                Ok(U256::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
                U256::from_dec_str(v.trim()).map_err(|e| E::custom(format!("{v:?}: {e:?}")))
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}
