//! Arbitrary-precision token amounts.
//!
//! Voting power and token balances are 256-bit unsigned integers. JSON numbers
//! cannot carry them without loss, so `TokenAmount` serializes to a tagged
//! wrapper `{"__@json.bigint__": "<decimal>"}` and reads it back exactly.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wrapper key marking a decimal string as a big integer
pub const BIGINT_TAG: &str = "__@json.bigint__";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid token amount: {0}")]
pub struct AmountParseError(pub String);

/// A 256-bit unsigned token or voting-power amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    pub fn zero() -> Self {
        TokenAmount(U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a base-10 string as delivered by the indexer
    pub fn from_dec_str(value: &str) -> Result<Self, AmountParseError> {
        U256::from_dec_str(value.trim())
            .map(TokenAmount)
            .map_err(|_| AmountParseError(value.to_string()))
    }

    /// Sum that pins at `U256::MAX` instead of wrapping
    pub fn saturating_add(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_add(other.0))
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(U256::from(value))
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        TokenAmount(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        TokenAmount(value)
    }
}

impl FromStr for TokenAmount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenAmount::from_dec_str(s)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(BIGINT_TAG, &self.0.to_string())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{MapAccess, Visitor};

        struct TokenAmountVisitor;

        impl<'de> Visitor<'de> for TokenAmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a map with a {} key or a decimal string", BIGINT_TAG)
            }

            // Records written before the wrapper existed stored bare strings
            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                TokenAmount::from_dec_str(value).map_err(E::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(TokenAmount::from(value))
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut value: Option<String> = None;
                while let Some(key) = access.next_key::<String>()? {
                    if key == BIGINT_TAG {
                        value = Some(access.next_value()?);
                    } else {
                        let _: serde::de::IgnoredAny = access.next_value()?;
                    }
                }
                let value = value.ok_or_else(|| serde::de::Error::missing_field(BIGINT_TAG))?;
                TokenAmount::from_dec_str(&value).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(TokenAmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_tagged_wrapper() {
        let amount = TokenAmount::from(100u64);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, r#"{"__@json.bigint__":"100"}"#);
    }

    #[test]
    fn test_max_value_survives_json() {
        let amount = TokenAmount(U256::MAX);
        let json = serde_json::to_string(&amount).unwrap();
        assert!(json.contains(
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        ));

        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_accepts_bare_decimal_string() {
        let amount: TokenAmount = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(amount, TokenAmount::from(42u64));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<TokenAmount>("\"12abc\"").is_err());
        assert!(serde_json::from_str::<TokenAmount>(r#"{"other":"1"}"#).is_err());
        assert!(TokenAmount::from_dec_str("-5").is_err());
    }

    #[test]
    fn test_saturating_add() {
        let max = TokenAmount(U256::MAX);
        assert_eq!(max.saturating_add(TokenAmount::from(1u64)), max);
        assert_eq!(
            TokenAmount::from(2u64).saturating_add(TokenAmount::from(3u64)),
            TokenAmount::from(5u64)
        );
    }
}
