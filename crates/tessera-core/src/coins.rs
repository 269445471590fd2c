// Decimal coin amounts
//
// DecCoins is always sorted by denom and never holds a zero or negative
// amount, so two equal balances compare equal regardless of how they were built.

use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;

/// Native staking and fee denomination
pub const NATIVE_DENOM: &str = "tsr";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoinsError {
    #[error("invalid coin expression: {0}")]
    InvalidExpression(String),

    #[error("negative amount for {0}")]
    NegativeAmount(String),

    #[error("insufficient coins for {address}: available {available}, required {required}")]
    Insufficient {
        address: Address,
        available: DecCoins,
        required: DecCoins,
    },
}

/// Shortest exact rendering: integers without a fraction, others without trailing zeros
pub fn canonical(value: &BigDecimal) -> String {
    if value.is_integer() {
        value.with_scale(0).to_string()
    } else {
        value.normalized().to_string()
    }
}

/// Serde adapter storing a decimal as its canonical string in every format
pub mod decimal_serde {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::canonical(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigDecimal::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    #[serde(with = "decimal_serde")]
    pub amount: BigDecimal,
}

impl DecCoin {
    pub fn new(denom: impl Into<String>, amount: impl Into<BigDecimal>) -> Self {
        DecCoin {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", canonical(&self.amount), self.denom)
    }
}

impl FromStr for DecCoin {
    type Err = CoinsError;

    /// Parses `<amount><denom>`, e.g. `1000tsr` or `0.5tsr`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| CoinsError::InvalidExpression(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() || !denom.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoinsError::InvalidExpression(s.to_string()));
        }
        let amount = BigDecimal::from_str(amount).map_err(|_| CoinsError::InvalidExpression(s.to_string()))?;
        if amount < BigDecimal::zero() {
            return Err(CoinsError::NegativeAmount(denom.to_string()));
        }
        Ok(DecCoin::new(denom.to_lowercase(), amount))
    }
}

/// Sorted set of positive coin amounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoins(Vec<DecCoin>);

impl DecCoins {
    pub fn new(coins: impl IntoIterator<Item = DecCoin>) -> Self {
        let mut result = DecCoins::default();
        for coin in coins {
            result.add_coin(coin);
        }
        result
    }

    pub fn single(denom: &str, amount: impl Into<BigDecimal>) -> Self {
        DecCoins::new([DecCoin::new(denom, amount)])
    }

    /// Parses a comma separated list such as `10tsr,5atom`
    pub fn parse(s: &str) -> Result<Self, CoinsError> {
        if s.trim().is_empty() {
            return Ok(DecCoins::default());
        }
        let coins = s
            .split(',')
            .map(DecCoin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DecCoins::new(coins))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecCoin> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amount_of(&self, denom: &str) -> BigDecimal {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount.clone())
            .unwrap_or_else(BigDecimal::zero)
    }

    /// True when every denom in `other` is covered by `self`
    pub fn is_all_gte(&self, other: &DecCoins) -> bool {
        other.0.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    pub fn add(&self, other: &DecCoins) -> DecCoins {
        let mut result = self.clone();
        for coin in &other.0 {
            result.add_coin(coin.clone());
        }
        result
    }

    /// `self - other`, or None if any denom would go negative
    pub fn checked_sub(&self, other: &DecCoins) -> Option<DecCoins> {
        if !self.is_all_gte(other) {
            return None;
        }
        let coins = self.0.iter().map(|c| {
            let remaining = &c.amount - &other.amount_of(&c.denom);
            DecCoin::new(c.denom.clone(), remaining)
        });
        Some(DecCoins::new(coins))
    }

    pub fn mul_dec(&self, factor: &BigDecimal) -> DecCoins {
        DecCoins::new(
            self.0
                .iter()
                .map(|c| DecCoin::new(c.denom.clone(), &c.amount * factor)),
        )
    }

    fn add_coin(&mut self, coin: DecCoin) {
        if coin.amount.is_zero() {
            return;
        }
        match self.0.binary_search_by(|c| c.denom.as_str().cmp(coin.denom.as_str())) {
            Ok(idx) => {
                let sum = &self.0[idx].amount + &coin.amount;
                if sum.is_zero() {
                    self.0.remove(idx);
                } else {
                    self.0[idx].amount = sum;
                }
            }
            Err(idx) => self.0.insert(idx, coin),
        }
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// Fails unless `available` covers `required` for every denom
pub fn has_sufficient_coins(address: &Address, available: &DecCoins, required: &DecCoins) -> Result<(), CoinsError> {
    if available.is_all_gte(required) {
        Ok(())
    } else {
        Err(CoinsError::Insufficient {
            address: address.clone(),
            available: available.clone(),
            required: required.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> DecCoins {
        DecCoins::parse(s).unwrap()
    }

    #[test]
    fn test_parse_sorts_and_merges() {
        let parsed = coins("5tsr,2atom,1tsr");
        assert_eq!(parsed.to_string(), "2atom,6tsr");
        assert!(DecCoins::parse("tsr").is_err());
        assert!(DecCoins::parse("-1tsr").is_err());
    }

    #[test]
    fn test_checked_sub() {
        let balance = coins("10tsr,3atom");
        assert_eq!(balance.checked_sub(&coins("3atom")), Some(coins("10tsr")));
        assert_eq!(balance.checked_sub(&coins("11tsr")), None);
        assert_eq!(balance.checked_sub(&coins("1btc")), None);
    }

    #[test]
    fn test_tenth_of_min_deposit() {
        let min = coins("1000tsr");
        let tenth = min.mul_dec(&BigDecimal::from_str("0.1").unwrap());
        assert_eq!(tenth, coins("100tsr"));
        assert!(coins("100tsr").is_all_gte(&tenth));
        assert!(!coins("99.9tsr").is_all_gte(&tenth));
    }

    #[test]
    fn test_has_sufficient_coins() {
        let addr = Address::from_raw("proposer");
        assert!(has_sufficient_coins(&addr, &coins("5tsr"), &coins("5tsr")).is_ok());
        let err = has_sufficient_coins(&addr, &coins("4tsr"), &coins("5tsr")).unwrap_err();
        assert!(matches!(err, CoinsError::Insufficient { .. }));
    }

    #[test]
    fn test_serde_keeps_precision() {
        let original = coins("0.125tsr");
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#"[{"denom":"tsr","amount":"0.125"}]"#);
        let bytes = bincode::serialize(&original).unwrap();
        let decoded: DecCoins = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    proptest::proptest! {
        #[test]
        fn prop_add_then_sub_is_identity(a in 0u64..1_000_000, b in 0u64..1_000_000, c in 0u64..1_000) {
            let left = DecCoins::new([DecCoin::new("tsr", a), DecCoin::new("atom", c)]);
            let right = DecCoins::single("tsr", b);
            let sum = left.add(&right);
            proptest::prop_assert!(sum.is_all_gte(&left));
            proptest::prop_assert_eq!(sum.checked_sub(&right), Some(left));
        }
    }
}
