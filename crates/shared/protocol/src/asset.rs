//! Fixed-point asset amounts and their tickers.

use crate::error::ProtocolError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Decimal places carried by every amount.
pub const ASSET_DECIMALS: u32 = 6;
/// Smallest representable unit per whole coin.
pub const SATOSHIS_PER_COIN: i64 = 1_000_000;
/// Hard cap on any single amount: the total supply in satoshis.
pub const MAX_SHARE_SUPPLY: i64 = 500_000_000 * SATOSHIS_PER_COIN;

const MAX_SYMBOL_LENGTH: usize = 7;

/// The native currency.
pub const SPHTX_SYMBOL: AssetSymbol = AssetSymbol::from_raw(*b"SPHTX\0\0\0");
/// Vesting shares backing witness participation.
pub const VESTS_SYMBOL: AssetSymbol = AssetSymbol::from_raw(*b"VESTS\0\0\0");

/// An inline uppercase ticker of one to seven characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetSymbol {
    raw: [u8; 8],
}

impl AssetSymbol {
    /// Builds a symbol from a nul-padded byte array. Used for constants; the
    /// bytes are not re-validated.
    #[must_use]
    pub const fn from_raw(raw: [u8; 8]) -> Self {
        Self { raw }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        let end = self.raw.iter().position(|&b| b == 0).unwrap_or(self.raw.len());
        // Construction only admits ASCII, so this cannot fail.
        std::str::from_utf8(&self.raw[..end]).unwrap_or("")
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetSymbol({})", self.as_str())
    }
}

impl FromStr for AssetSymbol {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > MAX_SYMBOL_LENGTH {
            return Err(ProtocolError::InvalidAsset {
                message: format!("Symbol '{s}' must be 1..={MAX_SYMBOL_LENGTH} characters").into(),
                context: None,
            });
        }
        let starts_with_letter = s.as_bytes()[0].is_ascii_uppercase();
        let all_valid = s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if !starts_with_letter || !all_valid {
            return Err(ProtocolError::InvalidAsset {
                message: format!("Symbol '{s}' must be uppercase A-Z0-9 starting with a letter")
                    .into(),
                context: None,
            });
        }

        let mut raw = [0u8; 8];
        raw[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self { raw })
    }
}

impl Serialize for AssetSymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetSymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A fixed-point amount of some asset.
///
/// Amounts are stored in satoshis (10^-6 coins). The canonical string form is
/// `"<whole>.<6 decimals> <SYMBOL>"`, e.g. `"1.000000 SPHTX"`, which is also
/// the human-readable serialization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asset {
    pub amount: i64,
    pub symbol: AssetSymbol,
}

impl Asset {
    #[must_use]
    pub const fn new(amount: i64, symbol: AssetSymbol) -> Self {
        Self { amount, symbol }
    }

    /// Convenience constructor for whole coins of the native currency.
    #[must_use]
    pub const fn sphtx(coins: i64) -> Self {
        Self::new(coins * SATOSHIS_PER_COIN, SPHTX_SYMBOL)
    }

    #[must_use]
    pub const fn vests(amount: i64) -> Self {
        Self::new(amount, VESTS_SYMBOL)
    }

    /// Structural validation: non-negative and within the supply cap.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAsset`] when out of range.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.amount < 0 {
            return Err(ProtocolError::InvalidAsset {
                message: format!("Amount may not be negative: {self}").into(),
                context: None,
            });
        }
        if self.amount > MAX_SHARE_SUPPLY {
            return Err(ProtocolError::InvalidAsset {
                message: format!("Amount exceeds the supply cap: {self}").into(),
                context: None,
            });
        }
        Ok(())
    }

    /// Checked addition of two amounts of the same symbol.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Arithmetic`] on symbol mismatch or overflow.
    pub fn checked_add(&self, other: &Self) -> Result<Self, ProtocolError> {
        self.require_same_symbol(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or_else(|| {
            ProtocolError::Arithmetic {
                message: format!("{self} + {other} overflows").into(),
                context: None,
            }
        })?;
        Ok(Self::new(amount, self.symbol))
    }

    /// Checked subtraction of two amounts of the same symbol.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Arithmetic`] on symbol mismatch or overflow.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, ProtocolError> {
        self.require_same_symbol(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or_else(|| {
            ProtocolError::Arithmetic {
                message: format!("{self} - {other} overflows").into(),
                context: None,
            }
        })?;
        Ok(Self::new(amount, self.symbol))
    }

    fn require_same_symbol(&self, other: &Self) -> Result<(), ProtocolError> {
        if self.symbol == other.symbol {
            Ok(())
        } else {
            Err(ProtocolError::Arithmetic {
                message: format!("Symbol mismatch: {} vs {}", self.symbol, other.symbol).into(),
                context: None,
            })
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.amount < 0;
        let magnitude = self.amount.unsigned_abs();
        let whole = magnitude / SATOSHIS_PER_COIN.unsigned_abs();
        let fract = magnitude % SATOSHIS_PER_COIN.unsigned_abs();
        let sign = if negative { "-" } else { "" };
        write!(f, "{sign}{whole}.{fract:06} {}", self.symbol)
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({self})")
    }
}

impl FromStr for Asset {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: String| ProtocolError::InvalidAsset {
            message: detail.into(),
            context: None,
        };

        let trimmed = s.trim();
        let (number, symbol) = trimmed
            .split_once(' ')
            .ok_or_else(|| invalid(format!("'{trimmed}' is missing the asset symbol")))?;

        let symbol: AssetSymbol = symbol.trim().parse()?;

        if number.starts_with('-') {
            return Err(invalid(format!("'{trimmed}' may not be negative")));
        }

        let (whole, fract) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };

        if fract.len() > ASSET_DECIMALS as usize {
            return Err(invalid(format!(
                "'{trimmed}' has more than {ASSET_DECIMALS} decimal places"
            )));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|e| invalid(format!("'{trimmed}' has a malformed whole part: {e}")))?;

        let mut fract_value: i64 = 0;
        if !fract.is_empty() {
            fract_value = fract
                .parse()
                .map_err(|e| invalid(format!("'{trimmed}' has a malformed fraction: {e}")))?;
            for _ in 0..(ASSET_DECIMALS as usize - fract.len()) {
                fract_value *= 10;
            }
        }

        let amount = whole
            .checked_mul(SATOSHIS_PER_COIN)
            .and_then(|v| v.checked_add(fract_value))
            .ok_or_else(|| invalid(format!("'{trimmed}' exceeds the representable range")))?;

        if amount > MAX_SHARE_SUPPLY {
            return Err(invalid(format!("'{trimmed}' exceeds the supply cap")));
        }

        Ok(Self::new(amount, symbol))
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            (self.amount, self.symbol.raw).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(de::Error::custom)
        } else {
            let (amount, raw) = <(i64, [u8; 8])>::deserialize(deserializer)?;
            Ok(Self { amount, symbol: AssetSymbol::from_raw(raw) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_round_trips() {
        for (text, satoshis) in [
            ("1.000000 SPHTX", 1_000_000),
            ("0.000001 SPHTX", 1),
            ("7.005000 SPHTX", 7_005_000),
            ("0.000000 SPHTX", 0),
        ] {
            let asset: Asset = text.parse().unwrap();
            assert_eq!(asset.amount, satoshis);
            assert_eq!(asset.symbol, SPHTX_SYMBOL);
            assert_eq!(asset.to_string(), text);
        }
    }

    #[test]
    fn short_fractions_are_scaled() {
        let asset: Asset = "1.5 SPHTX".parse().unwrap();
        assert_eq!(asset.amount, 1_500_000);

        let asset: Asset = "3 VESTS".parse().unwrap();
        assert_eq!(asset.amount, 3_000_000);
        assert_eq!(asset.symbol, VESTS_SYMBOL);
    }

    #[test]
    fn malformed_strings_are_rejected() {
        for text in [
            "1.000000",
            "1.0000000 SPHTX",
            "-1.000000 SPHTX",
            "abc SPHTX",
            "1.000000 sphtx",
            "1.000000 TOOLONGSYM",
        ] {
            assert!(text.parse::<Asset>().is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn checked_math_guards_symbols_and_overflow() {
        let a = Asset::sphtx(1);
        let b = Asset::sphtx(2);
        assert_eq!(a.checked_add(&b).unwrap().amount, 3 * SATOSHIS_PER_COIN);
        assert_eq!(b.checked_sub(&a).unwrap().amount, SATOSHIS_PER_COIN);

        let v = Asset::vests(5);
        assert!(a.checked_add(&v).is_err());

        let max = Asset::new(i64::MAX, SPHTX_SYMBOL);
        assert!(max.checked_add(&a).is_err());
    }

    #[test]
    fn validation_rejects_out_of_range() {
        assert!(Asset::new(-1, SPHTX_SYMBOL).validate().is_err());
        assert!(Asset::new(MAX_SHARE_SUPPLY + 1, SPHTX_SYMBOL).validate().is_err());
        assert!(Asset::sphtx(10).validate().is_ok());
    }
}
