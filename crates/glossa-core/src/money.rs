//! Fixed-point token amounts.
//!
//! The escrow token carries a configurable number of decimals and amounts
//! travel as integer minor units (u128, well beyond any plausible balance).
//! Rendering follows the convention wallets use: trim trailing fractional
//! zeros but always keep at least one digit after the point, so a settled
//! whole amount reads "1.0" rather than "1" or "1.000000".

/// Render `amount` minor units as a decimal string with `decimals` places.
///
/// With `decimals == 0` the amount is already in whole units and is printed
/// as a plain integer.
pub fn format_minor_units(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = amount.to_string();
    let decimals = decimals as usize;
    let (whole, frac) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{frac}")
    }
}

/// Parse a decimal minor-unit amount that may arrive as a JSON number or a
/// decimal string. Ledger backends serialize 256-bit quantities as strings;
/// hand-written clients tend to send plain integers.
pub fn parse_minor_units(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Serde adapter for `u128` minor-unit fields: emits a decimal string,
/// accepts either a string or an integer. A hand-rolled visitor rather than
/// an untagged enum: the latter buffers through serde's content machinery,
/// which cannot represent `u128` and also intercepts the values these fields
/// see inside `#[serde(flatten)]` structs. Amounts beyond `u64::MAX` must
/// arrive as strings, which is what ledger backends emit anyway.
pub mod amount {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    struct MinorUnits;

    impl de::Visitor<'_> for MinorUnits {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a minor-unit amount as an integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<u128, E> {
            super::parse_minor_units(s)
                .ok_or_else(|| E::custom(format!("invalid amount {s:?}")))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MinorUnits)
    }
}

/// Like [`amount`] but for optional fields; null and empty strings read as
/// absent.
pub mod amount_opt {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    struct MaybeMinorUnits;

    impl de::Visitor<'_> for MaybeMinorUnits {
        type Value = Option<u128>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a minor-unit amount, a decimal string, or null")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as u128))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            if s.trim().is_empty() {
                return Ok(None);
            }
            super::parse_minor_units(s)
                .map(Some)
                .ok_or_else(|| E::custom(format!("invalid amount {s:?}")))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MaybeMinorUnits)
    }
}
