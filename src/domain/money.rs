use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimal places kept for every persisted monetary amount.
pub const MONEY_SCALE: i64 = 2;

/// Round to two decimal places, halves away from zero (10.005 -> 10.01,
/// -10.005 -> -10.01).
pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

/// Parse a JSON number into a decimal through its shortest textual form, so
/// `3.995` stays `3.995` instead of the nearest binary fraction.
pub fn decimal_from_number(number: &serde_json::Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    fn into_decimal(self) -> Result<BigDecimal, String> {
        match self {
            RawAmount::Number(n) => {
                decimal_from_number(&n).ok_or_else(|| format!("'{n}' is not a decimal amount"))
            }
            RawAmount::Text(s) => BigDecimal::from_str(s.trim())
                .map_err(|e| format!("'{s}' is not a decimal amount: {e}")),
        }
    }
}

/// Inverse of [`decimal_from_number`] for amounts within `f64` precision.
pub fn decimal_to_number(value: &BigDecimal) -> Option<serde_json::Number> {
    value.to_f64().and_then(serde_json::Number::from_f64)
}

/// Amounts are stored in documents as JSON numbers and accepted from clients
/// either as numbers or as decimal strings.
pub mod amount {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        let number = decimal_to_number(value)
            .ok_or_else(|| S::Error::custom(format!("amount {value} is not representable")))?;
        number.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        RawAmount::deserialize(deserializer)?
            .into_decimal()
            .map_err(D::Error::custom)
    }
}

pub mod option_amount {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<BigDecimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::amount::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigDecimal>, D::Error> {
        Option::<RawAmount>::deserialize(deserializer)?
            .map(RawAmount::into_decimal)
            .transpose()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn rounds_halves_away_from_zero() {
        assert_eq!(round2(&dec("0.005")), dec("0.01"));
        assert_eq!(round2(&dec("-0.005")), dec("-0.01"));
        assert_eq!(round2(&dec("10.125")), dec("10.13"));
        assert_eq!(round2(&dec("10.115")), dec("10.12"));
        assert_eq!(round2(&dec("10.005")), dec("10.01"));
        assert_eq!(round2(&dec("-10.005")), dec("-10.01"));
        assert_eq!(round2(&dec("3.995")), dec("4.00"));
    }

    #[test]
    fn round2_is_idempotent() {
        for raw in ["0.005", "-0.005", "10.125", "10.115", "3.14159", "-2.499", "7"] {
            let once = round2(&dec(raw));
            assert_eq!(round2(&once), once, "round2 not idempotent for {raw}");
        }
    }

    #[test]
    fn keeps_two_decimal_scale() {
        assert_eq!(round2(&dec("5")).to_string(), "5.00");
    }

    #[derive(Serialize, Deserialize)]
    struct Priced {
        #[serde(with = "amount")]
        price: BigDecimal,
        #[serde(default, with = "option_amount")]
        discount: Option<BigDecimal>,
    }

    #[test]
    fn accepts_numbers_and_strings() {
        let from_number: Priced = serde_json::from_str(r#"{"price": 3.995}"#).expect("number");
        assert_eq!(from_number.price, dec("3.995"));
        assert!(from_number.discount.is_none());

        let from_text: Priced =
            serde_json::from_str(r#"{"price": "10.115", "discount": "1.5"}"#).expect("text");
        assert_eq!(from_text.price, dec("10.115"));
        assert_eq!(from_text.discount, Some(dec("1.5")));
    }

    #[test]
    fn rejects_non_decimal_text() {
        let parsed = serde_json::from_str::<Priced>(r#"{"price": "ten"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn stored_amount_reads_back_exactly() {
        let stored = serde_json::to_value(Priced {
            price: dec("8.99"),
            discount: None,
        })
        .expect("serialize");
        let back: Priced = serde_json::from_value(stored).expect("deserialize");
        assert_eq!(back.price, dec("8.99"));
    }
}
