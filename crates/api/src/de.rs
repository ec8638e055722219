//! Custom deserializers.

use keeper_chain::response::parse_decimal_str;
use rust_decimal::Decimal;
use serde::Deserialize;

pub(crate) fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Integer(i64),
        Float(f64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => parse_decimal_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal '{}'", s))),
        StringOrNumber::Integer(i) => Ok(Decimal::from(i)),
        StringOrNumber::Float(f) => Decimal::try_from(f).map_err(serde::de::Error::custom),
    }
}
