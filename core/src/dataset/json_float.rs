//! Serde helpers for floats that must survive JSON.
//!
//! JSON has no NaN or infinity, and `serde_json` writes them as `null`.
//! Non-finite values are written as the strings `"NaN"`, `"inf"` and
//! `"-inf"` instead; `null` reads back as NaN so older files still load.

use ndarray::ArrayD;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy)]
struct JsonFloat(f64);

impl Serialize for JsonFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if value == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(value)
        }
    }
}

struct JsonFloatVisitor;

impl<'de> Visitor<'de> for JsonFloatVisitor {
    type Value = JsonFloat;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, null, or one of \"NaN\", \"inf\", \"-inf\"")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<JsonFloat, E> {
        Ok(JsonFloat(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<JsonFloat, E> {
        Ok(JsonFloat(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<JsonFloat, E> {
        Ok(JsonFloat(value as f64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<JsonFloat, E> {
        match value {
            "NaN" => Ok(JsonFloat(f64::NAN)),
            "inf" => Ok(JsonFloat(f64::INFINITY)),
            "-inf" => Ok(JsonFloat(f64::NEG_INFINITY)),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonFloat, E> {
        Ok(JsonFloat(f64::NAN))
    }

    fn visit_none<E: de::Error>(self) -> Result<JsonFloat, E> {
        Ok(JsonFloat(f64::NAN))
    }
}

impl<'de> Deserialize<'de> for JsonFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JsonFloatVisitor)
    }
}

pub(crate) mod scalar {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        JsonFloat(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        JsonFloat::deserialize(deserializer).map(|v| v.0)
    }
}

pub(crate) mod list {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&v| JsonFloat(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<JsonFloat>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.0).collect())
    }
}

pub(crate) mod array {
    use super::*;

    pub fn serialize<S: Serializer>(values: &ArrayD<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        values.mapv(JsonFloat).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ArrayD<f64>, D::Error> {
        Ok(ArrayD::<JsonFloat>::deserialize(deserializer)?.mapv(|v| v.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "array")]
        values: ArrayD<f64>,
    }

    #[test]
    fn non_finite_values_are_written_as_strings() {
        let holder = Holder {
            values: ndarray::arr1(&[1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY]).into_dyn(),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert!(json.contains(r#"[1.5,"NaN","inf","-inf"]"#));

        let back: Holder = serde_json::from_str(&json).unwrap();
        let values: Vec<f64> = back.values.iter().copied().collect();
        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan());
        assert_eq!(values[2], f64::INFINITY);
        assert_eq!(values[3], f64::NEG_INFINITY);
    }

    #[test]
    fn null_reads_back_as_nan() {
        let value = scalar::deserialize(&mut serde_json::Deserializer::from_str("null")).unwrap();
        assert!(value.is_nan());
        assert!(scalar::deserialize(&mut serde_json::Deserializer::from_str("\"abc\"")).is_err());
    }
}
