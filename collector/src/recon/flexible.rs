//! Lenient numbers for fields that swift reports as `None`, as strings or not at all.

use serde::{
    de::{
        self,
        DeserializeOwned,
        Visitor,
    },
    Deserialize,
    Deserializer,
};
use std::fmt;

/// `null` and unparsable strings read as 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct FlexibleU64(pub u64);

/// `null` and unparsable strings read as 0, `"None"` reads as -1.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FlexibleF64(pub f64);

impl<'de> Deserialize<'de> for FlexibleU64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct U64Visitor;

        impl Visitor<'_> for U64Visitor {
            type Value = FlexibleU64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned number, a numeric string or null")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FlexibleU64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexibleU64(v.max(0) as u64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FlexibleU64(v.max(0.0) as u64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(FlexibleU64(v.trim().parse().unwrap_or_default()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexibleU64(0))
            }
        }

        deserializer.deserialize_any(U64Visitor)
    }
}

impl<'de> Deserialize<'de> for FlexibleF64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct F64Visitor;

        impl Visitor<'_> for F64Visitor {
            type Value = FlexibleF64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number, a numeric string, \"None\" or null")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FlexibleF64(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexibleF64(v as f64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FlexibleF64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    "None" => Ok(FlexibleF64(-1.0)),
                    other => Ok(FlexibleF64(other.trim().parse().unwrap_or_default())),
                }
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexibleF64(0.0))
            }
        }

        deserializer.deserialize_any(F64Visitor)
    }
}

/// For records a host reports as a whole `None` when the daemon never ran.
pub(crate) fn none_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(T::default()),
        serde_json::Value::String(s) if s == "None" => Ok(T::default()),
        value => T::deserialize(value).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::decode;

    #[derive(Deserialize, Debug)]
    struct Disk {
        used: FlexibleU64,
        size: FlexibleU64,
        last: FlexibleF64,
    }

    #[test]
    fn accepts_numbers_strings_and_none() {
        let disk: Disk = decode(b"{'used': 12, 'size': '100', 'last': 1577664676.578959}").unwrap();
        assert_eq!(disk.used, FlexibleU64(12));
        assert_eq!(disk.size, FlexibleU64(100));
        assert_eq!(disk.last, FlexibleF64(1577664676.578959));

        let disk: Disk = decode(b"{'used': None, 'size': 'unknown', 'last': None}").unwrap();
        assert_eq!(disk.used, FlexibleU64(0));
        assert_eq!(disk.size, FlexibleU64(0));
        assert_eq!(disk.last, FlexibleF64(-1.0));

        let disk: Disk = serde_json::from_str(r#"{"used": null, "size": -5, "last": null}"#).unwrap();
        assert_eq!(disk.used, FlexibleU64(0));
        assert_eq!(disk.size, FlexibleU64(0));
        assert_eq!(disk.last, FlexibleF64(0.0));
    }

    #[test]
    fn rejects_structures() {
        assert!(decode::<Disk>(b"{'used': [], 'size': 1, 'last': 1}").is_err());
    }

    #[test]
    fn none_record_reads_as_default() {
        #[derive(Deserialize, Debug, Default, PartialEq)]
        struct Stats {
            #[serde(default)]
            attempted: i64,
        }

        #[derive(Deserialize, Debug)]
        struct Host {
            #[serde(default, deserialize_with = "none_as_default")]
            stats: Stats,
        }

        let host: Host = decode(b"{'stats': None}").unwrap();
        assert_eq!(host.stats, Stats::default());
        let host: Host = decode(b"{'stats': {'attempted': 4}}").unwrap();
        assert_eq!(host.stats, Stats { attempted: 4 });
        let host: Host = decode(b"{}").unwrap();
        assert_eq!(host.stats, Stats::default());
    }
}
