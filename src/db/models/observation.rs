//! Raw network-derived image facts, before DOM correlation.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const UNKNOWN: &str = "unknown";

/// Largest byte count the store can hold. Bigger claims are unresolved.
pub const MAX_OBSERVED_BYTES: u64 = i64::MAX as u64;

/// Byte count reported by the response's content-length header.
///
/// On the wire this is either an integer, the raw header string, or the
/// literal `"unknown"` when the header was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedSize {
    Bytes(u64),
    Unknown,
}

impl ObservedSize {
    /// Parses a content-length header value. Anything that is not a plain
    /// non-negative integer within `MAX_OBSERVED_BYTES` is unresolved.
    pub fn from_header(value: &str) -> Self {
        value
            .trim()
            .parse::<u64>()
            .map(ObservedSize::from_bytes)
            .unwrap_or(ObservedSize::Unknown)
    }

    pub fn from_bytes(bytes: u64) -> Self {
        if bytes <= MAX_OBSERVED_BYTES {
            ObservedSize::Bytes(bytes)
        } else {
            ObservedSize::Unknown
        }
    }

    /// The byte count, if it is known and storable.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            ObservedSize::Bytes(bytes) if *bytes <= MAX_OBSERVED_BYTES => Some(*bytes),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.bytes().is_some()
    }
}

impl fmt::Display for ObservedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedSize::Bytes(bytes) => write!(f, "{bytes}"),
            ObservedSize::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for ObservedSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ObservedSize::Bytes(bytes) => serializer.serialize_u64(*bytes),
            ObservedSize::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de> Deserialize<'de> for ObservedSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawSize {
            Integer(u64),
            Float(f64),
            Text(String),
        }

        match RawSize::deserialize(deserializer)? {
            RawSize::Integer(bytes) => Ok(ObservedSize::from_bytes(bytes)),
            RawSize::Float(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
                if value < MAX_OBSERVED_BYTES as f64 {
                    Ok(ObservedSize::Bytes(value as u64))
                } else {
                    Ok(ObservedSize::Unknown)
                }
            }
            RawSize::Float(value) => Err(de::Error::custom(format!(
                "image size must be a whole byte count, got {value}"
            ))),
            RawSize::Text(text) => Ok(ObservedSize::from_header(&text)),
        }
    }
}

/// A single image response seen by the network observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub url: String,
    pub size: ObservedSize,
    #[serde(rename = "type", default = "unknown_mime")]
    pub mime_type: String,
}

fn unknown_mime() -> String {
    UNKNOWN.to_string()
}

impl Observation {
    pub fn new(url: impl Into<String>, size: ObservedSize, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    pub fn unknown_mime_type() -> &'static str {
        UNKNOWN
    }
}
