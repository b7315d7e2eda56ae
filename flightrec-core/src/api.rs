//! JSON wire types for the control API.
//!
//! Durations and sizes are never sent as raw numbers of nanoseconds; they pass
//! through the [`units`](crate::units) codecs:
//!
//! ```text
//! GET  status  ->  {"enabled":true,"period":"1s","size":"64MB"}
//! POST update  <-  {"period":"2s","size":"128MB"}   (both fields optional)
//!                  {"size":134217728}               (integer bytes also accepted)
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer, Error as _, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigUpdate, StatusView};
use crate::error::ControlError;
use crate::units::{format_duration, format_size, parse_duration, parse_size, UnitError};

/// Response body for the status operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse {
    pub enabled: bool,
    pub period: Duration,
    pub size: usize,
}

/// Request body for the update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub period: Option<Duration>,
    pub size: Option<usize>,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<StatusView> for StatusResponse {
    fn from(status: StatusView) -> Self {
        Self {
            enabled: status.enabled,
            period: status.period,
            size: status.size,
        }
    }
}

impl From<UpdateRequest> for ConfigUpdate {
    fn from(request: UpdateRequest) -> Self {
        Self {
            period: request.period,
            size: request.size,
        }
    }
}

impl From<ConfigUpdate> for UpdateRequest {
    fn from(update: ConfigUpdate) -> Self {
        Self {
            period: update.period,
            size: update.size,
        }
    }
}

impl UpdateRequest {
    /// Decode textual fields, as given on a command line.
    pub fn parse(period: Option<&str>, size: Option<&str>) -> Result<Self, ControlError> {
        Ok(Self {
            period: period.map(parse_duration).transpose()?,
            size: size.map(parse_size).transpose()?,
        })
    }
}

impl ErrorResponse {
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

impl Serialize for StatusResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("StatusResponse", 3)?;
        state.serialize_field("enabled", &self.enabled)?;
        state.serialize_field("period", &format_duration(self.period))?;
        state.serialize_field("size", &format_size(self.size))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for StatusResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            enabled: bool,
            period: String,
            size: SizeValue,
        }

        let wire = Wire::deserialize(deserializer)?;
        Ok(Self {
            enabled: wire.enabled,
            period: parse_duration(&wire.period).map_err(D::Error::custom)?,
            size: wire.size.0,
        })
    }
}

// Sizes are sent as integer bytes so that the request is not subject to the
// truncation of `format_size`.
impl Serialize for UpdateRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.period.is_some() as usize + self.size.is_some() as usize;
        let mut state = serializer.serialize_struct("UpdateRequest", len)?;
        if let Some(period) = self.period {
            state.serialize_field("period", &format_duration(period))?;
        }
        if let Some(size) = self.size {
            state.serialize_field("size", &size)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for UpdateRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default)]
            period: Option<String>,
            #[serde(default)]
            size: Option<SizeValue>,
        }

        let wire = Wire::deserialize(deserializer)?;
        let period = wire
            .period
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(D::Error::custom)?;
        Ok(Self {
            period,
            size: wire.size.map(|s| s.0),
        })
    }
}

/// A byte size given either as a unit string or as integer bytes.
struct SizeValue(usize);

impl<'de> Deserialize<'de> for SizeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SizeVisitor;

        impl<'de> Visitor<'de> for SizeVisitor {
            type Value = SizeValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte count or a memory unit string such as \"64MB\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SizeValue, E> {
                usize::try_from(v)
                    .map(SizeValue)
                    .map_err(|_| E::custom(UnitError::InvalidSize(v.to_string())))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SizeValue, E> {
                usize::try_from(v)
                    .map(SizeValue)
                    .map_err(|_| E::custom(UnitError::InvalidSize(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<SizeValue, E> {
                Err(E::custom(UnitError::InvalidSize(v.to_string())))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SizeValue, E> {
                parse_size(v).map(SizeValue).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}
