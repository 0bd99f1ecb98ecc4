// src/types.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InvalidInput;

/// A point on the map, validated on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidInput> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidInput::OutOfRange("lat"));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(InvalidInput::OutOfRange("lng"));
        }
        Ok(Self { lat, lng })
    }

    /// Pulls `lat`/`lng` out of a JSON object. Strings such as `"5"` are not coerced.
    pub fn from_json(value: &Value) -> Result<Self, InvalidInput> {
        let lat = number_field(value, "lat")?;
        let lng = number_field(value, "lng")?;
        Self::new(lat, lng)
    }
}

fn number_field(value: &Value, key: &'static str) -> Result<f64, InvalidInput> {
    match value.get(key) {
        None | Some(Value::Null) => Err(InvalidInput::Missing(key)),
        Some(v) => v.as_f64().ok_or(InvalidInput::NotNumeric(key)),
    }
}

/// One persisted distress signal.
///
/// Only the coordinates and the submitter identity are typed. Everything else the
/// client sent (message, type, time, ...) rides along in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignalRecord {
    pub fn from_json(value: Value) -> Result<Self, InvalidInput> {
        if !value.is_object() {
            return Err(InvalidInput::NotAnObject);
        }
        let coord = Coordinate::from_json(&value)?;
        let Value::Object(mut fields) = value else {
            return Err(InvalidInput::NotAnObject);
        };
        fields.remove("lat");
        fields.remove("lng");

        let user = match fields.remove("user") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => return Err(InvalidInput::NotText("user")),
        };

        Ok(Self {
            lat: coord.lat,
            lng: coord.lng,
            user,
            extra: fields,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootStash {
    pub id: u32,
    pub lat: f64,
    pub lng: f64,
    pub item: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanReport {
    pub message: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
}

#[derive(Serialize)]
pub struct StatusRes {
    pub status: &'static str,
    pub message: String,
}

impl StatusRes {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}
