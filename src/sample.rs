use crate::error::{AppError, MappingError};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    F64(f64),
    I64(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(f) => Some(*f),
            FieldValue::I64(i) => Some(*i as f64),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(i) => Some(*i),
            FieldValue::F64(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            FieldValue::F64(f) => f.to_string(),
            FieldValue::I64(i) => i.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Text(t) => t.clone(),
        }
    }
}

/// Latest telemetry of one device as a flat field map.
///
/// Built once from the API payload: top-level scalars are kept, nulls and
/// nested values are dropped, so an absent key is the only "missing" case.
/// Keys are stored in snake_case whatever casing the payload uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSample {
    fields: BTreeMap<String, FieldValue>,
}

impl RemoteSample {
    pub fn from_json(json: &Value) -> Result<Self, AppError> {
        let obj = json
            .as_object()
            .ok_or_else(|| AppError::Decode("telemetry payload is not a JSON object".into()))?;
        let fields = obj
            .iter()
            .filter_map(|(k, v)| cast_value(v).map(|fv| (snake_case(k), fv)))
            .collect();
        Ok(Self { fields })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Result<&FieldValue, MappingError> {
        self.fields
            .get(key)
            .ok_or_else(|| MappingError::MissingField(key.to_string()))
    }

    pub fn number(&self, key: &str) -> Result<f64, MappingError> {
        self.get(key)?.as_f64().ok_or_else(|| MappingError::WrongType {
            field: key.to_string(),
            expected: "numeric",
        })
    }

    pub fn integer(&self, key: &str) -> Result<i64, MappingError> {
        self.get(key)?.as_i64().ok_or_else(|| MappingError::WrongType {
            field: key.to_string(),
            expected: "an integer",
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for RemoteSample {
    fn from_iter<T: IntoIterator<Item = (K, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// `tRoom` -> `t_room`, `COP` -> `cop`; snake_case keys pass through.
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn cast_value(v: &Value) -> Option<FieldValue> {
    match v {
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::I64)
            .or_else(|| n.as_f64().map(FieldValue::F64)),
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_scalars() {
        let sample = RemoteSample::from_json(&json!({
            "t_room": 21.3,
            "rpm": 3000,
            "control_bridge_status_decoded_gas_boiler": true,
            "heatPumpId": "abc",
            "t_air_in": null,
            "nested": {"a": 1}
        }))
        .unwrap();

        assert_eq!(sample.len(), 4);
        assert_eq!(sample.number("t_room").unwrap(), 21.3);
        assert_eq!(sample.get("rpm").unwrap(), &FieldValue::I64(3000));
        assert_eq!(
            sample.integer("control_bridge_status_decoded_gas_boiler").unwrap(),
            1
        );
        assert_eq!(
            sample.get("t_air_in"),
            Err(MappingError::MissingField("t_air_in".into()))
        );
        assert!(sample.get("nested").is_err());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            RemoteSample::from_json(&json!([1, 2, 3])),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn test_camel_case_keys_normalized() {
        let sample = RemoteSample::from_json(&json!({
            "heatPumpId": "abc",
            "tRoom": 21.3,
            "cmMassPowerIn": 1.0,
            "controlBridgeStatusDecodedGasBoiler": false,
            "t_water_in": 30.5
        }))
        .unwrap();

        assert_eq!(sample.number("t_room").unwrap(), 21.3);
        assert_eq!(sample.number("cm_mass_power_in").unwrap(), 1.0);
        assert_eq!(
            sample.integer("control_bridge_status_decoded_gas_boiler").unwrap(),
            0
        );
        assert_eq!(sample.number("t_water_in").unwrap(), 30.5);
        assert!(sample.get("heat_pump_id").is_ok());
    }

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(snake_case("tRoomTarget"), "t_room_target");
        assert_eq!(snake_case("t_room"), "t_room");
        assert_eq!(snake_case("COP"), "cop");
        assert_eq!(snake_case("rpm"), "rpm");
    }

    #[test]
    fn test_text_is_not_numeric() {
        let sample: RemoteSample = [("state", FieldValue::Text("seventy".into()))]
            .into_iter()
            .collect();
        assert!(matches!(
            sample.number("state"),
            Err(MappingError::WrongType { .. })
        ));
    }

    #[test]
    fn test_integer_from_whole_float() {
        let sample: RemoteSample = [("state", FieldValue::F64(70.0)), ("x", FieldValue::F64(1.5))]
            .into_iter()
            .collect();
        assert_eq!(sample.integer("state").unwrap(), 70);
        assert!(sample.integer("x").is_err());
    }
}
