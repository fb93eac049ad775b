//! Request payload parsing and field validation

use serde_json::{Map, Value};

use super::error::{ActionError, ActionResult};

/// JSON object sent as a request body
///
/// A missing, malformed or non-object body behaves like `{}`, so such
/// requests fail on their first required field.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Required `hostname` field
    pub fn hostname(&self) -> ActionResult<&str> {
        self.required_str("hostname")
    }

    /// Required `content` field, returned exactly as sent
    pub fn content(&self) -> ActionResult<&str> {
        self.required_str("content")
    }

    pub fn required_str(&self, field: &'static str) -> ActionResult<&str> {
        match self.fields.get(field) {
            None => Err(ActionError::MissingField(field)),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ActionError::InvalidArgument(format!(
                "{} must be a string",
                field
            ))),
        }
    }

    /// Optional positive integer; `null` counts as absent
    pub fn optional_positive_int(&self, field: &'static str) -> ActionResult<Option<i64>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse_positive_int(value, field).map(Some),
        }
    }

    /// Required positive integer
    pub fn required_positive_int(&self, field: &'static str) -> ActionResult<i64> {
        self.optional_positive_int(field)?
            .ok_or(ActionError::MissingField(field))
    }
}

/// Accepts JSON integers, integral floats and decimal strings
fn parse_positive_int(value: &Value, field: &str) -> ActionResult<i64> {
    let not_an_integer = || ActionError::InvalidArgument(format!("{} must be an integer", field));

    let number = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    f as i64
                }
                _ => return Err(not_an_integer()),
            },
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_an_integer())?,
        _ => return Err(not_an_integer()),
    };

    if number <= 0 {
        return Err(ActionError::InvalidArgument(format!(
            "{} must be positive",
            field
        )));
    }

    Ok(number)
}
