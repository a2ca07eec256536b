//! Response validation.

use serde_json::Value;

/// A payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            message: message.into(),
        }
    }
}

/// Validates response payloads of a resource.
///
/// Failures are reported but never reject the payload.
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &Value) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        self(payload)
    }
}

/// Checks that the payload (or every element of an array payload) is an
/// object carrying the given fields.
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequiredFields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn check_object(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::new(format!("{} is not an object", path)));
        };

        match self.fields.iter().find(|f| !object.contains_key(f.as_str())) {
            Some(missing) => Err(ValidationError::new(format!(
                "{} is missing field '{}'",
                path, missing
            ))),
            None => Ok(()),
        }
    }
}

impl Validator for RequiredFields {
    fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        match payload {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| self.check_object(item, &format!("item {}", i))),
            other => self.check_object(other, "payload"),
        }
    }
}
