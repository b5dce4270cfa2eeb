use serde_json::Value;

/// Closed set of presentation transforms for raw status values. The
/// gateway reports everything as strings; these map the known shapes onto
/// useful types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Serve the raw value unchanged.
    Identity,
    /// Parse the gateway's voltage string, e.g. `"12.6V"`, into volts.
    VoltageStringToFloat,
    /// Compare against a target state string; yields a boolean.
    EqualsTargetState(&'static str),
}

impl Transform {
    /// Applies the transform. `None` means the raw value does not have the
    /// shape this transform expects.
    pub fn apply(&self, raw: &Value) -> Option<Value> {
        match self {
            Transform::Identity => Some(raw.clone()),
            Transform::VoltageStringToFloat => {
                let text = raw.as_str()?;
                let volts: f64 = text.strip_suffix('V').unwrap_or(text).trim().parse().ok()?;
                Some(Value::from(volts))
            }
            Transform::EqualsTargetState(target) => Some(Value::Bool(raw.as_str()? == *target)),
        }
    }
}
