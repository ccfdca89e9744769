use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A flat record returned by an integration's item listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub item_type: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_path_or_name: Option<String>,
}

impl RemoteItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: item_type.into(),
            parent_id: None,
            parent_path_or_name: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_parent_path_or_name(mut self, parent: impl Into<String>) -> Self {
        self.parent_path_or_name = Some(parent.into());
        self
    }

    /// Empty parent ids count as "no parent", the same as a missing one.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|id| !id.is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Opaque credentials payload produced by the OAuth exchange.
///
/// The payload is never inspected beyond its truthiness; it is handed back
/// verbatim to the item listing. Deserializing rejects falsy payloads, the
/// same as [`Credentials::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Credentials(Value);

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value)
            .ok_or_else(|| serde::de::Error::custom("credentials payload is empty"))
    }
}

impl Credentials {
    /// Returns `None` for falsy payloads (null, false, 0, empty string).
    pub fn from_value(value: Value) -> Option<Self> {
        is_truthy(&value).then_some(Self(value))
    }

    /// Parses a response body; non-JSON text is kept as a string payload.
    pub fn from_response_body(body: &str) -> Option<Self> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        let value =
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        Self::from_value(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The parameters handed to the owning context after a successful connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationParams {
    pub credentials: Credentials,
    #[serde(rename = "type")]
    pub integration_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}
