use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Key of the event title.
pub const NAME: &str = "name";
/// Key of the start date.
pub const START_DATE: &str = "start_date";
/// Key of the venue.
pub const LOCATION: &str = "location";
/// Key of the source URL.
pub const URL: &str = "url";
/// Key of the free-form description.
pub const DESCRIPTION: &str = "description";

/// Event discovered by the event finder agent.
///
/// The payload is the caller's JSON object, kept exactly as supplied so a
/// cached entry hands back what was stored. Only `name`, `start_date`,
/// `location` and `url` identify an event; they are read leniently: a missing
/// key or `null` reads as empty, strings as-is, and any other JSON value as
/// its compact text (`20250701` reads as `"20250701"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    /// Build an event from its three required identifying fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        start_date: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::default()
            .with_field(NAME, Value::String(name.into()))
            .with_field(START_DATE, Value::String(start_date.into()))
            .with_field(LOCATION, Value::String(location.into()))
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with_field(DESCRIPTION, Value::String(description.into()))
    }

    /// Set the source URL.
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.with_field(URL, Value::String(url.into()))
    }

    /// Set an arbitrary field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Event title as used for fingerprinting.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        self.identity(NAME)
    }

    /// Start date as used for fingerprinting.
    #[must_use]
    pub fn start_date(&self) -> Cow<'_, str> {
        self.identity(START_DATE)
    }

    /// Venue as used for fingerprinting.
    #[must_use]
    pub fn location(&self) -> Cow<'_, str> {
        self.identity(LOCATION)
    }

    /// Source URL as used for fingerprinting; empty when absent or `null`.
    #[must_use]
    pub fn url(&self) -> Cow<'_, str> {
        self.identity(URL)
    }

    /// Raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn identity(&self, key: &str) -> Cow<'_, str> {
        match self.0.get(key) {
            None | Some(Value::Null) => Cow::Borrowed(""),
            Some(Value::String(text)) => Cow::Borrowed(text),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
