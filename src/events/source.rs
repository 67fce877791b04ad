use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Opaque identifier partitioning the event space.
///
/// Transactions and snapshots never span sources; two events with different
/// sources are processed by independent, non-interacting state. Cloning is
/// cheap (shared name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventSource {
    name: Arc<str>,
}

impl EventSource {
    pub const DEFAULT_NAME: &'static str = "DEFAULT";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        &*self.name == Self::DEFAULT_NAME
    }

    /// Render the subscription symbol for this source, e.g. `AAPL#NTV`.
    pub fn decorate(&self, symbol: &str) -> String {
        format!("{}#{}", symbol, self.name)
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for EventSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventSource::new(name))
    }
}
