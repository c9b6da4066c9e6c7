//! Module identity presented to the broker at registration time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of module registering with the broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleType {
    #[default]
    Core,
    Support,
    Ai,
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleType::Core => write!(f, "CORE"),
            ModuleType::Support => write!(f, "SUPPORT"),
            ModuleType::Ai => write!(f, "AI"),
        }
    }
}

impl FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CORE" => Ok(ModuleType::Core),
            "SUPPORT" => Ok(ModuleType::Support),
            "AI" => Ok(ModuleType::Ai),
            other => Err(format!("unknown module type '{}'", other)),
        }
    }
}

/// Static identity record read once when registering with the broker.
///
/// The client does not keep a live reference: topics changed after
/// registration need an explicit subscribe/unsubscribe call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub description: String,
    /// Semantic version string (e.g. "1.2.0")
    pub version: String,
    pub module_type: ModuleType,
    /// URL the broker pushes events to
    pub callback_address: String,
    topics: BTreeSet<String>,
}

impl ModuleDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        module_type: ModuleType,
        callback_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            module_type,
            callback_address: callback_address.into(),
            topics: BTreeSet::new(),
        }
    }

    /// Adds a topic. Returns false if it was already present.
    pub fn add_topic(&mut self, topic: impl Into<String>) -> bool {
        self.topics.insert(topic.into())
    }

    /// Removes a topic. Removing a topic that is not present is a no-op
    /// returning false.
    pub fn remove_topic(&mut self, topic: &str) -> bool {
        self.topics.remove(topic)
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    /// Topics in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module(name={}, description={}, version={}, type={})",
            self.name, self.description, self.version, self.module_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ModuleDescriptor {
        ModuleDescriptor::new(
            "thermostat",
            "Reads temperatures",
            "1.0.0",
            ModuleType::Support,
            "http://127.0.0.1:8080/event",
        )
    }

    #[test]
    fn test_add_topic_is_idempotent() {
        let mut module = descriptor();
        assert!(module.add_topic("/a"));
        assert!(!module.add_topic("/a"));
        assert_eq!(module.topics().collect::<Vec<_>>(), vec!["/a"]);
    }

    #[test]
    fn test_remove_missing_topic_is_noop() {
        let mut module = descriptor();
        module.add_topic("/a");
        assert!(!module.remove_topic("/b"));
        assert!(module.remove_topic("/a"));
        assert!(!module.has_topic("/a"));
    }

    #[test]
    fn test_topics_are_sorted() {
        let mut module = descriptor();
        module.add_topic("/c");
        module.add_topic("/a");
        module.add_topic("/b");
        assert_eq!(module.topics().collect::<Vec<_>>(), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_module_type_wire_names() {
        assert_eq!(serde_json::to_value(ModuleType::Ai).unwrap(), "AI");
        assert_eq!(ModuleType::Support.to_string(), "SUPPORT");
        assert_eq!("core".parse::<ModuleType>().unwrap(), ModuleType::Core);
        assert!("robot".parse::<ModuleType>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            descriptor().to_string(),
            "Module(name=thermostat, description=Reads temperatures, version=1.0.0, type=SUPPORT)"
        );
    }
}
