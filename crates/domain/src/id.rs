//! Typed identifier newtypes backed by configuration strings.
//!
//! Device and adapter identifiers are chosen by whoever writes the
//! configuration and must stay stable across restarts, so they wrap the
//! configured string instead of generating random values.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a configured identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (or only whitespace).
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Device`](crate::device::Device).
    DeviceId
);

define_id!(
    /// Unique identifier for a protocol adapter instance.
    AdapterId
);

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn should_display_inner_string() {
        let id = DeviceId::new("living_room_light");
        assert_eq!(id.to_string(), "living_room_light");
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = AdapterId::new("mqtt_main");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"mqtt_main\"");
        let parsed: AdapterId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_report_blank_when_only_whitespace() {
        assert!(DeviceId::new("  ").is_blank());
        assert!(!DeviceId::new("a").is_blank());
    }

    #[test]
    fn should_lookup_map_by_str_when_keyed_by_id() {
        let mut map = HashMap::new();
        map.insert(DeviceId::from("lamp"), 1);
        assert_eq!(map.get("lamp"), Some(&1));
    }
}
