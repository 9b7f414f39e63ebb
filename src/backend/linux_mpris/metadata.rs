use std::collections::HashMap;
use std::time::Duration;

use zbus::zvariant::{Array, OwnedValue};

/// Typed view over the MPRIS `Metadata` property map.
///
/// [Read more about the MPRIS2 `Metadata_Map` type.][metadata_map]
///
/// [metadata_map]: https://specifications.freedesktop.org/mpris-spec/latest/Track_List_Interface.html#Mapping:Metadata_Map
#[derive(Debug, Default, Clone)]
pub struct Metadata {
    values: HashMap<String, OwnedValue>,
}

impl Metadata {
    fn get(&self, key: &str) -> Option<&OwnedValue> {
        self.values.get(key)
    }

    /// Based on `mpris:trackid`
    /// > A unique identity for this track within the context of an MPRIS
    /// > object.
    ///
    /// Players serve it either as an object path or as a plain string.
    pub fn track_id(&self) -> Option<String> {
        self.get("mpris:trackid").and_then(|v| {
            v.downcast_ref::<zbus::zvariant::ObjectPath<'_>>()
                .map(|p| p.to_string())
                .or_else(|_| v.downcast_ref::<&str>().map(str::to_string))
                .ok()
        })
    }

    /// Based on `xesam:title`
    /// > The track title.
    pub fn title(&self) -> Option<&str> {
        self.get("xesam:title")
            .and_then(|v| v.downcast_ref::<&str>().ok())
    }

    /// First entry of `xesam:artist`
    /// > The track artist(s).
    pub fn first_artist(&self) -> Option<String> {
        self.get("xesam:artist")
            .and_then(|v| v.downcast_ref::<Array>().ok())
            .and_then(|v| Vec::<String>::try_from(v).ok())
            .and_then(|artists| artists.into_iter().next())
    }

    /// Based on `mpris:length`
    /// > The duration of the track in microseconds.
    pub fn length(&self) -> Option<Duration> {
        self.get("mpris:length")
            .and_then(|v| {
                if let Ok(val) = v.downcast_ref::<u64>() {
                    Some(val)
                } else if let Ok(val) = v.downcast_ref::<i64>() {
                    u64::try_from(val).ok()
                } else {
                    None
                }
            })
            .map(Duration::from_micros)
    }
}

impl From<HashMap<String, OwnedValue>> for Metadata {
    fn from(values: HashMap<String, OwnedValue>) -> Self {
        Metadata { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Value;

    fn owned(value: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    #[test]
    fn reads_title_artist_and_length() {
        let mut values = HashMap::new();
        values.insert("xesam:title".to_string(), owned(Value::from("A")));
        values.insert(
            "xesam:artist".to_string(),
            owned(Value::from(vec!["X", "Y"])),
        );
        values.insert("mpris:length".to_string(), owned(Value::from(180_000_000i64)));

        let metadata = Metadata::from(values);
        assert_eq!(metadata.title(), Some("A"));
        assert_eq!(metadata.first_artist(), Some("X".to_string()));
        assert_eq!(metadata.length(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn missing_keys_are_none() {
        let metadata = Metadata::default();
        assert_eq!(metadata.title(), None);
        assert_eq!(metadata.first_artist(), None);
        assert_eq!(metadata.track_id(), None);
        assert_eq!(metadata.length(), None);
    }
}
