//! Lookup of monitor friendly names keyed by hardware-info instance keys.

use std::collections::HashMap;

use crate::HardwareInfoSource;

/// Decodes a friendly name payload.
///
/// The payload is read as UTF-16 up to the first zero code unit, and surrounding
/// whitespace is trimmed. Unpaired surrogates are replaced with U+FFFD.
pub fn decode_friendly_name(raw: &[u16]) -> String {
    let len = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
    String::from_utf16_lossy(&raw[..len]).trim().to_owned()
}

/// An ordered mapping from instance key to friendly name.
///
/// Iteration follows insertion order. Inserting an existing key replaces its
/// name but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index by querying `source` once.
    ///
    /// A failing source produces an empty index.
    pub fn build<S: HardwareInfoSource + ?Sized>(source: &S) -> Self {
        let identities = match source.query_monitor_identities() {
            Ok(identities) => identities,
            Err(e) => {
                log::warn!("Monitor names are unavailable: {e}");
                return Self::new();
            }
        };

        let mut index = Self::new();
        for identity in identities {
            let name = identity
                .raw_name
                .as_deref()
                .map(decode_friendly_name)
                .unwrap_or_default();

            log::debug!("Monitor identity {:?} => {name:?}", identity.instance_key);
            index.insert(identity.instance_key, name);
        }

        index
    }

    /// Inserts a name, replacing the name of an existing key.
    pub fn insert(&mut self, instance_key: String, friendly_name: String) {
        if let Some(&position) = self.positions.get(&instance_key) {
            self.entries[position].1 = friendly_name;
        } else {
            self.positions.insert(instance_key.clone(), self.entries.len());
            self.entries.push((instance_key, friendly_name));
        }
    }

    /// Returns the name stored for exactly `instance_key`.
    pub fn get(&self, instance_key: &str) -> Option<&str> {
        self.positions
            .get(instance_key)
            .map(|&position| self.entries[position].1.as_str())
    }

    /// Iterates `(instance_key, friendly_name)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, name)| (key.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameIndex {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (key, name) in iter {
            index.insert(key.into(), name.into());
        }
        index
    }
}
