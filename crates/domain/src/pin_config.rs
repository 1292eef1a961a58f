//! The persisted configuration snapshot.
//!
//! Devices and routines are stored as JSON objects keyed by name. Key order
//! is registration order and survives a load/save cycle.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::device::Device;
use crate::routine::Routine;

/// A record whose identity is the key it is stored under.
pub trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

impl Named for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Named for Routine {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// Insertion-ordered table of named records.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable<T> {
    entries: Vec<T>,
}

impl<T> Default for NamedTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Named> NamedTable<T> {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.name() == name)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    /// Insert or replace by name, keeping the position of a replaced entry.
    ///
    /// Returns the entry that was replaced.
    pub fn upsert(&mut self, entry: T) -> Option<T> {
        match self.position(entry.name()) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx], entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let idx = self.position(name)?;
        Some(self.entries.remove(idx))
    }

    pub(crate) fn replace_at(&mut self, idx: usize, entry: T) -> T {
        std::mem::replace(&mut self.entries[idx], entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Named::name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Named> FromIterator<T> for NamedTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::default();
        for entry in iter {
            table.upsert(entry);
        }
        table
    }
}

impl<T: Named + Serialize> Serialize for NamedTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.name(), entry)?;
        }
        map.end()
    }
}

struct TableVisitor<T>(PhantomData<T>);

impl<'de, T: Named + Deserialize<'de>> Visitor<'de> for TableVisitor<T> {
    type Value = NamedTable<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object keyed by name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = NamedTable::default();
        while let Some((name, mut entry)) = access.next_entry::<String, T>()? {
            entry.set_name(name);
            table.upsert(entry);
        }
        Ok(table)
    }
}

impl<'de, T: Named + Deserialize<'de>> Deserialize<'de> for NamedTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}

/// Everything pinhub keeps between invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinConfig {
    #[serde(default)]
    pub devices: NamedTable<Device>,
    #[serde(default)]
    pub routines: NamedTable<Routine>,
}
