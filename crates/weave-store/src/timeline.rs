//! Persistent ordered map keyed by [`Timestamp`].
//!
//! Clones are O(1) and share structure, so a published state can be handed to
//! any number of readers while a writer builds the next one.

use std::fmt;
use std::marker::PhantomData;

use imbl::OrdMap;
use serde::de::{SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use weave_types::Timestamp;

#[derive(Clone, PartialEq)]
pub struct TimelineMap<V: Clone> {
    inner: OrdMap<Timestamp, V>,
}

impl<V: Clone> Default for TimelineMap<V> {
    fn default() -> Self {
        Self {
            inner: OrdMap::new(),
        }
    }
}

impl<V: Clone> TimelineMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, key: &Timestamp) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &Timestamp) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn contains_key(&self, key: &Timestamp) -> bool {
        self.inner.contains_key(key)
    }

    /// A new map with `key` set, leaving `self` untouched.
    pub fn set(&self, key: Timestamp, value: V) -> Self {
        Self {
            inner: self.inner.update(key, value),
        }
    }

    /// A new map without `key`, leaving `self` untouched.
    pub fn delete(&self, key: &Timestamp) -> Self {
        Self {
            inner: self.inner.without(key),
        }
    }

    /// Insert in place; an occupied slot is overwritten and its value returned.
    pub fn insert(&mut self, key: Timestamp, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&mut self, key: &Timestamp) -> Option<V> {
        self.inner.remove(key)
    }

    /// Entries with `lo <= key <= hi`, ascending. Empty when `lo > hi`.
    pub fn range<'a>(
        &'a self,
        lo: &Timestamp,
        hi: &Timestamp,
    ) -> impl DoubleEndedIterator<Item = (&'a Timestamp, &'a V)> + use<'a, V> {
        (lo <= hi)
            .then(|| self.inner.range(lo.clone()..=hi.clone()))
            .into_iter()
            .flatten()
    }

    pub fn min(&self) -> Option<&Timestamp> {
        self.inner.keys().next()
    }

    pub fn max(&self) -> Option<&Timestamp> {
        self.inner.keys().next_back()
    }

    pub fn first(&self) -> Option<(&Timestamp, &V)> {
        self.inner.iter().next()
    }

    pub fn last(&self) -> Option<(&Timestamp, &V)> {
        self.inner.iter().next_back()
    }

    /// Greatest key strictly below `key`.
    pub fn next_lower_key(&self, key: &Timestamp) -> Option<&Timestamp> {
        self.inner.range(..key.clone()).next_back().map(|(k, _)| k)
    }

    /// Least key strictly above `key`.
    pub fn next_higher_key(&self, key: &Timestamp) -> Option<&Timestamp> {
        self.inner
            .range(key.clone()..)
            .find(|(k, _)| *k > key)
            .map(|(k, _)| k)
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Timestamp> {
        self.inner.keys()
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.inner.values()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Timestamp, &V)> {
        self.inner.iter()
    }
}

impl<V: Clone> FromIterator<(Timestamp, V)> for TimelineMap<V> {
    fn from_iter<I: IntoIterator<Item = (Timestamp, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<V: Clone + fmt::Debug> fmt::Debug for TimelineMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.iter()).finish()
    }
}

// Serialized form is a plain ascending list of `[key, value]` pairs.

impl<V: Clone + Serialize> Serialize for TimelineMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.inner.iter())
    }
}

impl<'de, V: Clone + Deserialize<'de>> Deserialize<'de> for TimelineMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor<V>(PhantomData<V>);

        impl<'de, V: Clone + Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
            type Value = TimelineMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of [timestamp, value] pairs")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut map = TimelineMap::new();
                while let Some((key, value)) = seq.next_element::<(Timestamp, V)>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_seq(PairsVisitor(PhantomData))
    }
}
