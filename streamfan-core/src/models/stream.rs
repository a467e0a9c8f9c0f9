use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Shard;

/// A named change feed with its accumulated shard and subscriber state.
///
/// Identity is `name`; everything else is payload that survives
/// reconciliation for as long as the name keeps being reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,

    #[serde(default, with = "shard_list")]
    pub shards: IndexMap<String, Shard>,

    #[serde(default)]
    pub subscribers: IndexSet<String>,
}

impl Stream {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: IndexMap::new(),
            subscribers: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn with_shard(mut self, shard: Shard) -> Self {
        self.shards.insert(shard.id.clone(), shard);
        self
    }

    #[must_use]
    pub fn with_subscriber(mut self, url: impl Into<String>) -> Self {
        self.subscribers.insert(url.into());
        self
    }

    /// Add shards for ids not seen before; known shards keep their progress.
    ///
    /// Returns how many shards were added.
    pub fn merge_shard_ids<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.shards.len();
        for id in ids {
            let id = id.into();
            if !self.shards.contains_key(&id) {
                self.shards.insert(id.clone(), Shard::new(id));
            }
        }
        self.shards.len() - before
    }

    /// Drop a partition the source reported as gone
    pub fn remove_shard(&mut self, shard_id: &str) -> Option<Shard> {
        self.shards.shift_remove(shard_id)
    }

    /// Add subscriber URLs not already known. Never removes any.
    ///
    /// Returns how many subscribers were added.
    pub fn merge_subscribers<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.subscribers.len();
        self.subscribers
            .extend(urls.into_iter().map(Into::into).filter(|url: &String| !url.is_empty()));
        self.subscribers.len() - before
    }

    #[must_use]
    pub fn shard_ids(&self) -> Vec<String> {
        self.shards.keys().cloned().collect()
    }
}

/// Shards persist as a plain list; on load the first entry per id wins.
mod shard_list {
    use super::{Deserialize, Deserializer, IndexMap, Serializer, Shard};
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(
        shards: &IndexMap<String, Shard>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(shards.len()))?;
        for shard in shards.values() {
            seq.serialize_element(shard)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, Shard>, D::Error> {
        let list = Vec::<Shard>::deserialize(deserializer)?;
        let mut shards = IndexMap::with_capacity(list.len());
        for shard in list {
            shards.entry(shard.id.clone()).or_insert(shard);
        }
        Ok(shards)
    }
}

/// The working set of streams, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSet {
    streams: IndexMap<String, Stream>,
}

impl StreamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stream, replacing any stream with the same name
    pub fn insert(&mut self, stream: Stream) -> Option<Stream> {
        self.streams.insert(stream.name.clone(), stream)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Stream> {
        self.streams.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Stream> {
        self.streams.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Stream> {
        self.streams.shift_remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Stream> {
        self.streams.values_mut()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Stream) -> bool) {
        self.streams.retain(|_, stream| keep(stream));
    }
}

impl FromIterator<Stream> for StreamSet {
    /// Later streams with an already-seen name are ignored
    fn from_iter<T: IntoIterator<Item = Stream>>(iter: T) -> Self {
        let mut streams = IndexMap::new();
        for stream in iter {
            streams.entry(stream.name.clone()).or_insert(stream);
        }
        Self { streams }
    }
}

impl IntoIterator for StreamSet {
    type Item = Stream;
    type IntoIter = indexmap::map::IntoValues<String, Stream>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.into_values()
    }
}

impl Serialize for StreamSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.streams.values())
    }
}

impl<'de> Deserialize<'de> for StreamSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Stream>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}
