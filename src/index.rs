//! Append-only fingerprint index: hash to every (song, offset) it was seen at.

use rustc_hash::FxHashMap;

/// Position of a song name in the index's interning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongKey(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub song: SongKey,
    pub time_offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FingerprintIndex {
    buckets: FxHashMap<u64, Vec<IndexEntry>>,
    songs: Vec<String>,
    song_keys: FxHashMap<String, SongKey>,
    entry_count: usize,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an occurrence. Existing entries, including identical ones,
    /// are never replaced.
    pub fn insert(&mut self, hash: u64, song_id: &str, time_offset: u32) {
        let song = self.intern(song_id);
        self.buckets
            .entry(hash)
            .or_default()
            .push(IndexEntry { song, time_offset });
        self.entry_count += 1;
    }

    /// `(song, stored_offset - query_offset)` for every entry under `hash`.
    /// Unknown hashes yield an empty list.
    pub fn lookup(&self, hash: u64, query_offset: u32) -> Vec<(&str, i64)> {
        self.entries(hash)
            .iter()
            .map(|entry| {
                (
                    self.song_name(entry.song),
                    entry.time_offset as i64 - query_offset as i64,
                )
            })
            .collect()
    }

    pub fn entries(&self, hash: u64) -> &[IndexEntry] {
        self.buckets.get(&hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn song_name(&self, song: SongKey) -> &str {
        &self.songs[song.0 as usize]
    }

    pub fn contains_song(&self, song_id: &str) -> bool {
        self.song_keys.contains_key(song_id)
    }

    pub fn songs(&self) -> impl Iterator<Item = &str> {
        self.songs.iter().map(String::as_str)
    }

    /// Buckets in ascending hash order.
    pub fn buckets(&self) -> Vec<(u64, &[IndexEntry])> {
        let mut buckets: Vec<(u64, &[IndexEntry])> = self
            .buckets
            .iter()
            .map(|(hash, entries)| (*hash, entries.as_slice()))
            .collect();
        buckets.sort_unstable_by_key(|(hash, _)| *hash);
        buckets
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    fn intern(&mut self, song_id: &str) -> SongKey {
        if let Some(key) = self.song_keys.get(song_id) {
            return *key;
        }
        let key = SongKey(self.songs.len() as u32);
        self.songs.push(song_id.to_owned());
        self.song_keys.insert(song_id.to_owned(), key);
        key
    }
}
