use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    config::{HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD, VOTE_WINDOW},
    hashing::Fingerprint,
    index::FingerprintIndex,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub song_id: String,
    /// Hits for the song inside its best offset window.
    pub votes: usize,
    /// First alignment offset (seconds) of the winning window.
    pub offset: i64,
    pub query_fingerprints: usize,
    /// Query fingerprints whose hash exists in the index.
    pub matched_fingerprints: usize,
    /// `votes` as a percentage of the query fingerprints, capped at 100.
    pub confidence: f64,
}

impl Prediction {
    pub fn quality(&self) -> &'static str {
        get_match_quality(self.confidence)
    }
}

/// Offset-voting matcher over a read-only index.
pub struct Matcher<'a> {
    index: &'a FingerprintIndex,
    vote_window: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a FingerprintIndex) -> Self {
        Self {
            index,
            vote_window: VOTE_WINDOW,
        }
    }

    pub fn with_vote_window(mut self, vote_window: usize) -> Self {
        self.vote_window = vote_window.max(1);
        self
    }

    /// Groups every index hit by alignment offset.
    pub fn offset_histogram(&self, query: &[Fingerprint]) -> (BTreeMap<i64, Vec<&'a str>>, usize) {
        let mut histogram: BTreeMap<i64, Vec<&'a str>> = BTreeMap::new();
        let mut matched = 0;

        for fingerprint in query {
            let hits = self.index.lookup(fingerprint.hash, fingerprint.time_slot);
            if !hits.is_empty() {
                matched += 1;
            }
            for (song_id, offset) in hits {
                histogram.entry(offset).or_default().push(song_id);
            }
        }
        (histogram, matched)
    }

    /// Best song for the query, or `None` when no fingerprint hit the index.
    ///
    /// Offsets are walked in ascending order. An offset whose hit list is at
    /// least as long as the best tally so far opens a window covering it and
    /// the next `vote_window - 1` offset values; songs are tallied inside the
    /// window. The first strictly higher tally wins, and songs tied within a
    /// window resolve to the smallest id.
    pub fn predict(&self, query: &[Fingerprint]) -> Option<Prediction> {
        let (histogram, matched) = self.offset_histogram(query);
        if histogram.is_empty() {
            debug!("no query fingerprint hit the index");
            return None;
        }

        let span = self.vote_window as i64 - 1;
        let mut best: Option<(&str, usize, i64)> = None;

        for (&offset, songs) in &histogram {
            let best_votes = best.map_or(1, |(_, votes, _)| votes);
            if songs.len() < best_votes {
                continue;
            }

            let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
            for (_, window_songs) in histogram.range(offset..=offset.saturating_add(span)) {
                for song in window_songs {
                    *tally.entry(*song).or_default() += 1;
                }
            }

            for (song, votes) in tally {
                if best.is_none_or(|(_, best_votes, _)| votes > best_votes) {
                    best = Some((song, votes, offset));
                }
            }
        }

        let (song_id, votes, offset) = best?;
        let confidence = (votes as f64 / query.len().max(1) as f64 * 100.0).min(100.0);
        debug!(
            "best match {} with {} votes at offset {} ({} offsets, {}/{} hashes hit)",
            song_id,
            votes,
            offset,
            histogram.len(),
            matched,
            query.len()
        );

        Some(Prediction {
            song_id: song_id.to_owned(),
            votes,
            offset,
            query_fingerprints: query.len(),
            matched_fingerprints: matched,
            confidence,
        })
    }
}

pub fn get_match_quality(confidence: f64) -> &'static str {
    if confidence > HIGH_CONFIDENCE_THRESHOLD {
        "High"
    } else if confidence > MEDIUM_CONFIDENCE_THRESHOLD {
        "Medium"
    } else {
        "Low"
    }
}
