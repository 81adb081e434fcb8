use std::cmp::Ordering;

use tracing::debug;

use crate::peaks::{Constellation, ConstellationPoint};

/// One hash per time slot. `time_slot` counts coarse slots of roughly one
/// second from the start of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hash: u64,
    pub time_slot: u32,
}

/// The strongest distinct bins of one time slot, at most `K` of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSet {
    points: Vec<ConstellationPoint>,
}

impl PeakSet {
    pub fn points(&self) -> &[ConstellationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bins(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.iter().map(|p| p.bin)
    }
}

/// `floor(frames / duration)`, never below one so slot stepping always
/// advances.
pub fn frames_per_second(total_frames: usize, duration_secs: f64) -> usize {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return 1;
    }
    ((total_frames as f64 / duration_secs).floor() as usize).max(1)
}

/// Picks up to `max_points` points by descending magnitude, skipping any
/// bin already taken, then orders them by bin so hashing sees a fixed
/// sequence regardless of how the input was ordered.
pub fn extract_peak_set<'a, I>(points: I, max_points: usize) -> PeakSet
where
    I: IntoIterator<Item = &'a ConstellationPoint>,
{
    let mut candidates: Vec<&ConstellationPoint> = points.into_iter().collect();
    candidates.sort_by(|a, b| by_strength(a, b));

    let mut kept: Vec<ConstellationPoint> = Vec::with_capacity(max_points);
    for point in candidates {
        if kept.len() == max_points {
            break;
        }
        if kept.iter().all(|k| k.bin != point.bin) {
            kept.push(*point);
        }
    }

    kept.sort_by(|a, b| a.bin.cmp(&b.bin).then(a.frame.cmp(&b.frame)));
    PeakSet { points: kept }
}

// Strongest first; equal magnitudes fall back to lower bin, then earlier frame.
fn by_strength(a: &ConstellationPoint, b: &ConstellationPoint) -> Ordering {
    b.magnitude
        .total_cmp(&a.magnitude)
        .then(a.bin.cmp(&b.bin))
        .then(a.frame.cmp(&b.frame))
}

/// Sum of the mixed bin indices, visited in ascending bin order.
pub fn hash_peak_set(peak_set: &PeakSet) -> u64 {
    debug_assert!(
        peak_set
            .points
            .windows(2)
            .all(|pair| pair[0].bin < pair[1].bin),
        "peak set must hold strictly ascending, unique bins"
    );

    peak_set
        .bins()
        .fold(0u64, |hash, bin| hash.wrapping_add(mix(bin as u64)))
}

// splitmix64 finalizer
fn mix(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Peak sets for every slot, stepping `frames_per_second` frames at a time.
/// Slots without any point are left out.
pub fn slot_peak_sets(
    constellation: &Constellation,
    frames_per_second: usize,
    max_points: usize,
) -> Vec<(u32, PeakSet)> {
    let stride = frames_per_second.max(1);

    (0..constellation.frame_count())
        .step_by(stride)
        .enumerate()
        .filter_map(|(slot, start)| {
            let peak_set = extract_peak_set(constellation.range(start, start + stride), max_points);
            (!peak_set.is_empty()).then_some((slot as u32, peak_set))
        })
        .collect()
}

pub fn generate_fingerprints(
    constellation: &Constellation,
    frames_per_second: usize,
    max_points: usize,
) -> Vec<Fingerprint> {
    let fingerprints: Vec<Fingerprint> =
        slot_peak_sets(constellation, frames_per_second, max_points)
            .into_iter()
            .map(|(time_slot, peak_set)| Fingerprint {
                hash: hash_peak_set(&peak_set),
                time_slot,
            })
            .collect();

    debug!(
        "generated {} fingerprints from {} frames ({} frames per slot)",
        fingerprints.len(),
        constellation.frame_count(),
        frames_per_second
    );
    fingerprints
}
