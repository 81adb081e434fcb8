//! Constellation points: candidate spectral peaks collected per frame.

use crate::config::FREQUENCY_SKEW;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstellationPoint {
    pub magnitude: f32,
    pub bin: u32,
    /// Frame the point was observed in, counted from the clip start.
    pub frame: u32,
}

/// Every candidate point of a clip, grouped by the frame it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constellation {
    frames: Vec<Vec<ConstellationPoint>>,
}

impl Constellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the points of the next frame.
    pub fn push_frame(&mut self, spectrum: &[f32], min_magnitude: f32) {
        let frame = self.frames.len() as u32;
        self.frames
            .push(extract_constellation_points(spectrum, frame, min_magnitude));
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> &[ConstellationPoint] {
        self.frames.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Points of frames `start..end`, clamped to the clip.
    pub fn range(&self, start: usize, end: usize) -> impl Iterator<Item = &ConstellationPoint> {
        let end = end.min(self.frames.len());
        let start = start.min(end);
        self.frames[start..end].iter().flatten()
    }

    pub fn point_count(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }
}

/// One point per canonical bin `1..=N/2` whose magnitude clears
/// `min_magnitude`. The DC bin and the mirrored upper half never qualify.
pub fn extract_constellation_points(
    spectrum: &[f32],
    frame: u32,
    min_magnitude: f32,
) -> Vec<ConstellationPoint> {
    let last_bin = (spectrum.len() / 2).min(spectrum.len().saturating_sub(1));

    (1..=last_bin)
        .filter(|&bin| spectrum[bin] > min_magnitude)
        .map(|bin| ConstellationPoint {
            magnitude: spectrum[bin],
            bin: bin as u32,
            frame,
        })
        .collect()
}

/// Maps a display row (0 at the top) to a spectrum bin on a log-like scale so
/// low frequencies take up more rows.
pub fn skewed_bin(row: u32, rows: u32, fft_size: usize) -> usize {
    let half = fft_size / 2;
    if rows == 0 || row == 0 {
        return half;
    }
    let proportion = row as f32 / rows as f32;
    let skewed = 1.0 - (proportion.ln() * FREQUENCY_SKEW).exp();
    ((skewed * half as f32) as usize).min(half)
}
