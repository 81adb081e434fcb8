//! Slices a sample stream into fixed-size frames and turns each frame into a
//! magnitude spectrum.
//!
//! Frames are back to back (no overlap) and a trailing partial frame is
//! dropped rather than zero padded.

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use tracing::warn;

use crate::audio::hamming_window;

/// Magnitudes of one frame, `fft_size` bins long.
pub type Spectrum = Vec<f32>;

pub struct Framer {
    fifo: Vec<f32>,
    fifo_index: usize,
    frame: Vec<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Framer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fifo: vec![0.0; fft_size],
            fifo_index: 0,
            frame: vec![0.0; fft_size],
            window: hamming_window(fft_size),
            fft: planner.plan_fft_forward(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fifo.len()
    }

    /// Appends one sample. Returns `true` when the FIFO just filled up; the
    /// completed frame is then available from [`Framer::frame`] until the
    /// next fill.
    pub fn push(&mut self, sample: f32) -> bool {
        self.fifo[self.fifo_index] = sample;
        self.fifo_index += 1;

        if self.fifo_index == self.fifo.len() {
            self.frame.copy_from_slice(&self.fifo);
            self.fifo_index = 0;
            return true;
        }
        false
    }

    pub fn frame(&self) -> &[f32] {
        &self.frame
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.fifo_index
    }

    pub fn reset(&mut self) {
        self.fifo_index = 0;
        self.fifo.fill(0.0);
        self.frame.fill(0.0);
    }

    /// Forward magnitude-only transform of a full frame. Phase is
    /// discarded, so for real input `out[i] == out[N - i]` and only the first
    /// `N / 2 + 1` bins are informative. A frame whose length is not `N`
    /// yields an empty spectrum, which carries no constellation points.
    pub fn transform(&self, frame: &[f32]) -> Spectrum {
        if frame.len() != self.fft_size() {
            warn!("skipping {}-sample frame, expected {}", frame.len(), self.fft_size());
            return Spectrum::new();
        }

        let mut complex_buffer: Vec<Complex<f32>> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(sample, coeff)| Complex::new(sample * coeff, 0.0))
            .collect();

        self.fft.process(&mut complex_buffer);

        complex_buffer.iter().map(|c| c.norm()).collect()
    }

    /// Spectra of every complete frame in `samples`, in frame order.
    /// Transforms run in parallel; ordering is fixed by the frame index.
    pub fn spectra(&self, samples: &[f32]) -> Vec<Spectrum> {
        samples
            .par_chunks_exact(self.fft_size())
            .map(|frame| self.transform(frame))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(bin: usize, fft_size: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * PI * bin as f32 * n as f32 / fft_size as f32).sin())
            .collect()
    }

    #[test]
    fn push_signals_each_full_frame() {
        let mut framer = Framer::new(16);
        let ready: Vec<bool> = (0..40).map(|i| framer.push(i as f32)).collect();

        assert_eq!(ready.iter().filter(|r| **r).count(), 2);
        assert!(ready[15] && ready[31]);
        assert_eq!(framer.frame()[0], 16.0);
        assert_eq!(framer.pending(), 8);

        framer.reset();
        assert_eq!(framer.pending(), 0);
        assert!(framer.frame().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn partial_final_frame_is_dropped() {
        let framer = Framer::new(64);
        let samples = vec![0.25; 64 * 3 + 10];
        assert_eq!(framer.spectra(&samples).len(), 3);
    }

    #[test]
    fn spectrum_is_mirror_symmetric() {
        let framer = Framer::new(256);
        let spectrum = framer.transform(&tone(20, 256, 256));

        assert_eq!(spectrum.len(), 256);
        for i in 1..128 {
            assert!((spectrum[i] - spectrum[256 - i]).abs() < 1e-2);
        }
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let framer = Framer::new(512);
        let spectrum = framer.transform(&tone(37, 512, 512));

        let (peak, _) = spectrum[1..256]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak + 1, 37);
    }

    #[test]
    fn wrong_length_frame_yields_empty_spectrum() {
        let framer = Framer::new(64);
        assert!(framer.transform(&[0.5; 63]).is_empty());
        assert!(framer.transform(&[0.5; 65]).is_empty());
        assert!(framer.transform(&[]).is_empty());
        assert_eq!(framer.transform(&[0.5; 64]).len(), 64);
    }

    #[test]
    fn streaming_matches_batch_framing() {
        let samples = tone(9, 128, 128 * 4 + 17);
        let mut framer = Framer::new(128);

        let mut streamed = Vec::new();
        for &sample in &samples {
            if framer.push(sample) {
                streamed.push(framer.transform(framer.frame()));
            }
        }

        assert_eq!(streamed, framer.spectra(&samples));
    }
}
