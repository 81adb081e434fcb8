use crate::error::FingerprintError;

// Framing Parameters
pub const FFT_ORDER: u32 = 13;
pub const MIN_FFT_ORDER: u32 = 4;
pub const MAX_FFT_ORDER: u32 = 16;

// Peak Finding Parameters
pub const PEAKS_PER_SLOT: usize = 5;
pub const MIN_PEAK_MAGNITUDE: f32 = 1e-6;
pub const FREQUENCY_SKEW: f32 = 0.2;

// Input Limits
pub const MAX_CLIP_SECONDS: f64 = 600.0;

// Matching Parameters
pub const VOTE_WINDOW: usize = 4;
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 50.0;
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 20.0;

// Visualization
pub const PLOT_HEIGHT: u32 = 330;

/// Runtime knobs for the fingerprinting pipeline.
///
/// Enrollment and query must run with the same values, otherwise the
/// hashes of the two sides never meet.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintConfig {
    /// Frames hold `2^fft_order` samples.
    pub fft_order: u32,
    /// Upper bound on the points kept per time slot.
    pub peaks_per_slot: usize,
    /// Longer clips are ignored.
    pub max_duration_secs: f64,
    /// Number of consecutive alignment offsets pooled per vote.
    pub vote_window: usize,
    /// Bins at or below this magnitude never become constellation points.
    pub min_peak_magnitude: f32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            fft_order: FFT_ORDER,
            peaks_per_slot: PEAKS_PER_SLOT,
            max_duration_secs: MAX_CLIP_SECONDS,
            vote_window: VOTE_WINDOW,
            min_peak_magnitude: MIN_PEAK_MAGNITUDE,
        }
    }
}

impl FingerprintConfig {
    pub fn with_fft_order(mut self, fft_order: u32) -> Self {
        self.fft_order = fft_order;
        self
    }

    pub fn with_max_duration(mut self, max_duration_secs: f64) -> Self {
        self.max_duration_secs = max_duration_secs;
        self
    }

    pub fn fft_size(&self) -> usize {
        1 << self.fft_order
    }

    pub fn validate(&self) -> Result<(), FingerprintError> {
        if !(MIN_FFT_ORDER..=MAX_FFT_ORDER).contains(&self.fft_order) {
            return Err(FingerprintError::InvalidConfig(format!(
                "fft order {} outside {}..={}",
                self.fft_order, MIN_FFT_ORDER, MAX_FFT_ORDER
            )));
        }
        if self.peaks_per_slot == 0 {
            return Err(FingerprintError::InvalidConfig(
                "peaks per slot must be at least 1".into(),
            ));
        }
        if self.vote_window == 0 {
            return Err(FingerprintError::InvalidConfig(
                "vote window must be at least 1".into(),
            ));
        }
        if !(self.max_duration_secs > 0.0) {
            return Err(FingerprintError::InvalidConfig(format!(
                "max duration must be positive, got {}",
                self.max_duration_secs
            )));
        }
        Ok(())
    }
}
