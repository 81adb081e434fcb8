use std::{f32::consts::PI, path::Path};

use tracing::{debug, info};

use crate::error::FingerprintError;

/// A fully decoded mono clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy of the samples between two whole-second marks.
    pub fn slice_secs(&self, start_secs: u32, end_secs: u32) -> AudioClip {
        let rate = self.sample_rate as usize;
        let start = (start_secs as usize * rate).min(self.samples.len());
        let end = (end_secs as usize * rate).clamp(start, self.samples.len());
        AudioClip::new(self.samples[start..end].to_vec(), self.sample_rate)
    }
}

/// Reads a WAV file into a mono clip, optionally decimating it to
/// `target_sample_rate`.
pub fn load_wav(
    filepath: impl AsRef<Path>,
    target_sample_rate: Option<u32>,
) -> Result<AudioClip, FingerprintError> {
    let filepath = filepath.as_ref();
    let reader = hound::WavReader::open(filepath)?;
    let spec = reader.spec();

    info!(
        path = %filepath.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        format = ?spec.sample_format,
        frames = reader.duration(),
        "reading wav"
    );

    if spec.channels == 0 {
        return Err(FingerprintError::UnsupportedFormat(
            "wav header reports zero channels".into(),
        ));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(FingerprintError::UnsupportedFormat(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut samples = downmix(&interleaved, spec.channels as usize);
    let mut sample_rate = spec.sample_rate;

    if let Some(target) = target_sample_rate {
        if target > sample_rate {
            return Err(FingerprintError::Upsampling {
                from: sample_rate,
                to: target,
            });
        }
        if target < sample_rate {
            info!("downsampling: {} Hz -> {} Hz", sample_rate, target);
            samples = downsample(&samples, sample_rate, target);
            sample_rate = sample_rate / (sample_rate / target);
        }
    }

    Ok(AudioClip::new(samples, sample_rate))
}

/// Averages interleaved channels into one.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    debug!("down-mixing {} channels to mono", channels);

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Keeps every `original / target`-th sample. A target at or above the
/// source rate returns the samples unchanged.
pub fn downsample(samples: &[f32], original_sample_rate: u32, target_sample_rate: u32) -> Vec<f32> {
    if target_sample_rate == 0 || target_sample_rate >= original_sample_rate {
        return samples.to_vec();
    }

    let step = (original_sample_rate / target_sample_rate) as usize;
    debug!("decimation step: {}", step);

    samples.iter().step_by(step).copied().collect()
}

pub fn hamming_window(window_size: usize) -> Vec<f32> {
    if window_size < 2 {
        return vec![1.0; window_size];
    }
    (0..window_size)
        .map(|n| {
            // 0.54 - 0.46 * cos(2 * pi * n / (N - 1))
            let value = 2.0 * PI * n as f32 / (window_size as f32 - 1.0);
            0.54 - 0.46 * value.cos()
        })
        .collect()
}
