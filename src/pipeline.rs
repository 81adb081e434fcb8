//! The two operating modes: enrolling clips into an index and querying it.

use std::fmt;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    audio::AudioClip,
    config::FingerprintConfig,
    error::FingerprintError,
    framer::{Framer, Spectrum},
    hashing::{self, Fingerprint, PeakSet},
    index::FingerprintIndex,
    matching::{Matcher, Prediction},
    peaks::Constellation,
};

/// Why a clip was ignored. These are statuses, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Empty,
    TooLong { duration_secs: f64, max_secs: f64 },
    /// Shorter than one frame.
    NoFrames { samples: usize, fft_size: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "clip has no samples"),
            Rejection::TooLong {
                duration_secs,
                max_secs,
            } => write!(f, "clip is {:.1}s long, limit is {:.0}s", duration_secs, max_secs),
            Rejection::NoFrames { samples, fft_size } => write!(
                f,
                "clip has {} samples, fewer than one {}-sample frame",
                samples, fft_size
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    Enrolled { song_id: String, fingerprints: usize },
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Match(Prediction),
    NoMatch { fingerprints: usize },
    Rejected(Rejection),
}

impl QueryOutcome {
    pub fn song_id(&self) -> Option<&str> {
        match self {
            QueryOutcome::Match(prediction) => Some(prediction.song_id.as_str()),
            _ => None,
        }
    }
}

/// Runs framer, peak extractor and fingerprint generator over whole clips.
pub struct Fingerprinter {
    config: FingerprintConfig,
    framer: Framer,
}

impl Fingerprinter {
    pub fn new(config: FingerprintConfig) -> Result<Self, FingerprintError> {
        config.validate()?;
        let framer = Framer::new(config.fft_size());
        Ok(Self { config, framer })
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    pub fn check(&self, clip: &AudioClip) -> Result<(), Rejection> {
        if clip.is_empty() || clip.sample_rate == 0 {
            return Err(Rejection::Empty);
        }
        let duration_secs = clip.duration_secs();
        if duration_secs > self.config.max_duration_secs {
            return Err(Rejection::TooLong {
                duration_secs,
                max_secs: self.config.max_duration_secs,
            });
        }
        if clip.samples.len() < self.config.fft_size() {
            return Err(Rejection::NoFrames {
                samples: clip.samples.len(),
                fft_size: self.config.fft_size(),
            });
        }
        Ok(())
    }

    pub fn spectrogram(&self, clip: &AudioClip) -> Vec<Spectrum> {
        self.framer.spectra(&clip.samples)
    }

    pub fn constellation(&self, spectrogram: &[Spectrum]) -> Constellation {
        let mut constellation = Constellation::new();
        for spectrum in spectrogram {
            constellation.push_frame(spectrum, self.config.min_peak_magnitude);
        }
        constellation
    }

    /// Slot stride derived from the clip's own duration.
    pub fn frames_per_second(&self, clip: &AudioClip, frame_count: usize) -> usize {
        hashing::frames_per_second(frame_count, clip.duration_secs())
    }

    pub fn peak_sets(&self, clip: &AudioClip, spectrogram: &[Spectrum]) -> Vec<(u32, PeakSet)> {
        let constellation = self.constellation(spectrogram);
        let fps = self.frames_per_second(clip, constellation.frame_count());
        hashing::slot_peak_sets(&constellation, fps, self.config.peaks_per_slot)
    }

    pub fn fingerprint(&self, clip: &AudioClip) -> Result<Vec<Fingerprint>, Rejection> {
        self.check(clip)?;

        let spectrogram = self.spectrogram(clip);
        let constellation = self.constellation(&spectrogram);
        drop(spectrogram);

        let fps = self.frames_per_second(clip, constellation.frame_count());
        debug!(
            "{:.2}s clip: {} frames, {} points, {} frames per slot",
            clip.duration_secs(),
            constellation.frame_count(),
            constellation.point_count(),
            fps
        );
        Ok(hashing::generate_fingerprints(
            &constellation,
            fps,
            self.config.peaks_per_slot,
        ))
    }
}

fn validate_song_id(song_id: &str) -> Result<(), FingerprintError> {
    if song_id.is_empty() || song_id.trim() != song_id || song_id.contains(['\n', '\r']) {
        return Err(FingerprintError::InvalidSongId(song_id.to_owned()));
    }
    Ok(())
}

/// Fingerprints `clip` and appends every fingerprint to `index` under
/// `song_id`.
pub fn enroll(
    index: &mut FingerprintIndex,
    fingerprinter: &Fingerprinter,
    clip: &AudioClip,
    song_id: &str,
) -> Result<EnrollOutcome, FingerprintError> {
    validate_song_id(song_id)?;

    let fingerprints = match fingerprinter.fingerprint(clip) {
        Ok(fingerprints) => fingerprints,
        Err(rejection) => {
            warn!("not enrolling {}: {}", song_id, rejection);
            return Ok(EnrollOutcome::Rejected(rejection));
        }
    };
    Ok(insert_fingerprints(index, song_id, &fingerprints))
}

fn insert_fingerprints(
    index: &mut FingerprintIndex,
    song_id: &str,
    fingerprints: &[Fingerprint],
) -> EnrollOutcome {
    for fingerprint in fingerprints {
        index.insert(fingerprint.hash, song_id, fingerprint.time_slot);
    }
    info!("enrolled {} with {} fingerprints", song_id, fingerprints.len());

    EnrollOutcome::Enrolled {
        song_id: song_id.to_owned(),
        fingerprints: fingerprints.len(),
    }
}

/// Fingerprints all clips in parallel, then inserts them from this thread in
/// input order. The resulting index equals sequential enrollment.
pub fn enroll_batch(
    index: &mut FingerprintIndex,
    fingerprinter: &Fingerprinter,
    clips: &[(String, AudioClip)],
) -> Result<Vec<EnrollOutcome>, FingerprintError> {
    for (song_id, _) in clips {
        validate_song_id(song_id)?;
    }

    let fingerprinted: Vec<Result<Vec<Fingerprint>, Rejection>> = clips
        .par_iter()
        .map(|(_, clip)| fingerprinter.fingerprint(clip))
        .collect();

    let outcomes = clips
        .iter()
        .zip(fingerprinted)
        .map(|((song_id, _), result)| match result {
            Ok(fingerprints) => insert_fingerprints(index, song_id, &fingerprints),
            Err(rejection) => {
                warn!("not enrolling {}: {}", song_id, rejection);
                EnrollOutcome::Rejected(rejection)
            }
        })
        .collect();
    Ok(outcomes)
}

/// Identifies `clip` against a fully enrolled index.
pub fn query(index: &FingerprintIndex, fingerprinter: &Fingerprinter, clip: &AudioClip) -> QueryOutcome {
    let fingerprints = match fingerprinter.fingerprint(clip) {
        Ok(fingerprints) => fingerprints,
        Err(rejection) => {
            warn!("not querying: {}", rejection);
            return QueryOutcome::Rejected(rejection);
        }
    };

    let matcher = Matcher::new(index).with_vote_window(fingerprinter.config().vote_window);
    match matcher.predict(&fingerprints) {
        Some(prediction) => {
            info!(
                "matched {} ({} votes, offset {}s, {:.1}% confidence)",
                prediction.song_id, prediction.votes, prediction.offset, prediction.confidence
            );
            QueryOutcome::Match(prediction)
        }
        None => {
            info!("no match for {} query fingerprints", fingerprints.len());
            QueryOutcome::NoMatch {
                fingerprints: fingerprints.len(),
            }
        }
    }
}
