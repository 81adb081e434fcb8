//! Song identification by spectral-peak fingerprints.
//!
//! Samples are cut into frames, each frame's strongest bins become
//! constellation points, and the strongest distinct bins of every
//! one-second slot are hashed into a [`Fingerprint`]. Enrollment appends
//! fingerprints to a [`FingerprintIndex`]; a query looks its fingerprints up
//! and votes on alignment offsets to pick a song.
//!
//! ```no_run
//! use songprint::{AudioClip, FingerprintConfig, FingerprintIndex, Fingerprinter, QueryOutcome};
//!
//! let fingerprinter = Fingerprinter::new(FingerprintConfig::default())?;
//! let mut index = FingerprintIndex::new();
//!
//! let song = songprint::audio::load_wav("song.wav", None)?;
//! songprint::enroll(&mut index, &fingerprinter, &song, "song")?;
//!
//! let clip: AudioClip = song.slice_secs(10, 15);
//! if let QueryOutcome::Match(prediction) = songprint::query(&index, &fingerprinter, &clip) {
//!     println!("{} ({} votes)", prediction.song_id, prediction.votes);
//! }
//! # Ok::<(), songprint::FingerprintError>(())
//! ```

pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod framer;
pub mod hashing;
pub mod index;
pub mod matching;
pub mod peaks;
pub mod pipeline;
pub mod telemetry;
pub mod visualize;

pub use audio::AudioClip;
pub use config::FingerprintConfig;
pub use error::FingerprintError;
pub use hashing::{Fingerprint, PeakSet};
pub use index::{FingerprintIndex, IndexEntry};
pub use matching::{Matcher, Prediction};
pub use pipeline::{
    EnrollOutcome, Fingerprinter, QueryOutcome, Rejection, enroll, enroll_batch, query,
};
