//! End-to-end enrollment and recognition on synthetic songs.
//!
//! Every synthetic song plays a different chord of pure tones each second.
//! Tones sit exactly on FFT bins and each second spans a whole number of
//! frames, so clips cut on second boundaries reproduce enrollment frames.
//! The 44.1 kHz songs run under the default config, where neither frames nor
//! slots line up with seconds.

use std::f64::consts::PI;

use songprint::{
    AudioClip, EnrollOutcome, FingerprintConfig, FingerprintIndex, Fingerprinter, QueryOutcome,
    Rejection, db, enroll, enroll_batch, query,
};

const SAMPLE_RATE: u32 = 8192;
const FFT_ORDER: u32 = 11;
const BIN_HZ: f64 = SAMPLE_RATE as f64 / (1 << FFT_ORDER) as f64;
const AMPLITUDES: [f64; 5] = [0.24, 0.22, 0.20, 0.18, 0.16];
const CD_SAMPLE_RATE: u32 = 44_100;

fn config() -> FingerprintConfig {
    FingerprintConfig::default().with_fft_order(FFT_ORDER)
}

fn fingerprinter() -> Fingerprinter {
    Fingerprinter::new(config()).unwrap()
}

fn next_random(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state >> 33
}

/// One bin per band so tones never sit next to each other.
fn chord(seed: u64, second: u32, tones: usize) -> Vec<u32> {
    let mut state = seed.wrapping_mul(1_000_003).wrapping_add(second as u64);
    let band = 880 / tones as u32;
    (0..tones as u32)
        .map(|k| 24 + band * k + (next_random(&mut state) % (band as u64 - 8)) as u32)
        .collect()
}

fn synthetic_song(seed: u64, seconds: u32, tones: usize) -> AudioClip {
    let mut samples = Vec::with_capacity((seconds * SAMPLE_RATE) as usize);
    for second in 0..seconds {
        let bins = chord(seed, second, tones);
        for n in 0..SAMPLE_RATE {
            let t = (second * SAMPLE_RATE + n) as f64 / SAMPLE_RATE as f64;
            let sample: f64 = bins
                .iter()
                .enumerate()
                .map(|(k, bin)| {
                    let amplitude = AMPLITUDES[k % AMPLITUDES.len()] / (1 + k / AMPLITUDES.len()) as f64;
                    amplitude * (2.0 * PI * *bin as f64 * BIN_HZ * t).sin()
                })
                .sum();
            samples.push(sample as f32);
        }
    }
    AudioClip::new(samples, SAMPLE_RATE)
}

/// Chords held for two seconds at 44.1 kHz. Tones sit on bins of the
/// default frame size but chord changes fall mid-frame.
fn cd_rate_song(seed: u64, seconds: u32) -> AudioClip {
    let fft_size = FingerprintConfig::default().fft_size() as u64;
    let mut samples = Vec::with_capacity((seconds * CD_SAMPLE_RATE) as usize);
    for second in 0..seconds {
        let bins: Vec<u64> = chord(seed, second / 2, 5).iter().map(|bin| 2 * *bin as u64).collect();
        for n in 0..CD_SAMPLE_RATE {
            let position = (second * CD_SAMPLE_RATE + n) as u64;
            let sample: f64 = bins
                .iter()
                .zip(AMPLITUDES)
                .map(|(bin, amplitude)| {
                    let cycle = (bin * position % fft_size) as f64 / fft_size as f64;
                    amplitude * (2.0 * PI * cycle).sin()
                })
                .sum();
            samples.push(sample as f32);
        }
    }
    AudioClip::new(samples, CD_SAMPLE_RATE)
}

fn song(seed: u64) -> AudioClip {
    synthetic_song(seed, 30, 5)
}

fn enrolled(songs: &[(&str, &AudioClip)]) -> FingerprintIndex {
    let fingerprinter = fingerprinter();
    let mut index = FingerprintIndex::new();
    for (song_id, clip) in songs {
        let outcome = enroll(&mut index, &fingerprinter, clip, song_id).unwrap();
        assert!(matches!(outcome, EnrollOutcome::Enrolled { .. }));
    }
    index
}

#[test]
fn middle_of_song_matches_itself() {
    let song_a = song(1);
    let song_b = song(2);
    let index = enrolled(&[("songA", &song_a), ("songB", &song_b)]);

    let outcome = query(&index, &fingerprinter(), &song_a.slice_secs(10, 15));
    let QueryOutcome::Match(prediction) = outcome else {
        panic!("expected a match, got {:?}", outcome);
    };
    assert_eq!(prediction.song_id, "songA");
    assert_eq!(prediction.offset, 10);
    assert_eq!(prediction.votes, 5);
    assert_eq!(prediction.query_fingerprints, 5);
    assert_eq!(prediction.quality(), "High");
}

#[test]
fn each_enrolled_song_is_recognised() {
    let songs: Vec<(String, AudioClip)> =
        (10..14).map(|seed| (format!("song{}", seed), song(seed))).collect();
    let refs: Vec<(&str, &AudioClip)> = songs.iter().map(|(id, clip)| (id.as_str(), clip)).collect();
    let index = enrolled(&refs);

    for (song_id, clip) in &songs {
        let outcome = query(&index, &fingerprinter(), &clip.slice_secs(20, 26));
        assert_eq!(outcome.song_id(), Some(song_id.as_str()));
    }
}

#[test]
fn silence_does_not_match() {
    let song_a = song(1);
    let index = enrolled(&[("songA", &song_a)]);

    let silence = AudioClip::new(vec![0.0; 5 * SAMPLE_RATE as usize], SAMPLE_RATE);
    assert_eq!(
        query(&index, &fingerprinter(), &silence),
        QueryOutcome::NoMatch { fingerprints: 0 }
    );
}

#[test]
fn unknown_song_does_not_match() {
    let index = enrolled(&[("songA", &song(1))]);

    let outcome = query(&index, &fingerprinter(), &song(99).slice_secs(0, 8));
    assert!(matches!(outcome, QueryOutcome::NoMatch { fingerprints: 8 }));
}

#[test]
fn truncated_start_still_matches() {
    let song_a = song(3);
    let song_b = song(4);
    let index = enrolled(&[("songA", &song_a), ("songB", &song_b)]);

    let shifted = song_a.slice_secs(7, 30);
    let outcome = query(&index, &fingerprinter(), &shifted);
    let QueryOutcome::Match(prediction) = outcome else {
        panic!("expected a match, got {:?}", outcome);
    };
    assert_eq!(prediction.song_id, "songA");
    assert_eq!(prediction.offset, 7);
    assert_eq!(prediction.votes, 23);
}

#[test]
fn default_config_at_cd_rate_still_matches() {
    let fingerprinter = Fingerprinter::new(FingerprintConfig::default()).unwrap();
    let song_a = cd_rate_song(31, 30);
    let song_b = cd_rate_song(32, 30);

    let mut index = FingerprintIndex::new();
    for (song_id, clip) in [("songA", &song_a), ("songB", &song_b)] {
        let outcome = enroll(&mut index, &fingerprinter, clip, song_id).unwrap();
        assert!(matches!(outcome, EnrollOutcome::Enrolled { fingerprints: 33, .. }));
    }

    // Slots are ~0.93s long, so the alignment offset runs slightly ahead of
    // the cut point and only slots inside a single chord find their hash.
    for (start, end) in [(10, 15), (7, 30)] {
        let outcome = query(&index, &fingerprinter, &song_a.slice_secs(start, end));
        let QueryOutcome::Match(prediction) = outcome else {
            panic!("expected a match for {}..{}s, got {:?}", start, end, outcome);
        };
        assert_eq!(prediction.song_id, "songA");
        assert!(prediction.votes >= 2, "only {} votes for {}..{}s", prediction.votes, start, end);
        assert!((start as i64..=start as i64 + 2).contains(&prediction.offset));
    }
}

#[test]
fn light_noise_does_not_break_matching() {
    let song_a = song(5);
    let index = enrolled(&[("songA", &song_a), ("songB", &song(6))]);

    let mut noisy = song_a.slice_secs(12, 18);
    let mut state = 42u64;
    for sample in &mut noisy.samples {
        let noise = (next_random(&mut state) % 2001) as f32 / 1000.0 - 1.0;
        *sample += 0.005 * noise;
    }

    assert_eq!(query(&index, &fingerprinter(), &noisy).song_id(), Some("songA"));
}

#[test]
fn enrollment_is_deterministic() {
    let song_a = song(7);
    let first = enrolled(&[("songA", &song_a)]);
    let second = enrolled(&[("songA", &song_a)]);

    assert_eq!(first, second);
    assert_eq!(first.buckets(), second.buckets());
    assert_eq!(first.entry_count(), 30);
}

#[test]
fn batch_enrollment_equals_sequential() {
    let clips: Vec<(String, AudioClip)> = (20..24)
        .map(|seed| (format!("song{}", seed), song(seed)))
        .collect();

    let mut batch_index = FingerprintIndex::new();
    let outcomes = enroll_batch(&mut batch_index, &fingerprinter(), &clips).unwrap();
    assert!(outcomes.iter().all(|o| matches!(o, EnrollOutcome::Enrolled { fingerprints: 30, .. })));

    let refs: Vec<(&str, &AudioClip)> = clips.iter().map(|(id, clip)| (id.as_str(), clip)).collect();
    assert_eq!(batch_index, enrolled(&refs));
}

#[test]
fn busy_slots_keep_at_most_five_unique_peaks() {
    let busy = synthetic_song(8, 6, 12);
    let fingerprinter = fingerprinter();
    let spectrogram = fingerprinter.spectrogram(&busy);
    let peak_sets = fingerprinter.peak_sets(&busy, &spectrogram);

    assert_eq!(peak_sets.len(), 6);
    for (_, peak_set) in &peak_sets {
        assert_eq!(peak_set.len(), 5);
        let bins: Vec<u32> = peak_set.bins().collect();
        assert!(bins.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn overlong_clip_is_ignored() {
    let fingerprinter = Fingerprinter::new(config().with_max_duration(20.0)).unwrap();
    let mut index = FingerprintIndex::new();

    let outcome = enroll(&mut index, &fingerprinter, &song(1), "songA").unwrap();
    assert!(matches!(outcome, EnrollOutcome::Rejected(Rejection::TooLong { .. })));
    assert!(index.is_empty());

    let outcome = query(&index, &fingerprinter, &song(1));
    assert!(matches!(outcome, QueryOutcome::Rejected(Rejection::TooLong { .. })));
}

#[test]
fn database_round_trip_keeps_lookups() {
    let index = enrolled(&[("songA", &song(1)), ("songB", &song(2))]);
    let path = std::env::temp_dir().join(format!("songprint-it-{}.db", std::process::id()));

    db::save(&index, &path).unwrap();
    let report = db::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(report.status, db::LoadStatus::Loaded);
    assert_eq!(report.index.len(), index.len());
    for (hash, _) in index.buckets() {
        assert_eq!(report.index.lookup(hash, 4), index.lookup(hash, 4));
    }

    let outcome = query(&report.index, &fingerprinter(), &song(2).slice_secs(3, 9));
    assert_eq!(outcome.song_id(), Some("songB"));
}
