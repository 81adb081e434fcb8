//! PNG renderings of a clip's spectrogram and constellation for outside
//! display. Rows use the log-skewed frequency axis from [`skewed_bin`].

use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::info;

use crate::{error::FingerprintError, framer::Spectrum, hashing::PeakSet, peaks::skewed_bin};

const PEAK_COLOR: Rgb<u8> = Rgb([255, 40, 40]);

fn log_magnitude(magnitude: f32) -> f32 {
    (magnitude + 1e-6).log10()
}

/// Row-to-bin table for an image `height` rows tall.
fn row_bins(height: u32, fft_size: usize) -> Vec<usize> {
    (0..height).map(|row| skewed_bin(row, height, fft_size)).collect()
}

/// Grayscale spectrogram, one pixel column per frame.
pub fn spectrogram_image(spectrogram: &[Spectrum], height: u32) -> Option<RgbImage> {
    let fft_size = spectrogram.first().map(Vec::len).filter(|len| *len > 1)?;
    if height == 0 {
        return None;
    }
    let bins = row_bins(height, fft_size);

    let mut min_log_mag = f32::MAX;
    let mut max_log_mag = f32::MIN;
    for time_slice in spectrogram {
        for &magnitude in &time_slice[..=fft_size / 2] {
            if magnitude < 1e-10 {
                continue;
            }
            let log_mag = log_magnitude(magnitude);
            min_log_mag = min_log_mag.min(log_mag);
            max_log_mag = max_log_mag.max(log_mag);
        }
    }
    if min_log_mag > max_log_mag {
        min_log_mag = log_magnitude(0.0);
        max_log_mag = min_log_mag;
    }
    let log_mag_range = max_log_mag - min_log_mag;
    let log_mag_range = if log_mag_range < 1e-6 { 1.0 } else { log_mag_range };

    let mut imgbuf = RgbImage::new(spectrogram.len() as u32, height);
    for (x, time_slice) in spectrogram.iter().enumerate() {
        for (y, &bin) in bins.iter().enumerate() {
            let scaled_val = (log_magnitude(time_slice[bin]) - min_log_mag) / log_mag_range;
            let intensity = (scaled_val.clamp(0.0, 1.0) * 255.0).round() as u8;
            imgbuf.put_pixel(x as u32, y as u32, Rgb([intensity, intensity, intensity]));
        }
    }
    Some(imgbuf)
}

/// Marks every peak-set point on top of an image built by
/// [`spectrogram_image`].
pub fn draw_constellation(imgbuf: &mut RgbImage, peak_sets: &[(u32, PeakSet)], fft_size: usize) {
    let (width, height) = imgbuf.dimensions();
    if height == 0 {
        return;
    }
    let bins = row_bins(height, fft_size);

    for point in peak_sets.iter().flat_map(|(_, peak_set)| peak_set.points()) {
        let x = point.frame;
        if x >= width {
            continue;
        }
        let bin = point.bin as usize;
        let y = bins
            .iter()
            .enumerate()
            .min_by_key(|(_, row_bin)| row_bin.abs_diff(bin))
            .map(|(row, _)| row as u32)
            .unwrap_or(0);
        imgbuf.put_pixel(x, y, PEAK_COLOR);
    }
}

pub fn render_spectrogram(
    spectrogram: &[Spectrum],
    height: u32,
    output_path: impl AsRef<Path>,
) -> Result<bool, FingerprintError> {
    let Some(imgbuf) = spectrogram_image(spectrogram, height) else {
        info!("spectrogram is empty, nothing to render");
        return Ok(false);
    };
    imgbuf.save(output_path.as_ref())?;
    info!("spectrogram saved to {}", output_path.as_ref().display());
    Ok(true)
}

pub fn render_constellation(
    spectrogram: &[Spectrum],
    peak_sets: &[(u32, PeakSet)],
    height: u32,
    output_path: impl AsRef<Path>,
) -> Result<bool, FingerprintError> {
    let Some(mut imgbuf) = spectrogram_image(spectrogram, height) else {
        info!("spectrogram is empty, nothing to render");
        return Ok(false);
    };
    let fft_size = spectrogram[0].len();
    draw_constellation(&mut imgbuf, peak_sets, fft_size);

    imgbuf.save(output_path.as_ref())?;
    info!("constellation saved to {}", output_path.as_ref().display());
    Ok(true)
}
