//! Frame-based audio features
//!
//! Splits the waveform into fixed-size frames and computes per-frame
//! cepstral coefficients, spectral centroid/rolloff, zero-crossing rate,
//! energy, a pitch estimate and two formant estimates, then reduces each
//! series by mean (and std where the spread carries signal) into the fixed
//! 15-wide vector the models consume.
//!
//! Frequency-domain features use rustfft over Hann-windowed frames. The
//! cepstral path is a compact stand-in for a full MFCC bank: log magnitude
//! spectrum followed by a DCT-II, keeping the first five coefficients.

use super::AUDIO_FEATURE_DIM;
use edupulse_common::{Error, Result};
use rustfft::{num_complex::Complex, FftPlanner};

const FRAME_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;
const CEPSTRAL_COEFFS: usize = 5;
const ROLLOFF_FRACTION: f32 = 0.85;

const MIN_SAMPLE_RATE: u32 = 8_000;
const MAX_SAMPLE_RATE: u32 = 96_000;

// Pitch search range (Hz); matches child/adult speech fundamentals
const PITCH_MIN_HZ: f32 = 60.0;
const PITCH_MAX_HZ: f32 = 500.0;

// Formant search bands (Hz)
const F1_BAND: (f32, f32) = (200.0, 1_000.0);
const F2_BAND: (f32, f32) = (1_000.0, 3_000.0);

/// Extract the fixed-width audio feature vector from mono PCM samples
/// (f32, normalized to [-1, 1]).
///
/// Waveforms shorter than one frame yield the zero vector rather than an
/// error; an out-of-range sample rate is a malformed input signal.
///
/// Layout:
/// - `[0..5)`  cepstral coefficient means
/// - `[5]`/`[6]` spectral centroid mean/std (normalized by Nyquist)
/// - `[7]`     spectral rolloff mean (normalized by Nyquist)
/// - `[8]`/`[9]` zero-crossing rate mean/std
/// - `[10]`/`[11]` frame energy mean/std
/// - `[12]`    pitch estimate mean (normalized by the search ceiling)
/// - `[13]`/`[14]` first/second formant means (normalized by band ceiling)
pub fn extract(samples: &[f32], sample_rate: u32) -> Result<[f32; AUDIO_FEATURE_DIM]> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(Error::FeatureExtraction(format!(
            "Unsupported sample rate: {} Hz",
            sample_rate
        )));
    }

    let mut features = [0.0f32; AUDIO_FEATURE_DIM];
    if samples.len() < FRAME_SIZE {
        return Ok(features);
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let nyquist = sample_rate as f32 / 2.0;
    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;

    let mut cepstra_sums = [0.0f32; CEPSTRAL_COEFFS];
    let mut centroids = Vec::new();
    let mut rolloffs = Vec::new();
    let mut zcrs = Vec::new();
    let mut energies = Vec::new();
    let mut pitches = Vec::new();
    let mut formants1 = Vec::new();
    let mut formants2 = Vec::new();

    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        let frame = &samples[start..start + FRAME_SIZE];

        energies.push(rms(frame));
        zcrs.push(zero_crossing_rate(frame));

        // Hann window before the FFT to limit spectral leakage
        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let w = 0.5
                    - 0.5
                        * (2.0 * std::f32::consts::PI * i as f32 / (FRAME_SIZE - 1) as f32).cos();
                Complex::new(s * w, 0.0)
            })
            .collect();
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..FRAME_SIZE / 2].iter().map(|c| c.norm()).collect();

        centroids.push(spectral_centroid(&magnitudes, bin_hz) / nyquist);
        rolloffs.push(spectral_rolloff(&magnitudes, bin_hz) / nyquist);

        let cepstra = cepstral_coefficients(&magnitudes);
        for (sum, c) in cepstra_sums.iter_mut().zip(cepstra.iter()) {
            *sum += c;
        }

        pitches.push(estimate_pitch(frame, sample_rate) / PITCH_MAX_HZ);
        formants1.push(band_peak_frequency(&magnitudes, bin_hz, F1_BAND) / F1_BAND.1);
        formants2.push(band_peak_frequency(&magnitudes, bin_hz, F2_BAND) / F2_BAND.1);

        start += HOP_SIZE;
    }

    let frame_count = energies.len() as f32;
    for (i, sum) in cepstra_sums.iter().enumerate() {
        features[i] = (sum / frame_count).clamp(-1.0, 1.0);
    }
    let (centroid_mean, centroid_std) = mean_std(&centroids);
    features[5] = centroid_mean;
    features[6] = centroid_std;
    features[7] = mean_std(&rolloffs).0;
    let (zcr_mean, zcr_std) = mean_std(&zcrs);
    features[8] = zcr_mean;
    features[9] = zcr_std;
    let (energy_mean, energy_std) = mean_std(&energies);
    features[10] = energy_mean.min(1.0);
    features[11] = energy_std.min(1.0);
    features[12] = mean_std(&pitches).0.min(1.0);
    features[13] = mean_std(&formants1).0.min(1.0);
    features[14] = mean_std(&formants2).0.min(1.0);

    Ok(features)
}

fn rms(frame: &[f32]) -> f32 {
    let sum_squares: f32 = frame.iter().map(|&s| s * s).sum();
    (sum_squares / frame.len() as f32).sqrt()
}

fn zero_crossing_rate(frame: &[f32]) -> f32 {
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0 && w[1] < 0.0) || (w[0] < 0.0 && w[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() / 2) as f32
}

fn spectral_centroid(magnitudes: &[f32], bin_hz: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= f32::EPSILON {
        return 0.0;
    }
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * bin_hz * m)
        .sum();
    weighted / total
}

/// Frequency below which `ROLLOFF_FRACTION` of the spectral energy sits
fn spectral_rolloff(magnitudes: &[f32], bin_hz: f32) -> f32 {
    let total: f32 = magnitudes.iter().map(|&m| m * m).sum();
    if total <= f32::EPSILON {
        return 0.0;
    }
    let target = total * ROLLOFF_FRACTION;
    let mut cumulative = 0.0;
    for (i, &m) in magnitudes.iter().enumerate() {
        cumulative += m * m;
        if cumulative >= target {
            return i as f32 * bin_hz;
        }
    }
    (magnitudes.len() - 1) as f32 * bin_hz
}

/// First `CEPSTRAL_COEFFS` coefficients of a DCT-II over the log magnitude
/// spectrum, scaled into roughly [-1, 1]
fn cepstral_coefficients(magnitudes: &[f32]) -> [f32; CEPSTRAL_COEFFS] {
    let n = magnitudes.len();
    let log_spectrum: Vec<f32> = magnitudes.iter().map(|&m| (m + 1e-10).ln()).collect();

    let mut coeffs = [0.0f32; CEPSTRAL_COEFFS];
    for (k, coeff) in coeffs.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (i, &x) in log_spectrum.iter().enumerate() {
            sum += x * (std::f32::consts::PI * k as f32 * (i as f32 + 0.5) / n as f32).cos();
        }
        *coeff = sum / n as f32;
    }
    coeffs
}

/// Autocorrelation pitch estimate in Hz; 0 for unvoiced/silent frames
fn estimate_pitch(frame: &[f32], sample_rate: u32) -> f32 {
    let min_lag = (sample_rate as f32 / PITCH_MAX_HZ) as usize;
    let max_lag = ((sample_rate as f32 / PITCH_MIN_HZ) as usize).min(frame.len() - 1);
    if min_lag >= max_lag {
        return 0.0;
    }

    let energy: f32 = frame.iter().map(|&s| s * s).sum();
    if energy <= f32::EPSILON {
        return 0.0;
    }

    let mut best_lag = 0;
    let mut best_corr = 0.0f32;
    for lag in min_lag..=max_lag {
        let corr: f32 = frame[..frame.len() - lag]
            .iter()
            .zip(&frame[lag..])
            .map(|(&a, &b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    // Require meaningful periodicity before claiming a pitch
    if best_lag == 0 || best_corr / energy < 0.3 {
        return 0.0;
    }
    sample_rate as f32 / best_lag as f32
}

/// Frequency of the strongest spectral peak inside a band
fn band_peak_frequency(magnitudes: &[f32], bin_hz: f32, band: (f32, f32)) -> f32 {
    let lo = (band.0 / bin_hz) as usize;
    let hi = ((band.1 / bin_hz) as usize).min(magnitudes.len().saturating_sub(1));
    if lo >= hi {
        return 0.0;
    }
    let (peak_bin, peak_mag) = magnitudes[lo..=hi]
        .iter()
        .enumerate()
        .fold((0, 0.0f32), |(bi, bm), (i, &m)| {
            if m > bm {
                (i, m)
            } else {
                (bi, bm)
            }
        });
    if peak_mag <= f32::EPSILON {
        return 0.0;
    }
    (lo + peak_bin) as f32 * bin_hz
}

fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance =
        values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(freq: f32, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
        let count = (sample_rate as f32 * duration_secs) as usize;
        (0..count)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.8
            })
            .collect()
    }

    #[test]
    fn short_waveform_yields_zero_vector() {
        let features = extract(&[0.1; 100], 44_100).unwrap();
        assert_eq!(features, [0.0; AUDIO_FEATURE_DIM]);
    }

    #[test]
    fn empty_waveform_yields_zero_vector() {
        let features = extract(&[], 44_100).unwrap();
        assert_eq!(features, [0.0; AUDIO_FEATURE_DIM]);
    }

    #[test]
    fn unsupported_sample_rate_is_a_typed_error() {
        let result = extract(&[0.0; 2048], 4_000);
        assert!(matches!(result, Err(Error::FeatureExtraction(_))));
    }

    #[test]
    fn pure_tone_has_energy_and_pitch() {
        let samples = sine_wave(220.0, 44_100, 0.5);
        let features = extract(&samples, 44_100).unwrap();

        assert!(features[10] > 0.1, "energy mean should be set");
        // 220 Hz normalized by the 500 Hz pitch ceiling
        let pitch = features[12] * PITCH_MAX_HZ;
        assert!(
            (pitch - 220.0).abs() < 25.0,
            "pitch estimate off: {} Hz",
            pitch
        );
    }

    #[test]
    fn higher_tone_moves_the_centroid_up() {
        let low = extract(&sine_wave(200.0, 44_100, 0.3), 44_100).unwrap();
        let high = extract(&sine_wave(4_000.0, 44_100, 0.3), 44_100).unwrap();
        assert!(high[5] > low[5], "centroid should track tone frequency");
    }

    #[test]
    fn silence_stays_finite() {
        let features = extract(&vec![0.0; 4096], 16_000).unwrap();
        assert!(features.iter().all(|v| v.is_finite()));
        assert_eq!(features[10], 0.0, "silent energy");
        assert_eq!(features[12], 0.0, "silent pitch");
    }
}
