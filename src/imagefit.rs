//! # Image Size-Fitter
//!
//! Guarantees photo-evidence payloads fit under a fixed byte budget before
//! they are queued or submitted. The backend rejects oversized payloads,
//! and the local queue must not balloon device storage.
//!
//! ## Algorithm
//!
//! Input (raw bytes, plain base64, or a data URL) is normalized to base64.
//! A payload already under budget is returned unchanged. Anything larger
//! is decoded and re-encoded as JPEG down a fixed descending ladder of
//! (max dimension, quality) pairs, returning at the first step that fits.
//! The ladder is fixed, so the same input always takes the same number of
//! steps and produces the same output.
//!
//! If the ladder is exhausted the fitter fails, reporting the smallest
//! size it achieved. It never truncates or silently corrupts an image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;

/// Descending (max dimension, JPEG quality) re-encode ladder.
const FIT_LADDER: &[(u32, u8)] = &[
    (1600, 80),
    (1280, 70),
    (1024, 60),
    (800, 50),
    (640, 40),
    (480, 30),
];

/// Size-fitting failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FitError {
    /// Empty input is an error, not a zero-byte success
    #[error("Image input is empty")]
    EmptyInput,

    /// Input could not be interpreted as base64
    #[error("Invalid base64 image payload: {message}")]
    InvalidBase64 {
        /// Human-readable error message
        message: String,
    },

    /// Decoded bytes are not a readable image
    #[error("Image decode failed: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },

    /// Every ladder step still exceeded the budget
    #[error("Image still {achieved} bytes after re-encoding, budget is {budget} bytes")]
    BudgetExceeded {
        /// Smallest size achieved, in bytes
        achieved: usize,
        /// The byte budget that could not be met
        budget: usize,
    },
}

impl From<image::ImageError> for FitError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// A payload that satisfies the byte budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedImage {
    /// Base64-encoded payload, ready for submission
    pub data: String,
    /// Decoded size in bytes
    pub decoded_len: usize,
    /// Ladder steps taken; 0 means the input already fit
    pub ladder_steps: usize,
}

/// Fit a base64 or data-URL image payload under `budget` bytes.
///
/// The data-URL prefix is stripped before the size is measured; measuring
/// an unstripped string over-counts and produces false "still too large"
/// failures.
pub fn fit(input: &str, budget: usize) -> Result<FittedImage, FitError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FitError::EmptyInput);
    }

    let payload = strip_data_url(trimmed)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| FitError::InvalidBase64 {
            message: e.to_string(),
        })?;

    if bytes.is_empty() {
        return Err(FitError::EmptyInput);
    }

    if bytes.len() <= budget {
        // Already small enough: hand back the normalized input untouched,
        // no re-encoding artifacts.
        return Ok(FittedImage {
            data: payload.to_string(),
            decoded_len: bytes.len(),
            ladder_steps: 0,
        });
    }

    reencode(&bytes, budget)
}

/// Fit raw image bytes under `budget` bytes.
pub fn fit_bytes(bytes: &[u8], budget: usize) -> Result<FittedImage, FitError> {
    if bytes.is_empty() {
        return Err(FitError::EmptyInput);
    }

    if bytes.len() <= budget {
        return Ok(FittedImage {
            data: STANDARD.encode(bytes),
            decoded_len: bytes.len(),
            ladder_steps: 0,
        });
    }

    reencode(bytes, budget)
}

/// Strip a `data:<mime>;base64,` prefix, if present.
fn strip_data_url(input: &str) -> Result<&str, FitError> {
    if !input.starts_with("data:") {
        return Ok(input);
    }
    match input.find("base64,") {
        Some(idx) => Ok(&input[idx + "base64,".len()..]),
        None => Err(FitError::InvalidBase64 {
            message: "data URL without base64 payload".to_string(),
        }),
    }
}

/// Walk the ladder until a step fits the budget.
fn reencode(bytes: &[u8], budget: usize) -> Result<FittedImage, FitError> {
    let original = image::load_from_memory(bytes)?;
    let mut smallest = bytes.len();

    for (step, &(max_dim, quality)) in FIT_LADDER.iter().enumerate() {
        let encoded = encode_step(&original, max_dim, quality)?;
        tracing::debug!(
            step = step + 1,
            max_dim,
            quality,
            size = encoded.len(),
            budget,
            "size-fit ladder step"
        );

        if encoded.len() <= budget {
            return Ok(FittedImage {
                data: STANDARD.encode(&encoded),
                decoded_len: encoded.len(),
                ladder_steps: step + 1,
            });
        }
        smallest = smallest.min(encoded.len());
    }

    Err(FitError::BudgetExceeded {
        achieved: smallest,
        budget,
    })
}

/// Resize within `max_dim` (aspect ratio preserved) and encode as JPEG.
fn encode_step(img: &DynamicImage, max_dim: u32, quality: u8) -> Result<Vec<u8>, FitError> {
    let resized = if img.width() > max_dim || img.height() > max_dim {
        img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
    } else {
        img.clone()
    };

    // JPEG has no alpha channel; flatten to RGB first.
    let rgb = resized.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    /// Deterministic noise image; noise defeats compression, which keeps
    /// encoded sizes large enough to exercise the ladder.
    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let img = image::RgbImage::from_fn(width, height, |_, _| {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let v = (seed >> 33) as u32;
            image::Rgb([(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert_matches!(fit("", 1024), Err(FitError::EmptyInput));
        assert_matches!(fit("   ", 1024), Err(FitError::EmptyInput));
        assert_matches!(fit_bytes(&[], 1024), Err(FitError::EmptyInput));
    }

    #[test]
    fn test_small_input_returned_unchanged() {
        let payload = STANDARD.encode(b"already tiny");
        let fitted = fit(&payload, 1024).unwrap();
        assert_eq!(fitted.data, payload);
        assert_eq!(fitted.ladder_steps, 0);
        assert_eq!(fitted.decoded_len, b"already tiny".len());
    }

    #[test]
    fn test_data_url_prefix_is_stripped_before_measuring() {
        let payload = STANDARD.encode(b"already tiny");
        let data_url = format!("data:image/png;base64,{}", payload);
        let fitted = fit(&data_url, 1024).unwrap();
        // The prefix must not survive into the output or the measurement.
        assert_eq!(fitted.data, payload);
        assert_eq!(fitted.decoded_len, b"already tiny".len());
    }

    #[test]
    fn test_data_url_without_base64_marker_is_rejected() {
        assert_matches!(
            fit("data:image/png;utf8,hello", 1024),
            Err(FitError::InvalidBase64 { .. })
        );
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        assert_matches!(fit("!!!not-base64!!!", 1024), Err(FitError::InvalidBase64 { .. }));
    }

    #[test]
    fn test_non_image_bytes_over_budget_fail_decode() {
        let blob = vec![0xABu8; 4096];
        assert_matches!(fit_bytes(&blob, 1024), Err(FitError::Decode { .. }));
    }

    #[test]
    fn test_oversized_image_converges_under_budget() {
        let png = noise_png(512, 512);
        let budget = 60 * 1024;
        assert!(png.len() > budget, "test image must start over budget");

        let fitted = fit_bytes(&png, budget).unwrap();
        assert!(fitted.decoded_len <= budget);
        assert!(fitted.ladder_steps >= 1);

        let decoded = STANDARD.decode(&fitted.data).unwrap();
        assert_eq!(decoded.len(), fitted.decoded_len);
    }

    #[test]
    fn test_ladder_is_deterministic() {
        let png = noise_png(512, 512);
        let budget = 60 * 1024;
        let first = fit_bytes(&png, budget).unwrap();
        let second = fit_bytes(&png, budget).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exhausted_ladder_reports_achieved_size() {
        let png = noise_png(64, 64);
        let budget = 50; // unreachable even at the bottom of the ladder
        match fit_bytes(&png, budget) {
            Err(FitError::BudgetExceeded { achieved, budget: b }) => {
                assert!(achieved > budget);
                assert_eq!(b, budget);
            }
            other => panic!("expected BudgetExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_base64_input_over_budget_is_reencoded() {
        let png = noise_png(512, 512);
        let payload = STANDARD.encode(&png);
        let budget = 60 * 1024;

        let fitted = fit(&payload, budget).unwrap();
        assert!(fitted.decoded_len <= budget);
        assert!(fitted.ladder_steps >= 1);
    }
}
