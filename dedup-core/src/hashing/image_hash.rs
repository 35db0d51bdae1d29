use std::path::Path;

use image::imageops::FilterType;
use image::GenericImageView;
use rustdct::DctPlanner;

use crate::error::{DedupError, Result};

use super::hamming;

/// 9x8 so each row yields 8 adjacent-pixel comparisons.
const DHASH_WIDTH: u32 = 9;
const DHASH_HEIGHT: u32 = 8;

/// pHash works on a 32x32 luma sample, keeping only the low-frequency
/// top-left 8x8 block of the DCT.
const PHASH_SAMPLE_SIZE: usize = 32;
const PHASH_KEEP: usize = 8;

/// Row-major difference hash: bit `i` is set when pixel `i` is brighter
/// than pixel `i + 1` in the same row of a 9x8 grayscale resample.
pub fn dhash(path: &Path) -> Result<u64> {
    let image = image::open(path).map_err(DedupError::Image)?;
    let small = image
        .resize_exact(DHASH_WIDTH, DHASH_HEIGHT, FilterType::Triangle)
        .to_luma8();

    let mut hash: u64 = 0;
    let mut bit = 0u32;
    for y in 0..DHASH_HEIGHT {
        for x in 0..DHASH_WIDTH - 1 {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    Ok(hash)
}

/// Perceptual hash via 2D DCT-II over a 32x32 luma sample, keeping the
/// top-left 8x8 low-frequency block (excluding the DC term) compared
/// against their median.
pub fn phash(path: &Path) -> Result<u64> {
    let image = image::open(path).map_err(DedupError::Image)?;
    let small = image
        .resize_exact(
            PHASH_SAMPLE_SIZE as u32,
            PHASH_SAMPLE_SIZE as u32,
            FilterType::Triangle,
        )
        .to_luma8();

    let mut samples: Vec<f32> = small.pixels().map(|p| p.0[0] as f32).collect();
    dct_2d_inplace(&mut samples, PHASH_SAMPLE_SIZE);

    let mut low_freq = Vec::with_capacity(PHASH_KEEP * PHASH_KEEP - 1);
    for y in 0..PHASH_KEEP {
        for x in 0..PHASH_KEEP {
            if x == 0 && y == 0 {
                continue; // DC term carries average brightness, not structure.
            }
            low_freq.push(samples[y * PHASH_SAMPLE_SIZE + x]);
        }
    }

    let median = median_of(&mut low_freq.clone());
    let mut hash: u64 = 0;
    for (bit, value) in low_freq.iter().enumerate().take(64) {
        if *value > median {
            hash |= 1 << bit;
        }
    }
    Ok(hash)
}

fn dct_2d_inplace(samples: &mut [f32], size: usize) {
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(size);

    let mut row = vec![0f32; size];
    for r in 0..size {
        row.copy_from_slice(&samples[r * size..(r + 1) * size]);
        dct.process_dct2(&mut row);
        samples[r * size..(r + 1) * size].copy_from_slice(&row);
    }

    let mut col = vec![0f32; size];
    for c in 0..size {
        for r in 0..size {
            col[r] = samples[r * size + c];
        }
        dct.process_dct2(&mut col);
        for r in 0..size {
            samples[r * size + c] = col[r];
        }
    }
}

fn median_of(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

pub use hamming::distance as hamming_distance;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_handles_even_and_odd_lengths() {
        assert_eq!(median_of(&mut [1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median_of(&mut [1.0, 2.0, 3.0, 4.0]), 2.5);
    }
}
