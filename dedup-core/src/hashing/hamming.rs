/// Hamming distance between two 64-bit perceptual hashes.
pub fn distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_hashes_have_zero_distance() {
        assert_eq!(distance(0xFF00, 0xFF00), 0);
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(distance(0b1010, 0b0101), 4);
    }
}
