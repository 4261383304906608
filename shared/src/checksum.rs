/// Folds `payload` into a single byte by XOR, starting from `seed`.
///
/// The credential record keeps this over every byte that precedes the checksum
/// field. It detects torn writes and single-bit rot; it is not a MAC.
pub fn xor_checksum(seed: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(seed, |acc, byte| acc ^ byte)
}

#[cfg(test)]
mod tests {
    use super::xor_checksum;

    #[test]
    fn folds_every_byte() {
        assert_eq!(xor_checksum(0, &[]), 0);
        assert_eq!(xor_checksum(0, &[0xA5]), 0xA5);
        assert_eq!(xor_checksum(0, &[0xA5, 0x01, 0x04]), 0xA5 ^ 0x01 ^ 0x04);
    }

    #[test]
    fn continues_from_seed() {
        let whole = xor_checksum(0, b"fingerprint");
        let (head, tail) = b"fingerprint".split_at(6);
        assert_eq!(xor_checksum(xor_checksum(0, head), tail), whole);
    }

    #[test]
    fn single_bit_flip_changes_result() {
        let data = [0x10u8, 0x20, 0x30, 0x40];
        let reference = xor_checksum(0, &data);
        for index in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[index] ^= 1 << bit;
                assert_ne!(xor_checksum(0, &flipped), reference);
            }
        }
    }
}
