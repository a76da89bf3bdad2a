pub type Hash32 = [u8; 32];

/// Hash a blob of data with blake3.
pub fn hash(data: &[u8]) -> Hash32 {
    *blake3::hash(data).as_bytes()
}
