//! Chunk compression. Thin wrapper so the rest of the crate depends on a
//! named transform, not directly on `zstd`'s API surface.

use crate::error::EnvelopeError;

pub fn compress(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(data, 0).expect("in-memory zstd encode is infallible")
}

pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, EnvelopeError> {
    let out = zstd::decode_all(data).map_err(|_| EnvelopeError::Corruption)?;
    if out.len() != expected_len {
        return Err(EnvelopeError::Corruption);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let c = compress(&data);
        let d = decompress(&c, data.len()).unwrap();
        assert_eq!(d, data);
    }

    #[test]
    fn wrong_expected_len_is_corruption() {
        let data = b"hello world".to_vec();
        let c = compress(&data);
        assert!(matches!(decompress(&c, data.len() + 1), Err(EnvelopeError::Corruption)));
    }
}
