//! ZKIM container wire format (little-endian, matching §6 exactly).
//!
//! ```text
//! Header:  magic[4]="ZKIM" | ver u16 | flags u32 | platformKeyId len u16 + utf8
//!          userId len u16 + utf8 | fileId len u16 + utf8 | createdAt u64
//!          chunkCount u32 | totalSize u64 | compType u8 | encType u8
//!          hashType u8 | sigType u8
//! Chunks:  chunkIndex u32 | chunkSize u32 | compressedSize u32
//!          encryptedSize u32 | nonce[24] | encryptedData[encryptedSize]
//!          integrityHash[32] | paddingLen u16 | padding[paddingLen]
//! Trailer: platformEncrypted len u32 + bytes | userEncrypted len u32 + bytes
//!          metadata len u32 + canonical-json bytes
//!          platformSig[64] | userSig[64] | contentSig[64]
//! ```
//!
//! Every multi-byte integer is little-endian; this module only knows about
//! bytes and offsets, it has no opinion on what the ciphertexts mean.

use std::convert::TryInto;

use crate::error::EnvelopeError;
use crate::types::{
    CompressionType, EncryptionType, FileMetadata, HashType, SignatureType, ZkimFile,
    ZkimFileChunk, ZkimFileHeader, MAGIC,
};

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn put_lp_str(out: &mut Vec<u8>, s: &str) {
    put_u16(out, s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}
fn put_lp_bytes_u32(out: &mut Vec<u8>, b: &[u8]) {
    put_u32(out, b.len() as u32);
    out.extend_from_slice(b);
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.pos + n > self.data.len() {
            return Err(EnvelopeError::Corruption);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, EnvelopeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, EnvelopeError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, EnvelopeError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, EnvelopeError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn lp_str(&mut self) -> Result<String, EnvelopeError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EnvelopeError::Corruption)
    }

    fn lp_bytes_u32(&mut self) -> Result<Vec<u8>, EnvelopeError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn array24(&mut self) -> Result<[u8; 24], EnvelopeError> {
        Ok(self.take(24)?.try_into().unwrap())
    }

    fn array32(&mut self) -> Result<[u8; 32], EnvelopeError> {
        Ok(self.take(32)?.try_into().unwrap())
    }

    fn array64(&mut self) -> Result<[u8; 64], EnvelopeError> {
        Ok(self.take(64)?.try_into().unwrap())
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn encode_header(out: &mut Vec<u8>, h: &ZkimFileHeader) {
    out.extend_from_slice(&MAGIC);
    put_u16(out, h.version);
    put_u32(out, h.flags);
    put_lp_str(out, &h.platform_key_id);
    put_lp_str(out, &h.user_id);
    put_lp_str(out, &h.file_id);
    put_u64(out, h.created_at);
    put_u32(out, h.chunk_count);
    put_u64(out, h.total_size);
    out.push(h.compression as u8);
    out.push(h.encryption as u8);
    out.push(h.hash as u8);
    out.push(h.signature as u8);
}

fn decode_header(c: &mut Cursor<'_>) -> Result<ZkimFileHeader, EnvelopeError> {
    let magic = c.take(4)?;
    if magic != MAGIC {
        return Err(EnvelopeError::Corruption);
    }
    let version = c.u16()?;
    let flags = c.u32()?;
    let platform_key_id = c.lp_str()?;
    let user_id = c.lp_str()?;
    let file_id = c.lp_str()?;
    let created_at = c.u64()?;
    let chunk_count = c.u32()?;
    let total_size = c.u64()?;
    let compression = CompressionType::try_from(c.u8()?)?;
    let encryption = EncryptionType::try_from(c.u8()?)?;
    let hash = HashType::try_from(c.u8()?)?;
    let signature = SignatureType::try_from(c.u8()?)?;

    Ok(ZkimFileHeader {
        version,
        flags,
        platform_key_id,
        user_id,
        file_id,
        created_at,
        chunk_count,
        total_size,
        compression,
        encryption,
        hash,
        signature,
    })
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

fn encode_chunk(out: &mut Vec<u8>, chunk: &ZkimFileChunk) {
    put_u32(out, chunk.index);
    put_u32(out, chunk.chunk_size);
    put_u32(out, chunk.compressed_size);
    put_u32(out, chunk.encrypted_size);
    out.extend_from_slice(&chunk.nonce);
    out.extend_from_slice(&chunk.encrypted_data);
    out.extend_from_slice(&chunk.integrity_hash);
    put_u16(out, chunk.padding.len() as u16);
    out.extend_from_slice(&chunk.padding);
}

fn decode_chunk(c: &mut Cursor<'_>) -> Result<ZkimFileChunk, EnvelopeError> {
    let index = c.u32()?;
    let chunk_size = c.u32()?;
    let compressed_size = c.u32()?;
    let encrypted_size = c.u32()?;
    let nonce = c.array24()?;
    let encrypted_data = c.take(encrypted_size as usize)?.to_vec();
    let integrity_hash = c.array32()?;
    let padding_len = c.u16()? as usize;
    let padding = c.take(padding_len)?.to_vec();

    Ok(ZkimFileChunk {
        index,
        chunk_size,
        compressed_size,
        encrypted_size,
        nonce,
        encrypted_data,
        integrity_hash,
        padding,
    })
}

// ---------------------------------------------------------------------------
// Trailer
// ---------------------------------------------------------------------------

fn encode_trailer(
    out: &mut Vec<u8>,
    platform_encrypted: &[u8],
    user_encrypted: &[u8],
    metadata: &FileMetadata,
    platform_sig: &[u8; 64],
    user_sig: &[u8; 64],
    content_sig: &[u8; 64],
) -> Result<(), EnvelopeError> {
    put_lp_bytes_u32(out, platform_encrypted);
    put_lp_bytes_u32(out, user_encrypted);
    let metadata_json =
        serde_json::to_vec(metadata).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
    put_lp_bytes_u32(out, &metadata_json);
    out.extend_from_slice(platform_sig);
    out.extend_from_slice(user_sig);
    out.extend_from_slice(content_sig);
    Ok(())
}

#[allow(clippy::type_complexity)]
fn decode_trailer(
    c: &mut Cursor<'_>,
) -> Result<(Vec<u8>, Vec<u8>, FileMetadata, [u8; 64], [u8; 64], [u8; 64]), EnvelopeError> {
    let platform_encrypted = c.lp_bytes_u32()?;
    let user_encrypted = c.lp_bytes_u32()?;
    let metadata_json = c.lp_bytes_u32()?;
    let metadata: FileMetadata =
        serde_json::from_slice(&metadata_json).map_err(|_| EnvelopeError::Corruption)?;
    let platform_sig = c.array64()?;
    let user_sig = c.array64()?;
    let content_sig = c.array64()?;
    Ok((platform_encrypted, user_encrypted, metadata, platform_sig, user_sig, content_sig))
}

// ---------------------------------------------------------------------------
// Whole-file encode/decode
// ---------------------------------------------------------------------------

pub fn encode_zkim_file(file: &ZkimFile) -> Result<Vec<u8>, EnvelopeError> {
    let mut out = Vec::new();
    encode_header(&mut out, &file.header);
    for chunk in &file.chunks {
        encode_chunk(&mut out, chunk);
    }
    encode_trailer(
        &mut out,
        &file.platform_encrypted,
        &file.user_encrypted,
        &file.metadata,
        &file.platform_signature,
        &file.user_signature,
        &file.content_signature,
    )?;
    Ok(out)
}

pub fn decode_zkim_file(data: &[u8]) -> Result<ZkimFile, EnvelopeError> {
    let mut c = Cursor::new(data);
    let header = decode_header(&mut c)?;
    let mut chunks = Vec::with_capacity(header.chunk_count as usize);
    for _ in 0..header.chunk_count {
        chunks.push(decode_chunk(&mut c)?);
    }
    let (platform_encrypted, user_encrypted, metadata, platform_signature, user_signature, content_signature) =
        decode_trailer(&mut c)?;

    let file = ZkimFile {
        header,
        chunks,
        metadata,
        platform_encrypted,
        user_encrypted,
        platform_signature,
        user_signature,
        content_signature,
    };
    file.validate()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_file() -> ZkimFile {
        let header = ZkimFileHeader {
            version: crate::types::VERSION,
            flags: 0,
            platform_key_id: "platform-1".into(),
            user_id: "user-1".into(),
            file_id: "file-1".into(),
            created_at: 1_700_000_000_000,
            chunk_count: 1,
            total_size: 5,
            compression: CompressionType::Zstd,
            encryption: EncryptionType::XChaCha20Poly1305,
            hash: HashType::Blake2b,
            signature: SignatureType::None,
        };
        let chunk = ZkimFileChunk {
            index: 0,
            chunk_size: 5,
            compressed_size: 5,
            encrypted_size: 5,
            nonce: [1u8; 24],
            encrypted_data: vec![9, 9, 9, 9, 9],
            integrity_hash: [2u8; 32],
            padding: vec![],
        };
        ZkimFile {
            header,
            chunks: vec![chunk],
            metadata: FileMetadata {
                file_name: "hello.txt".into(),
                user_id: "user-1".into(),
                mime_type: Some("text/plain".into()),
                created_at: 1_700_000_000_000,
                tags: vec!["greeting".into()],
                custom_fields: HashMap::new(),
                access_control: None,
            },
            platform_encrypted: vec![3u8; 10],
            user_encrypted: vec![4u8; 12],
            platform_signature: [0u8; 64],
            user_signature: [0u8; 64],
            content_signature: [0u8; 64],
        }
    }

    #[test]
    fn roundtrip() {
        let file = sample_file();
        let bytes = encode_zkim_file(&file).unwrap();
        let decoded = decode_zkim_file(&bytes).unwrap();
        assert_eq!(decoded.header.file_id, "file-1");
        assert_eq!(decoded.chunks.len(), 1);
        assert_eq!(decoded.chunks[0].encrypted_data, vec![9, 9, 9, 9, 9]);
        assert_eq!(decoded.metadata.file_name, "hello.txt");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_zkim_file(&sample_file()).unwrap();
        bytes[0] = b'X';
        assert!(decode_zkim_file(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = encode_zkim_file(&sample_file()).unwrap();
        assert!(decode_zkim_file(&bytes[..bytes.len() - 5]).is_err());
    }

    #[test]
    fn rejects_chunk_count_mismatch() {
        let mut file = sample_file();
        file.header.chunk_count = 2;
        let bytes = encode_zkim_file(&file);
        // encoding itself doesn't validate; decoding must catch it
        if let Ok(bytes) = bytes {
            assert!(decode_zkim_file(&bytes).is_err());
        }
    }
}
