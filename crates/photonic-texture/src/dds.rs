//! DDS container for BC3 textures.
//!
//! Files are the 4-byte magic `"DDS "`, a 124-byte header with a 32-byte
//! pixel format carrying fourCC `DXT5`, then the block payload. A single
//! mip level is written.

use crate::bc3::{Bc3Block, CompressedTexture, BLOCK_BYTES};
use crate::error::{MapError, Result};

pub const DDS_MAGIC: [u8; 4] = *b"DDS ";
pub const FOURCC_DXT5: [u8; 4] = *b"DXT5";
/// Magic plus header.
pub const DDS_HEADER_LEN: usize = 128;

const HEADER_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_LINEARSIZE: u32 = 0x8_0000;
const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS_TEXTURE: u32 = 0x1000;

/// Fields of a DDS header that this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdsHeader {
    pub width: u32,
    pub height: u32,
    /// Size of the top-level block payload in bytes.
    pub linear_size: u32,
    pub mip_map_count: u32,
    pub fourcc: [u8; 4],
}

impl DdsHeader {
    /// Header for a single-level DXT5 texture.
    pub fn dxt5(width: u32, height: u32) -> Self {
        let blocks = width.div_ceil(4) * height.div_ceil(4);
        Self {
            width,
            height,
            linear_size: blocks * BLOCK_BYTES as u32,
            mip_map_count: 1,
            fourcc: FOURCC_DXT5,
        }
    }

    /// Magic and header, little endian.
    pub fn to_bytes(&self) -> [u8; DDS_HEADER_LEN] {
        let mut out = [0u8; DDS_HEADER_LEN];
        out[0..4].copy_from_slice(&DDS_MAGIC);

        let mut put = |offset: usize, value: u32| {
            out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        };
        put(4, HEADER_SIZE);
        put(
            8,
            DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_LINEARSIZE,
        );
        put(12, self.height);
        put(16, self.width);
        put(20, self.linear_size);
        put(24, 0); // depth
        put(28, self.mip_map_count);
        // 11 reserved dwords at 32..76
        put(76, PIXEL_FORMAT_SIZE);
        put(80, DDPF_FOURCC);
        put(88, 0); // rgb bit count
        // channel masks 92..108 stay zero
        put(108, DDSCAPS_TEXTURE);
        // caps2..caps4 and reserved2 at 112..128 stay zero

        out[84..88].copy_from_slice(&self.fourcc);
        out
    }

    /// Parse the magic and header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DDS_HEADER_LEN {
            return Err(MapError::UnsupportedFormat(format!(
                "DDS data is {} bytes, header needs {}",
                bytes.len(),
                DDS_HEADER_LEN
            )));
        }
        if bytes[0..4] != DDS_MAGIC {
            return Err(MapError::UnsupportedFormat("missing DDS magic".into()));
        }
        let read = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        if read(4) != HEADER_SIZE || read(76) != PIXEL_FORMAT_SIZE {
            return Err(MapError::UnsupportedFormat(
                "unexpected DDS header size".into(),
            ));
        }
        if read(80) & DDPF_FOURCC == 0 {
            return Err(MapError::UnsupportedFormat(
                "uncompressed DDS pixel formats are not supported".into(),
            ));
        }

        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&bytes[84..88]);
        Ok(Self {
            height: read(12),
            width: read(16),
            linear_size: read(20),
            mip_map_count: read(28),
            fourcc,
        })
    }
}

/// Serialize a compressed texture as a complete DDS file.
pub fn encode_dds(texture: &CompressedTexture) -> Vec<u8> {
    let header = DdsHeader::dxt5(texture.width, texture.height);
    let mut out = Vec::with_capacity(DDS_HEADER_LEN + texture.linear_size());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&texture.block_bytes());
    out
}

/// Parse a DXT5 DDS file back into its top-level blocks.
pub fn decode_dds(bytes: &[u8]) -> Result<CompressedTexture> {
    let header = DdsHeader::parse(bytes)?;
    if header.fourcc != FOURCC_DXT5 {
        return Err(MapError::UnsupportedFormat(format!(
            "fourCC {:?} is not DXT5",
            String::from_utf8_lossy(&header.fourcc)
        )));
    }

    let blocks_len = header.width.div_ceil(4) as usize * header.height.div_ceil(4) as usize;
    let payload = &bytes[DDS_HEADER_LEN..];
    if payload.len() < blocks_len * BLOCK_BYTES {
        return Err(MapError::UnsupportedFormat(format!(
            "DDS payload is {} bytes, {}x{} needs {}",
            payload.len(),
            header.width,
            header.height,
            blocks_len * BLOCK_BYTES
        )));
    }

    let blocks = payload[..blocks_len * BLOCK_BYTES]
        .chunks_exact(BLOCK_BYTES)
        .map(|chunk| {
            let mut block = [0u8; BLOCK_BYTES];
            block.copy_from_slice(chunk);
            Bc3Block(block)
        })
        .collect();
    CompressedTexture::from_blocks(header.width, header.height, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dword(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn header_layout() {
        let bytes = DdsHeader::dxt5(6, 6).to_bytes();
        assert_eq!(&bytes[0..4], b"DDS ");
        assert_eq!(dword(&bytes, 4), 124);
        assert_eq!(dword(&bytes, 8), 0x1 | 0x2 | 0x4 | 0x1000 | 0x8_0000);
        assert_eq!(dword(&bytes, 12), 6);
        assert_eq!(dword(&bytes, 16), 6);
        assert_eq!(dword(&bytes, 20), 4 * 16);
        assert_eq!(dword(&bytes, 28), 1);
        assert_eq!(dword(&bytes, 76), 32);
        assert_eq!(dword(&bytes, 80), 0x4);
        assert_eq!(&bytes[84..88], b"DXT5");
        assert_eq!(dword(&bytes, 108), 0x1000);
        assert!(bytes[112..128].iter().all(|&b| b == 0));
    }

    #[test]
    fn header_parses_back() {
        let header = DdsHeader::dxt5(130, 17);
        assert_eq!(DdsHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn file_round_trips_blocks() {
        let mut blocks = Vec::new();
        for i in 0..6u8 {
            blocks.push(Bc3Block([i; BLOCK_BYTES]));
        }
        let texture = CompressedTexture::from_blocks(12, 8, blocks).unwrap();
        let bytes = encode_dds(&texture);
        assert_eq!(bytes.len(), DDS_HEADER_LEN + 6 * BLOCK_BYTES);
        assert_eq!(decode_dds(&bytes).unwrap(), texture);
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut bytes = DdsHeader::dxt5(4, 4).to_bytes().to_vec();
        assert!(matches!(
            decode_dds(&bytes),
            Err(MapError::UnsupportedFormat(_))
        ));
        bytes.extend_from_slice(&[0; BLOCK_BYTES]);
        assert!(decode_dds(&bytes).is_ok());
        bytes[0] = b'X';
        assert!(matches!(
            DdsHeader::parse(&bytes),
            Err(MapError::UnsupportedFormat(_))
        ));
    }
}
