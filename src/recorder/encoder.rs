//! Chunk encoding
//!
//! Every chunk carries one encoded frame behind a fixed 28-byte header:
//!
//! ```text
//! magic "OVRF" | encoding u8 | reserved [u8; 3] | width u32 | height u32 | pts_ms u64 | payload_len u32
//! ```
//!
//! All integers are little-endian. An artifact is the plain concatenation of
//! its chunks, so it can be decoded front to back.

use crate::capture::frame::Frame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHUNK_MAGIC: [u8; 4] = *b"OVRF";
pub const CHUNK_HEADER_LEN: usize = 28;

/// File extension for finalized artifacts
pub const ARTIFACT_EXTENSION: &str = "ovr";

/// Payload encoding for recorded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkEncoding {
    #[default]
    Png,
    Raw,
}

impl ChunkEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ChunkEncoding::Png => "video/x-ovr; codec=png",
            ChunkEncoding::Raw => "video/x-ovr; codec=rgba",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ChunkEncoding::Png => 1,
            ChunkEncoding::Raw => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ChunkEncoding::Png),
            2 => Some(ChunkEncoding::Raw),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("PNG encode error: {0}")]
    PngEncode(#[from] png::EncodingError),

    #[error("PNG decode error: {0}")]
    PngDecode(#[from] png::DecodingError),

    #[error("Unsupported PNG color type: {0:?}")]
    UnsupportedColor(png::ColorType),

    #[error("Truncated chunk at byte {0}")]
    Truncated(usize),

    #[error("Bad chunk magic at byte {0}")]
    BadMagic(usize),

    #[error("Unknown encoding tag {0}")]
    UnknownEncoding(u8),

    #[error("Payload does not match {width}x{height}")]
    SizeMismatch { width: u32, height: u32 },
}

/// A frame recovered from an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub pts_ms: u64,
    pub encoding: ChunkEncoding,
    pub frame: Frame,
}

/// Encode one frame into a self-describing chunk
pub fn encode_chunk(frame: &Frame, pts_ms: u64, encoding: ChunkEncoding) -> Result<Vec<u8>, EncodeError> {
    let payload = match encoding {
        ChunkEncoding::Png => encode_png(frame)?,
        ChunkEncoding::Raw => frame.data.clone(),
    };

    let mut chunk = Vec::with_capacity(CHUNK_HEADER_LEN + payload.len());
    chunk.extend_from_slice(&CHUNK_MAGIC);
    chunk.push(encoding.tag());
    chunk.extend_from_slice(&[0; 3]);
    chunk.extend_from_slice(&frame.width.to_le_bytes());
    chunk.extend_from_slice(&frame.height.to_le_bytes());
    chunk.extend_from_slice(&pts_ms.to_le_bytes());
    chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&payload);
    Ok(chunk)
}

/// Split an artifact back into frames, in recorded order
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<DecodedFrame>, EncodeError> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let header = bytes
            .get(offset..offset + CHUNK_HEADER_LEN)
            .ok_or(EncodeError::Truncated(offset))?;
        if header[0..4] != CHUNK_MAGIC {
            return Err(EncodeError::BadMagic(offset));
        }

        let encoding = ChunkEncoding::from_tag(header[4]).ok_or(EncodeError::UnknownEncoding(header[4]))?;
        let width = read_u32(&header[8..12]);
        let height = read_u32(&header[12..16]);
        let pts_ms = u64::from_le_bytes(header[16..24].try_into().unwrap_or_default());
        let payload_len = read_u32(&header[24..28]) as usize;

        let start = offset + CHUNK_HEADER_LEN;
        let payload = bytes
            .get(start..start + payload_len)
            .ok_or(EncodeError::Truncated(start))?;

        let frame = match encoding {
            ChunkEncoding::Png => decode_png(payload)?,
            ChunkEncoding::Raw => Frame::new(width, height, payload.to_vec())
                .ok_or(EncodeError::SizeMismatch { width, height })?,
        };
        if frame.width != width || frame.height != height {
            return Err(EncodeError::SizeMismatch { width, height });
        }

        frames.push(DecodedFrame {
            pts_ms,
            encoding,
            frame,
        });
        offset = start + payload_len;
    }

    Ok(frames)
}

/// Encode a frame as a standalone RGBA PNG image
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&frame.data)?;
        writer.finish()?;
    }
    Ok(out)
}

fn decode_png(bytes: &[u8]) -> Result<Frame, EncodeError> {
    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info()?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    let data = match info.color_type {
        png::ColorType::Rgba => buf[..info.buffer_size()].to_vec(),
        png::ColorType::Rgb => {
            let rgb = &buf[..info.buffer_size()];
            let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
            for px in rgb.chunks(3) {
                rgba.extend_from_slice(px);
                rgba.push(255);
            }
            rgba
        }
        other => return Err(EncodeError::UnsupportedColor(other)),
    };

    Frame::new(info.width, info.height, data).ok_or(EncodeError::SizeMismatch {
        width: info.width,
        height: info.height,
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, (x + y) as u8, 255]);
            }
        }
        Frame::new(width, height, data).unwrap()
    }

    #[test]
    fn test_png_chunks_decode_in_order() {
        let mut artifact = Vec::new();
        for pts in [0u64, 10, 20] {
            let frame = Frame::filled(4, 3, [pts as u8, 0, 0, 255]);
            artifact.extend(encode_chunk(&frame, pts, ChunkEncoding::Png).unwrap());
        }

        let frames = decode_frames(&artifact).unwrap();
        let pts: Vec<u64> = frames.iter().map(|f| f.pts_ms).collect();
        assert_eq!(pts, vec![0, 10, 20]);
        assert_eq!(frames[2].frame.pixel(0, 0), Some([20, 0, 0, 255]));
    }

    #[test]
    fn test_raw_chunk_preserves_pixels() {
        let frame = gradient(5, 4);
        let chunk = encode_chunk(&frame, 7, ChunkEncoding::Raw).unwrap();
        assert_eq!(chunk.len(), CHUNK_HEADER_LEN + frame.data.len());

        let decoded = decode_frames(&chunk).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].encoding, ChunkEncoding::Raw);
        assert_eq!(decoded[0].frame, frame);
    }

    #[test]
    fn test_empty_artifact_has_no_frames() {
        assert!(decode_frames(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_and_corrupt_input() {
        let chunk = encode_chunk(&gradient(2, 2), 0, ChunkEncoding::Raw).unwrap();

        let truncated = &chunk[..chunk.len() - 1];
        assert!(matches!(decode_frames(truncated), Err(EncodeError::Truncated(_))));

        let mut corrupt = chunk.clone();
        corrupt[0] = b'X';
        assert!(matches!(decode_frames(&corrupt), Err(EncodeError::BadMagic(0))));
    }
}
