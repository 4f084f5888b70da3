//! Binary PGM codec and pixel helpers.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::VideoPixelFormat;

/// `P5\n<w> <h>\n<max>\n`
pub fn pgm_header(width: u32, height: u32, max_value: u16) -> String {
    format!("P5\n{} {}\n{}\n", width, height, max_value)
}

pub fn encode_gray8(width: u32, height: u32, pixels: &[u8]) -> Bytes {
    let header = pgm_header(width, height, u8::MAX as u16);
    let mut buf = BytesMut::with_capacity(header.len() + pixels.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(pixels);
    buf.freeze()
}

/// 16-bit samples are written big-endian.
pub fn encode_gray16(width: u32, height: u32, pixels: &[u16]) -> Bytes {
    let header = pgm_header(width, height, u16::MAX);
    let mut buf = BytesMut::with_capacity(header.len() + pixels.len() * 2);
    buf.put_slice(header.as_bytes());
    for &value in pixels {
        buf.put_u16(value);
    }
    buf.freeze()
}

/// Decoded PGM image; samples widened to `u16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pgm {
    pub width: u32,
    pub height: u32,
    pub max_value: u16,
    pub samples: Vec<u16>,
}

/// Parses the subset produced by this module (no comments, single whitespace).
pub fn decode_pgm(data: &[u8]) -> Option<Pgm> {
    let mut fields = Vec::with_capacity(4);
    let mut cursor = 0;
    while fields.len() < 4 {
        let rest = data.get(cursor..)?;
        let len = rest.iter().position(|b| b.is_ascii_whitespace())?;
        fields.push(std::str::from_utf8(&rest[..len]).ok()?);
        cursor += len + 1;
    }
    if fields[0] != "P5" {
        return None;
    }
    let width: u32 = fields[1].parse().ok()?;
    let height: u32 = fields[2].parse().ok()?;
    let max_value: u16 = fields[3].parse().ok()?;

    let count = width as usize * height as usize;
    let body = data.get(cursor..)?;
    let samples = if max_value > u8::MAX as u16 {
        if body.len() != count * 2 {
            return None;
        }
        body.chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    } else {
        if body.len() != count {
            return None;
        }
        body.iter().map(|&b| u16::from(b)).collect()
    };

    Some(Pgm {
        width,
        height,
        max_value,
        samples,
    })
}

/// Row `y` swaps with row `rows - 1 - y`.
pub fn flip_vertical_in_place(data: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = data.len() / row_bytes;
    for y in 0..rows / 2 {
        let (top, bottom) = data.split_at_mut((rows - 1 - y) * row_bytes);
        top[y * row_bytes..(y + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
}

/// Converts a source frame into BGRA8, reusing `out` when its length already fits.
pub fn convert_to_bgra(format: VideoPixelFormat, src: &[u8], out: &mut Vec<u8>) {
    let pixels = src.len() / format.bytes_per_pixel();
    out.resize(pixels * 4, 0);
    match format {
        VideoPixelFormat::Bgra8 => out.copy_from_slice(&src[..pixels * 4]),
        VideoPixelFormat::Rgba8 => {
            for (dst, px) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                dst.copy_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        VideoPixelFormat::Gray8 => {
            for (dst, &g) in out.chunks_exact_mut(4).zip(src) {
                dst.copy_from_slice(&[g, g, g, u8::MAX]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray8_layout() {
        let encoded = encode_gray8(2, 1, &[3, 250]);
        assert_eq!(&encoded[..], b"P5\n2 1\n255\n\x03\xfa");
    }

    #[test]
    fn test_gray16_is_big_endian() {
        let encoded = encode_gray16(1, 2, &[0x0102, 500]);
        let header = b"P5\n1 2\n65535\n";
        assert_eq!(&encoded[..header.len()], header);
        assert_eq!(&encoded[header.len()..], &[0x01, 0x02, 0x01, 0xF4]);

        let decoded = decode_pgm(&encoded).unwrap();
        assert_eq!(decoded.samples, vec![0x0102, 500]);
        assert_eq!(decoded.max_value, 65535);
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let mut encoded = encode_gray8(2, 2, &[1, 2, 3, 4]).to_vec();
        encoded.pop();
        assert!(decode_pgm(&encoded).is_none());
        assert!(decode_pgm(b"P6\n1 1\n255\n\x00").is_none());
    }

    #[test]
    fn test_flip_vertical() {
        let mut data = vec![1, 1, 2, 2, 3, 3];
        flip_vertical_in_place(&mut data, 2);
        assert_eq!(data, vec![3, 3, 2, 2, 1, 1]);

        let mut even = vec![1, 2, 3, 4];
        flip_vertical_in_place(&mut even, 1);
        assert_eq!(even, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_bgra_conversion() {
        let mut out = Vec::new();
        convert_to_bgra(VideoPixelFormat::Rgba8, &[10, 20, 30, 40], &mut out);
        assert_eq!(out, vec![30, 20, 10, 40]);

        convert_to_bgra(VideoPixelFormat::Gray8, &[7, 9], &mut out);
        assert_eq!(out, vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }
}
