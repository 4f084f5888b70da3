//! FrameRecord - 帧缓存单元
//!
//! 缓存槽独占持有像素缓冲，消费者与写线程只读取拷贝。

use crate::{AbsoluteTicks, CameraIntrinsics, RigPose};

/// 帧元数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// 绝对时间戳
    pub timestamp: AbsoluteTicks,
    /// 传感器到世界的位姿
    pub pose: RigPose,
    /// 相机内参（仅视频流）
    pub intrinsics: Option<CameraIntrinsics>,
    pub width: u32,
    pub height: u32,
}

/// 像素缓冲（按流类型区分）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    /// 8 位灰度，每像素 1 字节
    Gray8(Vec<u8>),
    /// 深度平面后接主动亮度平面，每像素 2 个 u16
    Depth16(Vec<u16>),
    /// BGRA8，每像素 4 字节
    Bgra8(Vec<u8>),
}

impl PixelBuffer {
    /// 每像素字节数
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelBuffer::Gray8(_) => 1,
            PixelBuffer::Depth16(_) => 4,
            PixelBuffer::Bgra8(_) => 4,
        }
    }

    /// 缓冲字节数
    pub fn byte_len(&self) -> usize {
        match self {
            PixelBuffer::Gray8(data) | PixelBuffer::Bgra8(data) => data.len(),
            PixelBuffer::Depth16(data) => data.len() * 2,
        }
    }

    /// 同类型且同尺寸时原地拷贝，返回是否成功
    pub fn copy_from(&mut self, src: &PixelBuffer) -> bool {
        match (self, src) {
            (PixelBuffer::Gray8(dst), PixelBuffer::Gray8(src))
            | (PixelBuffer::Bgra8(dst), PixelBuffer::Bgra8(src))
                if dst.len() == src.len() =>
            {
                dst.copy_from_slice(src);
                true
            }
            (PixelBuffer::Depth16(dst), PixelBuffer::Depth16(src)) if dst.len() == src.len() => {
                dst.copy_from_slice(src);
                true
            }
            _ => false,
        }
    }
}

/// 缓存的完整帧
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub header: FrameHeader,
    pub pixels: PixelBuffer,
}

impl FrameRecord {
    /// `width * height * bytes_per_pixel`
    pub fn pixel_buffer_size(&self) -> usize {
        self.header.width as usize * self.header.height as usize * self.pixels.bytes_per_pixel()
    }

    /// 缓冲尺寸与宽高一致
    pub fn is_consistent(&self) -> bool {
        self.pixel_buffer_size() == self.pixels.byte_len()
    }

    pub fn timestamp(&self) -> AbsoluteTicks {
        self.header.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(width: u32, height: u32) -> FrameHeader {
        FrameHeader {
            timestamp: AbsoluteTicks(1),
            pose: RigPose::identity(),
            intrinsics: None,
            width,
            height,
        }
    }

    #[test]
    fn test_buffer_size_invariant() {
        let gray = FrameRecord {
            header: header(4, 2),
            pixels: PixelBuffer::Gray8(vec![0; 8]),
        };
        assert_eq!(gray.pixel_buffer_size(), 8);
        assert!(gray.is_consistent());

        let depth = FrameRecord {
            header: header(4, 2),
            pixels: PixelBuffer::Depth16(vec![0; 16]),
        };
        assert_eq!(depth.pixel_buffer_size(), 32);
        assert!(depth.is_consistent());

        let broken = FrameRecord {
            header: header(4, 2),
            pixels: PixelBuffer::Bgra8(vec![0; 8]),
        };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_copy_from_requires_same_shape() {
        let mut dst = PixelBuffer::Gray8(vec![0; 4]);
        assert!(dst.copy_from(&PixelBuffer::Gray8(vec![7; 4])));
        assert_eq!(dst, PixelBuffer::Gray8(vec![7; 4]));
        assert!(!dst.copy_from(&PixelBuffer::Gray8(vec![1; 5])));
        assert!(!dst.copy_from(&PixelBuffer::Bgra8(vec![1; 4])));
    }
}
