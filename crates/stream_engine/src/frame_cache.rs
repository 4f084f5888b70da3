//! FrameCache - 最新帧缓存
//!
//! 单槽位、最新值优先：发布覆盖旧帧，消费者只会看到最近一帧。
//! 时间戳门控：与上一次接受的时间戳相同的帧被静默丢弃。

use std::sync::Arc;

use contracts::{AbsoluteTicks, FrameHeader, FrameRecord, PixelBuffer};
use parking_lot::Mutex;

#[derive(Default)]
struct Slot {
    frame: Option<Arc<FrameRecord>>,
    last_timestamp: Option<AbsoluteTicks>,
    new_available: bool,
}

/// 线程安全的单帧缓存
#[derive(Default)]
pub struct FrameCache {
    slot: Mutex<Slot>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布一帧；时间戳与上一帧相同则返回 `false` 且缓存不变
    pub fn publish(&self, record: FrameRecord) -> bool {
        let mut slot = self.slot.lock();
        if slot.last_timestamp == Some(record.header.timestamp) {
            return false;
        }
        slot.last_timestamp = Some(record.header.timestamp);
        slot.frame = Some(Arc::new(record));
        slot.new_available = true;
        true
    }

    /// 发布一帧，尺寸不变且无其他持有者时复用已有缓冲区
    pub fn publish_from(&self, header: FrameHeader, pixels: &PixelBuffer) -> bool {
        let mut slot = self.slot.lock();
        if slot.last_timestamp == Some(header.timestamp) {
            return false;
        }
        slot.last_timestamp = Some(header.timestamp);

        let reused = match slot.frame.as_mut() {
            Some(frame) => {
                let record = Arc::make_mut(frame);
                if record.pixels.copy_from(pixels) {
                    record.header = header;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if !reused {
            slot.frame = Some(Arc::new(FrameRecord {
                header,
                pixels: pixels.clone(),
            }));
        }
        slot.new_available = true;
        true
    }

    /// 取出最新帧的深拷贝并清除新帧标志；无新帧时返回 `None`
    pub fn consume(&self) -> Option<FrameRecord> {
        let mut slot = self.slot.lock();
        if !slot.new_available {
            return None;
        }
        let record = slot.frame.as_deref().cloned()?;
        slot.new_available = false;
        Some(record)
    }

    /// 在锁内读取最新帧；闭包返回 `true` 时清除新帧标志
    ///
    /// 不检查新帧标志，可重复读取同一帧。
    pub fn read_latest<F>(&self, read: F) -> bool
    where
        F: FnOnce(&FrameRecord) -> bool,
    {
        let mut slot = self.slot.lock();
        let Some(frame) = slot.frame.as_deref() else {
            return false;
        };
        let taken = read(frame);
        if taken {
            slot.new_available = false;
        }
        taken
    }

    /// 共享引用，不影响新帧标志（写线程使用）
    pub fn snapshot(&self) -> Option<Arc<FrameRecord>> {
        self.slot.lock().frame.clone()
    }

    pub fn is_new_available(&self) -> bool {
        self.slot.lock().new_available
    }

    pub fn width(&self) -> u32 {
        self.slot.lock().frame.as_ref().map_or(0, |f| f.header.width)
    }

    pub fn height(&self) -> u32 {
        self.slot.lock().frame.as_ref().map_or(0, |f| f.header.height)
    }

    /// 像素缓冲区字节数，无帧时为 0
    pub fn size(&self) -> usize {
        self.slot.lock().frame.as_ref().map_or(0, |f| f.pixels.byte_len())
    }

    pub fn last_timestamp(&self) -> Option<AbsoluteTicks> {
        self.slot.lock().last_timestamp
    }

    pub fn clear(&self) {
        *self.slot.lock() = Slot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RigPose;

    fn record(ts: u64, fill: u8) -> FrameRecord {
        FrameRecord {
            header: FrameHeader {
                timestamp: AbsoluteTicks(ts),
                pose: RigPose::identity(),
                intrinsics: None,
                width: 2,
                height: 2,
            },
            pixels: PixelBuffer::Gray8(vec![fill; 4]),
        }
    }

    #[test]
    fn test_empty_cache() {
        let cache = FrameCache::new();
        assert!(cache.consume().is_none());
        assert!(!cache.is_new_available());
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.width(), 0);
        assert!(cache.last_timestamp().is_none());
    }

    #[test]
    fn test_latest_value_wins() {
        let cache = FrameCache::new();
        for ts in 1..=5 {
            assert!(cache.publish(record(ts, ts as u8)));
        }
        assert!(cache.is_new_available());

        let frame = cache.consume().unwrap();
        assert_eq!(frame.timestamp(), AbsoluteTicks(5));
        assert_eq!(frame.pixels, PixelBuffer::Gray8(vec![5; 4]));
        assert!(!cache.is_new_available());
        assert!(cache.consume().is_none());
    }

    #[test]
    fn test_duplicate_timestamp_has_no_effect() {
        let cache = FrameCache::new();
        assert!(cache.publish(record(10, 1)));
        let first = cache.consume().unwrap();

        assert!(!cache.publish(record(10, 99)));
        assert!(!cache.is_new_available());
        assert!(cache.consume().is_none());

        let mut seen = None;
        cache.read_latest(|frame| {
            seen = Some(frame.clone());
            false
        });
        assert_eq!(seen.unwrap(), first);
    }

    #[test]
    fn test_publish_from_reuses_buffer_of_same_shape() {
        let cache = FrameCache::new();
        let first = record(1, 1);
        assert!(cache.publish_from(first.header, &first.pixels));

        let second = record(2, 2);
        assert!(cache.publish_from(second.header, &second.pixels));
        assert_eq!(cache.consume().unwrap(), second);

        let mut wider = record(3, 3);
        wider.header.width = 4;
        wider.pixels = PixelBuffer::Gray8(vec![3; 8]);
        assert!(cache.publish_from(wider.header, &wider.pixels));
        assert_eq!(cache.size(), 8);
        assert_eq!(cache.width(), 4);
    }

    #[test]
    fn test_snapshot_survives_overwrite() {
        let cache = FrameCache::new();
        cache.publish(record(1, 1));
        let held = cache.snapshot().unwrap();

        let next = record(2, 2);
        cache.publish_from(next.header, &next.pixels);
        assert_eq!(held.pixels, PixelBuffer::Gray8(vec![1; 4]));
        assert!(cache.is_new_available());
    }

    #[test]
    fn test_read_latest_clears_flag_only_when_taken() {
        let cache = FrameCache::new();
        assert!(!cache.read_latest(|_| true));

        cache.publish(record(1, 1));
        assert!(!cache.read_latest(|_| false));
        assert!(cache.is_new_available());
        assert!(cache.read_latest(|_| true));
        assert!(!cache.is_new_available());

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.publish(record(1, 1)));
    }
}
