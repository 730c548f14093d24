//! 突发合并窗口
//!
//! 高频更新下把密集到达的原始记录合并成一次处理：上次刷新后窗口期内
//! 到达的记录先缓冲，窗口过后一次性刷出；空闲后的第一批立即处理。
//! 只延迟、不丢弃。

use crate::dom::ChangeRecord;
use std::time::{Duration, Instant};

/// 记录突发合并器
pub struct BurstThrottle {
    /// 合并窗口
    window: Duration,
    /// 缓冲中的记录
    buffer: Vec<ChangeRecord>,
    /// 上次刷新时间
    last_flush: Option<Instant>,
}

impl BurstThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buffer: Vec::new(),
            last_flush: None,
        }
    }

    /// 缓冲一条记录
    pub fn push(&mut self, record: ChangeRecord) {
        self.buffer.push(record);
    }

    /// 窗口允许时取走全部缓冲记录
    pub fn take_ready(&mut self) -> Option<Vec<ChangeRecord>> {
        self.take_ready_with_time(Instant::now())
    }

    /// 带时间戳版本，便于测试
    pub fn take_ready_with_time(&mut self, now: Instant) -> Option<Vec<ChangeRecord>> {
        if self.buffer.is_empty() {
            return None;
        }
        let ready = match self.last_flush {
            None => true, // 空闲后的第一批立即处理
            Some(last) => now.duration_since(last) >= self.window,
        };
        if !ready {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.buffer))
    }

    /// 强制刷出缓冲（停止观察或回放收尾时使用）
    pub fn force_flush(&mut self) -> Vec<ChangeRecord> {
        self.last_flush = Some(Instant::now());
        std::mem::take(&mut self.buffer)
    }

    /// 丢弃缓冲，返回丢弃数量
    pub fn clear(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.last_flush = None;
        dropped
    }

    /// 当前缓冲数量
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// 距下次允许刷新的剩余时长（缓冲为空时为 None）
    pub fn next_flush_in(&self, now: Instant) -> Option<Duration> {
        if self.buffer.is_empty() {
            return None;
        }
        match self.last_flush {
            None => Some(Duration::ZERO),
            Some(last) => {
                let elapsed = now.duration_since(last);
                Some(self.window.saturating_sub(elapsed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeData, TargetNode};

    fn record(id: u64) -> ChangeRecord {
        ChangeRecord::child_list(
            TargetNode::new(NodeData::new(id, "div")),
            vec![NodeData::new(id + 100, "p").with_text("hello")],
            vec![],
        )
    }

    #[test]
    fn test_first_burst_flushes_immediately() {
        let mut throttle = BurstThrottle::new(Duration::from_millis(100));
        throttle.push(record(1));
        throttle.push(record(2));

        let flushed = throttle.take_ready_with_time(Instant::now()).unwrap();
        assert_eq!(flushed.len(), 2);
        assert_eq!(throttle.pending(), 0);
    }

    #[test]
    fn test_burst_within_window_is_deferred() {
        let mut throttle = BurstThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();

        throttle.push(record(1));
        assert!(throttle.take_ready_with_time(t0).is_some());

        // 窗口内的第二批被缓冲
        throttle.push(record(2));
        assert!(throttle
            .take_ready_with_time(t0 + Duration::from_millis(50))
            .is_none());
        assert_eq!(throttle.pending(), 1);

        // 窗口过后刷出
        let flushed = throttle
            .take_ready_with_time(t0 + Duration::from_millis(120))
            .unwrap();
        assert_eq!(flushed.len(), 1);
    }

    #[test]
    fn test_no_records_are_dropped_across_windows() {
        let mut throttle = BurstThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();

        throttle.push(record(1));
        let first = throttle.take_ready_with_time(t0).unwrap();

        for i in 2..=5 {
            throttle.push(record(i));
        }
        let second = throttle
            .take_ready_with_time(t0 + Duration::from_millis(150))
            .unwrap();

        assert_eq!(first.len() + second.len(), 5);
    }

    #[test]
    fn test_clear_drops_buffered_records() {
        let mut throttle = BurstThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        throttle.push(record(1));
        assert!(throttle.take_ready_with_time(t0).is_some());

        throttle.push(record(2));
        throttle.push(record(3));
        assert_eq!(throttle.clear(), 2);
        assert!(throttle.take_ready_with_time(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_next_flush_in() {
        let mut throttle = BurstThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(throttle.next_flush_in(t0).is_none());

        throttle.push(record(1));
        assert_eq!(throttle.next_flush_in(t0), Some(Duration::ZERO));

        throttle.take_ready_with_time(t0);
        throttle.push(record(2));
        let remaining = throttle.next_flush_in(t0 + Duration::from_millis(40)).unwrap();
        assert_eq!(remaining, Duration::from_millis(60));
    }
}
