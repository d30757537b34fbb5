//! 取消令牌
//!
//! 阻塞调用的中断机制：调用方持有令牌的克隆，在任意线程上触发
//! `cancel()`，正在 `select!` 等待回复的调用立即以
//! [`crate::BusError::Cancelled`] 返回，不等待在途回复。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;

/// 取消令牌
///
/// 克隆共享同一个取消状态。触发是一次性的、不可逆的。
///
/// # Example
///
/// ```
/// use colord_bus::CancelToken;
///
/// let token = CancelToken::new();
/// let remote = token.clone();
///
/// assert!(!token.is_cancelled());
/// remote.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    /// 触发端。`cancel()` 把它丢弃，使所有等待的 Receiver 立即断开。
    guard: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    /// 创建未触发的令牌
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            guard: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// 触发取消
    ///
    /// 幂等：重复触发无额外效果。
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // 丢弃 Sender，所有在 select 中等待的 recv 立即返回 Disconnected
        self.guard.lock().take();
    }

    /// 是否已触发
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 取消通道的接收端，用于 `crossbeam_channel::select!`
    ///
    /// 未触发时永远不会就绪；触发后任何 `recv` 立即返回错误。
    #[must_use]
    pub fn channel(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
