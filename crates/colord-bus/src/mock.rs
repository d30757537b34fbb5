//! Mock 传输（无总线依赖）
//!
//! 按方法名脚本化回复队列，记录全部调用，支持注入信号帧和挂起调用
//! （用于取消语义测试）。启用 `mock` feature 后可用。
//!
//! # Example
//!
//! ```
//! use colord_bus::{BusValue, CancelToken, MockReply, MockTransport};
//! use colord_bus::BusTransport;
//!
//! let mock = MockTransport::new();
//! mock.push_reply(
//!     "GetDevices",
//!     MockReply::Ok(vec![BusValue::Array(vec![])]),
//! );
//!
//! let reply = mock
//!     .call("GetDevices", &[], &CancelToken::new())
//!     .unwrap();
//! assert_eq!(reply.len(), 1);
//! assert_eq!(mock.call_count("GetDevices"), 1);
//! ```

use std::collections::{HashMap, VecDeque};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::{BusError, BusTransport, BusValue, CancelToken, SignalFrame};

/// 脚本化回复
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 正常回复，携带解码后的字段
    Ok(Vec<BusValue>),
    /// 远端错误（守护进程报告失败）
    Err(String),
    /// 永不回复，直到取消令牌触发
    ///
    /// 用于验证取消语义：调用必须以 `Cancelled` 返回而不是死等。
    Hang,
}

/// Mock 传输
///
/// 线程安全；测试可以持有 `Arc<MockTransport>` 在调用后继续注入
/// 信号或检查调用记录。
pub struct MockTransport {
    /// 方法名 → 回复队列（FIFO）
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    /// (对象路径, 接口) → 属性表
    objects: Mutex<HashMap<(String, String), HashMap<String, BusValue>>>,
    /// 根对象属性
    root: Mutex<HashMap<String, String>>,
    /// 调用记录（方法名 + 参数）
    calls: Mutex<Vec<(String, Vec<BusValue>)>>,
    signal_tx: Sender<SignalFrame>,
    signal_rx: Receiver<SignalFrame>,
}

impl MockTransport {
    /// 创建空的 mock 传输
    #[must_use]
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = unbounded();
        Self {
            replies: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashMap::new()),
            root: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            signal_tx,
            signal_rx,
        }
    }

    /// 追加一条脚本化回复（同一方法多次调用按 FIFO 消费）
    pub fn push_reply(&self, method: impl Into<String>, reply: MockReply) {
        self.replies
            .lock()
            .entry(method.into())
            .or_default()
            .push_back(reply);
    }

    /// 注册一个可绑定的对象：路径 + 接口 + 属性表
    ///
    /// 按 (路径, 接口) 建键：同一路径在错误接口下的 `GetAll` 会失败，
    /// 与真实守护进程一致。
    pub fn insert_object(
        &self,
        object_path: impl Into<String>,
        interface: impl Into<String>,
        properties: HashMap<String, BusValue>,
    ) {
        self.objects
            .lock()
            .insert((object_path.into(), interface.into()), properties);
    }

    /// 移除对象的全部接口（之后对它的绑定会失败）
    pub fn remove_object(&self, object_path: &str) {
        self.objects.lock().retain(|(path, _), _| path != object_path);
    }

    /// 设置根对象属性
    pub fn set_root_property(&self, name: impl Into<String>, value: impl Into<String>) {
        self.root.lock().insert(name.into(), value.into());
    }

    /// 注入一个信号帧
    pub fn emit_signal(&self, name: impl Into<String>, args: Vec<BusValue>) {
        // unbounded channel，send 只在所有接收端消失时失败
        let _ = self.signal_tx.send(SignalFrame::new(name, args));
    }

    /// 全部调用记录的快照
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<BusValue>)> {
        self.calls.lock().clone()
    }

    /// 某个方法被调用的次数
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for MockTransport {
    fn call(
        &self,
        method: &str,
        args: &[BusValue],
        cancel: &CancelToken,
    ) -> Result<Vec<BusValue>, BusError> {
        self.calls
            .lock()
            .push((method.to_string(), args.to_vec()));

        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        let reply = self
            .replies
            .lock()
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(MockReply::Ok(fields)) => Ok(fields),
            Some(MockReply::Err(message)) => Err(BusError::Call {
                method: method.to_string(),
                message,
            }),
            Some(MockReply::Hang) => {
                // 阻塞直到令牌触发（Sender 被丢弃，recv 返回错误）
                let _ = cancel.channel().recv();
                Err(BusError::Cancelled)
            }
            None => Err(BusError::Call {
                method: method.to_string(),
                message: "no scripted reply".to_string(),
            }),
        }
    }

    fn get_all_properties(
        &self,
        object_path: &str,
        interface: &str,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, BusValue>, BusError> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        self.objects
            .lock()
            .get(&(object_path.to_string(), interface.to_string()))
            .cloned()
            .ok_or_else(|| BusError::Call {
                method: "GetAll".to_string(),
                message: format!("no such object {object_path} on {interface}"),
            })
    }

    fn root_property(&self, name: &str) -> Result<Option<String>, BusError> {
        Ok(self.root.lock().get(name).cloned())
    }

    fn signals(&self) -> Receiver<SignalFrame> {
        self.signal_rx.clone()
    }
}
