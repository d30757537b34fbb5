//! 信号路由与观察者注册
//!
//! 入站信号帧在这里按名字标签一次性匹配成 typed 事件
//! （[`ClientEvent`]），再广播给注册的观察者。路由器只携带对象路径，
//! 从不解析成句柄——观察者若只关心"有东西变了"，不应付出远程调用的
//! 代价；需要句柄时由观察者自己按路径绑定。
//!
//! 未知信号名不是错误（前向兼容）：记一条日志后丢弃。

use std::sync::Arc;

use colord_bus::SignalFrame;
use tracing::warn;

/// 客户端事件
///
/// 只携带对象路径引用，不携带句柄。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClientEvent {
    /// 守护进程状态可能有变（无载荷）
    Changed,
    /// 设备加入
    DeviceAdded { object_path: String },
    /// 设备移除
    DeviceRemoved { object_path: String },
    /// 配置文件加入
    ProfileAdded { object_path: String },
    /// 配置文件移除
    ProfileRemoved { object_path: String },
}

/// 信号帧 → 事件
///
/// 返回 `None` 表示丢弃：未知名字、或已知名字但载荷形状不对。
pub(crate) fn route_signal(frame: &SignalFrame) -> Option<ClientEvent> {
    let path_arg = || {
        let path = frame.args.first().and_then(|v| v.as_object_path());
        if path.is_none() {
            warn!(signal = frame.name.as_str(), "signal missing object path argument");
        }
        path.map(str::to_string)
    };

    match frame.name.as_str() {
        "Changed" => Some(ClientEvent::Changed),
        "DeviceAdded" => Some(ClientEvent::DeviceAdded {
            object_path: path_arg()?,
        }),
        "DeviceRemoved" => Some(ClientEvent::DeviceRemoved {
            object_path: path_arg()?,
        }),
        "ProfileAdded" => Some(ClientEvent::ProfileAdded {
            object_path: path_arg()?,
        }),
        "ProfileRemoved" => Some(ClientEvent::ProfileRemoved {
            object_path: path_arg()?,
        }),
        other => {
            warn!("unhandled signal '{other}'");
            None
        }
    }
}

/// 事件观察者
///
/// 回调在信号分发线程上执行，与方法调用的线程无关。
///
/// # 性能要求
///
/// 回调不得无限阻塞，否则会饿死后续信号分发。推荐用
/// `crossbeam_channel::Sender<ClientEvent>` 作为观察者（非阻塞
/// `try_send`），在自己的线程里消费事件。
pub trait ClientObserver: Send + Sync {
    /// 事件到达时调用
    fn on_event(&self, event: &ClientEvent);
}

/// channel 发送端可直接作为观察者
///
/// 使用 `try_send`：通道满或断开时丢弃事件而不是阻塞分发线程。
impl ClientObserver for crossbeam_channel::Sender<ClientEvent> {
    fn on_event(&self, event: &ClientEvent) {
        let _ = self.try_send(event.clone());
    }
}

/// 订阅标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 观察者注册表
///
/// 列表本身不做内部同步，由 `Client` 用 `RwLock` 包裹。
#[derive(Default)]
pub(crate) struct SubscriberSet {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn ClientObserver>)>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    /// 注册观察者，返回用于注销的标识
    pub(crate) fn add(&mut self, observer: Arc<dyn ClientObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// 注销；标识未注册时返回 false
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// 把事件广播给全部观察者
    pub(crate) fn notify_all(&self, event: &ClientEvent) {
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colord_bus::BusValue;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn path_frame(name: &str, path: &str) -> SignalFrame {
        SignalFrame::new(name, vec![BusValue::path(path)])
    }

    #[test]
    fn test_device_added_routes_with_path() {
        let event = route_signal(&path_frame(
            "DeviceAdded",
            "/org/example/colord/devices/dev1",
        ));
        assert_eq!(
            event,
            Some(ClientEvent::DeviceAdded {
                object_path: "/org/example/colord/devices/dev1".to_string()
            })
        );
    }

    #[test]
    fn test_all_path_signals_route() {
        for (name, expect) in [
            ("DeviceRemoved", true),
            ("ProfileAdded", true),
            ("ProfileRemoved", true),
        ] {
            let event = route_signal(&path_frame(name, "/org/x/p"));
            assert_eq!(event.is_some(), expect, "signal {name}");
        }
    }

    #[test]
    fn test_changed_is_delivered() {
        let event = route_signal(&SignalFrame::new("Changed", vec![]));
        assert_eq!(event, Some(ClientEvent::Changed));
    }

    /// 未知信号名产生零事件
    #[test]
    fn test_unknown_signal_is_discarded() {
        assert_eq!(route_signal(&SignalFrame::new("FooBar", vec![])), None);
        assert_eq!(
            route_signal(&path_frame("FooBar", "/org/x/devices/d0")),
            None
        );
    }

    /// 已知名字但载荷不对也丢弃
    #[test]
    fn test_malformed_payload_is_discarded() {
        assert_eq!(route_signal(&SignalFrame::new("DeviceAdded", vec![])), None);
        assert_eq!(
            route_signal(&SignalFrame::new(
                "DeviceAdded",
                vec![BusValue::from("not-a-path")]
            )),
            None
        );
    }

    struct CountingObserver(AtomicU64);

    impl ClientObserver for CountingObserver {
        fn on_event(&self, _event: &ClientEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_subscriber_set_add_remove_notify() {
        let mut set = SubscriberSet::new();
        let observer = Arc::new(CountingObserver(AtomicU64::new(0)));
        let id = set.add(observer.clone());
        assert_eq!(set.len(), 1);

        set.notify_all(&ClientEvent::Changed);
        assert_eq!(observer.0.load(Ordering::Relaxed), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.notify_all(&ClientEvent::Changed);
        assert_eq!(observer.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_channel_sender_as_observer() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut set = SubscriberSet::new();
        set.add(Arc::new(tx));

        set.notify_all(&ClientEvent::DeviceRemoved {
            object_path: "/org/x/devices/d0".to_string(),
        });
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, ClientEvent::DeviceRemoved { .. }));
    }
}
