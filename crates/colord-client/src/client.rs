//! 客户端主对象
//!
//! [`Client`] 是进程与 colord 守护进程之间的唯一连接对象：
//! 持有传输、暴露调用表面（list/create/delete/find）、把信号分发给
//! 注册的观察者。
//!
//! # 调用模型
//!
//! 所有远程操作同步阻塞，接受取消令牌。除 `connect` 外的操作在连接
//! 建立前调用直接返回 [`ClientError::NotConnected`]，不发起远程调用。
//! 多线程并发调用安全：共享可变状态（传输、版本缓存、观察者表）
//! 各自加锁，远程调用本身由传输层保证配对正确。
//!
//! # Example
//!
//! ```no_run
//! use colord_bus::CancelToken;
//! use colord_client::Client;
//!
//! # fn main() -> Result<(), colord_client::ClientError> {
//! let client = Client::shared();
//! let cancel = CancelToken::new();
//! client.connect(&cancel)?;
//!
//! for device in client.get_devices(&cancel)? {
//!     println!("{} ({})", device.id(), device.object_path());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use colord_bus::{BusTransport, BusValue, CancelToken, SignalFrame};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::error::ClientError;
use crate::handle::{Device, Profile};
use crate::kind::DeviceKind;
use crate::marshal;
use crate::signal::{ClientObserver, SubscriberSet, SubscriptionId, route_signal};

/// 进程级共享实例（弱引用；全部强引用释放后重置）
static SHARED: OnceLock<Mutex<Weak<Client>>> = OnceLock::new();

/// colord 客户端
///
/// 构造时为空；`connect` 绑定传输；Drop 释放传输并回收分发线程。
pub struct Client {
    /// 传输句柄（connect 成功后才存在）
    transport: RwLock<Option<Arc<dyn BusTransport>>>,
    /// connect 时缓存的守护进程版本快照（之后不自动刷新）
    daemon_version: ArcSwapOption<String>,
    /// 观察者注册表
    subscribers: Arc<RwLock<SubscriberSet>>,
    /// 信号分发线程（Drop 时 join）
    dispatch: Mutex<Option<JoinHandle<()>>>,
    /// 分发线程运行标志
    is_running: Arc<AtomicBool>,
}

impl Client {
    /// 创建未连接的客户端
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: RwLock::new(None),
            daemon_version: ArcSwapOption::empty(),
            subscribers: Arc::new(RwLock::new(SubscriberSet::new())),
            dispatch: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 进程级共享实例
    ///
    /// 已有实例存活时返回同一个 `Arc`；全部引用释放后，下一次请求
    /// 创建全新的未连接实例。共享是便利而非正确性要求——需要独立
    /// 连接的调用方直接用 [`Client::new`]。
    #[must_use]
    pub fn shared() -> Arc<Client> {
        let slot = SHARED.get_or_init(|| Mutex::new(Weak::new()));
        let mut guard = slot.lock();
        if let Some(existing) = guard.upgrade() {
            existing
        } else {
            let fresh = Arc::new(Client::new());
            *guard = Arc::downgrade(&fresh);
            fresh
        }
    }

    /// 连接系统总线上的 colord 守护进程
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`]: 已连接（原传输保持不变）
    /// - [`ClientError::ConnectionFailed`]: 总线不可达
    #[cfg(feature = "zbus-backend")]
    pub fn connect(&self, cancel: &CancelToken) -> Result<(), ClientError> {
        let transport = colord_bus::ZbusTransport::system(colord_bus::BusConfig::default())
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        self.connect_with(Arc::new(transport), cancel)
    }

    /// 在给定传输上建立连接（测试、会话总线等场景）
    ///
    /// 成功后读取缓存的 `Title` 属性作为守护进程版本（缺失不算错误，
    /// 版本保持未设置），并订阅传输的信号流。
    pub fn connect_with(
        &self,
        transport: Arc<dyn BusTransport>,
        cancel: &CancelToken,
    ) -> Result<(), ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let mut slot = self.transport.write();
        if slot.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        // 版本属性缺失容忍：版本保持 None
        let version = transport.root_property("Title").ok().flatten();
        self.daemon_version.store(version.clone().map(Arc::new));

        // 信号分发线程
        self.is_running.store(true, Ordering::SeqCst);
        let rx = transport.signals();
        let subscribers = self.subscribers.clone();
        let running = self.is_running.clone();
        let handle = std::thread::Builder::new()
            .name("colord-dispatch".to_string())
            .spawn(move || dispatch_loop(&rx, &subscribers, &running))
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        *self.dispatch.lock() = Some(handle);

        *slot = Some(transport);
        info!(
            "Connected to colord daemon version {}",
            version.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// connect 时缓存的守护进程版本；不发起远程调用
    #[must_use]
    pub fn daemon_version(&self) -> Option<String> {
        self.daemon_version.load_full().map(|v| (*v).clone())
    }

    /// 获取全部设备
    ///
    /// 结果顺序为守护进程返回的顺序。任何元素绑定失败时整个操作
    /// 失败，不返回部分列表。
    pub fn get_devices(&self, cancel: &CancelToken) -> Result<Vec<Device>, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call("GetDevices", &[], cancel)
            .map_err(|e| ClientError::request("GetDevices", e))?;
        marshal::bind_array(&transport, &reply, cancel)
    }

    /// 获取指定类别的设备
    pub fn get_devices_by_kind(
        &self,
        kind: DeviceKind,
        cancel: &CancelToken,
    ) -> Result<Vec<Device>, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call("GetDevicesByKind", &[BusValue::from(kind.as_str())], cancel)
            .map_err(|e| ClientError::request("GetDevicesByKind", e))?;
        marshal::bind_array(&transport, &reply, cancel)
    }

    /// 获取全部配置文件
    pub fn get_profiles(&self, cancel: &CancelToken) -> Result<Vec<Profile>, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call("GetProfiles", &[], cancel)
            .map_err(|e| ClientError::request("GetProfiles", e))?;
        marshal::bind_array(&transport, &reply, cancel)
    }

    /// 创建色彩设备并返回已绑定句柄
    pub fn create_device(
        &self,
        id: &str,
        options: u32,
        cancel: &CancelToken,
    ) -> Result<Device, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call(
                "CreateDevice",
                &[BusValue::from(id), BusValue::from(options)],
                cancel,
            )
            .map_err(|e| ClientError::request("CreateDevice", e))?;
        marshal::bind_single(&transport, &reply, cancel)
    }

    /// 创建色彩配置文件并返回已绑定句柄
    pub fn create_profile(
        &self,
        id: &str,
        options: u32,
        cancel: &CancelToken,
    ) -> Result<Profile, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call(
                "CreateProfile",
                &[BusValue::from(id), BusValue::from(options)],
                cancel,
            )
            .map_err(|e| ClientError::request("CreateProfile", e))?;
        marshal::bind_single(&transport, &reply, cancel)
    }

    /// 按标识删除设备
    ///
    /// 收到回复即成功；不需要也不隐含任何本地句柄。
    pub fn delete_device(&self, id: &str, cancel: &CancelToken) -> Result<(), ClientError> {
        self.transport()?
            .call("DeleteDevice", &[BusValue::from(id)], cancel)
            .map_err(|e| ClientError::request("DeleteDevice", e))?;
        Ok(())
    }

    /// 按标识删除配置文件
    pub fn delete_profile(&self, id: &str, cancel: &CancelToken) -> Result<(), ClientError> {
        self.transport()?
            .call("DeleteProfile", &[BusValue::from(id)], cancel)
            .map_err(|e| ClientError::request("DeleteProfile", e))?;
        Ok(())
    }

    /// 按标识查找设备
    ///
    /// 远端无匹配时返回 [`ClientError::RequestFailed`]，携带远端消息。
    pub fn find_device(&self, id: &str, cancel: &CancelToken) -> Result<Device, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call("FindDeviceById", &[BusValue::from(id)], cancel)
            .map_err(|e| ClientError::request("FindDeviceById", e))?;
        marshal::bind_single(&transport, &reply, cancel)
    }

    /// 按标识查找配置文件
    pub fn find_profile(&self, id: &str, cancel: &CancelToken) -> Result<Profile, ClientError> {
        let transport = self.transport()?;
        let reply = transport
            .call("FindProfileById", &[BusValue::from(id)], cancel)
            .map_err(|e| ClientError::request("FindProfileById", e))?;
        marshal::bind_single(&transport, &reply, cancel)
    }

    /// 注册事件观察者
    ///
    /// 回调在信号分发线程上执行，见 [`ClientObserver`] 的阻塞约束。
    pub fn subscribe(&self, observer: Arc<dyn ClientObserver>) -> SubscriptionId {
        self.subscribers.write().add(observer)
    }

    /// 注销观察者；标识未注册时返回 false
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.write().remove(id)
    }

    /// 当前传输；未连接返回 `NotConnected`
    fn transport(&self) -> Result<Arc<dyn BusTransport>, ClientError> {
        self.transport
            .read()
            .clone()
            .ok_or(ClientError::NotConnected)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.dispatch.lock().take() {
            let _ = handle.join();
        }
        // 传输随字段 Drop 释放，且只释放一次
    }
}

/// 信号分发主循环
///
/// 带超时轮询运行标志：传输可能被测试继续持有，单靠通道断开不足以
/// 结束线程。
fn dispatch_loop(
    rx: &Receiver<SignalFrame>,
    subscribers: &Arc<RwLock<SubscriberSet>>,
    running: &Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => {
                if let Some(event) = route_signal(&frame) {
                    subscribers.read().notify_all(&event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
