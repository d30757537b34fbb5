//! # Colord 客户端访问层
//!
//! colord 色彩管理守护进程的同步客户端：把 D-Bus 方法调用与信号
//! 转换成强类型的 Rust 对象接口。
//!
//! 分层：
//! - [`Client`]: 连接生命周期 + 调用表面（list/create/delete/find）
//! - [`Device`] / [`Profile`]: 绑定到远程对象路径的本地句柄
//! - [`ClientEvent`] / [`ClientObserver`]: 信号路由与事件广播
//!
//! 传输在 `colord-bus` crate 里抽象（真实 zbus 后端 / 测试 mock）。
//!
//! # Example
//!
//! ```no_run
//! use colord_bus::CancelToken;
//! use colord_client::{Client, DeviceKind};
//!
//! # fn main() -> Result<(), colord_client::ClientError> {
//! let client = Client::shared();
//! let cancel = CancelToken::new();
//! client.connect(&cancel)?;
//!
//! for device in client.get_devices_by_kind(DeviceKind::Display, &cancel)? {
//!     println!("{}: {:?}", device.id(), device.title());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handle;
pub mod kind;
pub mod signal;

mod marshal;

pub use client::Client;
pub use error::ClientError;
pub use handle::{BoundObject, Device, Profile};
pub use kind::{DeviceKind, ProfileKind};
pub use signal::{ClientEvent, ClientObserver, SubscriptionId};

pub use colord_bus::{BusConfig, BusError, BusTransport, CancelToken};
