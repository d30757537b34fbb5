//! # Colord D-Bus 传输抽象层
//!
//! 总线传输抽象层，提供统一的远程调用接口。
//!
//! 本 crate 不关心 colord 守护进程的对象语义（那是 `colord-client` 的职责），
//! 只负责三件事：
//! - 同步方法调用（带取消令牌和超时）
//! - 对象属性读取（绑定句柄时的 `GetAll`）
//! - 信号帧投递（crossbeam channel，乱序于方法调用）

use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::Receiver;
use thiserror::Error;

pub mod cancel;
pub mod value;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "zbus-backend")]
pub mod zbus_backend;

pub use cancel::CancelToken;
pub use value::BusValue;

#[cfg(feature = "mock")]
pub use mock::{MockReply, MockTransport};

#[cfg(feature = "zbus-backend")]
pub use zbus_backend::ZbusTransport;

/// colord 守护进程的服务名
pub const COLORD_SERVICE: &str = "org.freedesktop.ColorManager";
/// colord 根对象路径
pub const COLORD_PATH: &str = "/org/freedesktop/ColorManager";
/// colord 根接口名
pub const COLORD_INTERFACE: &str = "org.freedesktop.ColorManager";
/// 设备对象接口名
pub const DEVICE_INTERFACE: &str = "org.freedesktop.ColorManager.Device";
/// 配置文件对象接口名
pub const PROFILE_INTERFACE: &str = "org.freedesktop.ColorManager.Profile";

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum BusError {
    /// 无法建立总线连接
    #[error("Failed to connect to bus: {0}")]
    Connection(String),

    /// 远程调用被守护进程拒绝（携带远端错误消息）
    #[error("{method} call failed: {message}")]
    Call { method: String, message: String },

    /// 回复的类型/元数与预期不符
    ///
    /// 与 [`BusError::Call`] 严格区分：`Call` 是远端报告的失败，
    /// `Decode` 是本地对回复形状的强类型校验失败。
    #[error("Malformed reply: {0}")]
    Decode(String),

    /// 调用被取消令牌中断
    #[error("Operation cancelled")]
    Cancelled,

    /// 调用超时（守护进程未在期限内回复）
    #[error("Call timeout")]
    Timeout,

    /// 传输已关闭（调用线程退出）
    #[error("Transport disconnected")]
    Disconnected,
}

/// 总线连接配置
///
/// 默认值对应 colord 守护进程的 well-known 三元组。
/// 超时时间沿用 D-Bus 的惯例默认（25 秒）。
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    /// 服务名（destination）
    pub service: String,
    /// 根对象路径
    pub path: String,
    /// 根接口名
    pub interface: String,
    /// 单次方法调用的超时
    pub call_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            service: COLORD_SERVICE.to_string(),
            path: COLORD_PATH.to_string(),
            interface: COLORD_INTERFACE.to_string(),
            call_timeout: Duration::from_secs(25),
        }
    }
}

/// 入站信号帧
///
/// 只携带名字标签和未解码的参数，不做任何路由判断。
/// 路由（按名字匹配成 typed 事件）在 `colord-client` 的 signal 模块完成。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalFrame {
    /// 信号名（如 "DeviceAdded"）
    pub name: String,
    /// 信号参数
    pub args: Vec<BusValue>,
}

impl SignalFrame {
    /// 构造信号帧
    pub fn new(name: impl Into<String>, args: Vec<BusValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// 总线传输接口
///
/// 所有方法都是同步阻塞的。实现必须满足：
/// - `call` 在取消令牌触发后立即返回 [`BusError::Cancelled`]，
///   不等待在途回复
/// - 并发调用安全：如果底层不支持多个在途调用，实现负责串行化，
///   不破坏每次调用的回复配对
/// - `signals` 返回的 Receiver 可以被克隆持有，信号投递与方法调用
///   在不同线程上异步发生
pub trait BusTransport: Send + Sync {
    /// 对根对象发起一次方法调用，返回解码后的回复字段
    fn call(
        &self,
        method: &str,
        args: &[BusValue],
        cancel: &CancelToken,
    ) -> Result<Vec<BusValue>, BusError>;

    /// 读取某个对象路径在指定接口下的全部属性
    fn get_all_properties(
        &self,
        object_path: &str,
        interface: &str,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, BusValue>, BusError>;

    /// 读取根对象上缓存的字符串属性；属性不存在返回 `Ok(None)`
    fn root_property(&self, name: &str) -> Result<Option<String>, BusError>;

    /// 获取信号帧接收端
    fn signals(&self) -> Receiver<SignalFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_default_is_colord_triple() {
        let config = BusConfig::default();
        assert_eq!(config.service, "org.freedesktop.ColorManager");
        assert_eq!(config.path, "/org/freedesktop/ColorManager");
        assert_eq!(config.interface, "org.freedesktop.ColorManager");
        assert_eq!(config.call_timeout, Duration::from_secs(25));
    }

    /// 测试 BusError 的 Display 实现
    #[test]
    fn test_bus_error_display() {
        let err = BusError::Call {
            method: "GetDevices".to_string(),
            message: "no such method".to_string(),
        };
        assert_eq!(format!("{err}"), "GetDevices call failed: no such method");

        let err = BusError::Decode("expected object path".to_string());
        assert!(format!("{err}").contains("Malformed reply"));

        assert_eq!(format!("{}", BusError::Cancelled), "Operation cancelled");
    }

    #[test]
    fn test_signal_frame_new() {
        let frame = SignalFrame::new(
            "DeviceAdded",
            vec![BusValue::ObjectPath("/org/x/y".to_string())],
        );
        assert_eq!(frame.name, "DeviceAdded");
        assert_eq!(frame.args.len(), 1);
    }
}
