//! 客户端错误类型定义

use colord_bus::BusError;
use thiserror::Error;

/// 客户端错误类型
///
/// 远程失败一律携带操作名 + 传输层消息，无需重试即可定位问题。
/// 本客户端不做自动重试，失败立即上报，由调用方决定是否重试。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 尚未连接守护进程
    ///
    /// 除 `connect` 外的所有操作在连接建立前调用都返回此错误，
    /// 且不会发起任何远程调用。
    #[error("Not connected to the colord daemon")]
    NotConnected,

    /// 重复连接
    #[error("Already connected to the colord daemon")]
    AlreadyConnected,

    /// 连接守护进程失败
    #[error("Failed to connect to colord: {0}")]
    ConnectionFailed(String),

    /// 远程调用失败（远端报告的错误）
    #[error("Failed to {operation}: {message}")]
    RequestFailed { operation: String, message: String },

    /// 对象路径绑定失败（对象不存在或属性拉取出错）
    #[error("Failed to set object path {path}: {message}")]
    BindFailed { path: String, message: String },

    /// 回复形状校验失败
    ///
    /// 与 [`ClientError::RequestFailed`] 严格区分：这是本地强类型
    /// 解码的失败，不是远端报告的错误。
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// 操作被取消令牌中断
    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// 把传输层错误映射为携带操作名的客户端错误
    pub(crate) fn request(operation: &str, err: BusError) -> Self {
        match err {
            BusError::Cancelled => ClientError::Cancelled,
            BusError::Decode(detail) => ClientError::MalformedReply(detail),
            other => ClientError::RequestFailed {
                operation: operation.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// 把绑定阶段的传输层错误映射为 `BindFailed`
    pub(crate) fn bind(path: &str, err: BusError) -> Self {
        match err {
            BusError::Cancelled => ClientError::Cancelled,
            other => ClientError::BindFailed {
                path: path.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 ClientError 的 Display 实现
    #[test]
    fn test_client_error_display() {
        let err = ClientError::RequestFailed {
            operation: "GetDevices".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "Failed to GetDevices: timeout");

        let err = ClientError::BindFailed {
            path: "/org/x/devices/d0".to_string(),
            message: "no such object".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to set object path /org/x/devices/d0: no such object"
        );
    }

    #[test]
    fn test_cancelled_maps_through_request() {
        let err = ClientError::request("GetDevices", BusError::Cancelled);
        assert!(matches!(err, ClientError::Cancelled));
    }

    /// 解码错误与远端错误不混淆
    #[test]
    fn test_decode_maps_to_malformed_reply() {
        let err = ClientError::request(
            "CreateDevice",
            BusError::Decode("expected object path".to_string()),
        );
        assert!(matches!(err, ClientError::MalformedReply(_)));

        let err = ClientError::request(
            "CreateDevice",
            BusError::Call {
                method: "CreateDevice".to_string(),
                message: "denied".to_string(),
            },
        );
        assert!(matches!(err, ClientError::RequestFailed { .. }));
    }
}
