//! 回复 marshaling
//!
//! 把远程调用的无类型回复转换成一个或一批已绑定句柄。两条路径：
//! - 单路径提取：回复必须恰好是一个对象路径字段
//! - 数组提取：回复首字段必须是对象路径数组，逐个绑定，全有或全无
//!
//! 全有或全无策略：部分绑定成功的列表会悄悄隐藏哪些条目可用，
//! 调用方必须能信任任何返回的列表全部有效。第 k 个元素绑定失败时，
//! 已绑定的 0..k-1 个句柄全部丢弃，整个操作以单个错误结束。

use std::sync::Arc;

use colord_bus::{BusTransport, BusValue, CancelToken};
use tracing::debug;

use crate::error::ClientError;
use crate::handle::BoundObject;

/// 从回复中提取唯一的对象路径
///
/// 元数或类型不符是解码错误（[`ClientError::MalformedReply`]），
/// 与远端报告的失败严格区分。
pub(crate) fn single_object_path(reply: &[BusValue]) -> Result<&str, ClientError> {
    match reply {
        [value] => value.as_object_path().ok_or_else(|| {
            ClientError::MalformedReply("expected an object path field".to_string())
        }),
        _ => Err(ClientError::MalformedReply(format!(
            "expected exactly one field, got {}",
            reply.len()
        ))),
    }
}

/// 单路径回复 → 一个已绑定句柄
pub(crate) fn bind_single<T: BoundObject>(
    transport: &Arc<dyn BusTransport>,
    reply: &[BusValue],
    cancel: &CancelToken,
) -> Result<T, ClientError> {
    let object_path = single_object_path(reply)?;
    T::bind(transport, object_path, cancel)
}

/// 数组回复 → 按返回顺序全部绑定
///
/// 顺序保持为远端返回的顺序，不按任何键排序。任何一个元素绑定失败，
/// 丢弃整批已绑定句柄并返回该绑定错误。
pub(crate) fn bind_array<T: BoundObject>(
    transport: &Arc<dyn BusTransport>,
    reply: &[BusValue],
    cancel: &CancelToken,
) -> Result<Vec<T>, ClientError> {
    let items = reply
        .first()
        .and_then(BusValue::as_array)
        .ok_or_else(|| {
            ClientError::MalformedReply("expected an array of object paths".to_string())
        })?;

    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let object_path = item.as_object_path().ok_or_else(|| {
            ClientError::MalformedReply("array element is not an object path".to_string())
        })?;
        debug!(object_path, "binding");
        // 失败即返回；handles 里已绑定的句柄随之丢弃
        handles.push(T::bind(transport, object_path, cancel)?);
    }
    Ok(handles)
}
