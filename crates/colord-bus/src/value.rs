//! 回复值模型
//!
//! 守护进程的回复在语言层面是无类型的元组（对象路径、字符串、标量、
//! 数组）。[`BusValue`] 把这个集合收窄成客户端实际需要的形状，
//! 使上层的 marshaling 可以做强类型校验而不是到处 downcast。

/// 总线值
///
/// 只覆盖 colord 客户端契约实际出现的类型。遇到契约之外的类型，
/// 后端在解码阶段就报 [`crate::BusError::Decode`]，不会流入本枚举。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusValue {
    /// 字符串 (D-Bus 签名 `s`)
    Str(String),
    /// 对象路径 (`o`)，稳定的不透明对象标识
    ObjectPath(String),
    /// 布尔 (`b`)
    Bool(bool),
    /// 无符号 32 位 (`u`)
    U32(u32),
    /// 无符号 64 位 (`t`)
    U64(u64),
    /// 数组 (`a?`)
    Array(Vec<BusValue>),
}

impl BusValue {
    /// 作为字符串读取
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BusValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 作为对象路径读取
    ///
    /// 只接受 `ObjectPath`，不接受普通字符串。路径和字符串在
    /// 线上是不同的类型，混用会掩盖服务端的类型错误。
    #[must_use]
    pub fn as_object_path(&self) -> Option<&str> {
        match self {
            BusValue::ObjectPath(p) => Some(p),
            _ => None,
        }
    }

    /// 作为 u32 读取
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            BusValue::U32(n) => Some(*n),
            _ => None,
        }
    }

    /// 作为数组读取
    #[must_use]
    pub fn as_array(&self) -> Option<&[BusValue]> {
        match self {
            BusValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// 构造对象路径值
    pub fn path(p: impl Into<String>) -> Self {
        BusValue::ObjectPath(p.into())
    }
}

impl From<&str> for BusValue {
    fn from(s: &str) -> Self {
        BusValue::Str(s.to_string())
    }
}

impl From<String> for BusValue {
    fn from(s: String) -> Self {
        BusValue::Str(s)
    }
}

impl From<u32> for BusValue {
    fn from(n: u32) -> Self {
        BusValue::U32(n)
    }
}

impl From<bool> for BusValue {
    fn from(b: bool) -> Self {
        BusValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_variant() {
        let v = BusValue::path("/org/freedesktop/ColorManager/devices/d0");
        assert_eq!(
            v.as_object_path(),
            Some("/org/freedesktop/ColorManager/devices/d0")
        );
        assert_eq!(v.as_str(), None);

        let v = BusValue::from("display");
        assert_eq!(v.as_str(), Some("display"));
        assert_eq!(v.as_object_path(), None);

        let v = BusValue::from(7u32);
        assert_eq!(v.as_u32(), Some(7));
    }

    /// 对象路径与字符串不能互相冒充
    #[test]
    fn test_path_is_not_str() {
        let v = BusValue::Str("/looks/like/a/path".to_string());
        assert_eq!(v.as_object_path(), None);
    }

    #[test]
    fn test_array_accessor() {
        let v = BusValue::Array(vec![BusValue::path("/a"), BusValue::path("/b")]);
        let items = v.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_object_path(), Some("/b"));
        assert_eq!(BusValue::from(true).as_array(), None);
    }
}
