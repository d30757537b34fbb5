//! 对象句柄（Device / Profile）
//!
//! 句柄是绑定到单个远程对象路径的本地代理，缓存绑定时刻的属性快照。
//! 设计上不存在"未绑定"的句柄：构造即绑定（[`BoundObject::bind`]），
//! 绑定失败就没有句柄，路径在绑定后不可变。
//!
//! 快照不自动刷新；守护进程侧的后续变更通过信号（`Changed` 等）
//! 通知，由调用方决定是否重新绑定。丢弃句柄不触发任何远程操作，
//! 删除远程对象是独立的显式调用（`delete_device` / `delete_profile`）。

use std::collections::HashMap;
use std::sync::Arc;

use colord_bus::{BusTransport, BusValue, CancelToken, DEVICE_INTERFACE, PROFILE_INTERFACE};

use crate::error::ClientError;
use crate::kind::{DeviceKind, ProfileKind};

/// 可绑定的远程对象
///
/// marshaling 层通过本 trait 对 Device/Profile 做统一处理。
pub trait BoundObject: Sized {
    /// 对象属性所在的 D-Bus 接口
    const INTERFACE: &'static str;

    /// 按对象路径拉取属性集并构造句柄
    ///
    /// # Errors
    ///
    /// 远程对象不存在或属性拉取失败时返回 [`ClientError::BindFailed`]。
    fn bind(
        transport: &Arc<dyn BusTransport>,
        object_path: &str,
        cancel: &CancelToken,
    ) -> Result<Self, ClientError>;

    /// 绑定的对象路径
    fn object_path(&self) -> &str;
}

/// 色彩设备句柄
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Device {
    object_path: String,
    id: String,
    kind: DeviceKind,
    title: Option<String>,
}

impl Device {
    /// 设备标识（守护进程侧的 `DeviceId`）
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 设备类别
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// 人类可读标题（`Model`，可能缺失）
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// 绑定的对象路径
    #[must_use]
    pub fn object_path(&self) -> &str {
        &self.object_path
    }
}

impl BoundObject for Device {
    const INTERFACE: &'static str = DEVICE_INTERFACE;

    fn bind(
        transport: &Arc<dyn BusTransport>,
        object_path: &str,
        cancel: &CancelToken,
    ) -> Result<Self, ClientError> {
        let properties = transport
            .get_all_properties(object_path, Self::INTERFACE, cancel)
            .map_err(|e| ClientError::bind(object_path, e))?;

        Ok(Self {
            object_path: object_path.to_string(),
            id: prop_string(&properties, "DeviceId").unwrap_or_default(),
            kind: DeviceKind::from_wire(prop_string(&properties, "Kind").as_deref().unwrap_or("")),
            title: prop_string(&properties, "Model"),
        })
    }

    fn object_path(&self) -> &str {
        &self.object_path
    }
}

/// 色彩配置文件句柄
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    object_path: String,
    id: String,
    kind: ProfileKind,
    title: Option<String>,
    filename: Option<String>,
    qualifier: Option<String>,
}

impl Profile {
    /// 配置文件标识（`ProfileId`）
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 配置文件类别
    #[must_use]
    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// 人类可读标题
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// ICC 文件路径（可能缺失）
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// 匹配限定符（可能缺失）
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// 绑定的对象路径
    #[must_use]
    pub fn object_path(&self) -> &str {
        &self.object_path
    }
}

impl BoundObject for Profile {
    const INTERFACE: &'static str = PROFILE_INTERFACE;

    fn bind(
        transport: &Arc<dyn BusTransport>,
        object_path: &str,
        cancel: &CancelToken,
    ) -> Result<Self, ClientError> {
        let properties = transport
            .get_all_properties(object_path, Self::INTERFACE, cancel)
            .map_err(|e| ClientError::bind(object_path, e))?;

        Ok(Self {
            object_path: object_path.to_string(),
            id: prop_string(&properties, "ProfileId").unwrap_or_default(),
            kind: ProfileKind::from_wire(prop_string(&properties, "Kind").as_deref().unwrap_or("")),
            title: prop_string(&properties, "Title"),
            filename: prop_string(&properties, "Filename"),
            qualifier: prop_string(&properties, "Qualifier"),
        })
    }

    fn object_path(&self) -> &str {
        &self.object_path
    }
}

/// 属性表里的字符串字段；缺失或类型不符都按未设置处理
fn prop_string(properties: &HashMap<String, BusValue>, name: &str) -> Option<String> {
    properties
        .get(name)
        .and_then(BusValue::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colord_bus::MockTransport;

    fn device_props(id: &str, kind: &str, model: &str) -> HashMap<String, BusValue> {
        let mut props = HashMap::new();
        props.insert("DeviceId".to_string(), BusValue::from(id));
        props.insert("Kind".to_string(), BusValue::from(kind));
        props.insert("Model".to_string(), BusValue::from(model));
        props
    }

    #[test]
    fn test_device_bind_populates_snapshot() {
        let mock = MockTransport::new();
        mock.insert_object(
            "/org/x/devices/epson",
            DEVICE_INTERFACE,
            device_props("epson-9800", "printer", "Epson Stylus Pro 9800"),
        );

        let transport: Arc<dyn BusTransport> = Arc::new(mock);
        let device =
            Device::bind(&transport, "/org/x/devices/epson", &CancelToken::new()).unwrap();

        assert_eq!(device.object_path(), "/org/x/devices/epson");
        assert_eq!(device.id(), "epson-9800");
        assert_eq!(device.kind(), DeviceKind::Printer);
        assert_eq!(device.title(), Some("Epson Stylus Pro 9800"));
    }

    #[test]
    fn test_bind_missing_object_fails() {
        let transport: Arc<dyn BusTransport> = Arc::new(MockTransport::new());
        let err = Device::bind(&transport, "/org/x/devices/ghost", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::BindFailed { ref path, .. } if path == "/org/x/devices/ghost"));
    }

    /// 属性缺失不是绑定失败
    #[test]
    fn test_bind_tolerates_missing_properties() {
        let mock = MockTransport::new();
        mock.insert_object("/org/x/profiles/p0", PROFILE_INTERFACE, HashMap::new());

        let transport: Arc<dyn BusTransport> = Arc::new(mock);
        let profile =
            Profile::bind(&transport, "/org/x/profiles/p0", &CancelToken::new()).unwrap();

        assert_eq!(profile.id(), "");
        assert_eq!(profile.kind(), ProfileKind::Unknown);
        assert_eq!(profile.filename(), None);
        assert_eq!(profile.qualifier(), None);
    }

    /// 设备绑定走设备接口，不会读到同路径下其他接口的属性
    #[test]
    fn test_device_bind_fails_on_profile_only_path() {
        let mock = MockTransport::new();
        let mut props = HashMap::new();
        props.insert("ProfileId".to_string(), BusValue::from("icc-001"));
        mock.insert_object("/org/x/profiles/p0", PROFILE_INTERFACE, props);

        let transport: Arc<dyn BusTransport> = Arc::new(mock);
        let err = Device::bind(&transport, "/org/x/profiles/p0", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::BindFailed { ref path, .. } if path == "/org/x/profiles/p0"));
    }

    #[test]
    fn test_profile_bind_reads_variant_fields() {
        let mock = MockTransport::new();
        let mut props = HashMap::new();
        props.insert("ProfileId".to_string(), BusValue::from("icc-001"));
        props.insert("Kind".to_string(), BusValue::from("display-device"));
        props.insert("Title".to_string(), BusValue::from("Factory calibration"));
        props.insert(
            "Filename".to_string(),
            BusValue::from("/usr/share/color/icc/factory.icc"),
        );
        props.insert("Qualifier".to_string(), BusValue::from("RGB.Plain.300dpi"));
        mock.insert_object("/org/x/profiles/icc-001", PROFILE_INTERFACE, props);

        let transport: Arc<dyn BusTransport> = Arc::new(mock);
        let profile =
            Profile::bind(&transport, "/org/x/profiles/icc-001", &CancelToken::new()).unwrap();

        assert_eq!(profile.id(), "icc-001");
        assert_eq!(profile.kind(), ProfileKind::DisplayDevice);
        assert_eq!(profile.filename(), Some("/usr/share/color/icc/factory.icc"));
        assert_eq!(profile.qualifier(), Some("RGB.Plain.300dpi"));
    }
}
