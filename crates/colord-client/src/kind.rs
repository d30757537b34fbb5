//! 设备/配置文件类别枚举
//!
//! 线上表示是小写字符串（`GetDevicesByKind` 的参数、对象属性里的
//! `Kind` 字段），本模块提供与字符串的双向转换。未知字符串一律落到
//! `Unknown`，保持对新守护进程版本的前向兼容。

/// 设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceKind {
    /// 未知/未来版本新增的类别
    #[default]
    Unknown,
    /// 显示器
    Display,
    /// 扫描仪
    Scanner,
    /// 打印机
    Printer,
    /// 相机
    Camera,
    /// 摄像头
    Webcam,
}

impl DeviceKind {
    /// 线上字符串表示
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Unknown => "unknown",
            DeviceKind::Display => "display",
            DeviceKind::Scanner => "scanner",
            DeviceKind::Printer => "printer",
            DeviceKind::Camera => "camera",
            DeviceKind::Webcam => "webcam",
        }
    }

    /// 从线上字符串解析；未知字符串返回 `Unknown`
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "display" => DeviceKind::Display,
            "scanner" => DeviceKind::Scanner,
            "printer" => DeviceKind::Printer,
            "camera" => DeviceKind::Camera,
            "webcam" => DeviceKind::Webcam,
            _ => DeviceKind::Unknown,
        }
    }
}

/// 配置文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProfileKind {
    /// 未知类别
    #[default]
    Unknown,
    /// 输入设备
    InputDevice,
    /// 显示设备
    DisplayDevice,
    /// 输出设备
    OutputDevice,
    /// 抽象配置文件
    Abstract,
    /// 命名颜色
    NamedColor,
    /// 色彩空间转换
    ColorspaceConversion,
}

impl ProfileKind {
    /// 线上字符串表示
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Unknown => "unknown",
            ProfileKind::InputDevice => "input-device",
            ProfileKind::DisplayDevice => "display-device",
            ProfileKind::OutputDevice => "output-device",
            ProfileKind::Abstract => "abstract",
            ProfileKind::NamedColor => "named-color",
            ProfileKind::ColorspaceConversion => "colorspace-conversion",
        }
    }

    /// 从线上字符串解析；未知字符串返回 `Unknown`
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "input-device" => ProfileKind::InputDevice,
            "display-device" => ProfileKind::DisplayDevice,
            "output-device" => ProfileKind::OutputDevice,
            "abstract" => ProfileKind::Abstract,
            "named-color" => ProfileKind::NamedColor,
            "colorspace-conversion" => ProfileKind::ColorspaceConversion,
            _ => ProfileKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_round_trip() {
        for kind in [
            DeviceKind::Display,
            DeviceKind::Scanner,
            DeviceKind::Printer,
            DeviceKind::Camera,
            DeviceKind::Webcam,
            DeviceKind::Unknown,
        ] {
            assert_eq!(DeviceKind::from_wire(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_strings_fall_back() {
        assert_eq!(DeviceKind::from_wire("hologram"), DeviceKind::Unknown);
        assert_eq!(ProfileKind::from_wire("quantum"), ProfileKind::Unknown);
    }

    #[test]
    fn test_profile_kind_round_trip() {
        for kind in [
            ProfileKind::InputDevice,
            ProfileKind::DisplayDevice,
            ProfileKind::OutputDevice,
            ProfileKind::Abstract,
            ProfileKind::NamedColor,
            ProfileKind::ColorspaceConversion,
        ] {
            assert_eq!(ProfileKind::from_wire(kind.as_str()), kind);
        }
    }
}
