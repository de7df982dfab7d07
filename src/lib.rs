// Detection Studio 🚀 AGPL-3.0 License
pub mod annotate; // 帧上绘制
pub mod app; // 应用壳与状态机
pub mod config; // 命令行参数
pub mod dispatch; // 检测调度器
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod registry; // 模型注册表

pub mod ort_backend;

pub use crate::config::Args;
pub use crate::dispatch::Dispatcher;
pub use crate::error::AppError;
pub use crate::models::{AdapterKind, Classifier, Detector, SsdDetector, YoloDetector};
pub use crate::ort_backend::OrtBackend;
pub use crate::registry::{DetectorSpec, Framework, Manifest, Registry};

/// 检测框 (Detection bounding box)
///
/// 像素坐标系: (x1,y1) 左上角, (x2,y2) 右下角
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// 生成本地时间戳字符串,小时/分钟/秒之间使用给定分隔符
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!("%Y-%m-%d %H{}%M{}%S%.6f", delimiter, delimiter);
    t_now.format(&fmt).to_string()
}

/// 截图默认文件名: 时间戳 + .jpg,冒号替换为下划线以兼容文件系统
pub fn screenshot_file_name() -> String {
    format!("{}.jpg", gen_time_string("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_accessors() {
        let b = BBox::new(32.0, 24.0, 64.0, 48.0, 0.9, 3);
        assert_eq!(b.width(), 32.0);
        assert_eq!(b.height(), 24.0);
    }

    #[test]
    fn test_screenshot_file_name() {
        let name = screenshot_file_name();
        assert!(name.ends_with(".jpg"));
        // 文件名内不允许出现冒号
        assert!(!name.contains(':'));
    }
}
