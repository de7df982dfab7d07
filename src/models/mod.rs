// Detection Studio 🚀 AGPL-3.0 License
//! 模型统一接口与实现
//!
//! # 架构说明
//!
//! 每个模型族一个适配器,各自负责把帧转换成模型期望的输入张量、
//! 执行推理、把原始输出解码成检测记录并绘制标注:
//!
//! - **SSD 系列** (`ssd.rs`): 固定 320x320 输入,输出固定形状候选矩阵
//! - **YOLO 系列** (`yolo.rs`): 端到端输出,行内即像素坐标
//! - **分类网络** (`classifier.rs`): 全图分类,无检测框
//!
//! ## Detector Trait
//! 统一的能力接口,标准流程: preprocess → infer → postprocess → render
//!
//! 调度按 [`AdapterKind`] 标签枚举路由,不做字符串分支。

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::annotate::Annotator;
use crate::registry::DetectorSpec;
use crate::BBox;

/// 适配器类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// SSD 系列检测器 (固定输入,归一化坐标输出)
    Ssd,
    /// YOLO 系列检测器 (端到端像素坐标输出)
    Yolo,
    /// 全图分类网络
    Classify,
}

/// 统一的模型能力接口
///
/// ## 核心流程
/// ```text
/// 原始帧 → preprocess → NCHW 张量
///        ↓
///    推理引擎 infer
///        ↓
///    原始输出 → postprocess → 检测记录 → render → 标注帧
/// ```
pub trait Detector {
    /// 预处理: 帧 → NCHW 张量
    fn preprocess(&self, image: &RgbImage) -> Result<Array<f32, IxDyn>>;

    /// 推理: 前向传播,返回模型原始输出(未解码)
    fn infer(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测记录 (像素坐标)
    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, image: &RgbImage) -> Result<Vec<BBox>>;

    /// 把检测记录绘制到帧上
    fn render(&self, frame: &mut RgbImage, detections: &[BBox], annotator: &Annotator);

    /// 完整推理流程,默认实现串联四个阶段
    fn detect(&mut self, frame: &mut RgbImage, annotator: &Annotator) -> Result<Vec<BBox>> {
        let xs = self.preprocess(frame)?;
        let ys = self.infer(xs)?;
        let detections = self.postprocess(ys, frame)?;
        self.render(frame, &detections, annotator);
        Ok(detections)
    }

    /// 调整置信度阈值 (None 表示不过滤)
    fn set_conf(&mut self, conf: Option<f32>);

    fn conf(&self) -> Option<f32>;

    /// 打印模型信息
    fn summary(&self);
}

/// 根据描述符构造适配器并加载模型
pub fn make_detector(spec: &DetectorSpec) -> Result<Box<dyn Detector>> {
    match spec.kind {
        AdapterKind::Ssd => Ok(Box::new(SsdDetector::load(spec)?)),
        AdapterKind::Yolo => Ok(Box::new(YoloDetector::load(spec)?)),
        AdapterKind::Classify => Ok(Box::new(Classifier::load(spec)?)),
    }
}

/// 读取类别名文件 (每行一个标签,顺序与训练类别索引一致)
pub fn read_class_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("无法读取类别名文件: {}", path.as_ref().display()))?;
    Ok(text
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

// 各模型族的具体实现
pub mod classifier;
pub mod ssd;
pub mod yolo;

// Re-exports
pub use classifier::Classifier;
pub use ssd::SsdDetector;
pub use yolo::YoloDetector;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_kind_serde() {
        assert_eq!(
            serde_json::to_string(&AdapterKind::Classify).unwrap(),
            "\"classify\""
        );
        let kind: AdapterKind = serde_json::from_str("\"ssd\"").unwrap();
        assert_eq!(kind, AdapterKind::Ssd);
    }
}
