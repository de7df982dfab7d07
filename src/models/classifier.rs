// Detection Studio 🚀 AGPL-3.0 License
//
// 全图分类适配器 (非检测器,不产生检测框)
//
// 分类结果逐类打印到诊断流,不在显示帧上叠加。

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::annotate::Annotator;
use crate::models::{read_class_names, Detector};
use crate::ort_backend::OrtBackend;
use crate::registry::DetectorSpec;
use crate::BBox;

/// 固定输入尺寸
const INPUT_SIZE: u32 = 150;
/// ImageNet 归一化参数
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 分类网络
pub struct Classifier {
    engine: OrtBackend,
    class_names: Vec<String>,
    name: String,
}

impl Classifier {
    pub fn load(spec: &DetectorSpec) -> Result<Self> {
        let engine = OrtBackend::load(&spec.model, (INPUT_SIZE, INPUT_SIZE))?;
        let class_names = match &spec.classes {
            Some(path) => read_class_names(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            engine,
            class_names,
            name: spec.name.clone(),
        })
    }

    /// softmax (数值稳定版)
    pub fn softmax(x: &[f32]) -> Vec<f32> {
        let max_val = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = x.iter().map(|&v| (v - max_val).exp()).sum();
        x.iter().map(|&v| (v - max_val).exp() / exp_sum).collect()
    }

    /// 最大概率类别索引
    pub fn argmax(x: &[f32]) -> usize {
        x.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn class_name(&self, index: usize) -> String {
        self.class_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class {}", index))
    }
}

impl Detector for Classifier {
    fn preprocess(&self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        let resized = image::imageops::resize(
            image,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let mut xs =
            Array::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize)).into_dyn();
        for (x, y, rgb) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                xs[[0, c, y, x]] = (rgb.0[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
        Ok(xs)
    }

    fn infer(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs)
    }

    /// 分类器不产生检测框
    fn postprocess(&self, _ys: Vec<Array<f32, IxDyn>>, _image: &RgbImage) -> Result<Vec<BBox>> {
        Ok(Vec::new())
    }

    fn render(&self, _frame: &mut RgbImage, _detections: &[BBox], _annotator: &Annotator) {}

    /// 完整流程: 推理后逐类打印概率与最终预测,帧保持原样
    fn detect(&mut self, frame: &mut RgbImage, _annotator: &Annotator) -> Result<Vec<BBox>> {
        let xs = self.preprocess(frame)?;
        let ys = self.infer(xs)?;
        let logits: Vec<f32> = ys
            .first()
            .context("分类网络没有输出")?
            .iter()
            .copied()
            .collect();

        let probabilities = Self::softmax(&logits);
        let predicted = Self::argmax(&probabilities);

        for (i, prob) in probabilities.iter().enumerate() {
            println!("{}: {:.3}", self.class_name(i), prob);
        }
        println!("Predicted class: {}\n", self.class_name(predicted));

        Ok(Vec::new())
    }

    fn set_conf(&mut self, _conf: Option<f32>) {}

    fn conf(&self) -> Option<f32> {
        None
    }

    fn summary(&self) {
        println!("\n[分类模型信息] {}", self.name);
        println!("  输入尺寸: {}x{}", INPUT_SIZE, INPUT_SIZE);
        println!("  类别数量: {}", self.class_names.len());
        println!("  归一化: ImageNet mean/std");
    }
}
