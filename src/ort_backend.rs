// Detection Studio 🚀 AGPL-3.0 License
//
// ONNX Runtime 推理引擎封装
// 所有模型(SSD / YOLO / 分类网络)统一经由该结构加载与执行

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use ort::{GraphOptimizationLevel, Session, ValueType};

/// 模型元数据类别表的解析正则
/// (ultralytics 导出的模型在 `names` 字段内嵌 `{0: 'person', ...}` 形式的字典)
static NAMES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).unwrap());

/// 运行期模型句柄
///
/// 进程生命周期内只加载一次,不支持热重载。
pub struct OrtBackend {
    session: Session,
    height: u32,
    width: u32,
}

impl OrtBackend {
    /// 加载 ONNX 模型
    ///
    /// `fallback_size`: 模型输入为动态维度时使用的 (height, width)
    pub fn load<P: AsRef<Path>>(path: P, fallback_size: (u32, u32)) -> Result<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?;

        #[cfg(feature = "cuda")]
        let builder = builder
            .with_execution_providers([ort::CUDAExecutionProvider::default().build()])?;

        let session = builder
            .commit_from_file(path.as_ref())
            .with_context(|| format!("无法加载模型文件: {}", path.as_ref().display()))?;

        // 从输入张量形状推断模型输入尺寸 (NCHW)
        let (height, width) = match &session.inputs[0].input_type {
            ValueType::Tensor { dimensions, .. } => {
                let h = dimensions
                    .get(2)
                    .copied()
                    .filter(|&d| d > 0)
                    .map(|d| d as u32)
                    .unwrap_or(fallback_size.0);
                let w = dimensions
                    .get(3)
                    .copied()
                    .filter(|&d| d > 0)
                    .map(|d| d as u32)
                    .unwrap_or(fallback_size.1);
                (h, w)
            }
            _ => fallback_size,
        };

        Ok(Self {
            session,
            height,
            width,
        })
    }

    /// 执行一次前向传播 (fp32),按模型输出顺序返回全部张量
    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        let ys = self.session.run(ort::inputs![xs.view()]?)?;
        let mut outputs = Vec::new();
        for (_name, value) in ys.iter() {
            let y = value
                .try_extract_tensor::<f32>()
                .context("输出张量提取失败 (期望 fp32)")?;
            outputs.push(y.to_owned());
        }
        Ok(outputs)
    }

    /// 读取模型自带的类别名表
    pub fn names(&self) -> Option<Vec<String>> {
        let raw = self.fetch_from_metadata("names")?;
        let mut names = Vec::new();
        for (_, [_, name, _]) in NAMES_RE.captures_iter(&raw).map(|c| c.extract()) {
            names.push(name.to_string());
        }
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    fn fetch_from_metadata(&self, key: &str) -> Option<String> {
        let meta = self.session.metadata().ok()?;
        meta.custom(key).ok()?
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_regex() {
        // 与 ultralytics 导出格式一致的字典字符串
        let raw = "{0: 'person', 1: 'bicycle', 2: 'fire hydrant'}";
        let names: Vec<&str> = NAMES_RE
            .captures_iter(raw)
            .map(|c| c.extract::<3>().1[1])
            .collect();
        assert_eq!(names, vec!["person", "bicycle", "fire hydrant"]);
    }
}
