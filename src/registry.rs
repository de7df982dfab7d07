//! 模型注册表 - 启动时一次性同步加载全部检测器
//!
//! 清单文件(JSON)描述每个检测器的模型工件/类别文件/框架来源与适配器类型。
//! 任何一个模型加载失败都是致命错误: 调度器没有降级路径,
//! 不允许注册表处于半加载状态。

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::AppError;
use crate::models::{make_detector, AdapterKind, Detector};

/// 模型来源框架标签 (记录训练生态,不影响运行期加载方式)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Tensorflow,
    TorchHub,
    TorchCustom,
}

/// 检测器描述符,注册表构造后不可变
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorSpec {
    /// 显示名称,同时是调度键
    pub name: String,
    /// 主模型工件 (ONNX)
    pub model: String,
    /// 附属权重工件 (TensorFlow 式 graph/weights 成对发布时保留)
    #[serde(default)]
    pub weights: Option<String>,
    /// 类别名文件: 每行一个标签,顺序与训练类别索引一致
    #[serde(default)]
    pub classes: Option<String>,
    pub framework: Framework,
    /// 适配器类型
    pub kind: AdapterKind,
    /// 适配器置信度阈值 (None 表示不过滤)
    #[serde(default)]
    pub conf: Option<f32>,
}

/// 模型清单
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub detectors: Vec<DetectorSpec>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            detectors: vec![
                DetectorSpec {
                    name: "MobileNet v3 large".to_string(),
                    model: "models/mobilenet_v3_large/ssd_mobilenet_v3_large.onnx".to_string(),
                    weights: Some("models/mobilenet_v3_large/frozen_inference_graph.pb".to_string()),
                    classes: Some("models/mobilenet_v3_large/coco_names.txt".to_string()),
                    framework: Framework::Tensorflow,
                    kind: AdapterKind::Ssd,
                    conf: Some(0.5),
                },
                DetectorSpec {
                    name: "YOLOv5".to_string(),
                    model: "models/yolov5s.onnx".to_string(),
                    weights: None,
                    classes: None,
                    framework: Framework::TorchHub,
                    kind: AdapterKind::Yolo,
                    conf: None,
                },
                DetectorSpec {
                    name: "Classification Model".to_string(),
                    model: "models/classification/classification_model.onnx".to_string(),
                    weights: None,
                    classes: Some("models/classification/class_names.txt".to_string()),
                    framework: Framework::TorchCustom,
                    kind: AdapterKind::Classify,
                    conf: None,
                },
                DetectorSpec {
                    name: "Trained Model".to_string(),
                    model: "models/detection_model.onnx".to_string(),
                    weights: None,
                    classes: None,
                    framework: Framework::TorchCustom,
                    kind: AdapterKind::Yolo,
                    conf: Some(0.6),
                },
            ],
        }
    }
}

impl Manifest {
    /// 从 JSON 文件加载清单,文件缺失或解析失败时回退到内置默认值
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(manifest) => {
                    println!("✅ 模型清单已从 {} 加载", path);
                    manifest
                }
                Err(e) => {
                    eprintln!("⚠️  清单解析失败: {}, 使用内置默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                println!("📝 清单文件 {} 不存在,使用内置默认值", path);
                Self::default()
            }
        }
    }
}

/// 已加载检测器: 描述符 + 运行期模型句柄
pub struct Entry {
    pub spec: DetectorSpec,
    pub detector: Box<dyn Detector>,
}

/// 模型注册表
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// 加载清单中的全部模型
    ///
    /// 加载是同步阻塞的;任一失败立即返回错误,调用方应中止启动。
    pub fn load_all(manifest: &Manifest) -> Result<Self, AppError> {
        let mut entries = Vec::with_capacity(manifest.detectors.len());
        for spec in &manifest.detectors {
            println!("📦 正在加载检测器: {}", spec.name);
            let detector = make_detector(spec).map_err(|e| AppError::ModelLoad {
                name: spec.name.clone(),
                reason: format!("{:#}", e),
            })?;
            entries.push(Entry {
                spec: spec.clone(),
                detector,
            });
        }
        Ok(Self { entries })
    }

    /// 由既有条目直接构造 (测试桩注入用)
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Detector> {
        self.entries
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| e.detector.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Detector>> {
        self.entries
            .iter_mut()
            .find(|e| e.spec.name == name)
            .map(|e| &mut e.detector)
    }

    /// 打印全部已加载模型的信息
    pub fn print_summaries(&self) {
        for entry in &self.entries {
            entry.detector.summary();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = Manifest::default();
        assert_eq!(manifest.detectors.len(), 4);
        assert_eq!(manifest.detectors[0].name, "MobileNet v3 large");
        assert_eq!(manifest.detectors[0].kind, AdapterKind::Ssd);
        assert_eq!(manifest.detectors[1].framework, Framework::TorchHub);
        // 自训练检测器带 0.6 阈值,预训练 YOLO 不过滤
        assert_eq!(manifest.detectors[3].conf, Some(0.6));
        assert_eq!(manifest.detectors[1].conf, None);
    }

    #[test]
    fn test_manifest_json_round_trip() {
        let manifest = Manifest::default();
        let json = serde_json::to_string_pretty(&manifest).unwrap();
        // 框架标签使用 kebab-case
        assert!(json.contains("\"torch-hub\""));
        assert!(json.contains("\"tensorflow\""));
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.detectors.len(), manifest.detectors.len());
    }

    #[test]
    fn test_manifest_load_missing_falls_back() {
        let manifest = Manifest::load("/nonexistent/detectors.json");
        assert_eq!(manifest.detectors.len(), 4);
    }
}
