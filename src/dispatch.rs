//! 检测调度器
//!
//! 按检测器名称把帧路由到对应适配器,测量推理耗时,
//! 并按需在帧上叠加 FPS 读数。

use image::RgbImage;
use std::time::Instant;

use crate::annotate::Annotator;
use crate::error::AppError;
use crate::registry::Registry;
use crate::BBox;

pub struct Dispatcher {
    registry: Registry,
    annotator: Annotator,
}

impl Dispatcher {
    pub fn new(registry: Registry, annotator: Annotator) -> Self {
        Self {
            registry,
            annotator,
        }
    }

    /// 对一帧执行检测
    ///
    /// 名称必须精确命中注册表;未知名称是显式错误而不是静默跳过,
    /// 否则配置问题会表现为"画面没有框"而无从排查。
    /// `show_fps` 为真时叠加 1/耗时,保留两位小数。
    pub fn detect(
        &mut self,
        name: &str,
        frame: &mut RgbImage,
        show_fps: bool,
    ) -> Result<Vec<BBox>, AppError> {
        let start = Instant::now();

        let detector = self
            .registry
            .get_mut(name)
            .ok_or_else(|| AppError::UnknownDetector(name.to_string()))?;
        let detections = detector.detect(frame, &self.annotator)?;

        let elapsed = start.elapsed().as_secs_f64();
        if show_fps && elapsed > 0.0 {
            self.annotator.draw_fps(frame, 1.0 / elapsed);
        }
        Ok(detections)
    }

    pub fn detector_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// 调整指定检测器的置信度阈值
    pub fn set_conf(&mut self, name: &str, conf: Option<f32>) -> Result<(), AppError> {
        let detector = self
            .registry
            .get_mut(name)
            .ok_or_else(|| AppError::UnknownDetector(name.to_string()))?;
        detector.set_conf(conf);
        Ok(())
    }

    pub fn conf(&self, name: &str) -> Option<f32> {
        self.registry.get(name).and_then(|d| d.conf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdapterKind, Detector};
    use crate::registry::{DetectorSpec, Entry, Framework};
    use anyhow::Result;
    use image::Rgb;
    use ndarray::{Array, IxDyn};

    /// 测试桩: 把整帧涂成固定颜色
    struct PaintDetector {
        conf: Option<f32>,
    }

    impl Detector for PaintDetector {
        fn preprocess(&self, _image: &RgbImage) -> Result<Array<f32, IxDyn>> {
            Ok(Array::zeros(IxDyn(&[1])))
        }

        fn infer(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
            Ok(vec![xs])
        }

        fn postprocess(
            &self,
            _ys: Vec<Array<f32, IxDyn>>,
            _image: &RgbImage,
        ) -> Result<Vec<BBox>> {
            Ok(vec![BBox::new(0.0, 0.0, 1.0, 1.0, 0.9, 0)])
        }

        fn render(&self, frame: &mut RgbImage, _detections: &[BBox], _annotator: &Annotator) {
            for px in frame.pixels_mut() {
                *px = Rgb([1, 2, 3]);
            }
        }

        fn set_conf(&mut self, conf: Option<f32>) {
            self.conf = conf;
        }

        fn conf(&self) -> Option<f32> {
            self.conf
        }

        fn summary(&self) {}
    }

    fn stub_dispatcher() -> Dispatcher {
        let entry = Entry {
            spec: DetectorSpec {
                name: "stub".to_string(),
                model: String::new(),
                weights: None,
                classes: None,
                framework: Framework::TorchCustom,
                kind: AdapterKind::Yolo,
                conf: None,
            },
            detector: Box::new(PaintDetector { conf: None }),
        };
        Dispatcher::new(
            Registry::from_entries(vec![entry]),
            Annotator::without_font(),
        )
    }

    #[test]
    fn test_unknown_detector_is_explicit_error() {
        let mut dispatcher = stub_dispatcher();
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let before = frame.clone();

        let err = dispatcher.detect("no-such-model", &mut frame, false);
        assert!(matches!(err, Err(AppError::UnknownDetector(ref n)) if n == "no-such-model"));
        // 帧必须保持未修改: 不允许静默空操作假装成功
        assert_eq!(frame, before);
    }

    #[test]
    fn test_known_detector_runs_and_annotates() {
        let mut dispatcher = stub_dispatcher();
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));

        let detections = dispatcher.detect("stub", &mut frame, false).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(frame.get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_set_conf_round_trip() {
        let mut dispatcher = stub_dispatcher();
        assert_eq!(dispatcher.conf("stub"), None);
        dispatcher.set_conf("stub", Some(0.42)).unwrap();
        assert_eq!(dispatcher.conf("stub"), Some(0.42));
        assert!(dispatcher.set_conf("missing", Some(0.1)).is_err());
    }
}
