// Detection Studio 🚀 AGPL-3.0 License
//
// YOLO 系列检测器适配器
//
// 面向端到端导出的模型 (NMS 已在图内完成),输出为变长候选列表,
// 每行 [x1, y1, x2, y2, confidence, class_id],坐标即模型输入像素坐标系,
// 只需按 letterbox 缩放比还原到原帧,不需要反归一化。

use anyhow::Result;
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::annotate::{label_text, Annotator};
use crate::models::Detector;
use crate::ort_backend::OrtBackend;
use crate::registry::DetectorSpec;
use crate::BBox;

/// 输入为动态维度时的默认尺寸
const FALLBACK_SIZE: u32 = 640;
/// letterbox 填充灰度
const PAD_VALUE: f32 = 144.0 / 255.0;
/// 框与标签颜色 (红色)
const BOX_COLOR: [u8; 3] = [255, 0, 0];

/// YOLO 检测器
///
/// 类别名取自模型自带的元数据表,不读外部文件。
/// 预训练通用模型不做适配器层置信度过滤 (模型返回什么画什么);
/// 自训练变体带 0.6 阈值。
pub struct YoloDetector {
    engine: OrtBackend,
    names: Vec<String>,
    conf_threshold: Option<f32>,
    height: u32,
    width: u32,
    name: String,
}

impl YoloDetector {
    pub fn load(spec: &DetectorSpec) -> Result<Self> {
        let engine = OrtBackend::load(&spec.model, (FALLBACK_SIZE, FALLBACK_SIZE))?;
        let names = engine
            .names()
            .unwrap_or_else(|| vec!["Unknown".to_string()]);
        let (height, width) = (engine.height(), engine.width());
        Ok(Self {
            engine,
            names,
            conf_threshold: spec.conf,
            height,
            width,
            name: spec.name.clone(),
        })
    }

    /// letterbox 缩放比与目标尺寸
    fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// 解码端到端输出行
    ///
    /// `ratio`: letterbox 缩放比,坐标除以它还原到原帧
    /// `conf_threshold`: None 表示不过滤 (零置信度的填充行除外)
    pub fn decode_rows(
        output: &Array<f32, IxDyn>,
        ratio: f32,
        frame_w: u32,
        frame_h: u32,
        conf_threshold: Option<f32>,
    ) -> Vec<BBox> {
        let (w, h) = (frame_w as f32, frame_h as f32);
        let flat: Vec<f32> = output.iter().copied().collect();

        let mut detections = Vec::new();
        for row in flat.chunks_exact(6) {
            let confidence = row[4];
            // 固定形状导出会用零置信度行补齐,丢弃
            if confidence <= 0.0 {
                continue;
            }
            if let Some(threshold) = conf_threshold {
                if confidence <= threshold {
                    continue;
                }
            }
            let x1 = (row[0] / ratio).clamp(0.0, w);
            let y1 = (row[1] / ratio).clamp(0.0, h);
            let x2 = (row[2] / ratio).clamp(0.0, w);
            let y2 = (row[3] / ratio).clamp(0.0, h);
            detections.push(BBox::new(
                x1,
                y1,
                x2,
                y2,
                confidence,
                row[5].max(0.0) as u32,
            ));
        }
        detections
    }

    fn label(&self, class_id: u32) -> &str {
        self.names
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

impl Detector for YoloDetector {
    fn preprocess(&self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        let (w0, h0) = (image.width() as f32, image.height() as f32);
        let (_, w_new, h_new) =
            Self::scale_wh(w0, h0, self.width as f32, self.height as f32);
        let resized = image::imageops::resize(
            image,
            w_new as u32,
            h_new as u32,
            image::imageops::FilterType::Triangle,
        );

        let mut xs =
            Array::ones((1, 3, self.height as usize, self.width as usize)).into_dyn();
        xs.fill(PAD_VALUE);
        for (x, y, rgb) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = rgb.0;
            xs[[0, 0, y, x]] = r as f32 / 255.0;
            xs[[0, 1, y, x]] = g as f32 / 255.0;
            xs[[0, 2, y, x]] = b as f32 / 255.0;
        }
        Ok(xs)
    }

    fn infer(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        self.engine.run(xs)
    }

    fn postprocess(&self, ys: Vec<Array<f32, IxDyn>>, image: &RgbImage) -> Result<Vec<BBox>> {
        let Some(output) = ys.first() else {
            return Ok(Vec::new());
        };
        let (w0, h0) = (image.width() as f32, image.height() as f32);
        let (ratio, _, _) = Self::scale_wh(w0, h0, self.width as f32, self.height as f32);
        Ok(Self::decode_rows(
            output,
            ratio,
            image.width(),
            image.height(),
            self.conf_threshold,
        ))
    }

    fn render(&self, frame: &mut RgbImage, detections: &[BBox], annotator: &Annotator) {
        for bbox in detections {
            annotator.draw_box(frame, bbox, BOX_COLOR);
            let text = label_text(self.label(bbox.class_id), bbox.confidence);
            annotator.draw_label(frame, &text, bbox.x1 as i32, bbox.y1 as i32 - 10, BOX_COLOR);
        }
    }

    fn set_conf(&mut self, conf: Option<f32>) {
        self.conf_threshold = conf;
    }

    fn conf(&self) -> Option<f32> {
        self.conf_threshold
    }

    fn summary(&self) {
        println!("\n[YOLO 模型信息] {}", self.name);
        println!("  输入尺寸: {}x{}", self.width, self.height);
        println!("  类别数量: {}", self.names.len());
        println!("  置信度阈值: {:?}", self.conf_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn tensor_of_rows(rows: &[[f32; 6]]) -> Array<f32, IxDyn> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array::from_shape_vec(IxDyn(&[1, rows.len(), 6]), flat).unwrap()
    }

    #[test]
    fn test_rows_are_already_pixel_coordinates() {
        // ratio=1 时坐标原样通过,不做反归一化
        let output = tensor_of_rows(&[[10.0, 20.0, 110.0, 220.0, 0.35, 7.0]]);
        let detections = YoloDetector::decode_rows(&output, 1.0, 640, 480, None);
        assert_eq!(detections.len(), 1);
        let b = &detections[0];
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (10.0, 20.0, 110.0, 220.0));
        assert_eq!(b.class_id, 7);
    }

    #[test]
    fn test_base_variant_keeps_low_confidence() {
        // 无阈值: 模型返回的低置信度候选也全部保留
        let output = tensor_of_rows(&[
            [0.0, 0.0, 10.0, 10.0, 0.05, 0.0],
            [5.0, 5.0, 20.0, 20.0, 0.95, 1.0],
        ]);
        let detections = YoloDetector::decode_rows(&output, 1.0, 640, 480, None);
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn test_trained_variant_filters_at_threshold() {
        let output = tensor_of_rows(&[
            [0.0, 0.0, 10.0, 10.0, 0.60, 0.0], // 等于阈值也丢弃 (严格大于才保留)
            [5.0, 5.0, 20.0, 20.0, 0.61, 1.0],
            [7.0, 7.0, 30.0, 30.0, 0.90, 2.0],
        ]);
        let detections = YoloDetector::decode_rows(&output, 1.0, 640, 480, Some(0.6));
        assert_eq!(detections.len(), 2);
        assert!(detections.iter().all(|b| b.confidence > 0.6));
    }

    #[test]
    fn test_padding_rows_are_dropped() {
        let output = tensor_of_rows(&[
            [5.0, 5.0, 20.0, 20.0, 0.95, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ]);
        let detections = YoloDetector::decode_rows(&output, 1.0, 640, 480, None);
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_letterbox_ratio_restores_frame_space() {
        // 1280x720 帧 → 640 输入: ratio = 0.5,坐标乘 2 还原
        let (ratio, w_new, h_new) = YoloDetector::scale_wh(1280.0, 720.0, 640.0, 640.0);
        assert_eq!(ratio, 0.5);
        assert_eq!((w_new, h_new), (640.0, 360.0));

        let output = tensor_of_rows(&[[100.0, 50.0, 300.0, 150.0, 0.8, 0.0]]);
        let detections = YoloDetector::decode_rows(&output, ratio, 1280, 720, None);
        let b = &detections[0];
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (200.0, 100.0, 600.0, 300.0));
    }
}
