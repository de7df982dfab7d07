// Detection Studio 🚀 AGPL-3.0 License
//
// SSD 系列检测器适配器 (TensorFlow 导出的 SSD MobileNet 等)
//
// 输出为固定形状候选矩阵 (1,1,N,7),每行:
// [reserved, class_id, confidence, x1, y1, x2, y2]
// 坐标是 [0,1] 归一化值,需按帧尺寸逐元素还原

use anyhow::Result;
use image::RgbImage;
use ndarray::{Array, IxDyn};

use crate::annotate::{label_text, Annotator};
use crate::models::{read_class_names, Detector};
use crate::ort_backend::OrtBackend;
use crate::registry::DetectorSpec;
use crate::BBox;

/// 固定输入尺寸
const INPUT_SIZE: u32 = 320;
/// 像素均值与缩放: blob = (x - 127.5) / 127.5
const MEAN: f32 = 127.5;
/// 默认置信度阈值
const DEFAULT_CONF: f32 = 0.5;
/// 框与标签颜色 (绿色)
const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// SSD 检测器
pub struct SsdDetector {
    engine: OrtBackend,
    conf_threshold: Option<f32>,
    class_names: Vec<String>,
    name: String,
}

impl SsdDetector {
    pub fn load(spec: &DetectorSpec) -> Result<Self> {
        let engine = OrtBackend::load(&spec.model, (INPUT_SIZE, INPUT_SIZE))?;
        let class_names = match &spec.classes {
            Some(path) => read_class_names(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            engine,
            conf_threshold: spec.conf.or(Some(DEFAULT_CONF)),
            class_names,
            name: spec.name.clone(),
        })
    }

    /// 解码候选矩阵 → 检测记录
    ///
    /// confidence 低于阈值的行全部丢弃,其余每行恰好产出一条记录。
    /// 坐标按 (w,h,w,h) 逐元素相乘后向零截断为整数像素。
    pub fn decode_rows(
        output: &Array<f32, IxDyn>,
        frame_w: u32,
        frame_h: u32,
        conf_threshold: f32,
    ) -> Vec<BBox> {
        let (w, h) = (frame_w as f32, frame_h as f32);
        let flat: Vec<f32> = output.iter().copied().collect();

        let mut detections = Vec::new();
        for row in flat.chunks_exact(7) {
            let class_id = row[1];
            let confidence = row[2];
            if confidence < conf_threshold {
                continue;
            }
            let x1 = (row[3] * w) as i32 as f32;
            let y1 = (row[4] * h) as i32 as f32;
            let x2 = (row[5] * w) as i32 as f32;
            let y2 = (row[6] * h) as i32 as f32;
            detections.push(BBox::new(
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id.max(0.0) as u32,
            ));
        }
        detections
    }

    fn label(&self, class_id: u32) -> String {
        label_for(&self.class_names, class_id)
    }
}

/// 类别标签: 类别文件相对模型输出是 1 起始的,按 class_id - 1 取词并转大写。
/// 越界时退化为数字标签,不允许越界访问。
pub fn label_for(class_names: &[String], class_id: u32) -> String {
    let index = (class_id as usize).wrapping_sub(1);
    match class_names.get(index) {
        Some(name) => name.to_uppercase(),
        None => format!("#{}", class_id),
    }
}

impl Detector for SsdDetector {
    fn preprocess(&self, image: &RgbImage) -> Result<Array<f32, IxDyn>> {
        // 不保持纵横比,直接缩放到固定输入尺寸
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
            let [r, g, b] = rgb.0;
            xs[[0, 0, y, x]] = (r as f32 - MEAN) / MEAN;
            xs[[0, 1, y, x]] = (g as f32 - MEAN) / MEAN;
            xs[[0, 2, y, x]] = (b as f32 - MEAN) / MEAN;
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
        Ok(Self::decode_rows(
            output,
            image.width(),
            image.height(),
            self.conf_threshold.unwrap_or(0.0),
        ))
    }

    fn render(&self, frame: &mut RgbImage, detections: &[BBox], annotator: &Annotator) {
        for bbox in detections {
            annotator.draw_box(frame, bbox, BOX_COLOR);
            let text = label_text(&self.label(bbox.class_id), bbox.confidence);
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
        println!("\n[SSD 模型信息] {}", self.name);
        println!("  输入尺寸: {}x{}", INPUT_SIZE, INPUT_SIZE);
        println!("  类别数量: {}", self.class_names.len());
        println!("  置信度阈值: {:?}", self.conf_threshold);
        println!("  引擎输入: {}x{}", self.engine.width(), self.engine.height());
    }
}
