//! 帧上绘制 - 检测框 / 标签文字 / FPS 叠加

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::BBox;

/// FPS 叠加位置与颜色 (红色,画面左上角固定位置)
const FPS_POS: (i32, i32) = (5, 25);
const FPS_COLOR: [u8; 3] = [255, 0, 0];
const FPS_SCALE: f32 = 24.0;
/// 标签文字大小
const LABEL_SCALE: f32 = 16.0;
/// 框线宽
const STROKE: i32 = 2;

/// 绘制工具
///
/// 字体是运行期从文件加载的;缺失时检测框照常绘制,只是省略文字标签。
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font_path: &str) -> Self {
        let font = std::fs::read(font_path)
            .ok()
            .and_then(|data| FontVec::try_from_vec(data).ok());
        if font.is_none() {
            eprintln!("⚠️  字体文件 {} 不可用,标签文字将被省略", font_path);
        }
        Self { font }
    }

    /// 无字体绘制器 (只画框)
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// 绘制检测框,线宽 2
    pub fn draw_box(&self, frame: &mut RgbImage, bbox: &BBox, color: [u8; 3]) {
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let x1 = (bbox.x1 as i32).clamp(0, w - 1);
        let y1 = (bbox.y1 as i32).clamp(0, h - 1);
        let x2 = (bbox.x2 as i32).clamp(0, w - 1);
        let y2 = (bbox.y2 as i32).clamp(0, h - 1);
        if x1 >= x2 || y1 >= y2 {
            return;
        }
        for t in 0..STROKE {
            let bw = (x2 - x1 - 2 * t).max(1) as u32;
            let bh = (y2 - y1 - 2 * t).max(1) as u32;
            let rect = Rect::at(x1 + t, y1 + t).of_size(bw, bh);
            draw_hollow_rect_mut(frame, rect, Rgb(color));
        }
    }

    /// 在指定位置绘制标签文字 (检测框上缘上方)
    pub fn draw_label(&self, frame: &mut RgbImage, text: &str, x: i32, y: i32, color: [u8; 3]) {
        let Some(font) = &self.font else { return };
        draw_text_mut(
            frame,
            Rgb(color),
            x.max(0),
            y.max(0),
            PxScale::from(LABEL_SCALE),
            font,
            text,
        );
    }

    /// FPS 叠加
    pub fn draw_fps(&self, frame: &mut RgbImage, fps: f64) {
        let Some(font) = &self.font else { return };
        draw_text_mut(
            frame,
            Rgb(FPS_COLOR),
            FPS_POS.0,
            FPS_POS.1,
            PxScale::from(FPS_SCALE),
            font,
            &fps_text(fps),
        );
    }
}

/// FPS 文本,两位小数
pub fn fps_text(fps: f64) -> String {
    format!("FPS: {:.2}", fps)
}

/// 标签文本: 类别名 + 百分比置信度
pub fn label_text(label: &str, confidence: f32) -> String {
    format!("{} {:.2}%", label, confidence * 100.0)
}
