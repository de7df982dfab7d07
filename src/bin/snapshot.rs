/// 单张图片检测 (CLI)
///
/// 读入一张图片,运行指定检测器,保存标注结果。
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;

use detection_studio::annotate::Annotator;
use detection_studio::dispatch::Dispatcher;
use detection_studio::registry::{Manifest, Registry};
use detection_studio::screenshot_file_name;

#[derive(Parser, Debug)]
#[command(author, version, about = "单张图片检测", long_about = None)]
struct Args {
    /// 输入图片 (PNG/JPG/JPEG)
    #[arg(short, long)]
    input: String,

    /// 检测器名称
    #[arg(short, long, default_value = "MobileNet v3 large")]
    detector: String,

    /// 输出路径 (默认时间戳文件名)
    #[arg(short, long)]
    output: Option<String>,

    /// 模型清单文件 (JSON)
    #[arg(long, default_value = "models/detectors.json")]
    manifest: String,

    /// 标签字体文件
    #[arg(long, default_value = "assets/font.ttf")]
    font: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let manifest = Manifest::load(&args.manifest);
    let registry = Registry::load_all(&manifest)?;
    let mut dispatcher = Dispatcher::new(registry, Annotator::new(&args.font));

    let image = image::open(&args.input)
        .with_context(|| format!("无法读取输入图片: {}", args.input))?;
    let mut frame = image.to_rgb8();

    let start = Instant::now();
    let detections = dispatcher.detect(&args.detector, &mut frame, false)?;
    let elapsed = start.elapsed();

    println!("🔍 检测器: {}", args.detector);
    println!("⏱  耗时: {:?}", elapsed);
    println!("🎯 检出 {} 个目标", detections.len());
    for bbox in &detections {
        println!(
            "  - 类别 {} 置信度 {:.2}% 框 ({:.0},{:.0})-({:.0},{:.0})",
            bbox.class_id,
            bbox.confidence * 100.0,
            bbox.x1,
            bbox.y1,
            bbox.x2,
            bbox.y2
        );
    }

    let output = args.output.unwrap_or_else(screenshot_file_name);
    frame
        .save(&output)
        .with_context(|| format!("无法保存输出图片: {}", output))?;
    println!("💾 已保存: {}", output);

    Ok(())
}
