//! 命令行参数

use clap::Parser;

/// 检测工作台参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "智能检测工作台 - 多模型目标检测", long_about = None)]
pub struct Args {
    /// 模型清单文件 (JSON)
    #[arg(long, default_value = "models/detectors.json")]
    pub manifest: String,

    /// 摄像头设备索引 (/dev/video{N})
    #[arg(long, default_value_t = 0)]
    pub camera: usize,

    /// 启动时选中的检测器名称
    #[arg(long, default_value = "MobileNet v3 large")]
    pub detector: String,

    /// 标签字体文件 (缺失时只画框不写字)
    #[arg(long, default_value = "assets/font.ttf")]
    pub font: String,

    /// 摄像头画面不叠加FPS
    #[arg(long, default_value_t = false)]
    pub hide_fps: bool,
}
