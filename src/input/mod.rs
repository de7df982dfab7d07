//! 视频输入系统
//!
//! `FrameSource` 统一抽象帧来源 (本机摄像头 / 测试桩),
//! 应用壳按状态机的开关动作持有与释放设备。

use anyhow::Result;
use image::RgbImage;

/// 帧源统一接口 (阻塞式读取)
pub trait FrameSource {
    /// 读取下一帧 (RGB)
    fn read_frame(&mut self) -> Result<RgbImage>;
}

#[cfg(all(target_os = "linux", not(feature = "_diag_no_v4l")))]
pub mod v4l2;

/// 按设备索引打开本机摄像头
#[cfg(all(target_os = "linux", not(feature = "_diag_no_v4l")))]
pub fn open_camera(index: usize) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(v4l2::V4l2Camera::open(index)?))
}

#[cfg(all(target_os = "linux", feature = "_diag_no_v4l"))]
pub fn open_camera(index: usize) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("diag build without v4l, 设备索引 {}", index)
}

#[cfg(not(target_os = "linux"))]
pub fn open_camera(index: usize) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "当前平台不支持摄像头采集 (仅支持 V4L2 / Linux),设备索引 {}",
        index
    )
}
