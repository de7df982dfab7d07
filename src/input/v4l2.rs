//! V4L2 摄像头输入 (/dev/video{N})

use anyhow::{Context, Result};
use image::RgbImage;
use std::pin::Pin;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use super::FrameSource;

/// 默认采集分辨率
const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;

/// V4L2 摄像头帧源
///
/// v4l 的 Stream 借用 Device,因此 Device 以 Pin<Box> 固定内存地址,
/// 使引用它的 Stream 可以安全存放在同一结构体内。
pub struct V4l2Camera {
    device: Pin<Box<Device>>,
    stream: Option<Stream<'static>>,
    width: u32,
    height: u32,
}

impl V4l2Camera {
    /// 打开指定索引的摄像头设备
    pub fn open(index: usize) -> Result<Self> {
        let device = Box::pin(
            Device::new(index)
                .with_context(|| format!("无法打开摄像头设备 /dev/video{}", index))?,
        );

        let mut format = device.format().context("无法查询摄像头格式")?;
        format.width = CAPTURE_WIDTH;
        format.height = CAPTURE_HEIGHT;
        format.fourcc = FourCC::new(b"YUYV");
        let format = device.set_format(&format).context("无法设置摄像头格式")?;
        if format.fourcc.repr != *b"YUYV" {
            anyhow::bail!("摄像头不支持 YUYV 输出: {}", format.fourcc);
        }

        let mut camera = Self {
            device,
            stream: None,
            width: format.width,
            height: format.height,
        };

        // SAFETY: device 被 Pin<Box> 固定在堆上不会移动;
        // stream 与 device 存于同一结构体,Drop 先取走 stream 再释放 device。
        let device_ref: &Device = &camera.device;
        let stream = unsafe {
            let device_static: &'static Device = std::mem::transmute(device_ref);
            Stream::with_buffers(device_static, Type::VideoCapture, 4)
                .context("无法创建采集流")?
        };
        camera.stream = Some(stream);

        println!(
            "📷 摄像头已打开: /dev/video{} ({}x{})",
            index, camera.width, camera.height
        );
        Ok(camera)
    }

    /// YUYV → RGB
    fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);

        for chunk in yuyv.chunks_exact(4) {
            let y0 = chunk[0] as f32;
            let u = chunk[1] as f32 - 128.0;
            let y1 = chunk[2] as f32;
            let v = chunk[3] as f32 - 128.0;

            for y in [y0, y1] {
                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
                rgb.extend_from_slice(&[r, g, b]);
            }
        }

        rgb.truncate((width * height * 3) as usize);
        rgb
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        // stream 必须先于 device 释放
        self.stream.take();
    }
}

impl FrameSource for V4l2Camera {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let stream = self.stream.as_mut().context("采集流已关闭")?;
        let (buffer, _meta) = stream.next().context("摄像头读帧失败")?;
        let rgb = Self::yuyv_to_rgb(buffer, self.width, self.height);
        RgbImage::from_raw(self.width, self.height, rgb).context("无法构造 RGB 帧")
    }
}
