//! 应用壳 - 显示状态机
//!
//! 三态: OFF / IMAGE / CAMERA。
//! 状态保存在显式构造的结构体里,由入口函数持有并传递。
//! 重绘策略:
//! - CAMERA: 每次循环采一帧,水平镜像,执行检测后显示
//! - IMAGE: 仅在用户动作 (脏标记) 后重绘一次,对原始静态图重跑检测
//! - OFF:   渲染空白占位帧

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::path::Path;

use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::input::FrameSource;

pub mod ui;

/// OFF 状态占位帧尺寸
const BLANK_WIDTH: u32 = 640;
const BLANK_HEIGHT: u32 = 480;

/// 显示状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    Off,
    Image,
    Camera,
}

/// 摄像头打开器 (允许注入测试桩)
pub type CameraOpener = Box<dyn Fn(usize) -> Result<Box<dyn FrameSource>>>;

/// 应用壳
///
/// 持有采集设备生命周期、当前显示状态与重绘脏标记。
pub struct AppShell {
    dispatcher: Dispatcher,
    opener: CameraOpener,
    camera_index: usize,
    view: ViewState,
    source: Option<Box<dyn FrameSource>>,
    /// 上传的原始静态图 (切换检测器时从这里重跑,避免在标注结果上再标注)
    still: Option<RgbImage>,
    /// 当前显示帧 (已叠加标注)
    display: Option<RgbImage>,
    dirty: bool,
    selected: String,
    pub show_fps: bool,
}

impl AppShell {
    pub fn new(
        dispatcher: Dispatcher,
        opener: CameraOpener,
        camera_index: usize,
        selected: String,
        show_fps: bool,
    ) -> Self {
        Self {
            dispatcher,
            opener,
            camera_index,
            view: ViewState::Off,
            source: None,
            still: None,
            display: None,
            dirty: true,
            selected,
            show_fps,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn display(&self) -> Option<&RgbImage> {
        self.display.as_ref()
    }

    pub fn has_camera(&self) -> bool {
        self.source.is_some()
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn detector_names(&self) -> Vec<String> {
        self.dispatcher.detector_names()
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// 切换检测器,触发一次重绘
    pub fn select_detector(&mut self, name: &str) {
        if name != self.selected {
            self.selected = name.to_string();
            self.dirty = true;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// 开关摄像头
    ///
    /// 非 CAMERA → CAMERA: 打开设备;失败时设备保持释放,状态不变。
    /// CAMERA → OFF: 释放设备。
    pub fn toggle_camera(&mut self) -> Result<(), AppError> {
        if self.view != ViewState::Camera {
            match (self.opener)(self.camera_index) {
                Ok(source) => {
                    self.source = Some(source);
                    self.view = ViewState::Camera;
                    self.dirty = true;
                    Ok(())
                }
                Err(e) => {
                    self.source = None;
                    Err(AppError::CameraOpen {
                        index: self.camera_index,
                        reason: e.to_string(),
                    })
                }
            }
        } else {
            self.source = None;
            self.view = ViewState::Off;
            self.dirty = true;
            Ok(())
        }
    }

    /// 上传静态图
    ///
    /// 成功进入 IMAGE 状态并释放摄像头;
    /// 读取失败时状态与当前帧保持原样 (不向后传播空帧)。
    pub fn upload_image<P: AsRef<Path>>(&mut self, path: P) -> Result<(), AppError> {
        let image = image::open(path.as_ref()).map_err(|e| AppError::ImageRead {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        self.still = Some(image.to_rgb8());
        self.source = None;
        self.view = ViewState::Image;
        self.dirty = true;
        Ok(())
    }

    /// 把当前显示帧保存到文件 (按扩展名编码,默认约定 JPEG)
    pub fn screenshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let frame = self.display.as_ref().context("当前没有可保存的帧")?;
        frame
            .save(path.as_ref())
            .with_context(|| format!("截图保存失败: {}", path.as_ref().display()))?;
        println!("💾 截图已保存: {}", path.as_ref().display());
        Ok(())
    }

    /// 驱动一次重绘
    pub fn tick(&mut self) {
        match self.view {
            ViewState::Camera => {
                let frame = match self.source.as_mut() {
                    Some(source) => source.read_frame(),
                    None => return,
                };
                match frame {
                    Ok(mut frame) => {
                        // 镜像显示
                        image::imageops::flip_horizontal_in_place(&mut frame);
                        if let Err(e) =
                            self.dispatcher.detect(&self.selected, &mut frame, self.show_fps)
                        {
                            eprintln!("❌ 检测失败: {}", e);
                        }
                        self.display = Some(frame);
                    }
                    // 读帧失败保留上一帧
                    Err(e) => eprintln!("⚠️  摄像头读帧失败: {}", e),
                }
            }
            ViewState::Image => {
                if !self.dirty {
                    return;
                }
                if let Some(still) = self.still.clone() {
                    let mut frame = still;
                    // 静态图不叠加 FPS
                    if let Err(e) = self.dispatcher.detect(&self.selected, &mut frame, false) {
                        eprintln!("❌ 检测失败: {}", e);
                    }
                    self.display = Some(frame);
                }
                self.dirty = false;
            }
            ViewState::Off => {
                if !self.dirty {
                    return;
                }
                self.display = Some(RgbImage::from_pixel(
                    BLANK_WIDTH,
                    BLANK_HEIGHT,
                    Rgb([255, 255, 255]),
                ));
                self.dirty = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Annotator;
    use crate::registry::Registry;

    /// 固定帧测试桩
    struct StubSource {
        frame: RgbImage,
    }

    impl FrameSource for StubSource {
        fn read_frame(&mut self) -> Result<RgbImage> {
            Ok(self.frame.clone())
        }
    }

    fn shell_with_opener(opener: CameraOpener) -> AppShell {
        let dispatcher = Dispatcher::new(Registry::from_entries(vec![]), Annotator::without_font());
        AppShell::new(dispatcher, opener, 0, "stub".to_string(), true)
    }

    fn working_opener() -> CameraOpener {
        Box::new(|_index| {
            Ok(Box::new(StubSource {
                frame: RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])),
            }) as Box<dyn FrameSource>)
        })
    }

    fn failing_opener() -> CameraOpener {
        Box::new(|index| Err(anyhow::anyhow!("设备 {} 不存在", index)))
    }

    #[test]
    fn test_toggle_twice_releases_device() {
        let mut shell = shell_with_opener(working_opener());
        assert_eq!(shell.view(), ViewState::Off);

        shell.toggle_camera().unwrap();
        assert_eq!(shell.view(), ViewState::Camera);
        assert!(shell.has_camera());

        shell.toggle_camera().unwrap();
        assert_eq!(shell.view(), ViewState::Off);
        assert!(!shell.has_camera());
    }

    #[test]
    fn test_open_failure_stays_off() {
        let mut shell = shell_with_opener(failing_opener());
        let err = shell.toggle_camera();
        assert!(matches!(err, Err(AppError::CameraOpen { index: 0, .. })));
        assert_eq!(shell.view(), ViewState::Off);
        assert!(!shell.has_camera());
    }

    #[test]
    fn test_upload_invalid_path_leaves_state_unchanged() {
        let mut shell = shell_with_opener(working_opener());
        shell.tick(); // OFF 占位帧
        let before = shell.display().cloned();

        let err = shell.upload_image("/nonexistent/picture.png");
        assert!(matches!(err, Err(AppError::ImageRead { .. })));
        assert_eq!(shell.view(), ViewState::Off);
        assert!(shell.still.is_none());
        assert_eq!(shell.display().cloned(), before);
    }

    #[test]
    fn test_upload_valid_image_enters_image_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(6, 5, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut shell = shell_with_opener(working_opener());
        shell.upload_image(&path).unwrap();
        assert_eq!(shell.view(), ViewState::Image);
        let still = shell.still.as_ref().unwrap();
        assert_eq!(still.dimensions(), (6, 5));
    }

    #[test]
    fn test_upload_releases_camera() {
        let mut shell = shell_with_opener(working_opener());
        shell.toggle_camera().unwrap();
        assert!(shell.has_camera());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(2, 2, Rgb([1, 1, 1])).save(&path).unwrap();

        shell.upload_image(&path).unwrap();
        assert_eq!(shell.view(), ViewState::Image);
        assert!(!shell.has_camera());
    }

    #[test]
    fn test_off_tick_renders_blank_placeholder() {
        let mut shell = shell_with_opener(working_opener());
        shell.tick();
        let display = shell.display().unwrap();
        assert_eq!(display.dimensions(), (640, 480));
        assert_eq!(display.get_pixel(0, 0), &Rgb([255, 255, 255]));
        // 非动作状态下不再重绘
        assert!(!shell.dirty);
    }

    #[test]
    fn test_image_redraw_happens_once_per_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(3, 3, Rgb([5, 5, 5])).save(&path).unwrap();

        let mut shell = shell_with_opener(working_opener());
        shell.upload_image(&path).unwrap();
        assert!(shell.dirty);
        shell.tick();
        assert!(!shell.dirty);
        assert!(shell.display().is_some());

        // 动作 (切换检测器) 重新置脏
        shell.select_detector("other");
        assert!(shell.dirty);
    }

    #[test]
    fn test_camera_tick_mirrors_frame() {
        let opener: CameraOpener = Box::new(|_| {
            // 左上角一个白点,镜像后应出现在右上角
            let mut frame = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
            frame.put_pixel(0, 0, Rgb([255, 255, 255]));
            Ok(Box::new(StubSource { frame }) as Box<dyn FrameSource>)
        });
        let mut shell = shell_with_opener(opener);
        shell.toggle_camera().unwrap();
        shell.tick();

        let display = shell.display().unwrap();
        assert_eq!(display.get_pixel(3, 0), &Rgb([255, 255, 255]));
        assert_eq!(display.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
