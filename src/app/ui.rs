//! GUI 渲染 - macroquad 纹理显示 + egui 控制面板

use egui_macroquad::egui;
use macroquad::prelude::*;
use std::time::Instant;

use crate::app::{AppShell, ViewState};
use crate::screenshot_file_name;

/// GUI 渲染器: 持有帧纹理缓存与面板状态
pub struct Ui {
    texture: Option<Texture2D>,
    confidence_threshold: f32,
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
    /// 最近一次操作的诊断信息 (面板内展示)
    status: String,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui {
    pub fn new() -> Self {
        Self {
            texture: None,
            confidence_threshold: 0.5,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
            status: String::new(),
        }
    }

    /// 把当前显示帧上传为纹理
    /// 只在分辨率变化时重建纹理,否则原地更新像素数据
    pub fn update_texture(&mut self, shell: &AppShell) {
        let Some(frame) = shell.display() else { return };
        let (width, height) = frame.dimensions();

        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for px in frame.pixels() {
            rgba.extend_from_slice(&[px.0[0], px.0[1], px.0[2], 255]);
        }

        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: rgba,
                width: width as u16,
                height: height as u16,
            });
        }
    }

    /// 居中等比绘制当前帧
    pub fn draw_frame(&mut self) {
        if let Some(texture) = &self.texture {
            let scale = (screen_width() / texture.width())
                .min(screen_height() / texture.height());
            let scaled_width = texture.width() * scale;
            let scaled_height = texture.height() * scale;
            let center_x = (screen_width() - scaled_width) / 2.0;
            let center_y = (screen_height() - scaled_height) / 2.0;

            draw_texture_ex(
                texture,
                center_x,
                center_y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(scaled_width, scaled_height)),
                    ..Default::default()
                },
            );
        }

        // 渲染FPS统计
        self.render_count += 1;
        let now = Instant::now();
        if now.duration_since(self.render_last).as_secs() >= 1 {
            self.render_fps =
                self.render_count as f64 / now.duration_since(self.render_last).as_secs_f64();
            self.render_count = 0;
            self.render_last = now;
        }
    }

    /// egui 控制面板
    pub fn draw_panel(&mut self, shell: &mut AppShell) {
        egui_macroquad::ui(|egui_ctx| {
            egui::Window::new("控制面板")
                .default_pos(egui::pos2(10.0, 10.0))
                .resizable(true)
                .show(egui_ctx, |ui| {
                    // --- 状态监控 ---
                    egui::CollapsingHeader::new("📊 系统状态")
                        .default_open(true)
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                ui.label("显示状态:");
                                let (text, color) = match shell.view() {
                                    ViewState::Off => ("OFF", egui::Color32::GRAY),
                                    ViewState::Image => ("IMAGE", egui::Color32::LIGHT_BLUE),
                                    ViewState::Camera => ("CAMERA", egui::Color32::GREEN),
                                };
                                ui.colored_label(color, text);
                                ui.label("| 渲染 FPS:");
                                ui.colored_label(
                                    egui::Color32::YELLOW,
                                    format!("{:.1}", self.render_fps),
                                );
                            });
                        });

                    // --- 操作 ---
                    ui.horizontal(|ui| {
                        let camera_label = if shell.view() == ViewState::Camera {
                            "📷 关闭摄像头"
                        } else {
                            "📷 打开摄像头"
                        };
                        if ui.button(camera_label).clicked() {
                            match shell.toggle_camera() {
                                Ok(()) => self.status.clear(),
                                Err(e) => {
                                    eprintln!("⚠️  {}", e);
                                    self.status = e.to_string();
                                }
                            }
                        }
                        if ui.button("💾 截图").clicked() {
                            self.save_screenshot(shell);
                        }
                        if ui.button("🖼 上传图片").clicked() {
                            self.pick_image(shell);
                        }
                    });

                    // --- 检测器选择 ---
                    let names = shell.detector_names();
                    let mut selected = shell.selected().to_string();
                    egui::ComboBox::from_label("检测模型")
                        .selected_text(selected.clone())
                        .show_ui(ui, |ui| {
                            for name in &names {
                                ui.selectable_value(&mut selected, name.clone(), name);
                            }
                        });
                    if selected != shell.selected() {
                        // 选择变化会置脏,静态图立即用新模型重跑一次
                        shell.select_detector(&selected);
                        self.confidence_threshold = shell
                            .dispatcher_mut()
                            .conf(&selected)
                            .unwrap_or(self.confidence_threshold);
                    }

                    ui.checkbox(&mut shell.show_fps, "叠加FPS (摄像头画面)");

                    if ui
                        .add(
                            egui::Slider::new(&mut self.confidence_threshold, 0.0..=1.0)
                                .text("置信度"),
                        )
                        .changed()
                    {
                        let name = shell.selected().to_string();
                        if let Err(e) = shell
                            .dispatcher_mut()
                            .set_conf(&name, Some(self.confidence_threshold))
                        {
                            eprintln!("⚠️  {}", e);
                        }
                        shell.mark_dirty();
                    }

                    if !self.status.is_empty() {
                        ui.colored_label(egui::Color32::RED, &self.status);
                    }
                });
        });

        egui_macroquad::draw();
    }

    /// 保存对话框,默认文件名为时间戳 (冒号已替换为下划线)
    fn save_screenshot(&mut self, shell: &AppShell) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JPG image", &["jpg"])
            .add_filter("PNG image", &["png"])
            .add_filter("JPEG image", &["jpeg"])
            .set_file_name(screenshot_file_name())
            .save_file()
        else {
            return;
        };
        match shell.screenshot(&path) {
            Ok(()) => self.status.clear(),
            Err(e) => {
                eprintln!("❌ 截图失败: {}", e);
                self.status = format!("截图失败: {}", e);
            }
        }
    }

    /// 打开对话框,仅接受 PNG/JPG/JPEG
    fn pick_image(&mut self, shell: &mut AppShell) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image Files", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        match shell.upload_image(&path) {
            Ok(()) => self.status.clear(),
            Err(e) => {
                // 读取失败: 保持原显示状态
                eprintln!("⚠️  {}", e);
                self.status = e.to_string();
            }
        }
    }
}
