/// 智能检测工作台 (GUI 主程序)
///
/// 单线程协作式循环: 同一线程内轮询摄像头、执行推理、处理 GUI 事件。
/// 推理阻塞期间界面不刷新,帧上的 FPS 叠加就是这段延迟的观测手段。
use clap::Parser;
use macroquad::prelude::*;

use detection_studio::annotate::Annotator;
use detection_studio::app::ui::Ui;
use detection_studio::app::AppShell;
use detection_studio::config::Args;
use detection_studio::dispatch::Dispatcher;
use detection_studio::input::open_camera;
use detection_studio::registry::{Manifest, Registry};

fn window_conf() -> Conf {
    Conf {
        window_title: "智能检测工作台 - Detection Studio".to_owned(),
        window_width: 960,
        window_height: 640,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let args = Args::parse();

    println!("🚀 检测工作台启动");
    println!("📋 模型清单: {}", args.manifest);

    let manifest = Manifest::load(&args.manifest);

    // 模型加载失败是致命错误: 调度器没有降级路径,不能带着半加载的注册表继续
    let registry = match Registry::load_all(&manifest) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    println!("✅ 已加载 {} 个检测器", registry.len());
    registry.print_summaries();

    let selected = if registry.get(&args.detector).is_some() {
        args.detector.clone()
    } else {
        let fallback = registry.names().first().cloned().unwrap_or_default();
        eprintln!(
            "⚠️  检测器 '{}' 不在清单中,改用 '{}'",
            args.detector, fallback
        );
        fallback
    };

    let dispatcher = Dispatcher::new(registry, Annotator::new(&args.font));
    let mut shell = AppShell::new(
        dispatcher,
        Box::new(open_camera),
        args.camera,
        selected,
        !args.hide_fps,
    );
    let mut ui = Ui::new();

    println!("✅ 系统就绪\n");

    loop {
        shell.tick();
        ui.update_texture(&shell);

        clear_background(BLACK);
        ui.draw_frame();
        ui.draw_panel(&mut shell);

        next_frame().await;
    }
}
