//! 错误类型
//!
//! 四个边界各自独立成变体: 模型加载(致命) / 摄像头打开(可恢复) /
//! 检测器名称(显式报告) / 图像读取(可恢复,保持原状态)。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// 调度键不在注册表中。静默跳过会掩盖配置问题,必须显式报告。
    #[error("未知检测器: '{0}'")]
    UnknownDetector(String),

    /// 启动期模型加载失败,调用方应中止进程
    #[error("模型加载失败 [{name}]: {reason}")]
    ModelLoad { name: String, reason: String },

    /// 摄像头设备打开失败,状态机保持 OFF
    #[error("无法打开摄像头设备 {index}: {reason}")]
    CameraOpen { index: usize, reason: String },

    /// 图像文件读取失败,显示状态与当前帧保持不变
    #[error("图像读取失败 [{path}]: {reason}")]
    ImageRead { path: String, reason: String },

    /// 推理阶段错误
    #[error("推理失败: {0}")]
    Inference(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        // {:#} 展开完整错误链
        AppError::Inference(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_detector_message() {
        let e = AppError::UnknownDetector("nope".to_string());
        assert_eq!(e.to_string(), "未知检测器: 'nope'");
    }

    #[test]
    fn test_inference_keeps_error_chain() {
        use anyhow::Context;
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("张量形状不匹配"));
        let chained = inner.context("输出解码失败").unwrap_err();
        let e = AppError::from(chained);
        let text = e.to_string();
        assert!(text.contains("输出解码失败"));
        assert!(text.contains("张量形状不匹配"));
    }
}
