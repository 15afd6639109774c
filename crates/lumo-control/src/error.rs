//! 进程管理错误类型

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    /// 启动外部进程失败（监视器已恢复）
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to signal process {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
