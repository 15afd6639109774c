//! 状态查询命令

use clap::Args;

/// 状态命令参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,

    /// 只输出从臂的旧版单臂状态
    #[arg(long)]
    pub legacy: bool,

    /// 等待首次连接的最长时间（毫秒）
    #[arg(long, default_value_t = 3000)]
    pub wait_ms: u64,
}
