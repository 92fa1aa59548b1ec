//! printwatch CLI
//!
//! 轮询 PrusaLink / OctoPrint 打印机，任务状态变化时推送 Telegram 通知，
//! 并把每轮状态发布到 MQTT。

use anyhow::Result;
use clap::{Parser, Subcommand};
use printwatch::cli::{handle_check_config, handle_poll, handle_run, handle_status, PollArgs, RunArgs};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "printwatch")]
#[command(about = "printwatch - 3D 打印机状态监控与通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认: $PRINTWATCH_CONFIG, ./printwatch.yaml, ~/.config/printwatch/config.yaml）
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动轮询循环（Ctrl-C 退出）
    Run(RunArgs),
    /// 查询一次打印机状态
    Poll(PollArgs),
    /// 每台打印机一行状态
    Status {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 校验配置文件
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 可提供 APITOKEN / CHATID / PRINTWATCH_CONFIG
    dotenvy::dotenv().ok();

    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=printwatch=debug printwatch run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("printwatch=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => handle_run(cli.config, args).await?,
        Commands::Poll(args) => handle_poll(cli.config, args).await?,
        Commands::Status { json } => handle_status(cli.config, json).await?,
        Commands::CheckConfig => handle_check_config(cli.config)?,
    }

    Ok(())
}
