//! # key-relay 主程序
//!
//! 代理密钥替换与月度 Token 用量统计

use clap::Parser;
use std::path::PathBuf;

use key_relay::{
    Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    server_setup,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "key-relay", version, about = "LLM API key relay with monthly usage accounting")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 日志级别（未设置 RUST_LOG 时生效）
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// 打印日志配置说明后退出
    #[arg(long)]
    print_logging_help: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.print_logging_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_optimized_logging(cli.log_level.as_ref());

    let config_manager = ConfigManager::new(cli.config)?;
    let config = config_manager.get_config();

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        config_source = config_manager
            .source()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string())
            .as_str()
    );

    if let Err(e) = server_setup::run_servers(config).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务运行失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
