//! Wildberries 証明書スクレイパー
//!
//! 実行方法:
//! ```
//! cargo run --release -- config.json
//! ```
//!
//! 設定ファイルは第1引数、`WB_CONFIG`、`config.json` の順で探す。

use std::path::PathBuf;

use tracing::{error, info};
use wb_cert_scraper::{Logger, Pipeline, PipelineConfig};

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WB_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

#[tokio::main]
async fn main() {
    let path = config_path();

    // ロガーより前なので標準エラーに出す
    let config = match PipelineConfig::from_file(&path) {
        Ok(config) => config.with_env_overrides(|key| std::env::var(key).ok()),
        Err(e) => {
            eprintln!("{:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    let logger = match Logger::init(&config.log) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Config loaded from {:?}, logging to {:?}", path, logger.path());

    match Pipeline::new(config).run().await {
        Ok(summary) => {
            info!(
                "Finished: {} URLs ({} duplicates) in {} batches; downloaded={}, no_document={}, download_failed={}, failed={}; {} documents -> {} rows",
                summary.urls,
                summary.duplicates,
                summary.batches,
                summary.downloaded,
                summary.no_document,
                summary.download_failed,
                summary.failed,
                summary.documents,
                summary.rows
            );
            logger.close();
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            if e.is_input_error() {
                error!("Check the catalog section of {:?}", path);
            }
            logger.close();
            std::process::exit(1);
        }
    }
}
