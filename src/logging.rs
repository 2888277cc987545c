//! ログ出力
//!
//! 実行ごと（またはフロー名ごと）に1ファイル。コンソール出力は任意。
//! `Logger` は `main` が所有し、終了時に `close` でフラッシュする。

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ScraperError;

fn default_log_dir() -> PathBuf {
    PathBuf::from("Log")
}

fn default_console() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

/// ログ設定
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// 指定時は `<flow_name>.log`、未指定なら日付
    #[serde(default)]
    pub flow_name: Option<String>,
    #[serde(default = "default_console")]
    pub console: bool,
    /// RUST_LOG 未設定時のフィルタ
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            flow_name: None,
            console: default_console(),
            level: default_level(),
        }
    }
}

/// ログファイル名（`<flow>.log` または `dd.mm.YYYY.log`）
pub fn log_file_name(flow_name: Option<&str>, today: NaiveDate) -> String {
    match flow_name.map(str::trim).filter(|f| !f.is_empty()) {
        Some(flow) => format!("{}.log", flow),
        None => format!("{}.log", today.format("%d.%m.%Y")),
    }
}

/// インストール済みのロガー
///
/// ファイル出力はノンブロッキングのライターを通すので、複数ワーカーからの同時書き込みでも行が混ざらない。
pub struct Logger {
    path: PathBuf,
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// グローバルなサブスクライバを設定する
    pub fn init(config: &LogConfig) -> Result<Self, ScraperError> {
        std::fs::create_dir_all(&config.dir)?;

        let today = chrono::Local::now().date_naive();
        let file_name = log_file_name(config.flow_name.as_deref(), today);
        let path = config.dir.join(&file_name);

        let appender = tracing_appender::rolling::never(&config.dir, &file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_file(true)
            .with_line_number(true);

        let console_layer = config.console.then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .map_err(|e| ScraperError::Config(format!("ロガー初期化エラー: {}", e)))?;

        Ok(Self {
            path,
            guard: Some(guard),
        })
    }

    /// ログファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// バッファをフラッシュしてファイル出力を終了
    pub fn close(mut self) {
        tracing::info!("Closing log file {:?}", self.path);
        self.guard.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_by_date() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(log_file_name(None, day), "07.03.2024.log");
        assert_eq!(log_file_name(Some("  "), day), "07.03.2024.log");
    }

    #[test]
    fn test_log_file_name_by_flow() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(log_file_name(Some("collector"), day), "collector.log");
    }

    #[test]
    fn test_log_config_from_json() {
        let config: LogConfig =
            serde_json::from_str(r#"{"flow_name": "tv", "console": false}"#).unwrap();
        assert_eq!(config.dir, PathBuf::from("Log"));
        assert_eq!(config.flow_name.as_deref(), Some("tv"));
        assert!(!config.console);
        assert_eq!(config.level, "info");
    }
}
