//! 設定
//!
//! JSONファイル（`config.json`）から読み込み、環境変数で一部を上書きする。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ScraperError;
use crate::logging::LogConfig;

/// テレビカテゴリのトップ
pub const DEFAULT_CATALOG_URL: &str =
    "https://www.wildberries.ru/catalog/elektronika/tv-audio-foto-video-tehnika/televizory/televizory";

pub const DEFAULT_WORKERS: usize = 5;

/// ブラウザ設定
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub debug: bool,
    pub window_size: (u32, u32),
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            debug: false,
            window_size: (1920, 1080),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 待機時間まわり
///
/// 対象サイトの入力処理が遅いので、文字入力やクリック後に固定の待機を挟む。
#[derive(Debug, Clone)]
pub struct Timings {
    /// 必須要素の出現待ち上限
    pub element_wait: Duration,
    /// クリック後の固定待機
    pub settle: Duration,
    /// 1文字入力ごとの待機
    pub keystroke: Duration,
    /// スクロール1回ごとの待機
    pub scroll_pause: Duration,
    pub scroll_steps: u32,
    pub scroll_step_px: i64,
    /// ダウンロード完了待ち上限
    pub download_wait: Duration,
    /// ファイル・要素のポーリング間隔
    pub poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_wait: Duration::from_secs(10),
            settle: Duration::from_secs(5),
            keystroke: Duration::from_millis(300),
            scroll_pause: Duration::from_millis(500),
            scroll_steps: 40,
            scroll_step_px: 300,
            download_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Timings {
    /// 待機なし（オフラインのドライバ向け）
    pub fn instant() -> Self {
        Self {
            element_wait: Duration::ZERO,
            settle: Duration::ZERO,
            keystroke: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            scroll_steps: 2,
            scroll_step_px: 300,
            download_wait: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// カタログ検索条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub brand: String,
    pub diagonal: Option<String>,
    pub price_min: u64,
    pub price_max: u64,
}

impl FilterCriteria {
    /// 検索条件を作成（ブラウザ起動前に検証する）
    pub fn new(
        brand: impl Into<String>,
        diagonal: Option<String>,
        price_min: u64,
        price_max: u64,
    ) -> Result<Self, ScraperError> {
        if price_max < price_min {
            return Err(ScraperError::InvalidPriceRange {
                min: price_min,
                max: price_max,
            });
        }

        let brand = brand.into().trim().to_string();
        if brand.is_empty() {
            return Err(ScraperError::InvalidInput("ブランド名が空です".into()));
        }

        let diagonal = diagonal
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            brand,
            diagonal,
            price_min,
            price_max,
        })
    }
}

/// 商品処理のスケジューリング方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// `size` 件ずつ起動し、バッチ全体の完了を待って次へ
    Batched { size: usize },
    /// 固定数のワーカーがキューから順に取り出す
    Pooled { workers: usize },
}

impl Schedule {
    pub fn width(&self) -> usize {
        match *self {
            Schedule::Batched { size } => size.max(1),
            Schedule::Pooled { workers } => workers.max(1),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Batched {
            size: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum ScheduleKind {
    #[default]
    Batched,
    Pooled,
}

#[derive(Debug, Deserialize)]
struct CatalogSection {
    brand_name: String,
    #[serde(default)]
    diagonal: Option<String>,
    price_start: u64,
    price_end: u64,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BrowserSection {
    #[serde(default)]
    headless: Option<bool>,
    #[serde(default)]
    chrome_path: Option<PathBuf>,
    #[serde(default)]
    debug: bool,
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_urls_file() -> PathBuf {
    PathBuf::from("urls.csv")
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("result")
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// 設定ファイルの形
#[derive(Debug, Deserialize)]
struct ConfigFile {
    catalog: CatalogSection,
    #[serde(default = "default_pdf_dir")]
    path_to_save_pdf: PathBuf,
    #[serde(default = "default_urls_file")]
    urls_file: PathBuf,
    #[serde(default = "default_result_dir")]
    result_dir: PathBuf,
    #[serde(default)]
    log: LogConfig,
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default)]
    schedule: ScheduleKind,
    #[serde(default)]
    browser: BrowserSection,
}

/// パイプライン全体の設定
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub criteria: FilterCriteria,
    pub catalog_url: String,
    pub download_dir: PathBuf,
    pub urls_file: PathBuf,
    pub result_dir: PathBuf,
    pub log: LogConfig,
    pub schedule: Schedule,
    pub browser: ScraperConfig,
    pub timings: Timings,
}

impl PipelineConfig {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            download_dir: default_pdf_dir(),
            urls_file: default_urls_file(),
            result_dir: default_result_dir(),
            log: LogConfig::default(),
            schedule: Schedule::default(),
            browser: ScraperConfig::default(),
            timings: Timings::default(),
        }
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("{} を読み込めません: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ScraperError> {
        let file: ConfigFile =
            serde_json::from_str(raw).map_err(|e| ScraperError::Config(e.to_string()))?;

        let criteria = FilterCriteria::new(
            file.catalog.brand_name,
            file.catalog.diagonal,
            file.catalog.price_start,
            file.catalog.price_end,
        )?;

        if file.workers == 0 {
            return Err(ScraperError::Config("workers は1以上にしてください".into()));
        }
        let schedule = match file.schedule {
            ScheduleKind::Batched => Schedule::Batched { size: file.workers },
            ScheduleKind::Pooled => Schedule::Pooled {
                workers: file.workers,
            },
        };

        let mut browser = ScraperConfig::new().with_debug(file.browser.debug);
        if let Some(headless) = file.browser.headless {
            browser = browser.with_headless(headless);
        }
        if let Some(path) = file.browser.chrome_path {
            browser = browser.with_chrome_path(path);
        }

        Ok(Self {
            criteria,
            catalog_url: file
                .catalog
                .url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            download_dir: file.path_to_save_pdf,
            urls_file: file.urls_file,
            result_dir: file.result_dir,
            log: file.log,
            schedule,
            browser,
            timings: Timings::default(),
        })
    }

    /// 環境変数で上書き（CHROME_PATH / CHROMIUM_PATH, HEADLESS, WB_WORKERS）
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CHROME_PATH").or_else(|| lookup("CHROMIUM_PATH")) {
            self.browser = self.browser.with_chrome_path(path);
        }
        if let Some(headless) = lookup("HEADLESS") {
            self.browser = self.browser.with_headless(headless.trim() != "false");
        }
        if let Some(workers) = lookup("WB_WORKERS").and_then(|w| w.trim().parse::<usize>().ok()) {
            if workers > 0 {
                self.schedule = match self.schedule {
                    Schedule::Batched { .. } => Schedule::Batched { size: workers },
                    Schedule::Pooled { .. } => Schedule::Pooled { workers },
                };
            }
        }
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_urls_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.urls_file = path.into();
        self
    }

    pub fn with_result_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.result_dir = dir.into();
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn result_file(&self) -> PathBuf {
        self.result_dir.join("result.xlsx")
    }
}
