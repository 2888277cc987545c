//! Wildberries 商品証明書スクレイパー
//!
//! - テレビカテゴリをブランド・画面サイズ・価格で絞り込み、商品URLを収集
//! - 商品ごとに独立したブラウザで「Документы проверены」の証明書PDFをダウンロード
//! - 証明書から電話番号とメールアドレスを抽出してExcelに追記
//!
//! # 使用例
//!
//! ```rust,ignore
//! use wb_cert_scraper::{FilterCriteria, Logger, Pipeline, PipelineConfig, Schedule};
//!
//! #[tokio::main]
//! async fn main() {
//!     let criteria = FilterCriteria::new("LG", Some("55".into()), 30_000, 90_000).unwrap();
//!     let config = PipelineConfig::new(criteria)
//!         .with_download_dir("./downloads")
//!         .with_schedule(Schedule::Pooled { workers: 3 });
//!
//!     let logger = Logger::init(&config.log).unwrap();
//!     let summary = Pipeline::new(config).run().await.unwrap();
//!     println!("rows written: {}", summary.rows);
//!     logger.close();
//! }
//! ```
//!
//! # 1件だけ処理する
//!
//! ```rust,ignore
//! use wb_cert_scraper::{ProductProcessor, ProductService, ProductTask, ScraperConfig, Timings};
//! use tower::ServiceExt;
//!
//! let service = ProductService::new(
//!     ScraperConfig::new().with_headless(false),
//!     ProductProcessor::new("./downloads", Timings::default()),
//! );
//! let outcome = service
//!     .oneshot(ProductTask::new(0, "https://www.wildberries.ru/catalog/12345678/detail.aspx"))
//!     .await?;
//! ```

pub mod browser;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod product;
pub mod report;
pub mod service;
pub mod store;
pub mod traits;

// 主要な型をリエクスポート
pub use browser::ChromeSession;
pub use catalog::{CollectReport, ListingCollector};
pub use config::{FilterCriteria, PipelineConfig, Schedule, ScraperConfig, Timings};
pub use document::{DocumentFieldExtractor, ExtractedFields};
pub use error::ScraperError;
pub use logging::{LogConfig, Logger};
pub use pipeline::{dispatch, DispatchReport, Pipeline, RunSummary, TaskReport};
pub use product::{ProcessOutcome, ProductProcessor, ProductTask};
pub use report::ResultWriter;
pub use service::ProductService;
pub use store::UrlStore;
pub use traits::Browse;
