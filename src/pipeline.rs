//! 全体の流れ
//!
//! 1. 一覧からURLを収集してファイルに保存
//! 2. URLごとに独立したブラウザで証明書をダウンロード（バッチまたはワーカープール）
//! 3. ダウンロードした証明書から項目を抽出してExcelに追記

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::browser::ChromeSession;
use crate::catalog::{CollectReport, ListingCollector};
use crate::config::{PipelineConfig, Schedule};
use crate::document::{scan_directory, DocumentFieldExtractor};
use crate::error::ScraperError;
use crate::product::{ProcessOutcome, ProductProcessor, ProductTask};
use crate::report::ResultWriter;
use crate::service::ProductService;
use crate::store::{count_duplicates, UrlStore};
use crate::traits::Browse;

/// 1件分の処理結果
#[derive(Debug)]
pub struct TaskReport {
    pub index: usize,
    pub url: String,
    pub result: Result<ProcessOutcome, ScraperError>,
}

/// 配送結果（`index` 順）
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub reports: Vec<TaskReport>,
    /// Batched: バッチごとの件数 / Pooled: ワーカーごとの処理件数
    pub batches: Vec<usize>,
}

impl DispatchReport {
    /// この実行でダウンロードできた証明書（`index` 順）
    pub fn documents(&self) -> Vec<PathBuf> {
        self.reports
            .iter()
            .filter_map(|r| match &r.result {
                Ok(ProcessOutcome::Downloaded(path)) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "不明なpanic".to_string()
    }
}

/// 1件を実行する。エラーもpanicも結果として返す
async fn run_task<S>(service: S, task: ProductTask) -> TaskReport
where
    S: Service<ProductTask, Response = ProcessOutcome, Error = ScraperError>,
{
    let index = task.index;
    let url = task.url.clone();
    let span = info_span!("product", index, url = %url);

    let result = std::panic::AssertUnwindSafe(service.oneshot(task))
        .catch_unwind()
        .instrument(span.clone())
        .await
        .unwrap_or_else(|payload| Err(ScraperError::TaskPanicked(panic_message(&*payload))));

    span.in_scope(|| match &result {
        Ok(ProcessOutcome::Downloaded(path)) => info!("Done: {:?}", path),
        Ok(ProcessOutcome::NoDocument) => info!("Done: no certificate"),
        Ok(ProcessOutcome::DownloadFailed(reason)) => warn!("Done: download failed ({})", reason),
        Err(e) => error!("Product failed: {}", e),
    });

    TaskReport { index, url, result }
}

fn lost_task(index: usize, url: &str, e: tokio::task::JoinError) -> TaskReport {
    TaskReport {
        index,
        url: url.to_string(),
        result: Err(ScraperError::TaskPanicked(e.to_string())),
    }
}

/// URLを商品処理サービスに流す
///
/// どの1件が失敗しても残りは処理を続ける。
pub async fn dispatch<S>(urls: &[String], service: S, schedule: Schedule) -> DispatchReport
where
    S: Service<ProductTask, Response = ProcessOutcome, Error = ScraperError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    let tasks: Vec<ProductTask> = urls
        .iter()
        .enumerate()
        .map(|(index, url)| ProductTask::new(index, url.clone()))
        .collect();

    let mut report = match schedule {
        Schedule::Batched { .. } => dispatch_batched(tasks, service, schedule.width()).await,
        Schedule::Pooled { .. } => dispatch_pooled(tasks, service, schedule.width()).await,
    };
    report.reports.sort_by_key(|r| r.index);
    report
}

async fn dispatch_batched<S>(tasks: Vec<ProductTask>, service: S, size: usize) -> DispatchReport
where
    S: Service<ProductTask, Response = ProcessOutcome, Error = ScraperError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    let mut report = DispatchReport::default();
    let total = tasks.len().div_ceil(size);

    for (n, chunk) in tasks.chunks(size).enumerate() {
        info!("Starting batch {}/{} ({} products)", n + 1, total, chunk.len());

        let mut set = JoinSet::new();
        for task in chunk {
            set.spawn(run_task(service.clone(), task.clone()));
        }

        let mut finished = Vec::with_capacity(chunk.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(task_report) => finished.push(task_report),
                Err(e) => error!("Batch task was lost: {}", e),
            }
        }

        // JoinErrorで落ちた分も結果に残す
        for task in chunk {
            if !finished.iter().any(|r| r.index == task.index) {
                finished.push(TaskReport {
                    index: task.index,
                    url: task.url.clone(),
                    result: Err(ScraperError::TaskPanicked("タスクが結果を返しませんでした".into())),
                });
            }
        }

        report.batches.push(chunk.len());
        report.reports.extend(finished);
    }

    report
}

async fn dispatch_pooled<S>(tasks: Vec<ProductTask>, service: S, workers: usize) -> DispatchReport
where
    S: Service<ProductTask, Response = ProcessOutcome, Error = ScraperError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    let (tx, rx) = mpsc::channel::<ProductTask>(tasks.len().max(1));
    for task in tasks {
        // 容量はタスク数分あるので待たない
        if tx.send(task).await.is_err() {
            break;
        }
    }
    drop(tx);

    let rx = Arc::new(Mutex::new(rx));
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let rx = rx.clone();
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut done = Vec::new();
            loop {
                let next = rx.lock().await.recv().await;
                let Some(task) = next else {
                    break;
                };
                debug!("Worker {} picked #{}", worker, task.index);
                let (index, url) = (task.index, task.url.clone());
                let spawned = tokio::spawn(run_task(service.clone(), task));
                done.push(match spawned.await {
                    Ok(task_report) => task_report,
                    Err(e) => lost_task(index, &url, e),
                });
            }
            done
        }));
    }

    let mut report = DispatchReport::default();
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(done) => {
                report.batches.push(done.len());
                report.reports.extend(done);
            }
            Err(e) => error!("Worker {} stopped: {}", worker, e),
        }
    }
    report
}

/// 証明書ごとに項目を抽出して1行ずつ追記する
pub fn extract_all(documents: &[PathBuf], writer: &ResultWriter) -> Result<usize, ScraperError> {
    let extractor = DocumentFieldExtractor::new();
    info!("Extracting fields from {} documents", documents.len());

    for path in documents {
        let fields = extractor.extract(path);
        writer.append(&fields)?;
    }
    Ok(documents.len())
}

/// 今回の実行で作られていないファイルの数
fn stale_documents(download_dir: &Path, documents: &[PathBuf]) -> Result<usize, ScraperError> {
    Ok(scan_directory(download_dir)?
        .iter()
        .filter(|path| !documents.contains(path))
        .count())
}

/// 実行結果の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub urls: usize,
    pub duplicates: usize,
    pub batches: usize,
    pub downloaded: usize,
    pub no_document: usize,
    pub download_failed: usize,
    pub failed: usize,
    pub documents: usize,
    pub rows: usize,
}

impl RunSummary {
    fn tally(&mut self, dispatched: &DispatchReport) {
        self.batches = dispatched.batches.len();
        for report in &dispatched.reports {
            match &report.result {
                Ok(ProcessOutcome::Downloaded(_)) => self.downloaded += 1,
                Ok(ProcessOutcome::NoDocument) => self.no_document += 1,
                Ok(ProcessOutcome::DownloadFailed(_)) => self.download_failed += 1,
                Err(_) => self.failed += 1,
            }
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// 収集 → ダウンロード → 抽出
    ///
    /// 収集の失敗だけが `Err` になる。商品単位の失敗は集計に数える。
    pub async fn run(&self) -> Result<RunSummary, ScraperError> {
        let config = &self.config;
        std::fs::create_dir_all(&config.download_dir)?;
        std::fs::create_dir_all(&config.result_dir)?;

        self.collect().instrument(info_span!("collector")).await?;

        let urls = UrlStore::new(&config.urls_file).read_all()?;
        let mut summary = RunSummary {
            urls: urls.len(),
            duplicates: count_duplicates(&urls),
            ..Default::default()
        };
        if summary.duplicates > 0 {
            warn!(
                "{} duplicate URLs in {:?}; they will be processed again",
                summary.duplicates, config.urls_file
            );
        }

        let service = ProductService::new(
            config.browser.clone(),
            ProductProcessor::new(&config.download_dir, config.timings.clone()),
        );
        let dispatched = dispatch(&urls, service, config.schedule).await;
        summary.tally(&dispatched);

        let documents = dispatched.documents();
        let stale = stale_documents(&config.download_dir, &documents)?;
        if stale > 0 {
            info!(
                "Skipping {} documents in {:?} left from earlier runs",
                stale, config.download_dir
            );
        }

        let result_file = config.result_file();
        let (documents, rows) = tokio::task::spawn_blocking(move || {
            let _span = info_span!("extract").entered();
            let writer = ResultWriter::open(result_file)?;
            let documents = extract_all(&documents, &writer)?;
            Ok::<_, ScraperError>((documents, writer.rows().len()))
        })
        .await
        .map_err(|e| ScraperError::TaskPanicked(e.to_string()))??;

        summary.documents = documents;
        summary.rows = rows;
        Ok(summary)
    }

    async fn collect(&self) -> Result<CollectReport, ScraperError> {
        let config = &self.config;
        let session = ChromeSession::launch(&config.browser)
            .await?
            .with_poll_interval(config.timings.poll_interval);

        let mut collector = ListingCollector::new(
            config.criteria.clone(),
            UrlStore::new(&config.urls_file),
            session,
            config.timings.clone(),
        )
        .with_catalog_url(&config.catalog_url);

        let result = collector.collect().await;

        if let Err(e) = &result {
            error!("Listing collection failed: {}", e);
            if config.browser.debug {
                match collector.browser_mut().screenshot().await {
                    Ok(png) => error!("Screenshot (base64): {}", STANDARD.encode(png)),
                    Err(e) => debug!("Failed to take screenshot: {}", e),
                }
            }
        }

        if let Err(e) = collector.close().await {
            debug!("Failed to close collector browser: {}", e);
        }
        result
    }
}
