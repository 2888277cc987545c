use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::error::ScraperError;
use crate::traits::Browse;

use super::types::{ProcessOutcome, ProductTask};

/// 「Все характеристики и описание」
pub const DETAILS_BUTTON: &str = ".product-page__btn-detail.hide-mobile.j-details-btn-desktop";
/// 「Документы проверены」
pub const CERTIFICATE_BUTTON: &str = ".btn-certificate";
pub const POPUP_STEP_LINK: &str = ".popup__step-link";
pub const DOWNLOAD_BUTTON: &str = ".btn.btn_accent.btn-download-pdf";

const STAGING_DIR: &str = ".staging";

/// ダウンロード中の一時ファイルを除いた最初のファイル
fn find_completed_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .find(|path| {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            !name.starts_with('.') && !name.ends_with(".crdownload") && !name.ends_with(".tmp")
        })
}

/// ダウンロード完了を待機
async fn wait_for_file(
    dir: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<PathBuf, ScraperError> {
    let start = Instant::now();

    loop {
        if let Some(path) = find_completed_file(dir) {
            debug!("Download detected: {:?}", path);
            return Ok(path);
        }

        if start.elapsed() > timeout {
            return Err(ScraperError::Timeout(format!(
                "ダウンロードが{:?}以内に完了しませんでした",
                timeout
            )));
        }

        sleep(poll_interval).await;
    }
}

/// 商品ページから証明書をダウンロードする
///
/// ダウンロードはタスクごとのステージングディレクトリに受け、処理順と商品番号を付けた名前で
/// ダウンロードディレクトリへ移す。
#[derive(Debug, Clone)]
pub struct ProductProcessor {
    download_dir: PathBuf,
    timings: Timings,
}

impl ProductProcessor {
    pub fn new(download_dir: impl Into<PathBuf>, timings: Timings) -> Self {
        Self {
            download_dir: download_dir.into(),
            timings,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    fn staging_dir(&self, task: &ProductTask) -> PathBuf {
        self.download_dir
            .join(STAGING_DIR)
            .join(format!("{:04}", task.index))
    }

    pub async fn process<B: Browse>(
        &self,
        browser: &mut B,
        task: &ProductTask,
    ) -> Result<ProcessOutcome, ScraperError> {
        let staging = self.staging_dir(task);
        let result = self.process_in(browser, task, &staging).await;

        if let Err(e) = std::fs::remove_dir_all(&staging) {
            debug!("Failed to remove staging dir {:?}: {}", staging, e);
        }
        result
    }

    async fn process_in<B: Browse>(
        &self,
        browser: &mut B,
        task: &ProductTask,
        staging: &Path,
    ) -> Result<ProcessOutcome, ScraperError> {
        info!("Processing product #{}: {}", task.index, task.url);

        browser.set_download_dir(staging).await?;
        browser.goto(&task.url).await?;
        self.open_details(browser).await?;

        if !browser.exists(CERTIFICATE_BUTTON).await? {
            info!("No verified documents for this product");
            return Ok(ProcessOutcome::NoDocument);
        }

        // ここから先の失敗はこの商品の結果として残すだけ
        match self.fetch_certificate(browser, task, staging).await {
            Ok(Some(path)) => {
                info!("Certificate saved: {:?}", path);
                Ok(ProcessOutcome::Downloaded(path))
            }
            Ok(None) => Ok(ProcessOutcome::NoDocument),
            Err(e) => {
                warn!("Failed to download certificate for {}: {}", task.url, e);
                Ok(ProcessOutcome::DownloadFailed(e.to_string()))
            }
        }
    }

    /// 詳細パネルを開く（なければこの商品は失敗）
    async fn open_details<B: Browse>(&self, browser: &mut B) -> Result<(), ScraperError> {
        if !browser
            .wait_for(DETAILS_BUTTON, self.timings.element_wait)
            .await?
        {
            warn!(
                "Details button not found within {:?}",
                self.timings.element_wait
            );
            return Err(ScraperError::Timeout(format!(
                "「Все характеристики и описание」が{:?}以内に見つかりません",
                self.timings.element_wait
            )));
        }

        browser.click(DETAILS_BUTTON).await?;
        sleep(self.timings.settle).await;
        Ok(())
    }

    /// 「Документы проверены」からダウンロード画面を開いて保存する
    async fn fetch_certificate<B: Browse>(
        &self,
        browser: &mut B,
        task: &ProductTask,
        staging: &Path,
    ) -> Result<Option<PathBuf>, ScraperError> {
        browser.click(CERTIFICATE_BUTTON).await?;
        sleep(self.timings.settle).await;

        if !browser.exists(POPUP_STEP_LINK).await? {
            info!("Certificate popup has no document link");
            return Ok(None);
        }

        browser.click(POPUP_STEP_LINK).await?;
        sleep(self.timings.settle).await;

        self.download_document(browser, task, staging).await.map(Some)
    }

    async fn download_document<B: Browse>(
        &self,
        browser: &mut B,
        task: &ProductTask,
        staging: &Path,
    ) -> Result<PathBuf, ScraperError> {
        browser
            .switch_to_new_window(self.timings.element_wait)
            .await?;

        if !browser
            .wait_for(DOWNLOAD_BUTTON, self.timings.element_wait)
            .await?
        {
            return Err(ScraperError::ElementNotFound("PDFダウンロードボタン".into()));
        }
        sleep(self.timings.settle).await;
        browser.click(DOWNLOAD_BUTTON).await?;

        let downloaded = wait_for_file(
            staging,
            self.timings.download_wait,
            self.timings.poll_interval,
        )
        .await?;

        let extension = downloaded
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "pdf".to_string());
        let target = self
            .download_dir
            .join(task.document_file_name(&extension));

        std::fs::rename(&downloaded, &target)
            .map_err(|e| ScraperError::Download(format!("{:?} -> {:?}: {}", downloaded, target, e)))?;
        debug!("Renamed {:?} -> {:?}", downloaded, target);

        Ok(target)
    }
}
