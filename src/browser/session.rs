//! chromiumoxide によるブラウザセッション

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{ScraperConfig, Timings};
use crate::error::ScraperError;
use crate::traits::Browse;

/// JS の文字列リテラルに変換
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Chrome 1プロセス分のセッション
///
/// ワーカーごとに独立して起動する。ユーザーデータディレクトリも別にしないと同時起動できない。
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    known_targets: HashSet<TargetId>,
    user_data_dir: PathBuf,
    poll_interval: Duration,
}

impl ChromeSession {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser session...");

        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("wb-scraper-{}", unique_id));

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .window_size(width, height)
            .request_timeout(config.timeout);

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--lang=ru-RU");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder.build().map_err(ScraperError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let mut session = Self {
            browser,
            page,
            handler,
            known_targets: HashSet::new(),
            user_data_dir,
            poll_interval: Timings::default().poll_interval,
        };
        session.known_targets = session.current_targets().await?;

        info!("Browser session ready");
        Ok(session)
    }

    /// 要素・ウィンドウ待ちのポーリング間隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn current_targets(&self) -> Result<HashSet<TargetId>, ScraperError> {
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;
        Ok(pages.iter().map(|p| p.target_id().clone()).collect())
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }
}

#[async_trait]
impl Browse for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, ScraperError> {
        self.eval(&format!("document.querySelector({}) !== null", js_str(selector)))
            .await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScraperError> {
        let start = Instant::now();
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!("{} not found within {:?}", selector, timeout);
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Navigation(format!("{} クリック: {}", selector, e)))?;
        Ok(())
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), ScraperError> {
        let clicked: bool = self
            .eval(&format!(
                r#"
                (function() {{
                    var els = document.querySelectorAll({});
                    if (els.length <= {}) {{
                        return false;
                    }}
                    els[{}].click();
                    return true;
                }})()
                "#,
                js_str(selector),
                index,
                index
            ))
            .await?;

        if !clicked {
            return Err(ScraperError::ElementNotFound(format!("{} [{}]", selector, index)));
        }
        Ok(())
    }

    async fn hover(&mut self, selector: &str) -> Result<(), ScraperError> {
        let hovered: bool = self
            .eval(&format!(
                r#"
                (function() {{
                    var el = document.querySelector({});
                    if (!el) {{
                        return false;
                    }}
                    ['mouseover', 'mouseenter'].forEach(function(type) {{
                        el.dispatchEvent(new MouseEvent(type, {{ bubbles: true }}));
                    }});
                    return true;
                }})()
                "#,
                js_str(selector)
            ))
            .await?;

        if !hovered {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn clear(&mut self, selector: &str) -> Result<(), ScraperError> {
        let cleared: bool = self
            .eval(&format!(
                r#"
                (function() {{
                    var el = document.querySelector({});
                    if (!el) {{
                        return false;
                    }}
                    el.focus();
                    el.value = '';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }})()
                "#,
                js_str(selector)
            ))
            .await?;

        if !cleared {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn type_char(&mut self, selector: &str, ch: char) -> Result<(), ScraperError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?;

        element
            .focus()
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{} フォーカス: {}", selector, e)))?;
        element
            .type_str(ch.to_string())
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{} 入力: {}", selector, e)))?;
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>, ScraperError> {
        self.eval(&format!(
            r#"
            (function() {{
                var el = document.querySelector({});
                return el ? el.innerText : null;
            }})()
            "#,
            js_str(selector)
        ))
        .await
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError> {
        self.eval(&format!(
            "Array.from(document.querySelectorAll({})).map(function(e) {{ return e.innerText; }})",
            js_str(selector)
        ))
        .await
    }

    async fn attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<String>, ScraperError> {
        // href はプロパティ側で絶対URLになる
        self.eval(&format!(
            r#"
            (function() {{
                var name = {};
                return Array.from(document.querySelectorAll({}))
                    .map(function(e) {{
                        var v = e[name];
                        if (v === undefined || v === null || v === '') {{
                            v = e.getAttribute(name);
                        }}
                        return v === null || v === undefined ? '' : String(v);
                    }})
                    .filter(function(v) {{ return v.length > 0; }});
            }})()
            "#,
            js_str(name),
            js_str(selector)
        ))
        .await
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError> {
        let scrolled: bool = self
            .eval(&format!(
                r#"
                (function() {{
                    var els = document.querySelectorAll({});
                    if (els.length === 0) {{
                        return false;
                    }}
                    els[els.length - 1].scrollIntoView();
                    return true;
                }})()
                "#,
                js_str(selector)
            ))
            .await?;

        if !scrolled {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScraperError> {
        let _: f64 = self
            .eval(&format!("window.scrollBy(0, {}); window.scrollY", pixels))
            .await?;
        Ok(())
    }

    async fn switch_to_new_window(&mut self, timeout: Duration) -> Result<(), ScraperError> {
        let start = Instant::now();

        loop {
            let pages = self
                .browser
                .pages()
                .await
                .map_err(|e| ScraperError::Navigation(e.to_string()))?;

            if let Some(page) = pages
                .into_iter()
                .find(|p| !self.known_targets.contains(p.target_id()))
            {
                self.known_targets.insert(page.target_id().clone());
                page.bring_to_front()
                    .await
                    .map_err(|e| ScraperError::Navigation(e.to_string()))?;
                self.page = page;
                debug!("Switched to new window");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(ScraperError::Timeout(format!(
                    "新しいウィンドウが{:?}以内に開きませんでした",
                    timeout
                )));
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), ScraperError> {
        std::fs::create_dir_all(dir)?;
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ダウンロード設定エラー: {}", e)))?;

        self.page
            .execute(params)
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("ダウンロード設定エラー: {}", e)))?;

        debug!("Download directory set to {:?}", dir);
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser session...");

        if let Err(e) = self.browser.close().await {
            debug!("Failed to close browser: {}", e);
        }
        self.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Failed to remove {:?}: {}", self.user_data_dir, e);
        }

        info!("Browser session closed");
        Ok(())
    }
}
