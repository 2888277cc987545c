//! テスト用のスクリプト化されたブラウザ

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::traits::Browse;

/// 1ページ分の状態
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    present: HashSet<String>,
    texts: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    transitions: HashMap<String, usize>,
    downloads: HashMap<String, (String, Vec<u8>)>,
    opens_window: HashSet<String>,
    failing: HashSet<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.present.insert(selector.to_string());
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_list(mut self, selector: &str, items: &[&str]) -> Self {
        self.present.insert(selector.to_string());
        self.lists.insert(
            selector.to_string(),
            items.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// クリックでページ `target` に遷移
    pub fn navigates(mut self, selector: &str, target: usize) -> Self {
        self.present.insert(selector.to_string());
        self.transitions.insert(selector.to_string(), target);
        self
    }

    /// クリックでダウンロード先にファイルを書き出す
    pub fn downloads(mut self, selector: &str, file_name: &str, body: &[u8]) -> Self {
        self.present.insert(selector.to_string());
        self.downloads
            .insert(selector.to_string(), (file_name.to_string(), body.to_vec()));
        self
    }

    /// 要素はあるがクリックがドライバエラーになる
    pub fn fails_on(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self.failing.insert(selector.to_string());
        self
    }

    /// クリックで新しいウィンドウが開く
    pub fn opens_window(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self.opens_window.insert(selector.to_string());
        self
    }
}

/// 呼び出しを記録する偽ブラウザ
#[derive(Debug, Default)]
pub struct FakeBrowser {
    pages: Vec<FakePage>,
    current: usize,
    /// 新しいウィンドウとして開くページ
    popup: Option<usize>,
    popup_opened: bool,
    download_dir: Option<PathBuf>,
    pub calls: Vec<String>,
    pub typed: HashMap<String, String>,
    pub closed: bool,
}

impl FakeBrowser {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_popup(mut self, page: usize) -> Self {
        self.popup = Some(page);
        self
    }

    pub fn clicked(&self, selector: &str) -> bool {
        self.calls.iter().any(|c| c == &format!("click:{}", selector))
    }

    pub fn clicks_containing(&self, needle: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.starts_with("click") && c.contains(needle))
            .count()
    }

    fn page(&self) -> &FakePage {
        &self.pages[self.current]
    }

    fn present(&self, selector: &str) -> bool {
        self.pages
            .get(self.current)
            .map(|p| p.present.contains(selector))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Browse for FakeBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        self.calls.push(format!("goto:{}", url));
        self.current = 0;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, ScraperError> {
        Ok(self.present(selector))
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool, ScraperError> {
        Ok(self.present(selector))
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        if self.page().failing.contains(selector) {
            return Err(ScraperError::Navigation(format!("{} はクリックできません", selector)));
        }
        self.calls.push(format!("click:{}", selector));

        let page = self.page().clone();
        if let Some((name, body)) = page.downloads.get(selector) {
            if let Some(dir) = &self.download_dir {
                std::fs::write(dir.join(name), body)?;
            }
        }
        if page.opens_window.contains(selector) {
            self.popup_opened = true;
        }
        if let Some(target) = page.transitions.get(selector) {
            self.current = *target;
        }
        Ok(())
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        self.calls.push(format!("click_nth:{}:{}", selector, index));
        Ok(())
    }

    async fn hover(&mut self, selector: &str) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        self.calls.push(format!("hover:{}", selector));
        Ok(())
    }

    async fn clear(&mut self, selector: &str) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        self.typed.remove(selector);
        Ok(())
    }

    async fn type_char(&mut self, selector: &str, ch: char) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        self.typed.entry(selector.to_string()).or_default().push(ch);
        self.calls.push(format!("type:{}", ch));
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>, ScraperError> {
        Ok(self.page().texts.get(selector).cloned())
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError> {
        Ok(self.page().lists.get(selector).cloned().unwrap_or_default())
    }

    async fn attributes(
        &mut self,
        selector: &str,
        _name: &str,
    ) -> Result<Vec<String>, ScraperError> {
        Ok(self.page().lists.get(selector).cloned().unwrap_or_default())
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError> {
        if !self.present(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScraperError> {
        self.calls.push(format!("scroll:{}", pixels));
        Ok(())
    }

    async fn switch_to_new_window(&mut self, _timeout: Duration) -> Result<(), ScraperError> {
        match self.popup {
            Some(page) if self.popup_opened => {
                self.current = page;
                self.calls.push("switch".to_string());
                Ok(())
            }
            _ => Err(ScraperError::Timeout("新しいウィンドウなし".into())),
        }
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), ScraperError> {
        std::fs::create_dir_all(dir)?;
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        Ok(Vec::new())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closed = true;
        Ok(())
    }
}

/// テスト用の一時ディレクトリ
pub fn scratch_dir(tag: &str) -> PathBuf {
    let unique_id = format!(
        "{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    let dir = std::env::temp_dir().join(format!("wb-scraper-test-{}-{}", tag, unique_id));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
