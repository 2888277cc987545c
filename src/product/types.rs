//! 商品処理の型

use std::path::PathBuf;

use url::Url;

/// 処理対象の商品（URLファイル上の順番付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductTask {
    pub index: usize,
    pub url: String,
}

impl ProductTask {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }

    /// URLのパスに含まれる商品番号（`/catalog/<id>/detail.aspx`）
    pub fn product_id(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        url.path_segments()?
            .find(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }

    /// 保存ファイル名（処理順 + 商品番号）
    pub fn document_file_name(&self, extension: &str) -> String {
        let id = self.product_id().unwrap_or_else(|| "item".to_string());
        format!("{:04}_{}.{}", self.index, id, extension)
    }
}

/// 1商品の処理結果
///
/// 構造的な失敗（詳細ボタンがない等）は `Err` 側で返る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 証明書を保存した
    Downloaded(PathBuf),
    /// 「Документы проверены」がない
    NoDocument,
    /// ダウンロード途中で失敗（処理済み扱い）
    DownloadFailed(String),
}

impl ProcessOutcome {
    pub fn document(&self) -> Option<&PathBuf> {
        match self {
            ProcessOutcome::Downloaded(path) => Some(path),
            _ => None,
        }
    }
}
