//! 商品URLの保存（1行1URL、追記のみ）

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScraperError;

#[derive(Debug, Clone)]
pub struct UrlStore {
    path: PathBuf,
}

impl UrlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 空のファイルから始める
    pub fn reset(&self) -> Result<(), ScraperError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&self.path)?;
        Ok(())
    }

    /// URLを追記し、書き込んだ件数を返す
    pub fn append(&self, urls: &[String]) -> Result<usize, ScraperError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut written = 0;
        for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            writeln!(file, "{}", url)?;
            written += 1;
        }

        debug!("Appended {} URLs to {:?}", written, self.path);
        Ok(written)
    }

    /// 保存済みURLを順に読み出す（重複はそのまま）
    pub fn read_all(&self) -> Result<Vec<String>, ScraperError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// 重複しているURLの件数（2回目以降の出現数）
pub fn count_duplicates(urls: &[String]) -> usize {
    let mut seen = HashSet::new();
    urls.iter().filter(|u| !seen.insert(u.as_str())).count()
}
