//! 証明書PDFから電話番号とメールアドレスを取り出す
//!
//! テキストを行に分け、ラベル行の次の行を値とみなす。

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ScraperError;

pub const PHONE_LABEL: &str = "номер телефона";
pub const EMAIL_LABEL: &str = "адрес электронной почты";

/// 抽出結果（見つからなかった項目は `None`）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none()
    }
}

/// 空行を除いた行
pub fn document_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// `key` に一致する最初の行の次の行（最終行がラベルなら `None`）
pub fn find_value_by_key<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    let key = key.to_lowercase();
    let index = lines.iter().position(|line| line.to_lowercase() == key)?;
    lines.get(index + 1).copied()
}

pub fn fields_from_text(text: &str) -> ExtractedFields {
    let lines = document_lines(text);
    ExtractedFields {
        phone: find_value_by_key(&lines, PHONE_LABEL).map(str::to_string),
        email: find_value_by_key(&lines, EMAIL_LABEL).map(str::to_string),
    }
}

/// PDFの全ページのテキスト
fn read_text(path: &Path) -> Result<String, ScraperError> {
    let bytes = std::fs::read(path)?;

    // 壊れたPDFでパーサがpanicすることがある
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| ScraperError::Document(format!("{:?} の解析に失敗しました", path)))?
        .map_err(|e| ScraperError::Document(e.to_string()))
}

/// 証明書の項目抽出（状態を持たない）
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFieldExtractor;

impl DocumentFieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 読めないファイルは警告だけ出して両方 `None`
    pub fn extract(&self, path: &Path) -> ExtractedFields {
        match read_text(path) {
            Ok(text) => {
                let fields = fields_from_text(&text);
                if fields.is_empty() {
                    warn!("No phone or email found in {:?}", path);
                } else {
                    debug!("Extracted {:?} from {:?}", fields, path);
                }
                fields
            }
            Err(e) => {
                warn!("Could not read document {:?}: {}", path, e);
                ExtractedFields::default()
            }
        }
    }
}

/// ディレクトリ直下のファイルを名前順に列挙（隠しファイルは除く）
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, ScraperError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            !path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
        })
        .collect();
    files.sort();
    Ok(files)
}
