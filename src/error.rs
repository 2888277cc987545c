use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("価格範囲が不正です: 上限 {max} が下限 {min} より小さい")]
    InvalidPriceRange { min: u64, max: u64 },

    #[error("入力値が不正です: {0}")]
    InvalidInput(String),

    #[error("該当商品なし: {0}")]
    NoResults(String),

    #[error("ブランドが一致しません: 指定 \"{requested}\", サイト上の候補 \"{found}\"")]
    BrandMismatch { requested: String, found: String },

    #[error("ダウンロードエラー: {0}")]
    Download(String),

    #[error("ドキュメント読み込みエラー: {0}")]
    Document(String),

    #[error("Excel操作エラー: {0}")]
    Spreadsheet(String),

    #[error("タスクが異常終了しました: {0}")]
    TaskPanicked(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// ユーザー入力に起因するエラーか（リトライしても結果は変わらない）
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScraperError::InvalidPriceRange { .. }
                | ScraperError::InvalidInput(_)
                | ScraperError::BrandMismatch { .. }
                | ScraperError::NoResults(_)
        )
    }
}

impl From<rust_xlsxwriter::XlsxError> for ScraperError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ScraperError::Spreadsheet(e.to_string())
    }
}

impl From<calamine::XlsxError> for ScraperError {
    fn from(e: calamine::XlsxError) -> Self {
        ScraperError::Spreadsheet(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors() {
        assert!(ScraperError::InvalidPriceRange { min: 10, max: 1 }.is_input_error());
        assert!(ScraperError::BrandMismatch {
            requested: "LG".into(),
            found: "Samsung".into()
        }
        .is_input_error());
        assert!(!ScraperError::Timeout("x".into()).is_input_error());
    }

    #[test]
    fn test_brand_mismatch_message() {
        let e = ScraperError::BrandMismatch {
            requested: "LG".into(),
            found: "Samsung".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("LG"));
        assert!(msg.contains("Samsung"));
    }
}
