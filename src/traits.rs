use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::ScraperError;

/// ブラウザ操作（CSSセレクタ単位）
///
/// 要素が「ない」ことは `Ok(false)` / `Ok(None)` で返し、ドライバ自体の失敗だけを `Err` にする。
/// ページ送りの終了判定などで、不在とエラーを取り違えないため。
#[async_trait]
pub trait Browse: Send {
    /// ページ遷移
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError>;

    /// 要素が存在するか
    async fn exists(&mut self, selector: &str) -> Result<bool, ScraperError>;

    /// 要素の出現を待機（タイムアウトで `Ok(false)`）
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScraperError>;

    /// 最初に一致した要素をクリック（存在しなければ `ElementNotFound`）
    async fn click(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// n番目に一致した要素をクリック
    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), ScraperError>;

    /// マウスオーバー
    async fn hover(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// 入力欄をクリア
    async fn clear(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// 入力欄に1文字入力
    async fn type_char(&mut self, selector: &str, ch: char) -> Result<(), ScraperError>;

    /// 表示テキスト
    async fn text(&mut self, selector: &str) -> Result<Option<String>, ScraperError>;

    /// 一致した全要素の表示テキスト
    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError>;

    /// 一致した全要素の属性値（値のないものは除く）
    async fn attributes(&mut self, selector: &str, name: &str)
        -> Result<Vec<String>, ScraperError>;

    /// 最後に一致した要素までスクロール
    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// 縦スクロール
    async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScraperError>;

    /// 新しく開いたウィンドウ（タブ）に切り替え
    async fn switch_to_new_window(&mut self, timeout: Duration) -> Result<(), ScraperError>;

    /// ダウンロード先ディレクトリを設定
    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), ScraperError>;

    /// 現在のページのスクリーンショット（PNG）
    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;
}
