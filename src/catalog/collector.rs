//! 商品一覧の収集
//!
//! フィルター（価格・ブランド・画面サイズ）を設定し、全ページの商品URLをファイルに追記する。

use std::path::PathBuf;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{FilterCriteria, Timings, DEFAULT_CATALOG_URL};
use crate::error::ScraperError;
use crate::store::UrlStore;
use crate::traits::Browse;

use super::selectors::*;

/// 収集結果
#[derive(Debug, Clone)]
pub struct CollectReport {
    /// URLファイル
    pub path: PathBuf,
    pub pages: usize,
    pub urls: usize,
}

/// サイト上のブランド名が指定と一致するか（大文字小文字は無視）
fn brand_matches(on_site: &str, requested: &str) -> bool {
    on_site.trim().to_lowercase() == requested.trim().to_lowercase()
}

/// 画面サイズの項目（例: `55"`）が指定値で始まるか
fn diagonal_matches(item: &str, diagonal: &str) -> bool {
    match item.trim().strip_prefix(diagonal) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}

pub struct ListingCollector<B: Browse> {
    criteria: FilterCriteria,
    store: UrlStore,
    browser: B,
    timings: Timings,
    catalog_url: String,
}

impl<B: Browse> ListingCollector<B> {
    pub fn new(criteria: FilterCriteria, store: UrlStore, browser: B, timings: Timings) -> Self {
        Self {
            criteria,
            store,
            browser,
            timings,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
        }
    }

    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    /// 一括実行（フィルター設定 → 全ページ収集）
    pub async fn collect(&mut self) -> Result<CollectReport, ScraperError> {
        info!(
            "Collecting listings: brand={}, diagonal={:?}, price={}..{}",
            self.criteria.brand,
            self.criteria.diagonal,
            self.criteria.price_min,
            self.criteria.price_max
        );

        self.store.reset()?;

        self.browser.goto(&self.catalog_url).await?;
        self.open_all_filters().await?;
        self.set_price().await?;
        self.set_brand().await?;
        self.set_diagonal().await?;
        self.apply_filters().await?;

        let report = self.harvest().await?;
        info!(
            "Collected {} URLs from {} pages into {:?}",
            report.urls, report.pages, report.path
        );
        Ok(report)
    }

    /// ブラウザを閉じる
    pub async fn close(&mut self) -> Result<(), ScraperError> {
        self.browser.close().await
    }

    /// 「Все фильтры」を開く
    async fn open_all_filters(&mut self) -> Result<(), ScraperError> {
        info!("Opening filter panel");

        if !self
            .browser
            .wait_for(ALL_FILTERS, self.timings.element_wait)
            .await?
        {
            warn!(
                "Filter panel button not found within {:?}",
                self.timings.element_wait
            );
            return Err(ScraperError::ElementNotFound(format!(
                "「Все фильтры」が{:?}以内に見つかりません",
                self.timings.element_wait
            )));
        }

        self.browser.click(ALL_FILTERS).await
    }

    /// 1文字ずつ入力（対象サイトは一括入力だと取りこぼす）
    async fn type_slowly(&mut self, selector: &str, text: &str) -> Result<(), ScraperError> {
        self.browser.clear(selector).await?;
        for ch in text.chars() {
            self.browser.type_char(selector, ch).await?;
            sleep(self.timings.keystroke).await;
        }
        Ok(())
    }

    async fn set_price(&mut self) -> Result<(), ScraperError> {
        info!(
            "Setting price range {}..{}",
            self.criteria.price_min, self.criteria.price_max
        );

        if self.browser.exists(PRICE_DROPDOWN).await? {
            self.browser.hover(PRICE_DROPDOWN).await?;
        }

        let min = self.criteria.price_min.to_string();
        let max = self.criteria.price_max.to_string();

        self.browser.click(PRICE_START).await?;
        self.type_slowly(PRICE_START, &min).await?;
        self.browser.click(PRICE_END).await?;
        self.type_slowly(PRICE_END, &max).await?;
        sleep(self.timings.keystroke).await;

        if let Some(text) = self.browser.text(NOT_FOUND).await? {
            if text.to_lowercase().contains(NOT_FOUND_TEXT) {
                warn!("No products in price range {}..{}", min, max);
                return Err(ScraperError::NoResults(format!(
                    "価格 {}..{} の商品はありません",
                    min, max
                )));
            }
        }

        Ok(())
    }

    async fn set_brand(&mut self) -> Result<(), ScraperError> {
        info!("Entering brand name {}", self.criteria.brand);
        sleep(self.timings.settle).await;

        if !self.browser.exists(BRAND_FILTER).await? {
            warn!("Brand facet not found");
            return Err(ScraperError::ElementNotFound("ブランドフィルター".into()));
        }

        self.browser.scroll_into_view(BRAND_FILTER).await?;
        self.browser.click(BRAND_FILTER).await?;
        sleep(self.timings.settle).await;

        self.browser.click(BRAND_SHOW_ALL).await?;
        sleep(self.timings.settle).await;

        let brand = self.criteria.brand.clone();
        self.type_slowly(BRAND_SEARCH, &brand).await?;

        let listing = self.browser.text(BRAND_LIST).await?.unwrap_or_default();
        let first = listing.lines().next().unwrap_or_default().trim().to_string();

        if !brand_matches(&first, &brand) {
            warn!(
                "Brand \"{}\" not offered, first suggestion is \"{}\"",
                brand, first
            );
            return Err(ScraperError::BrandMismatch {
                requested: brand,
                found: first,
            });
        }

        info!("Brand \"{}\" found, selecting it", brand);
        self.browser.click(BRAND_CHECKBOX).await?;
        sleep(self.timings.settle).await;
        Ok(())
    }

    /// 画面サイズ（見つからなくても続行）
    async fn set_diagonal(&mut self) -> Result<(), ScraperError> {
        let Some(diagonal) = self.criteria.diagonal.clone() else {
            debug!("No diagonal requested");
            return Ok(());
        };

        info!("Selecting diagonal {}", diagonal);

        if !self.browser.exists(DIAGONAL_FILTER).await? {
            warn!("Diagonal facet not found, continuing without it");
            return Ok(());
        }

        self.browser.scroll_into_view(DIAGONAL_FILTER).await?;
        sleep(self.timings.settle).await;

        let items = self.browser.texts(DIAGONAL_ITEMS).await?;
        match items.iter().position(|item| diagonal_matches(item, &diagonal)) {
            Some(index) => {
                self.browser.click_nth(DIAGONAL_CHECKBOXES, index).await?;
            }
            None => {
                warn!(
                    "Diagonal {} not offered for brand {}, continuing without it",
                    diagonal, self.criteria.brand
                );
            }
        }

        Ok(())
    }

    /// 「Показать」
    async fn apply_filters(&mut self) -> Result<(), ScraperError> {
        info!("Applying filters");
        self.browser.click(APPLY).await?;
        sleep(self.timings.keystroke).await;
        Ok(())
    }

    /// 遅延読み込みのカードを表示させるため少しずつスクロール
    async fn smooth_scroll(&mut self) -> Result<(), ScraperError> {
        for _ in 0..self.timings.scroll_steps {
            self.browser.scroll_by(self.timings.scroll_step_px).await?;
            sleep(self.timings.scroll_pause).await;
        }
        Ok(())
    }

    /// 「次のページ」がなくなるまで商品URLを集める
    async fn harvest(&mut self) -> Result<CollectReport, ScraperError> {
        let mut pages = 0;
        let mut urls = 0;

        loop {
            self.smooth_scroll().await?;

            let links = self.browser.attributes(PRODUCT_LINK, "href").await?;
            pages += 1;
            urls += self.store.append(&links)?;
            info!("Page {}: {} product links", pages, links.len());

            if !self.browser.exists(NEXT_PAGE).await? {
                info!("No next page, pagination finished");
                break;
            }

            if self.browser.exists(PRODUCT_CARD).await? {
                self.browser.scroll_into_view(PRODUCT_CARD).await?;
            }
            self.browser.click(NEXT_PAGE).await?;
        }

        Ok(CollectReport {
            path: self.store.path().to_path_buf(),
            pages,
            urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{scratch_dir, FakeBrowser, FakePage};

    fn filter_page(brand_listing: &str) -> FakePage {
        FakePage::new()
            .with(ALL_FILTERS)
            .with(PRICE_DROPDOWN)
            .with(PRICE_START)
            .with(PRICE_END)
            .with(BRAND_FILTER)
            .with(BRAND_SHOW_ALL)
            .with(BRAND_SEARCH)
            .with_text(BRAND_LIST, brand_listing)
            .with(BRAND_CHECKBOX)
            .with(DIAGONAL_FILTER)
            .with_list(DIAGONAL_ITEMS, &["32\"", "55\"", "65\""])
            .with(DIAGONAL_CHECKBOXES)
            .with(APPLY)
            .with(PRODUCT_CARD)
    }

    fn collector(
        tag: &str,
        criteria: FilterCriteria,
        pages: Vec<FakePage>,
    ) -> (ListingCollector<FakeBrowser>, PathBuf) {
        let dir = scratch_dir(tag);
        let store = UrlStore::new(dir.join("urls.csv"));
        let browser = FakeBrowser::new(pages);
        (
            ListingCollector::new(criteria, store, browser, Timings::instant()),
            dir,
        )
    }

    fn lg() -> FilterCriteria {
        FilterCriteria::new("LG", Some("55".into()), 30_000, 90_000).unwrap()
    }

    #[test]
    fn test_brand_matches_ignores_case() {
        assert!(brand_matches("lg", "LG"));
        assert!(brand_matches(" Samsung ", "SAMSUNG"));
        assert!(!brand_matches("Samsung", "LG"));
    }

    #[test]
    fn test_diagonal_matches_prefix() {
        assert!(diagonal_matches("55\"", "55"));
        assert!(diagonal_matches(" 55 дюймов", "55"));
        assert!(!diagonal_matches("65\"", "55"));
        assert!(!diagonal_matches("55\"", "5"));
    }

    #[tokio::test]
    async fn test_collects_all_pages_until_no_next_page() {
        let first = filter_page("LG\nLG Electronics")
            .with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx", "https://wb/catalog/2/detail.aspx"])
            .navigates(NEXT_PAGE, 1);
        let second = FakePage::new()
            .with(PRODUCT_CARD)
            .with_list(PRODUCT_LINK, &["https://wb/catalog/3/detail.aspx"]);

        let (mut collector, dir) = collector("collect-pages", lg(), vec![first, second]);
        let report = collector.collect().await.unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.urls, 3);
        let stored = UrlStore::new(&report.path).read_all().unwrap();
        assert_eq!(
            stored,
            vec![
                "https://wb/catalog/1/detail.aspx",
                "https://wb/catalog/2/detail.aspx",
                "https://wb/catalog/3/detail.aspx"
            ]
        );

        let browser = collector.browser();
        assert_eq!(browser.typed.get(BRAND_SEARCH).map(String::as_str), Some("LG"));
        assert_eq!(browser.typed.get(PRICE_START).map(String::as_str), Some("30000"));
        assert_eq!(browser.typed.get(PRICE_END).map(String::as_str), Some("90000"));
        assert!(browser.clicked(BRAND_CHECKBOX));
        assert!(browser
            .calls
            .contains(&format!("click_nth:{}:1", DIAGONAL_CHECKBOXES)));
        assert!(browser.clicked(APPLY));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_brand_typed_one_char_at_a_time() {
        let page = filter_page("Samsung").with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"]);
        let criteria = FilterCriteria::new("Samsung", None, 1, 2).unwrap();
        let (mut collector, dir) = collector("collect-typing", criteria, vec![page]);
        collector.collect().await.unwrap();

        let typed: Vec<&String> = collector
            .browser()
            .calls
            .iter()
            .filter(|c| c.starts_with("type:"))
            .collect();
        // 価格 "1" + "2" + ブランド7文字
        assert_eq!(typed.len(), 9);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_brand_mismatch_is_fatal_before_checkbox_click() {
        let page = filter_page("Samsung\nSony").with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"]);
        let (mut collector, dir) = collector("collect-mismatch", lg(), vec![page]);

        let err = collector.collect().await.unwrap_err();
        match err {
            ScraperError::BrandMismatch { requested, found } => {
                assert_eq!(requested, "LG");
                assert_eq!(found, "Samsung");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let browser = collector.browser();
        assert_eq!(browser.clicks_containing("checkbox-with-text__decor"), 0);
        assert!(!browser.clicked(APPLY));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_filter_panel_is_fatal() {
        let (mut collector, dir) = collector("collect-no-panel", lg(), vec![FakePage::new()]);
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, ScraperError::ElementNotFound(_)));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_no_results_for_price() {
        let page = filter_page("LG").with_text(NOT_FOUND, "Не нашлось подходящих товаров");
        let (mut collector, dir) = collector("collect-no-results", lg(), vec![page]);

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, ScraperError::NoResults(_)));
        assert!(!collector.browser().clicked(BRAND_CHECKBOX));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_diagonal_facet_is_not_fatal() {
        let page = FakePage::new()
            .with(ALL_FILTERS)
            .with(PRICE_START)
            .with(PRICE_END)
            .with(BRAND_FILTER)
            .with(BRAND_SHOW_ALL)
            .with(BRAND_SEARCH)
            .with_text(BRAND_LIST, "lg")
            .with(BRAND_CHECKBOX)
            .with(APPLY)
            .with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"]);

        let (mut collector, dir) = collector("collect-no-diagonal", lg(), vec![page]);
        let report = collector.collect().await.unwrap();

        assert_eq!(report.pages, 1);
        assert_eq!(report.urls, 1);
        assert!(!collector.browser().calls.iter().any(|c| c.starts_with("click_nth")));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_unknown_diagonal_value_is_skipped() {
        let criteria = FilterCriteria::new("LG", Some("43".into()), 1, 2).unwrap();
        let page = filter_page("LG").with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"]);
        let (mut collector, dir) = collector("collect-diagonal-value", criteria, vec![page]);

        collector.collect().await.unwrap();
        assert!(!collector.browser().calls.iter().any(|c| c.starts_with("click_nth")));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_duplicate_urls_across_pages_are_kept() {
        let first = filter_page("LG")
            .with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"])
            .navigates(NEXT_PAGE, 1);
        let second = FakePage::new().with_list(PRODUCT_LINK, &["https://wb/catalog/1/detail.aspx"]);

        let (mut collector, dir) = collector("collect-dupes", lg(), vec![first, second]);
        let report = collector.collect().await.unwrap();

        assert_eq!(report.urls, 2);
        assert_eq!(UrlStore::new(&report.path).read_all().unwrap().len(), 2);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_previous_run_urls_are_discarded() {
        let page = filter_page("LG").with_list(PRODUCT_LINK, &["https://wb/catalog/9/detail.aspx"]);
        let (mut collector, dir) = collector("collect-reset", lg(), vec![page]);
        std::fs::write(dir.join("urls.csv"), "https://old/1\n").unwrap();

        let report = collector.collect().await.unwrap();
        assert_eq!(
            UrlStore::new(&report.path).read_all().unwrap(),
            vec!["https://wb/catalog/9/detail.aspx"]
        );
        std::fs::remove_dir_all(dir).ok();
    }
}
