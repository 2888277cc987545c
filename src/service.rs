use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{debug, info};

use crate::browser::ChromeSession;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::product::{ProcessOutcome, ProductProcessor, ProductTask};
use crate::traits::Browse;

/// tower::Serviceを実装した商品処理サービス
///
/// 呼び出しごとに独立したブラウザを起動し、終了時に必ず閉じる。
#[derive(Debug, Clone)]
pub struct ProductService {
    browser_config: Arc<ScraperConfig>,
    processor: Arc<ProductProcessor>,
}

impl ProductService {
    pub fn new(browser_config: ScraperConfig, processor: ProductProcessor) -> Self {
        Self {
            browser_config: Arc::new(browser_config),
            processor: Arc::new(processor),
        }
    }
}

impl Service<ProductTask> for ProductService {
    type Response = ProcessOutcome;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, task: ProductTask) -> Self::Future {
        info!("商品処理リクエスト受信: #{} {}", task.index, task.url);

        let browser_config = self.browser_config.clone();
        let processor = self.processor.clone();

        Box::pin(async move {
            let mut session = ChromeSession::launch(&browser_config)
                .await?
                .with_poll_interval(processor.timings().poll_interval);

            let outcome = processor.process(&mut session, &task).await;

            if let Err(e) = session.close().await {
                debug!("Failed to close session for #{}: {}", task.index, e);
            }

            outcome
        })
    }
}
