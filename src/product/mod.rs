//! 商品ページの処理（証明書ダウンロード）

mod processor;
mod types;

pub use processor::{
    ProductProcessor, CERTIFICATE_BUTTON, DETAILS_BUTTON, DOWNLOAD_BUTTON, POPUP_STEP_LINK,
};
pub use types::{ProcessOutcome, ProductTask};
