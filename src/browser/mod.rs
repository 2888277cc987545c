//! ブラウザセッション

mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use session::ChromeSession;
