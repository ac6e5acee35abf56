pub mod markup;
pub mod notify;
pub mod store;
pub mod webdriver;

pub use notify::NotifyRunSink;
pub use store::SqliteStore;
pub use webdriver::WebDriverSampler;
