//! Background worker: the service pool singleton, the batch indexing loop,
//! the rescrape job, the auto-watch mirror, and the crawl lifecycle reader
//! (spec §4.2, §4.5, §4.7, §5).

pub mod autowatch;
pub mod batch;
pub mod lifecycle;
pub mod pool;
pub mod rescrape;

pub use autowatch::AutoWatchClient;
pub use lifecycle::{CrawlMetricsResponse, LifecycleTracker};
pub use pool::ServicePool;
pub use rescrape::{HttpRescrapeClient, RescrapeJob};
