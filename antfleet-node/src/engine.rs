use async_trait::async_trait;

use crate::error::NodeError;
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};

#[async_trait]
/// The local crawl engine a fleet node drives.
///
/// The engine owns the download queue and the crawl loop, the node only
/// decides which requests end up in the queue and when the loop may run.
pub trait CrawlEngine: Send + Sync + 'static {
    /// Activates the named spider locally.
    fn start_spider(&self, name: &str) -> StartSpiderResult;

    /// The requests the named spider seeds the frontier with.
    fn start_requests(&self, name: &str) -> Vec<CrawlRequest>;

    /// The name of the running spider, if any.
    fn active_spider(&self) -> Option<String>;

    /// Stops the active spider and ends the crawl loop.
    fn stop_spider(&self) -> Result<(), NodeError>;

    /// Suspends processing after the current request.
    fn pause(&self);

    /// Resumes processing.
    fn unpause(&self);

    /// Adds a request to the local download queue.
    fn push(&self, request: CrawlRequest);

    /// The number of requests waiting in the download queue.
    fn queued(&self) -> usize;

    /// A receiver of the results produced by the crawl loop.
    fn subscribe_results(&self) -> flume::Receiver<ScrapeResult>;

    /// Runs the crawl loop until the engine is stopped.
    async fn run(&self);
}
