use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::CrawlEngine;
use crate::error::NodeError;
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};

#[async_trait]
/// User provided crawl logic.
///
/// A spider downloads and parses a single request, returning the
/// follow-up requests it discovered.
pub trait Spider: Send + Sync + 'static {
    /// The unique name the spider is started with.
    fn name(&self) -> &str;

    /// The initial requests seeding the frontier.
    fn start_requests(&self) -> Vec<CrawlRequest> {
        Vec::new()
    }

    /// Crawls a request, returning any follow-up requests.
    async fn crawl(
        &self,
        request: &CrawlRequest,
    ) -> anyhow::Result<Vec<Option<CrawlRequest>>>;
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
struct RunState {
    paused: bool,
    stopped: bool,
}

/// The default crawl engine.
///
/// Requests are processed one at a time from a queue, the run state is
/// checked at the head of the loop and between every request.
pub struct Crawler {
    spiders: BTreeMap<String, Arc<dyn Spider>>,
    active: Mutex<Option<Arc<dyn Spider>>>,
    state: watch::Sender<RunState>,
    requests_tx: flume::Sender<CrawlRequest>,
    requests_rx: flume::Receiver<CrawlRequest>,
    results_tx: flume::Sender<ScrapeResult>,
    results_rx: flume::Receiver<ScrapeResult>,
}

impl Default for Crawler {
    fn default() -> Self {
        let (state, _) = watch::channel(RunState::default());
        let (requests_tx, requests_rx) = flume::unbounded();
        let (results_tx, results_rx) = flume::unbounded();

        Self {
            spiders: BTreeMap::new(),
            active: Mutex::new(None),
            state,
            requests_tx,
            requests_rx,
            results_tx,
            results_rx,
        }
    }
}

impl Crawler {
    /// Registers a spider which can later be started by name.
    pub fn with_spider(mut self, spider: impl Spider) -> Self {
        self.spiders
            .insert(spider.name().to_string(), Arc::new(spider));
        self
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    async fn crawl(&self, request: CrawlRequest) {
        let spider = self.active.lock().clone();
        let key = request.key();

        let result = match spider {
            Some(spider) => match spider.crawl(&request).await {
                Ok(scraped_requests) => ScrapeResult::new(key, scraped_requests),
                Err(error) => {
                    warn!(
                        error = ?error,
                        spider = spider.name(),
                        url = %request.url,
                        "Failed to crawl request, reporting it without follow-ups."
                    );
                    ScrapeResult::leaf(key)
                },
            },
            None => {
                warn!(
                    url = %request.url,
                    "No spider is running, reporting request without follow-ups."
                );
                ScrapeResult::leaf(key)
            },
        };

        if self.results_tx.send(result).is_err() {
            warn!("Result channel has been closed, dropping crawl result.");
        }
    }
}

#[async_trait]
impl CrawlEngine for Crawler {
    fn start_spider(&self, name: &str) -> StartSpiderResult {
        let spider = match self.spiders.get(name) {
            Some(spider) => spider.clone(),
            None => return StartSpiderResult::failed(format!("Unknown spider `{name}`")),
        };

        {
            let mut active = self.active.lock();
            if let Some(current) = active.as_ref() {
                if current.name() == name {
                    return StartSpiderResult::failed(format!(
                        "Spider `{name}` is already running"
                    ));
                }
            }
            *active = Some(spider);
        }

        self.state.send_modify(|state| state.stopped = false);
        info!(spider = name, "Spider has been started.");
        StartSpiderResult::started(format!("Spider `{name}` started"))
    }

    fn start_requests(&self, name: &str) -> Vec<CrawlRequest> {
        self.spiders
            .get(name)
            .map(|spider| spider.start_requests())
            .unwrap_or_default()
    }

    fn active_spider(&self) -> Option<String> {
        self.active
            .lock()
            .as_ref()
            .map(|spider| spider.name().to_string())
    }

    fn stop_spider(&self) -> Result<(), NodeError> {
        let previous = self.active.lock().take();
        self.state.send_modify(|state| state.stopped = true);

        match previous {
            Some(spider) => {
                info!(spider = spider.name(), "Spider has been stopped.");
                Ok(())
            },
            None => Err(NodeError::NotRunning("spider")),
        }
    }

    fn pause(&self) {
        self.state.send_modify(|state| state.paused = true);
    }

    fn unpause(&self) {
        self.state.send_modify(|state| state.paused = false);
    }

    fn push(&self, request: CrawlRequest) {
        // Both halves live in `self`, the channel cannot be disconnected.
        let _ = self.requests_tx.send(request);
    }

    fn queued(&self) -> usize {
        self.requests_tx.len()
    }

    fn subscribe_results(&self) -> flume::Receiver<ScrapeResult> {
        self.results_rx.clone()
    }

    async fn run(&self) {
        let mut state = self.state.subscribe();
        info!("Crawl loop is running.");

        loop {
            let current = *state.borrow_and_update();
            if current.stopped {
                break;
            }

            if current.paused {
                if state.changed().await.is_err() {
                    break;
                }
                continue;
            }

            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },
                request = self.requests_rx.recv_async() => {
                    match request {
                        Ok(request) => self.crawl(request).await,
                        Err(_) => break,
                    }
                },
            }
        }

        debug!("Crawl loop has stopped.");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct LinkSpider;

    #[async_trait]
    impl Spider for LinkSpider {
        fn name(&self) -> &str {
            "links"
        }

        fn start_requests(&self) -> Vec<CrawlRequest> {
            vec![CrawlRequest::new("root", "https://example.com/")]
        }

        async fn crawl(
            &self,
            request: &CrawlRequest,
        ) -> anyhow::Result<Vec<Option<CrawlRequest>>> {
            if request.unique_name == "broken" {
                anyhow::bail!("connection reset");
            }

            Ok(vec![
                Some(CrawlRequest::new(
                    format!("{}/a", request.unique_name),
                    format!("{}a", request.url),
                )),
                None,
            ])
        }
    }

    #[test]
    fn test_start_and_stop_spider() {
        let crawler = Crawler::default().with_spider(LinkSpider);

        let result = crawler.start_spider("missing");
        assert!(!result.success);

        let result = crawler.start_spider("links");
        assert!(result.success, "{}", result.detail);
        assert_eq!(crawler.active_spider().as_deref(), Some("links"));

        let result = crawler.start_spider("links");
        assert!(!result.success, "Starting twice should be rejected.");

        assert_eq!(crawler.start_requests("links").len(), 1);
        assert!(crawler.start_requests("missing").is_empty());

        crawler.stop_spider().expect("Stop running spider");
        assert!(crawler.stop_spider().is_err());
        assert_eq!(crawler.active_spider(), None);
    }

    #[tokio::test]
    async fn test_crawl_loop_produces_results() {
        let crawler = Arc::new(Crawler::default().with_spider(LinkSpider));
        let results = crawler.subscribe_results();
        crawler.start_spider("links");

        crawler.push(CrawlRequest::new("root", "https://example.com/").with_owner("1"));
        crawler.push(CrawlRequest::new("broken", "https://example.com/x").with_owner("1"));

        let handle = tokio::spawn({
            let crawler = crawler.clone();
            async move { crawler.run().await }
        });

        let first = results.recv_async().await.expect("First result");
        assert_eq!(first.request.unique_name, "root");
        assert_eq!(first.scraped_requests.len(), 2);

        let second = results.recv_async().await.expect("Second result");
        assert_eq!(second.request.unique_name, "broken");
        assert!(
            second.scraped_requests.is_empty(),
            "Failed crawls should be reported without follow-ups."
        );

        crawler.stop_spider().expect("Stop spider");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("Crawl loop should stop")
            .expect("Crawl loop should not panic");
    }

    #[tokio::test]
    async fn test_paused_crawler_holds_requests() {
        let crawler = Arc::new(Crawler::default().with_spider(LinkSpider));
        let results = crawler.subscribe_results();
        crawler.start_spider("links");
        crawler.pause();
        assert!(crawler.is_paused());

        let handle = tokio::spawn({
            let crawler = crawler.clone();
            async move { crawler.run().await }
        });

        crawler.push(CrawlRequest::new("root", "https://example.com/").with_owner("1"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(crawler.queued(), 1, "Paused crawler should not take work.");
        assert!(results.is_empty());

        crawler.unpause();
        let result = tokio::time::timeout(Duration::from_secs(5), results.recv_async())
            .await
            .expect("Crawler should resume")
            .expect("Result");
        assert_eq!(result.request.unique_name, "root");
        assert_eq!(crawler.queued(), 0);

        crawler.stop_spider().expect("Stop spider");
        handle.await.expect("Crawl loop should not panic");
    }
}
