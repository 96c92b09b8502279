use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use antfleet_node::{ConnectionConfig, CrawlRequest, Crawler, FleetNodeBuilder, Spider};
use async_trait::async_trait;

struct FanOutSpider {
    crawled: Arc<AtomicUsize>,
}

#[async_trait]
impl Spider for FanOutSpider {
    fn name(&self) -> &str {
        "fan-out"
    }

    fn start_requests(&self) -> Vec<CrawlRequest> {
        vec![CrawlRequest::new("index", "https://example.com/")]
    }

    async fn crawl(
        &self,
        request: &CrawlRequest,
    ) -> anyhow::Result<Vec<Option<CrawlRequest>>> {
        self.crawled.fetch_add(1, Ordering::SeqCst);
        if request.unique_name != "index" {
            return Ok(Vec::new());
        }

        Ok((0..4)
            .map(|i| {
                Some(CrawlRequest::new(
                    format!("page-{i}"),
                    format!("https://example.com/page-{i}"),
                ))
            })
            .collect())
    }
}

fn crawler(crawled: &Arc<AtomicUsize>) -> Crawler {
    Crawler::default().with_spider(FanOutSpider {
        crawled: crawled.clone(),
    })
}

#[tokio::test]
async fn test_rpc_cluster_join_and_crawl() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let addrs = test_helper::get_unused_addrs(2);
    let node_1_addr = addrs[0];
    let node_2_addr = addrs[1];
    let crawled = Arc::new(AtomicUsize::new(0));

    let node_1_connection_cfg =
        ConnectionConfig::new(node_1_addr, node_1_addr, Vec::<String>::new());
    let node_2_connection_cfg =
        ConnectionConfig::new(node_2_addr, node_2_addr, [node_1_addr.to_string()]);

    let node_1 = FleetNodeBuilder::new(node_1_connection_cfg, crawler(&crawled))
        .connect()
        .await?;
    let node_2 = FleetNodeBuilder::new(node_2_connection_cfg, crawler(&crawled))
        .connect()
        .await?;

    assert!(node_1.is_master_node());
    assert_eq!(node_2.get_master_node().as_ref(), Some(node_1.me()));

    node_1
        .wait_for_members(2, Duration::from_secs(10))
        .await
        .expect("Nodes should connect within timeout.");

    let result = node_2.start_spider("fan-out").await;
    assert!(result.success, "Spider should start: {}", result.detail);

    node_1
        .wait_for_termination(Duration::from_secs(30))
        .await
        .expect("Crawl should terminate within timeout.");
    assert_eq!(node_1.statistics().num_crawled(), 5);
    assert_eq!(crawled.load(Ordering::SeqCst), 5);

    node_1.close_cluster().await;
    assert!(node_2.stop_crawl().is_err(), "Peer should have been stopped.");

    node_1.shutdown().await;
    node_2.shutdown().await;
    Ok(())
}
