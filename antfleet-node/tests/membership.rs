use std::net::SocketAddr;
use std::time::Duration;

use antfleet_node::{
    ClusterStatus,
    ConnectionConfig,
    Crawler,
    FleetNode,
    FleetNodeBuilder,
    LocalTransport,
};

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn local_node(
    transport: &LocalTransport,
    port: u16,
    seeds: &[SocketAddr],
) -> FleetNode {
    let connection_cfg = ConnectionConfig::new(
        addr(port),
        addr(port),
        seeds.iter().map(|seed| seed.to_string()),
    );
    FleetNodeBuilder::new(connection_cfg, Crawler::default())
        .connect_local(transport.clone())
        .await
}

#[tokio::test]
async fn test_single_node_becomes_master() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node = local_node(&transport, 7000, &[]).await;

    assert!(node.is_master_node());
    assert_eq!(node.get_master_name(), Some(node.me().id.clone()));
    assert_eq!(node.membership().status(), ClusterStatus::Ready);
    assert_eq!(node.statistics().num_members(), 1);

    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_seeds_fall_back_to_master() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node = local_node(&transport, 7000, &[addr(7001), addr(7002)]).await;

    assert!(node.is_master_node());
    assert_eq!(node.get_all_node_for_close(), vec![node.me().clone()]);

    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_member_join() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node_1 = local_node(&transport, 7000, &[]).await;
    let node_2 = local_node(&transport, 7001, &[addr(7000)]).await;

    assert!(node_1.is_master_node());
    assert!(!node_2.is_master_node());
    assert_eq!(node_2.get_master_node().as_ref(), Some(node_1.me()));
    assert_eq!(node_2.membership().status(), ClusterStatus::Ready);

    node_1
        .wait_for_members(2, Duration::from_secs(5))
        .await
        .expect("Master should learn of the new member.");
    assert_eq!(node_1.statistics().num_members(), 2);
    assert_eq!(node_2.statistics().num_members(), 2);

    // Joining through a member which is not the master.
    let node_3 = local_node(&transport, 7002, &[addr(7001)]).await;
    assert_eq!(node_3.get_master_node().as_ref(), Some(node_1.me()));

    for node in [&node_1, &node_2, &node_3] {
        node.wait_for_members(3, Duration::from_secs(5))
            .await
            .expect("Every node should know every member.");
        assert_eq!(node.get_master_name(), Some(node_1.me().id.clone()));
    }

    node_1.shutdown().await;
    node_2.shutdown().await;
    node_3.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_own_address_in_seeds() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node_1 = local_node(&transport, 7000, &[addr(7000), addr(7001)]).await;
    let node_2 = local_node(&transport, 7001, &[addr(7000), addr(7001)]).await;

    assert!(node_1.is_master_node());
    assert!(!node_2.is_master_node());
    assert_eq!(node_2.get_master_node().as_ref(), Some(node_1.me()));

    node_1.shutdown().await;
    node_2.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_add_master_node() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node_1 = local_node(&transport, 7000, &[]).await;
    let node_2 = local_node(&transport, 7001, &[addr(7000)]).await;

    let stranger = antfleet_node::NodeIdentity::new("127.0.0.1", 7999);
    assert!(!node_2.add_master_node(&stranger), "Unknown node cannot become master.");
    assert_eq!(node_2.get_master_name(), Some(node_1.me().id.clone()));

    assert!(node_2.add_master_node(node_2.me()));
    assert!(node_2.is_master_node());

    node_1.shutdown().await;
    node_2.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_reconfiguration_lock() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = LocalTransport::default();
    let node = local_node(&transport, 7000, &[]).await;

    node.join();
    assert_eq!(node.membership().status(), ClusterStatus::Joining);
    assert!(node.ready());
    assert_eq!(node.membership().status(), ClusterStatus::Ready);

    node.shutdown().await;
    Ok(())
}
