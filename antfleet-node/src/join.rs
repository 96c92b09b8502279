use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::engine::CrawlEngine;
use crate::identity::{parse_peer_addr, NodeIdentity};
use crate::membership::ClusterMembership;
use crate::transport::{ClusterTransport, JoinResponse, MembershipNotice};

/// The bootstrap protocol and the handlers reacting to remote joins.
///
/// Every membership change is applied inside the reconfiguration lock,
/// [JoinProtocol::join] pauses the local crawl loop and
/// [JoinProtocol::ready] resumes it once a master is known.
///
/// The master never changes once elected and there is no leave or
/// eviction path, a dead member stays a member.
pub struct JoinProtocol {
    membership: ClusterMembership,
    engine: Arc<dyn CrawlEngine>,
    transport: Arc<dyn ClusterTransport>,
}

impl JoinProtocol {
    pub fn new(
        membership: ClusterMembership,
        engine: Arc<dyn CrawlEngine>,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        Self {
            membership,
            engine,
            transport,
        }
    }

    /// Enters the reconfiguration lock, pausing local crawl processing.
    pub fn join(&self) {
        self.membership.join();
        self.engine.pause();
    }

    /// Leaves the reconfiguration lock.
    ///
    /// Crawl processing only resumes when the cluster could become ready.
    pub fn ready(&self) -> bool {
        let ready = self.membership.ready();
        if ready {
            self.engine.unpause();
        }
        ready
    }

    /// Attaches the node to an existing cluster through the seed nodes or
    /// elects itself master if none of them belongs to a cluster.
    ///
    /// Returns if an existing cluster was found.
    pub async fn join_node(&self, seed_nodes: &[String]) -> bool {
        self.join();
        let me = self.membership.me().clone();

        info!(
            self_node_id = %me.id,
            public_addr = %me.peer_addr(),
            peer_seed_addrs = %seed_nodes.join(", "),
            "Joining cluster."
        );

        let mut cluster_exists = false;
        for seed in seed_nodes {
            let (address, port) = match parse_peer_addr(seed) {
                Ok(location) => location,
                Err(error) => {
                    warn!(error = %error, seed = %seed, "Skipping malformed seed node.");
                    continue;
                },
            };

            if me.is_located_at(address, port) {
                continue;
            }

            // Every seed is attempted, a later refusal must not hide an
            // earlier success.
            cluster_exists |= self.send_join_request(seed, &me).await;
        }

        if !cluster_exists {
            self.membership.promote_self_to_master();
        }

        self.ready();
        cluster_exists
    }

    async fn send_join_request(&self, peer: &str, me: &NodeIdentity) -> bool {
        let response = match self.transport.join(peer, me).await {
            Ok(response) => response,
            Err(error) => {
                debug!(
                    error = %error,
                    target_addr = %peer,
                    "Seed node is unreachable, treating it as having no cluster."
                );
                return false;
            },
        };

        if !response.accepted {
            debug!(target_addr = %peer, "Seed node does not belong to a cluster yet.");
            return false;
        }

        for member in response.members {
            self.membership.add_member(member);
        }

        if let Some(master) = response.master {
            self.membership.add_member(master.clone());
            self.membership.set_master_by_name(&master.id);
        }

        if let Some(spider) = response.spider {
            self.adopt_spider(&spider);
        }

        info!(target_addr = %peer, "Seed node accepted join request.");
        true
    }

    /// Handles a remote node asking to be let into the cluster.
    pub async fn handle_join(&self, caller: NodeIdentity) -> JoinResponse {
        self.add_node_to_cluster(caller).await;

        let master = self.membership.master_node();
        JoinResponse {
            accepted: master.is_some(),
            master,
            members: self.membership.all_members(),
            spider: self.engine.active_spider(),
        }
    }

    /// Adds a remote node to the cluster.
    ///
    /// The master keeps itself as master and announces the new membership
    /// to every member, any other node forwards the new member to the master.
    pub async fn add_node_to_cluster(&self, info: NodeIdentity) {
        self.join();

        let me = self.membership.me().clone();
        if self.membership.add_member(info.clone()) {
            if self.membership.is_master(&me.id) {
                self.broadcast_membership().await;
            } else if let Some(master) = self.membership.master_node() {
                if master != info {
                    self.forward_to_master(&master, &info).await;
                }
            }
        }

        self.ready();
    }

    /// Changes the master to a node which is already a member.
    pub fn add_master_node(&self, master: &NodeIdentity) -> bool {
        self.membership.set_master_by_name(&master.id)
    }

    /// Applies the membership announced by the master.
    pub fn handle_membership_notice(&self, notice: MembershipNotice) {
        self.join();

        for member in notice.members {
            self.membership.add_member(member);
        }
        self.membership.add_member(notice.master.clone());
        self.add_master_node(&notice.master);

        if let Some(spider) = notice.spider {
            self.adopt_spider(&spider);
        }

        self.ready();
    }

    /// Activates the spider the rest of the fleet is running.
    ///
    /// Called while the crawl loop is paused, so requests routed to this
    /// node before the cluster is ready are crawled by the adopted spider.
    fn adopt_spider(&self, name: &str) {
        if self.engine.active_spider().as_deref() == Some(name) {
            return;
        }

        let result = self.engine.start_spider(name);
        if result.success {
            info!(spider = name, "Adopted spider running in the cluster.");
        } else {
            warn!(
                spider = name,
                detail = %result.detail,
                "Failed to adopt spider running in the cluster."
            );
        }
    }

    async fn forward_to_master(&self, master: &NodeIdentity, info: &NodeIdentity) {
        debug!(
            master_node_id = %master.id,
            target_node_id = %info.id,
            "Forwarding new member to master."
        );

        if let Err(error) = self.transport.join(&master.peer_addr(), info).await {
            warn!(
                error = %error,
                master_node_id = %master.id,
                target_node_id = %info.id,
                "Failed to forward new member to master."
            );
        }
    }

    async fn broadcast_membership(&self) {
        let master = match self.membership.master_node() {
            Some(master) => master,
            None => return,
        };

        let me = self.membership.me();
        let members = self.membership.all_members();
        let notice = MembershipNotice {
            master,
            members: members.clone(),
            spider: self.engine.active_spider(),
        };

        let notice = &notice;
        let transport = &self.transport;
        join_all(
            members
                .iter()
                .filter(|member| *member != me)
                .map(|member| async move {
                    let peer = member.peer_addr();
                    if let Err(error) = transport.announce_membership(&peer, notice).await {
                        warn!(
                            error = %error,
                            target_node_id = %member.id,
                            target_addr = %peer,
                            "Failed to announce membership to member."
                        );
                    }
                }),
        )
        .await;
    }
}
