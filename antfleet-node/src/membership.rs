use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::identity::{NodeId, NodeIdentity};
use crate::statistics::FleetStatistics;

/// The lifecycle status of the local view of the cluster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    /// The node has not started bootstrapping yet.
    Uninitialized,
    /// The node is bootstrapping or a membership change is being applied.
    ///
    /// The local crawl loop is paused while in this state.
    Joining,
    /// The node knows its master and is processing crawl work.
    Ready,
}

struct MembershipState {
    /// Known members in the order they were discovered.
    members: Vec<NodeIdentity>,
    /// The id of the current master, always the id of an entry in `members`.
    master: Option<NodeId>,
    status: ClusterStatus,
}

impl MembershipState {
    fn contains(&self, node_id: &str) -> bool {
        self.members.iter().any(|member| member.id == node_id)
    }

    fn get(&self, node_id: &str) -> Option<&NodeIdentity> {
        self.members.iter().find(|member| member.id == node_id)
    }
}

#[derive(Clone)]
/// The node's view of the cluster: known members, master and status.
///
/// Every operation is a single transaction on the shared state so the
/// view can be mutated from the bootstrap path and from inbound RPC
/// handlers concurrently.
///
/// Members are never removed, there is no failure detection yet.
pub struct ClusterMembership {
    me: NodeIdentity,
    state: Arc<Mutex<MembershipState>>,
    changes: Arc<watch::Sender<Vec<NodeIdentity>>>,
    statistics: FleetStatistics,
}

impl ClusterMembership {
    /// Creates a new membership view containing only the local node.
    pub fn new(me: NodeIdentity, statistics: FleetStatistics) -> Self {
        let members = vec![me.clone()];
        let (changes, _) = watch::channel(members.clone());
        statistics.num_members.store(1, Ordering::Relaxed);

        Self {
            me,
            state: Arc::new(Mutex::new(MembershipState {
                members,
                master: None,
                status: ClusterStatus::Uninitialized,
            })),
            changes: Arc::new(changes),
            statistics,
        }
    }

    #[inline]
    /// The identity of the local node.
    pub fn me(&self) -> &NodeIdentity {
        &self.me
    }

    /// Adds a node to the known members.
    ///
    /// Returns `false` if a member with the same id is already known.
    pub fn add_member(&self, info: NodeIdentity) -> bool {
        let mut state = self.state.lock();
        if state.contains(&info.id) {
            return false;
        }

        info!(
            self_node_id = %self.me.id,
            target_node_id = %info.id,
            target_addr = %info.peer_addr(),
            "Node has joined the cluster."
        );

        state.members.push(info);
        self.statistics
            .num_members
            .store(state.members.len() as u64, Ordering::Relaxed);
        self.changes.send_replace(state.members.clone());
        true
    }

    /// Makes the member with the given id the master.
    ///
    /// Unknown ids are ignored and leave the current master in place.
    pub fn set_master_by_name(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        if !state.contains(name) {
            debug!(
                self_node_id = %self.me.id,
                master_node_id = %name,
                "Ignoring unknown master node."
            );
            return false;
        }

        if state.master.as_deref() != Some(name) {
            info!(
                self_node_id = %self.me.id,
                master_node_id = %name,
                "Cluster master has changed."
            );
        }

        state.master = Some(name.to_string());
        true
    }

    /// Makes the local node the master and marks the cluster as ready.
    pub fn promote_self_to_master(&self) {
        let mut state = self.state.lock();
        if !state.contains(&self.me.id) {
            state.members.push(self.me.clone());
        }

        info!(self_node_id = %self.me.id, "Node has elected itself as master.");
        state.master = Some(self.me.id.clone());
        state.status = ClusterStatus::Ready;
    }

    /// Returns if the node with the given id is the current master.
    pub fn is_master(&self, node_id: &str) -> bool {
        self.state.lock().master.as_deref() == Some(node_id)
    }

    /// The id of the current master, if any.
    pub fn master_id(&self) -> Option<NodeId> {
        self.state.lock().master.clone()
    }

    /// The identity of the current master, if any.
    pub fn master_node(&self) -> Option<NodeIdentity> {
        let state = self.state.lock();
        let master = state.master.as_deref()?;
        state.get(master).cloned()
    }

    /// All known members in discovery order.
    pub fn all_members(&self) -> Vec<NodeIdentity> {
        self.state.lock().members.clone()
    }

    /// Looks up a known member by id.
    pub fn member(&self, node_id: &str) -> Option<NodeIdentity> {
        self.state.lock().get(node_id).cloned()
    }

    #[inline]
    pub fn status(&self) -> ClusterStatus {
        self.state.lock().status
    }

    /// Marks the membership as being reconfigured.
    pub fn join(&self) {
        self.state.lock().status = ClusterStatus::Joining;
    }

    /// Marks the reconfiguration as settled.
    ///
    /// The cluster can only become ready once a master is known, returns
    /// `false` and stays in the joining state otherwise.
    pub fn ready(&self) -> bool {
        let mut state = self.state.lock();
        if state.master.is_none() {
            warn!(
                self_node_id = %self.me.id,
                "Cannot mark cluster as ready without a master node."
            );
            return false;
        }

        state.status = ClusterStatus::Ready;
        true
    }

    /// A stream of the member list, yielding every time a member is added.
    pub fn member_change_watcher(&self) -> WatchStream<Vec<NodeIdentity>> {
        WatchStream::new(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership() -> ClusterMembership {
        ClusterMembership::new(
            NodeIdentity::new("127.0.0.1", 8000),
            FleetStatistics::default(),
        )
    }

    #[test]
    fn test_initial_state() {
        let membership = membership();
        assert_eq!(membership.status(), ClusterStatus::Uninitialized);
        assert_eq!(membership.all_members(), vec![membership.me().clone()]);
        assert_eq!(membership.master_id(), None);
        assert_eq!(membership.master_node(), None);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let statistics = FleetStatistics::default();
        let membership = ClusterMembership::new(
            NodeIdentity::new("127.0.0.1", 8000),
            statistics.clone(),
        );
        let other = NodeIdentity::new("127.0.0.1", 8001);

        assert!(membership.add_member(other.clone()));
        assert!(!membership.add_member(other.clone()));
        assert!(!membership.add_member(membership.me().clone()));

        assert_eq!(
            membership.all_members(),
            vec![membership.me().clone(), other],
            "Members should keep their discovery order."
        );
        assert_eq!(statistics.num_members(), 2);
    }

    #[test]
    fn test_set_master_by_name() {
        let membership = membership();
        let other = NodeIdentity::new("127.0.0.1", 8001);

        assert!(!membership.set_master_by_name(&other.id));
        assert_eq!(membership.master_id(), None, "Unknown master should be ignored.");

        membership.add_member(other.clone());
        assert!(membership.set_master_by_name(&other.id));
        assert_eq!(membership.master_node(), Some(other.clone()));
        assert!(membership.is_master(&other.id));
        assert!(!membership.is_master(&membership.me().id));

        assert!(!membership.set_master_by_name("unknown-node"));
        assert_eq!(
            membership.master_id(),
            Some(other.id),
            "Master should be left unchanged."
        );
    }

    #[test]
    fn test_promote_self_to_master() {
        let membership = membership();
        membership.join();
        membership.promote_self_to_master();

        assert_eq!(membership.status(), ClusterStatus::Ready);
        assert!(membership.is_master(&membership.me().id));
        assert_eq!(membership.master_node(), Some(membership.me().clone()));
    }

    #[test]
    fn test_ready_requires_master() {
        let membership = membership();
        membership.join();
        assert!(!membership.ready());
        assert_eq!(membership.status(), ClusterStatus::Joining);

        let other = NodeIdentity::new("127.0.0.1", 8001);
        membership.add_member(other.clone());
        membership.set_master_by_name(&other.id);
        assert!(membership.ready());
        assert_eq!(membership.status(), ClusterStatus::Ready);

        membership.join();
        assert_eq!(membership.status(), ClusterStatus::Joining);
    }

    #[tokio::test]
    async fn test_member_change_watcher() {
        use tokio_stream::StreamExt;

        let membership = membership();
        let mut changes = membership.member_change_watcher();
        let initial = changes.next().await.expect("Initial members");
        assert_eq!(initial.len(), 1);

        membership.add_member(NodeIdentity::new("127.0.0.1", 8001));
        let members = changes.next().await.expect("Updated members");
        assert_eq!(members.len(), 2);
    }
}
