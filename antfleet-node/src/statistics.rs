use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Counter = AtomicU64;

#[derive(Debug, Clone, Default)]
/// Live metrics around the fleet node.
pub struct FleetStatistics(Arc<FleetStatisticsInner>);

impl Deref for FleetStatistics {
    type Target = FleetStatisticsInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct FleetStatisticsInner {
    /// The number of members the node is aware of, including itself.
    pub(crate) num_members: Counter,
    /// The number of requests currently tracked as in-flight.
    pub(crate) num_in_flight: Counter,
    /// The total number of requests registered as in-flight.
    pub(crate) num_distributed: Counter,
    /// The total number of requests reported as crawled.
    pub(crate) num_crawled: Counter,
}

impl FleetStatisticsInner {
    /// The number of members the node is aware of, including itself.
    pub fn num_members(&self) -> u64 {
        self.num_members.load(Ordering::Relaxed)
    }

    /// The number of requests currently tracked as in-flight.
    ///
    /// This is only meaningful on the master node.
    pub fn num_in_flight(&self) -> u64 {
        self.num_in_flight.load(Ordering::Relaxed)
    }

    /// The total number of requests registered as in-flight.
    pub fn num_distributed(&self) -> u64 {
        self.num_distributed.load(Ordering::Relaxed)
    }

    /// The total number of requests reported as crawled.
    pub fn num_crawled(&self) -> u64 {
        self.num_crawled.load(Ordering::Relaxed)
    }
}
