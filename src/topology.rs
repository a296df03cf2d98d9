//! Read-only lane topology lookup.
//!
//! The lane→channel→section mapping is owned by an external dictionary
//! cache; the engine only consumes it through [`LaneDirectory`], assumed
//! already warm. `node_url` is set on lanes whose data lives on a remote
//! node in clustered deployments.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub lane_id: String,
    pub channel_id: String,
    pub section_id: String,
    pub node_url: Option<String>,
}

pub trait LaneDirectory: Send + Sync {
    fn lane(&self, lane_id: &str) -> Option<Lane>;

    fn lanes(&self) -> Vec<Lane>;

    fn channel_lanes(&self, channel_id: &str) -> Vec<Lane> {
        let mut lanes: Vec<Lane> = self
            .lanes()
            .into_iter()
            .filter(|lane| lane.channel_id == channel_id)
            .collect();
        lanes.sort_by(|a, b| a.lane_id.cmp(&b.lane_id));
        lanes
    }
}

/// Directory backed by a fixed map, for wiring and tests.
pub struct InMemoryLaneDirectory {
    lanes: HashMap<String, Lane>,
}

impl InMemoryLaneDirectory {
    pub fn new(lanes: impl IntoIterator<Item = Lane>) -> Self {
        Self {
            lanes: lanes
                .into_iter()
                .map(|lane| (lane.lane_id.clone(), lane))
                .collect(),
        }
    }
}

impl LaneDirectory for InMemoryLaneDirectory {
    fn lane(&self, lane_id: &str) -> Option<Lane> {
        self.lanes.get(lane_id).cloned()
    }

    fn lanes(&self) -> Vec<Lane> {
        self.lanes.values().cloned().collect()
    }
}
