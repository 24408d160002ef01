use crate::ir::{
    DEFAULT_POOL_ID, Flow, Node, NodeKind, ProcessGraph, SYSTEM_LANE_ID, SYSTEM_LANE_NAME,
};
use std::collections::{HashMap, HashSet};

/// A node that survived indexing, with its kind normalized.
#[derive(Debug, Clone)]
pub(crate) struct IndexedNode<'a> {
    pub node: &'a Node,
    pub kind: NodeKind,
    /// Index into [`GraphIndex::lanes`].
    pub lane: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct IndexedFlow<'a> {
    pub flow: &'a Flow,
    pub source: usize,
    pub target: usize,
}

impl IndexedFlow<'_> {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LaneInfo {
    pub id: String,
    pub name: String,
    /// Index into [`GraphIndex::pools`].
    pub pool: usize,
    pub synthesized: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct PoolInfo {
    pub id: String,
    pub name: String,
    pub process_id: String,
    /// Lane indices in stacking order.
    pub lanes: Vec<usize>,
}

/// Read-only view of a process graph shared by every layout stage.
///
/// Nodes keep declaration order, so a node's index doubles as its
/// declaration rank. Lanes are stored in final stacking order: grouped by
/// pool, pools ordered by their first lane.
#[derive(Debug)]
pub(crate) struct GraphIndex<'a> {
    pub nodes: Vec<IndexedNode<'a>>,
    pub flows: Vec<IndexedFlow<'a>>,
    pub lanes: Vec<LaneInfo>,
    pub pools: Vec<PoolInfo>,
    /// Flow indices leaving each node, in flow declaration order.
    pub outgoing: Vec<Vec<usize>>,
    pub incoming: Vec<Vec<usize>>,
}

struct LaneSeed {
    id: String,
    name: String,
    pool_id: Option<String>,
    synthesized: bool,
}

impl<'a> GraphIndex<'a> {
    pub fn build(graph: &'a ProcessGraph) -> Self {
        let mut node_lookup: HashMap<&'a str, usize> = HashMap::new();
        let mut kept_nodes: Vec<&'a Node> = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            if node_lookup.contains_key(node.id.as_str()) {
                tracing::warn!(node = %node.id, "duplicate node id, keeping the first");
                continue;
            }
            node_lookup.insert(node.id.as_str(), kept_nodes.len());
            kept_nodes.push(node);
        }

        let seeds = order_lanes(graph, &kept_nodes);
        let (lanes, pools) = group_into_pools(graph, seeds);
        let lane_lookup: HashMap<&str, usize> = lanes
            .iter()
            .enumerate()
            .map(|(idx, lane)| (lane.id.as_str(), idx))
            .collect();

        let mut nodes = Vec::with_capacity(kept_nodes.len());
        for node in kept_nodes {
            let lane_id = node.lane_id.as_deref().unwrap_or(SYSTEM_LANE_ID);
            let lane = lane_lookup.get(lane_id).copied().unwrap_or(0);
            nodes.push(IndexedNode {
                node,
                kind: NodeKind::resolve(&node.kind, node.gateway_type.as_deref()),
                lane,
            });
        }

        let mut flows = Vec::with_capacity(graph.flows.len());
        let mut seen_flows: HashSet<&str> = HashSet::new();
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for flow in &graph.flows {
            if !seen_flows.insert(flow.id.as_str()) {
                tracing::warn!(flow = %flow.id, "duplicate flow id, keeping the first");
                continue;
            }
            let (Some(&source), Some(&target)) = (
                node_lookup.get(flow.source.as_str()),
                node_lookup.get(flow.target.as_str()),
            ) else {
                tracing::warn!(
                    flow = %flow.id,
                    source = %flow.source,
                    target = %flow.target,
                    "dropping flow with an unknown endpoint"
                );
                continue;
            };
            let idx = flows.len();
            outgoing[source].push(idx);
            incoming[target].push(idx);
            flows.push(IndexedFlow {
                flow,
                source,
                target,
            });
        }

        Self {
            nodes,
            flows,
            lanes,
            pools,
            outgoing,
            incoming,
        }
    }

    pub fn pool_of(&self, node: usize) -> usize {
        self.lanes[self.nodes[node].lane].pool
    }

    /// Distinct predecessors of a node, ignoring self-loops, in flow order.
    pub fn predecessors(&self, node: usize) -> Vec<usize> {
        let mut preds = Vec::new();
        for &flow in &self.incoming[node] {
            let source = self.flows[flow].source;
            if source != node && !preds.contains(&source) {
                preds.push(source);
            }
        }
        preds
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.predecessors(node).len()
    }

    /// Number of non-self-loop flows leaving a node.
    pub fn out_degree(&self, node: usize) -> usize {
        self.outgoing[node]
            .iter()
            .filter(|&&flow| !self.flows[flow].is_self_loop())
            .count()
    }

    /// A node is a merge point when it is a gateway joining two or more branches.
    pub fn is_merge_gateway(&self, node: usize) -> bool {
        self.nodes[node].kind.is_gateway() && self.in_degree(node) >= 2
    }

    pub fn is_isolated(&self, node: usize) -> bool {
        self.incoming[node].is_empty() && self.outgoing[node].is_empty()
    }
}

/// Declared lanes first, then lanes only referenced by nodes, then the rest
/// (the synthesized system lane) by case-insensitive name.
fn order_lanes(graph: &ProcessGraph, nodes: &[&Node]) -> Vec<LaneSeed> {
    let mut seeds: Vec<LaneSeed> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for lane in &graph.lanes {
        if !seen.insert(lane.id.clone()) {
            tracing::warn!(lane = %lane.id, "duplicate lane id, keeping the first");
            continue;
        }
        seeds.push(LaneSeed {
            id: lane.id.clone(),
            name: lane.name.clone(),
            pool_id: lane.pool_id.clone(),
            synthesized: false,
        });
    }

    let mut needs_system = false;
    for node in nodes {
        match node.lane_id.as_deref() {
            Some(lane_id) if lane_id != SYSTEM_LANE_ID => {
                if seen.insert(lane_id.to_string()) {
                    tracing::debug!(
                        lane = %lane_id,
                        node = %node.id,
                        "synthesizing undeclared lane"
                    );
                    seeds.push(LaneSeed {
                        id: lane_id.to_string(),
                        name: lane_id.to_string(),
                        pool_id: None,
                        synthesized: true,
                    });
                }
            }
            _ => needs_system = true,
        }
    }

    if needs_system && seen.insert(SYSTEM_LANE_ID.to_string()) {
        seeds.push(LaneSeed {
            id: SYSTEM_LANE_ID.to_string(),
            name: SYSTEM_LANE_NAME.to_string(),
            pool_id: None,
            synthesized: true,
        });
    }
    seeds
}

fn group_into_pools(graph: &ProcessGraph, seeds: Vec<LaneSeed>) -> (Vec<LaneInfo>, Vec<PoolInfo>) {
    // Lanes without a pool join the first declared pool, or a default one.
    let default_pool = graph
        .pools
        .first()
        .map(|pool| pool.id.clone())
        .unwrap_or_else(|| DEFAULT_POOL_ID.to_string());

    let mut pool_order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<LaneSeed>> = HashMap::new();
    for seed in seeds {
        let pool_id = seed.pool_id.clone().unwrap_or_else(|| default_pool.clone());
        if !members.contains_key(&pool_id) {
            pool_order.push(pool_id.clone());
        }
        members.entry(pool_id).or_default().push(seed);
    }

    let mut lanes = Vec::new();
    let mut pools = Vec::new();
    for (pool_idx, pool_id) in pool_order.into_iter().enumerate() {
        let declared = graph.pools.iter().find(|pool| pool.id == pool_id);
        let name = match declared {
            Some(pool) => pool.name.clone(),
            None if pool_id == DEFAULT_POOL_ID => graph.name.clone(),
            None => pool_id.clone(),
        };
        let process_id = declared
            .and_then(|pool| pool.process_id.clone())
            .unwrap_or_else(|| {
                if pool_idx == 0 {
                    graph.process_id.clone()
                } else {
                    format!("Process_{pool_id}")
                }
            });

        let mut lane_indices = Vec::new();
        for seed in members.remove(&pool_id).unwrap_or_default() {
            lane_indices.push(lanes.len());
            lanes.push(LaneInfo {
                id: seed.id,
                name: seed.name,
                pool: pool_idx,
                synthesized: seed.synthesized,
            });
        }
        pools.push(PoolInfo {
            id: pool_id,
            name,
            process_id,
            lanes: lane_indices,
        });
    }
    (lanes, pools)
}
