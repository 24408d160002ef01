use super::index::GraphIndex;
use crate::config::LayoutConfig;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Column assignment for every node.
#[derive(Debug, Clone)]
pub(crate) struct Leveling {
    pub levels: Vec<usize>,
    /// Position among the nodes Kahn's pass could not order (cycle members
    /// and everything downstream of them).
    residue_rank: Vec<Option<usize>>,
}

impl Leveling {
    /// A flow whose target was ordered no later than its source inside the
    /// cycle residue. These are the flows that close a cycle.
    pub fn is_back_edge(&self, source: usize, target: usize) -> bool {
        match (self.residue_rank[source], self.residue_rank[target]) {
            (Some(src), Some(tgt)) => src >= tgt,
            _ => false,
        }
    }

    pub fn max_level(&self) -> usize {
        self.levels.iter().copied().max().unwrap_or(0)
    }
}

pub(crate) fn compute_levels(index: &GraphIndex, config: &LayoutConfig) -> Leveling {
    let count = index.nodes.len();
    let mut levels = vec![0usize; count];
    let mut indeg = vec![0usize; count];
    for flow in &index.flows {
        if !flow.is_self_loop() {
            indeg[flow.target] += 1;
        }
    }

    // Ready nodes pop in declaration order.
    let mut ready: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    for (node, &deg) in indeg.iter().enumerate() {
        if deg == 0 {
            ready.push(Reverse(node));
        }
    }

    let mut processed = vec![false; count];
    while let Some(Reverse(node)) = ready.pop() {
        if processed[node] {
            continue;
        }
        processed[node] = true;
        for &flow_idx in &index.outgoing[node] {
            let flow = &index.flows[flow_idx];
            if flow.is_self_loop() {
                continue;
            }
            let next = flow.target;
            levels[next] = levels[next].max(levels[node] + 1);
            indeg[next] = indeg[next].saturating_sub(1);
            if indeg[next] == 0 && !processed[next] {
                ready.push(Reverse(next));
            }
        }
    }

    let residue: Vec<usize> = (0..count).filter(|&node| !processed[node]).collect();
    let mut residue_rank = vec![None; count];
    if !residue.is_empty() {
        tracing::debug!(nodes = residue.len(), "leveling cycle residue");
        let base = levels.iter().copied().max().unwrap_or(0);
        for (rank, &node) in residue.iter().enumerate() {
            residue_rank[node] = Some(rank);
            levels[node] = levels[node].max(base + rank + 1);
        }
        // Push residue right of every predecessor reached by a forward flow.
        for &node in &residue {
            for &flow_idx in &index.incoming[node] {
                let flow = &index.flows[flow_idx];
                if flow.is_self_loop() {
                    continue;
                }
                let source = flow.source;
                let back = match (residue_rank[source], residue_rank[node]) {
                    (Some(src), Some(tgt)) => src >= tgt,
                    _ => false,
                };
                if !back {
                    levels[node] = levels[node].max(levels[source] + 1);
                }
            }
        }
    }

    if config.isolated_after_main {
        let connected_max = (0..count)
            .filter(|&node| !index.is_isolated(node))
            .map(|node| levels[node])
            .max();
        if let Some(main_max) = connected_max {
            for node in 0..count {
                if index.is_isolated(node) {
                    levels[node] = main_max + 1;
                }
            }
        }
    }

    Leveling {
        levels,
        residue_rank,
    }
}

/// For every gateway splitting into two or more flows, the flow that leads
/// to the deepest target; ties go to the first declared flow.
pub(crate) fn main_branches(index: &GraphIndex, leveling: &Leveling) -> Vec<bool> {
    let mut main = vec![false; index.flows.len()];
    for (node, entry) in index.nodes.iter().enumerate() {
        if !entry.kind.is_gateway() || index.out_degree(node) < 2 {
            continue;
        }
        let mut best: Option<(usize, usize)> = None;
        for &flow_idx in &index.outgoing[node] {
            let flow = &index.flows[flow_idx];
            if flow.is_self_loop() {
                continue;
            }
            let level = leveling.levels[flow.target];
            if best.map(|(_, lvl)| level > lvl).unwrap_or(true) {
                best = Some((flow_idx, level));
            }
        }
        if let Some((flow_idx, _)) = best {
            main[flow_idx] = true;
        }
    }
    main
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ProcessGraph;

    fn levels_of(graph: &ProcessGraph) -> Vec<usize> {
        let index = GraphIndex::build(graph);
        compute_levels(&index, &LayoutConfig::default()).levels
    }

    #[test]
    fn chain_levels() {
        let mut graph = ProcessGraph::new();
        graph.add_node("s", "startEvent", None);
        graph.add_node("t", "task", None);
        graph.add_node("e", "endEvent", None);
        graph.add_flow("f1", "s", "t");
        graph.add_flow("f2", "t", "e");
        assert_eq!(levels_of(&graph), vec![0, 1, 2]);
    }

    #[test]
    fn join_takes_longest_path() {
        let mut graph = ProcessGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_node(id, "task", None);
        }
        graph.add_flow("f1", "a", "b");
        graph.add_flow("f2", "b", "c");
        graph.add_flow("f3", "a", "d");
        graph.add_flow("f4", "c", "d");
        assert_eq!(levels_of(&graph), vec![0, 1, 2, 3]);
    }

    #[test]
    fn cycle_residue_stays_right_of_predecessors() {
        let mut graph = ProcessGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(id, "task", None);
        }
        graph.add_flow("f1", "a", "b");
        graph.add_flow("f2", "b", "c");
        graph.add_flow("f3", "c", "b");

        let index = GraphIndex::build(&graph);
        let leveling = compute_levels(&index, &LayoutConfig::default());
        assert_eq!(leveling.levels[0], 0);
        assert!(leveling.levels[1] > leveling.levels[0]);
        assert!(leveling.levels[2] > leveling.levels[1]);
        // c -> b closes the cycle
        assert!(leveling.is_back_edge(2, 1));
        assert!(!leveling.is_back_edge(1, 2));
    }

    #[test]
    fn self_loops_do_not_block_leveling() {
        let mut graph = ProcessGraph::new();
        graph.add_node("a", "task", None);
        graph.add_node("b", "task", None);
        graph.add_flow("f1", "a", "b");
        graph.add_flow("loop", "b", "b");
        assert_eq!(levels_of(&graph), vec![0, 1]);
    }

    #[test]
    fn isolated_nodes_follow_main_flow() {
        let mut graph = ProcessGraph::new();
        graph.add_node("lonely", "task", None);
        graph.add_node("a", "task", None);
        graph.add_node("b", "task", None);
        graph.add_flow("f1", "a", "b");
        assert_eq!(levels_of(&graph), vec![2, 0, 1]);

        let index = GraphIndex::build(&graph);
        let config = LayoutConfig {
            isolated_after_main: false,
            ..LayoutConfig::default()
        };
        assert_eq!(compute_levels(&index, &config).levels, vec![0, 0, 1]);
    }

    #[test]
    fn main_branch_is_deepest_first_declared() {
        let mut graph = ProcessGraph::new();
        graph.add_node("g", "exclusiveGateway", None);
        graph.add_node("short", "endEvent", None);
        graph.add_node("long1", "task", None);
        graph.add_node("long2", "task", None);
        graph.add_flow("f_short", "g", "short");
        graph.add_flow("f_long", "g", "long1");
        graph.add_flow("f_next", "long1", "long2");
        graph.add_flow("f_tie", "g", "long2");

        let index = GraphIndex::build(&graph);
        let leveling = compute_levels(&index, &LayoutConfig::default());
        let main = main_branches(&index, &leveling);
        // long2 sits at level 2 and is reached only by f_tie from g
        assert_eq!(main, vec![false, false, false, true]);
    }
}
