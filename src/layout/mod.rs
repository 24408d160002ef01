mod index;
mod lanes;
mod placement;
mod ranking;
mod routing;
pub(crate) mod types;
pub use routing::path_bend_count;
pub use types::*;

use crate::config::LayoutConfig;
use crate::ir::ProcessGraph;
use index::GraphIndex;
use lanes::pack_lanes;
use placement::assign_coordinates;
use ranking::compute_levels;
use routing::route_flows;

/// Lay out a process graph: levels, lane rows, coordinates, then flow routes.
///
/// Every stage reads the results of the previous ones and nothing is
/// revisited, so the same graph and config always give the same layout.
pub fn compute_layout(graph: &ProcessGraph, config: &LayoutConfig) -> Layout {
    let index = GraphIndex::build(graph);
    if index.pools.is_empty() {
        return Layout::default();
    }

    let leveling = compute_levels(&index, config);
    let packing = pack_lanes(&index, &leveling, config);
    let placement = assign_coordinates(&index, &leveling, &packing, config);
    let edges = route_flows(&index, &leveling, &packing, &placement, &config.routing);

    let pool_width = placement.pool_width(config);
    let pools: Vec<PoolLayout> = index
        .pools
        .iter()
        .zip(&packing.pools)
        .map(|(pool, band)| PoolLayout {
            id: pool.id.clone(),
            name: pool.name.clone(),
            process_id: pool.process_id.clone(),
            lanes: pool
                .lanes
                .iter()
                .map(|&lane| index.lanes[lane].id.clone())
                .collect(),
            x: config.pool_x,
            y: band.top,
            width: pool_width,
            height: band.height,
        })
        .collect();

    let lanes: Vec<LaneLayout> = index
        .lanes
        .iter()
        .zip(&packing.lanes)
        .map(|(lane, band)| LaneLayout {
            id: lane.id.clone(),
            name: lane.name.clone(),
            pool: index.pools[lane.pool].id.clone(),
            synthesized: lane.synthesized,
            x: placement.lane_x,
            y: band.top,
            width: placement.lane_width,
            height: band.height,
        })
        .collect();

    let nodes: Vec<NodeLayout> = index
        .nodes
        .iter()
        .enumerate()
        .map(|(node, entry)| {
            let bounds = placement.boxes[node];
            NodeLayout {
                id: entry.node.id.clone(),
                kind: entry.kind,
                lane: index.lanes[entry.lane].id.clone(),
                level: leveling.levels[node],
                row: packing.rows[node],
                x: bounds.x,
                y: bounds.y,
                width: bounds.width,
                height: bounds.height,
            }
        })
        .collect();

    tracing::debug!(
        nodes = nodes.len(),
        flows = edges.len(),
        lanes = lanes.len(),
        columns = leveling.max_level() + 1,
        "layout computed"
    );

    Layout {
        width: config.pool_x * 2.0 + pool_width,
        height: config.pool_y + packing.total_height(),
        pools,
        lanes,
        nodes,
        edges,
    }
}
