use super::index::GraphIndex;
use super::ranking::Leveling;
use crate::config::LayoutConfig;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) struct LaneBand {
    pub top: f32,
    pub height: f32,
    pub row_spacing: f32,
    pub rows: usize,
}

impl LaneBand {
    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PoolBand {
    pub top: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct LanePacking {
    /// Signed row offset per node.
    pub rows: Vec<f32>,
    pub lanes: Vec<LaneBand>,
    pub pools: Vec<PoolBand>,
}

impl LanePacking {
    pub fn total_height(&self) -> f32 {
        self.pools.iter().map(|pool| pool.height).sum()
    }
}

pub(crate) fn pack_lanes(
    index: &GraphIndex,
    leveling: &Leveling,
    config: &LayoutConfig,
) -> LanePacking {
    let mut rows = vec![0.0f32; index.nodes.len()];

    let mut columns: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for (node, entry) in index.nodes.iter().enumerate() {
        columns
            .entry((entry.lane, leveling.levels[node]))
            .or_default()
            .push(node);
    }

    let mut lane_rows = vec![1usize; index.lanes.len()];
    for (&(lane, _level), members) in &columns {
        let offsets = column_offsets(index, members);
        let mut max_abs = 0.0f32;
        for (&node, &offset) in members.iter().zip(&offsets) {
            rows[node] = offset;
            max_abs = max_abs.max(offset.abs());
        }
        let span = (2.0 * max_abs).round() as usize + 1;
        lane_rows[lane] = lane_rows[lane].max(span);
    }

    let mut tallest = vec![None::<f32>; index.lanes.len()];
    for entry in &index.nodes {
        let (_, h) = config.sizes.size_of(entry.kind);
        let slot = &mut tallest[entry.lane];
        *slot = Some(slot.map_or(h, |cur| cur.max(h)));
    }

    let mut lanes: Vec<LaneBand> = Vec::with_capacity(index.lanes.len());
    let mut pools = Vec::with_capacity(index.pools.len());
    let mut cursor = config.pool_y;
    for pool in &index.pools {
        let pool_top = cursor;
        for &lane in &pool.lanes {
            let tallest = tallest[lane].unwrap_or(config.empty_lane_node_height);
            let row_spacing = config.row_grid.max(tallest + config.row_margin);
            let row_count = lane_rows[lane];
            let needed =
                config.row_margin * 2.0 + tallest + (row_count as f32 - 1.0) * row_spacing;
            let height = config.min_lane_height.max(needed);
            lanes.push(LaneBand {
                top: cursor,
                height,
                row_spacing,
                rows: row_count,
            });
            cursor += height;
        }
        pools.push(PoolBand {
            top: pool_top,
            height: cursor - pool_top,
        });
    }

    LanePacking { rows, lanes, pools }
}

/// Row offsets for the nodes sharing one lane and level, in declaration order.
///
/// A merge gateway owns the center row and the rest alternate around it;
/// otherwise the column is balanced around the lane center.
fn column_offsets(index: &GraphIndex, members: &[usize]) -> Vec<f32> {
    let count = members.len();
    if count <= 1 {
        return vec![0.0; count];
    }

    if let Some(merge_pos) = members.iter().position(|&node| index.is_merge_gateway(node)) {
        let mut offsets = vec![0.0; count];
        let mut step = 0usize;
        for (pos, offset) in offsets.iter_mut().enumerate() {
            if pos == merge_pos {
                continue;
            }
            let magnitude = (step / 2 + 1) as f32;
            *offset = if step % 2 == 0 { -magnitude } else { magnitude };
            step += 1;
        }
        return offsets;
    }

    let mid = (count as f32 - 1.0) / 2.0;
    (0..count).map(|pos| pos as f32 - mid).collect()
}
