use super::index::GraphIndex;
use super::lanes::LanePacking;
use super::ranking::Leveling;
use super::types::Bounds;
use crate::config::LayoutConfig;
use crate::ir::NodeKind;

#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub boxes: Vec<Bounds>,
    /// Left edge of every lane (right of the pool header).
    pub lane_x: f32,
    pub lane_width: f32,
}

impl Placement {
    pub fn pool_width(&self, config: &LayoutConfig) -> f32 {
        config.pool_header_width + self.lane_width
    }
}

pub(crate) fn assign_coordinates(
    index: &GraphIndex,
    leveling: &Leveling,
    packing: &LanePacking,
    config: &LayoutConfig,
) -> Placement {
    let lane_x = config.pool_x + config.pool_header_width;
    let content_x = lane_x + config.lane_content_inset;
    let (task_w, _) = config.sizes.size_of(NodeKind::Task);

    let mut boxes: Vec<Bounds> = index
        .nodes
        .iter()
        .enumerate()
        .map(|(node, entry)| {
            let (w, h) = config.sizes.size_of(entry.kind);
            let lane = &packing.lanes[entry.lane];
            let mut x = content_x + leveling.levels[node] as f32 * config.column_width;
            if entry.kind == NodeKind::StartEvent && config.align_start_events {
                x += (task_w - w).max(0.0);
            }
            if entry.kind.is_gateway() {
                x += config.gateway_extra_padding;
            }
            let center_y = lane.center_y() + packing.rows[node] * lane.row_spacing;
            Bounds::new(x, center_y - h / 2.0, w, h)
        })
        .collect();

    // Joins that are not gateways: center between predecessors, never left of them.
    // Only predecessors in earlier columns count; a flow closing a loop does not.
    let mut order: Vec<usize> = (0..index.nodes.len()).collect();
    order.sort_by_key(|&node| (leveling.levels[node], node));
    for node in order {
        if index.nodes[node].kind.is_gateway() {
            continue;
        }
        let preds: Vec<usize> = index
            .predecessors(node)
            .into_iter()
            .filter(|&p| {
                !leveling.is_back_edge(p, node) && leveling.levels[p] < leveling.levels[node]
            })
            .collect();
        if preds.len() < 2 {
            continue;
        }
        let current = boxes[node];
        let avg_center =
            preds.iter().map(|&p| boxes[p].center_x()).sum::<f32>() / preds.len() as f32;
        let pred_right = preds
            .iter()
            .map(|&p| boxes[p].right())
            .fold(f32::MIN, f32::max);
        let x = (avg_center - current.width / 2.0)
            .max(content_x)
            .max(current.x)
            .max(pred_right + config.row_margin);

        let mut y = current.y;
        let lane = index.nodes[node].lane;
        let same_lane: Vec<usize> = preds
            .iter()
            .copied()
            .filter(|&p| index.nodes[p].lane == lane)
            .collect();
        if !same_lane.is_empty() {
            let band = &packing.lanes[lane];
            let avg_cy = same_lane.iter().map(|&p| boxes[p].center_y()).sum::<f32>()
                / same_lane.len() as f32;
            let half = current.height / 2.0;
            let low = band.top + config.row_margin + half;
            let high = band.bottom() - config.row_margin - half;
            let cy = if low <= high {
                avg_cy.clamp(low, high)
            } else {
                band.center_y()
            };
            let candidate = Bounds::new(x, cy - half, current.width, current.height);
            let blocked = index.nodes.iter().enumerate().any(|(other, entry)| {
                other != node && entry.lane == lane && boxes[other].overlaps(&candidate)
            });
            if !blocked {
                y = candidate.y;
            }
        }
        boxes[node] = Bounds::new(x, y, current.width, current.height);
    }

    let max_right = boxes.iter().map(Bounds::right).fold(lane_x, f32::max);
    let lane_width = config.min_lane_width.max(max_right - lane_x + config.pool_pad_x);

    Placement {
        boxes,
        lane_x,
        lane_width,
    }
}
