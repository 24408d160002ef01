use crate::layout::{Layout, path_bend_count};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// JSON snapshot of computed geometry, for debugging and regression diffs.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub pools: Vec<PoolDump>,
    pub lanes: Vec<LaneDump>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct PoolDump {
    pub id: String,
    pub name: String,
    pub process_id: String,
    pub lanes: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct LaneDump {
    pub id: String,
    pub name: String,
    pub pool: String,
    pub synthesized: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub kind: String,
    pub lane: String,
    pub level: usize,
    pub row: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub route: String,
    pub message: bool,
    pub bends: usize,
    pub points: Vec<[f32; 2]>,
    pub label: Option<[f32; 4]>,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout) -> Self {
        let pools = layout
            .pools
            .iter()
            .map(|pool| PoolDump {
                id: pool.id.clone(),
                name: pool.name.clone(),
                process_id: pool.process_id.clone(),
                lanes: pool.lanes.clone(),
                x: pool.x,
                y: pool.y,
                width: pool.width,
                height: pool.height,
            })
            .collect();

        let lanes = layout
            .lanes
            .iter()
            .map(|lane| LaneDump {
                id: lane.id.clone(),
                name: lane.name.clone(),
                pool: lane.pool.clone(),
                synthesized: lane.synthesized,
                x: lane.x,
                y: lane.y,
                width: lane.width,
                height: lane.height,
            })
            .collect();

        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.as_str().to_string(),
                lane: node.lane.clone(),
                level: node.level,
                row: node.row,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.from.clone(),
                to: edge.to.clone(),
                route: edge.route.as_str().to_string(),
                message: edge.message,
                bends: path_bend_count(&edge.points),
                points: edge.points.iter().map(|&(x, y)| [x, y]).collect(),
                label: edge
                    .label_bounds
                    .map(|b| [b.x, b.y, b.width, b.height]),
            })
            .collect();

        Self {
            width: layout.width,
            height: layout.height,
            pools,
            lanes,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::ProcessGraph;
    use crate::layout::compute_layout;

    #[test]
    fn dump_serializes_routes() {
        let mut graph = ProcessGraph::new();
        graph.add_node("a", "task", None);
        graph.add_node("b", "task", None);
        graph.add_flow("f", "a", "b");
        let layout = compute_layout(&graph, &LayoutConfig::default());
        let dump = LayoutDump::from_layout(&layout);
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["edges"][0]["route"], "straight");
        assert_eq!(json["nodes"][1]["level"], 1);
        assert_eq!(json["lanes"][0]["synthesized"], true);
    }
}
