use std::collections::{HashMap, HashSet};
use std::path::Path;

use bpmn_autolayout::layout::{Bounds, Layout, RouteKind};
use bpmn_autolayout::{
    ExportConfig, LayoutConfig, ProcessGraph, compute_layout, parse_bpmn_xml, parse_graph_file,
    render_bpmn,
};

const EPS: f32 = 0.5;

// Keep this list explicit so new fixtures must be added intentionally.
const FIXTURES: [&str; 8] = [
    "linear.json",
    "exclusive_join.json",
    "two_lanes.json",
    "self_loop.json",
    "invoice.json",
    "cycle.json",
    "multi_pool.json",
    "messy.json5",
];

fn load(rel: &str) -> ProcessGraph {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    assert!(path.exists(), "fixture missing: {rel}");
    parse_graph_file(&path).unwrap_or_else(|err| panic!("{rel}: parse failed: {err}"))
}

fn layout_fixture(rel: &str) -> (ProcessGraph, Layout) {
    let graph = load(rel);
    let layout = compute_layout(&graph, &LayoutConfig::default());
    (graph, layout)
}

fn node_bounds(layout: &Layout, id: &str) -> Bounds {
    layout
        .node(id)
        .unwrap_or_else(|| panic!("node {id} missing"))
        .bounds()
}

fn touches(b: &Bounds, (x, y): (f32, f32)) -> bool {
    x >= b.x - EPS && x <= b.right() + EPS && y >= b.y - EPS && y <= b.bottom() + EPS
}

/// Flows whose target can reach their source lie on a cycle.
fn on_cycle(graph: &ProcessGraph, source: &str, target: &str) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for flow in &graph.flows {
        adjacency
            .entry(flow.source.as_str())
            .or_default()
            .push(flow.target.as_str());
    }
    let mut seen = HashSet::new();
    let mut stack = vec![target];
    while let Some(current) = stack.pop() {
        if current == source {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

#[test]
fn every_fixture_lays_out_and_exports() {
    let export = ExportConfig::default();
    for rel in FIXTURES {
        let (graph, layout) = layout_fixture(rel);
        let xml = render_bpmn(&graph, &layout, &export);
        let doc = roxmltree::Document::parse(&xml)
            .unwrap_or_else(|err| panic!("{rel}: invalid XML: {err}"));
        assert_eq!(doc.root_element().tag_name().name(), "definitions", "{rel}");
        assert!(!layout.nodes.is_empty(), "{rel}: no nodes placed");
    }
}

#[test]
fn output_is_byte_identical_across_runs() {
    let export = ExportConfig::default();
    for rel in FIXTURES {
        let (graph, first) = layout_fixture(rel);
        let second = compute_layout(&graph, &LayoutConfig::default());
        assert_eq!(
            render_bpmn(&graph, &first, &export),
            render_bpmn(&graph, &second, &export),
            "{rel}: output differs between runs"
        );
    }
}

#[test]
fn acyclic_flows_move_rightward_in_levels() {
    for rel in FIXTURES {
        let (graph, layout) = layout_fixture(rel);
        for flow in &graph.flows {
            let (Some(src), Some(tgt)) = (layout.node(&flow.source), layout.node(&flow.target))
            else {
                continue;
            };
            if flow.source == flow.target || on_cycle(&graph, &flow.source, &flow.target) {
                continue;
            }
            assert!(
                tgt.level > src.level,
                "{rel}: flow {} goes from level {} to {}",
                flow.id,
                src.level,
                tgt.level
            );
        }
    }
}

#[test]
fn nodes_do_not_overlap_and_stay_in_their_lane() {
    for rel in FIXTURES {
        let (_, layout) = layout_fixture(rel);
        for (i, a) in layout.nodes.iter().enumerate() {
            for b in &layout.nodes[i + 1..] {
                assert!(
                    !a.bounds().overlaps(&b.bounds()),
                    "{rel}: {} overlaps {}",
                    a.id,
                    b.id
                );
            }
            let lane = layout
                .lane(&a.lane)
                .unwrap_or_else(|| panic!("{rel}: lane {} missing", a.lane));
            assert!(a.y >= lane.y - EPS, "{rel}: {} above its lane", a.id);
            assert!(
                a.y + a.height <= lane.y + lane.height + EPS,
                "{rel}: {} below its lane",
                a.id
            );
            assert!(
                a.x + a.width <= lane.x + lane.width + EPS,
                "{rel}: {} sticks out of its lane",
                a.id
            );
        }
    }
}

#[test]
fn lanes_tile_their_pool() {
    for rel in FIXTURES {
        let (_, layout) = layout_fixture(rel);
        for pool in &layout.pools {
            let mut y = pool.y;
            for lane_id in &pool.lanes {
                let lane = layout.lane(lane_id).expect("pool lane missing");
                assert!((lane.y - y).abs() <= EPS, "{rel}: gap above lane {lane_id}");
                assert!(lane.height > 0.0, "{rel}: lane {lane_id} has no height");
                assert!((lane.width - layout.lanes[0].width).abs() <= EPS);
                y += lane.height;
            }
            assert!(
                (pool.y + pool.height - y).abs() <= EPS,
                "{rel}: lanes of {} do not fill it",
                pool.id
            );
        }
        for pair in layout.pools.windows(2) {
            assert!(pair[1].y >= pair[0].y + pair[0].height - EPS, "{rel}: pools overlap");
        }
    }
}

#[test]
fn edges_are_orthogonal_and_anchored_on_their_nodes() {
    for rel in FIXTURES {
        let (_, layout) = layout_fixture(rel);
        for edge in &layout.edges {
            assert!(edge.points.len() >= 2, "{rel}: {} has no path", edge.id);
            for pair in edge.points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(
                    (a.0 - b.0).abs() <= EPS || (a.1 - b.1).abs() <= EPS,
                    "{rel}: {} has a diagonal segment",
                    edge.id
                );
            }
            let first = edge.points[0];
            let last = edge.points[edge.points.len() - 1];
            let source = node_bounds(&layout, &edge.from);
            let target = node_bounds(&layout, &edge.to);
            assert!(touches(&source, first), "{rel}: {} starts off its source", edge.id);
            assert!(touches(&target, last), "{rel}: {} ends off its target", edge.id);
        }
    }
}

#[test]
fn every_element_has_exactly_one_diagram_element() {
    let export = ExportConfig::default();
    for rel in FIXTURES {
        let (graph, layout) = layout_fixture(rel);
        let xml = render_bpmn(&graph, &layout, &export);
        let doc = roxmltree::Document::parse(&xml).expect("valid XML");
        let mut refs: HashMap<String, usize> = HashMap::new();
        for node in doc.descendants() {
            let tag = node.tag_name().name();
            if (tag == "BPMNShape" || tag == "BPMNEdge")
                && let Some(element) = node.attribute("bpmnElement")
            {
                *refs.entry(element.to_string()).or_default() += 1;
            }
        }
        let ids = layout
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(layout.edges.iter().map(|e| e.id.as_str()))
            .chain(layout.lanes.iter().map(|l| l.id.as_str()))
            .chain(layout.pools.iter().map(|p| p.id.as_str()));
        for id in ids {
            assert_eq!(refs.get(id).copied(), Some(1), "{rel}: {id}");
        }
    }
}

#[test]
fn straight_chain_uses_two_point_edges() {
    let (_, layout) = layout_fixture("linear.json");
    let start = node_bounds(&layout, "start");
    let task = node_bounds(&layout, "task");
    let end = node_bounds(&layout, "end");
    assert!(start.x < task.x && task.x < end.x);
    let levels: Vec<usize> = layout.nodes.iter().map(|n| n.level).collect();
    assert_eq!(levels, [0, 1, 2]);
    assert!((start.center_y() - task.center_y()).abs() <= EPS);
    for edge in &layout.edges {
        assert_eq!(edge.points.len(), 2, "{}", edge.id);
        assert_eq!(edge.route, RouteKind::Straight);
    }
}

#[test]
fn join_task_sits_right_of_both_branches() {
    let (_, layout) = layout_fixture("exclusive_join.json");
    let archive = node_bounds(&layout, "archive");
    let yes = node_bounds(&layout, "yes");
    let no = node_bounds(&layout, "no");
    assert!(archive.x >= yes.right() - EPS);
    assert!(archive.x >= no.right() - EPS);
    assert!((yes.center_y() - no.center_y()).abs() > EPS, "branches share a row");
    let labeled = layout.edge("f_yes").expect("f_yes routed");
    assert!(labeled.label_bounds.is_some());
}

#[test]
fn hand_off_between_lanes_crosses_once_at_midline() {
    let (_, layout) = layout_fixture("two_lanes.json");
    let upper = layout.lane("L_Req").expect("requester lane");
    let lower = layout.lane("L_App").expect("approver lane");
    let (top_c, bottom_c) = (
        upper.y + upper.height / 2.0,
        lower.y + lower.height / 2.0,
    );
    let edge = layout.edge("handoff").expect("hand-off routed");
    let between = edge
        .points
        .windows(2)
        .filter(|pair| {
            let (a, b) = (pair[0], pair[1]);
            (a.1 - b.1).abs() <= EPS && a.1 > top_c && a.1 < bottom_c
        })
        .count();
    assert_eq!(between, 1, "points: {:?}", edge.points);
    assert_eq!(edge.points[0], node_bounds(&layout, "ask").bottom_mid());
}

#[test]
fn self_loop_leaves_right_and_returns_on_top_or_bottom() {
    let (_, layout) = layout_fixture("self_loop.json");
    let poll = node_bounds(&layout, "poll");
    let edge = layout.edge("again").expect("loop routed");
    assert_eq!(edge.route, RouteKind::SelfLoop);
    assert_eq!(edge.points.len(), 5);
    assert_eq!(edge.points[0], poll.right_mid());
    let last = edge.points[4];
    assert!(last == poll.top_mid() || last == poll.bottom_mid());
    for &(x, y) in &edge.points[1..4] {
        let inside = x > poll.x + EPS
            && x < poll.right() - EPS
            && y > poll.y + EPS
            && y < poll.bottom() - EPS;
        assert!(!inside, "loop point ({x}, {y}) inside the node");
    }
}

#[test]
fn loop_back_keeps_forward_columns() {
    let (graph, layout) = layout_fixture("invoice.json");
    let review = layout.node("review").expect("review");
    let fix = layout.node("fix").expect("fix");
    assert!(fix.level > review.level);
    assert!(on_cycle(&graph, "fix", "review"));
    let back = layout.edge("f7").expect("loop back routed");
    assert!(back.points.len() >= 2);
    let wait = layout.node("wait").expect("timer event");
    assert_eq!(wait.kind.as_str(), "intermediate_catch_event");
}

#[test]
fn message_flows_connect_pools() {
    let (_, layout) = layout_fixture("multi_pool.json");
    assert_eq!(layout.pools.len(), 2);
    let messages: Vec<_> = layout
        .edges
        .iter()
        .filter(|e| e.message)
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(messages, ["m1", "m2"]);
    assert!(!layout.edge("s1").expect("s1").message);
}

#[test]
fn loose_input_is_repaired() {
    let (graph, layout) = layout_fixture("messy.json5");
    assert_eq!(graph.flows.len(), 8);
    assert_eq!(layout.edges.len(), 7, "dangling flow kept");
    assert_eq!(layout.node("note").expect("unknown kind kept").kind.as_str(), "task");
    let robots = layout.lane("Robots").expect("lane synthesized from laneId");
    assert!(robots.synthesized);
    assert_eq!(layout.node("begin").expect("begin").lane, "Lane_System");
}

#[test]
fn exported_document_imports_to_the_same_layout() {
    let export = ExportConfig::default();
    let (graph, layout) = layout_fixture("invoice.json");
    let xml = render_bpmn(&graph, &layout, &export);
    let imported = parse_bpmn_xml(&xml).expect("re-import");
    let again = compute_layout(&imported, &LayoutConfig::default());
    assert_eq!(again.nodes.len(), layout.nodes.len());
    for node in &layout.nodes {
        let other = again.node(&node.id).expect("node survives import");
        assert_eq!(other.level, node.level, "{}", node.id);
        assert_eq!(other.lane, node.lane, "{}", node.id);
    }
}
