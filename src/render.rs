use crate::config::ExportConfig;
use crate::ir::{EventDefinition, Node, NodeKind, ProcessGraph};
use crate::layout::{Bounds, EdgeLayout, Layout, NodeLayout, PoolLayout};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
const DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
const DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub const COLLABORATION_ID: &str = "Collab_1";
pub const DIAGRAM_ID: &str = "BPMNDiagram_1";
pub const PLANE_ID: &str = "BPMNPlane_1";

static XML_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap());

/// Serialize a laid-out graph as a BPMN 2.0 document with diagram interchange.
///
/// Semantic elements keep the input ids; shapes are `DI_<id>` and edges
/// `Edge_<id>`.
pub fn render_bpmn(graph: &ProcessGraph, layout: &Layout, export: &ExportConfig) -> String {
    warn_invalid_ids(layout);

    let mut nodes_by_id: HashMap<&str, &Node> = HashMap::new();
    for node in &graph.nodes {
        nodes_by_id.entry(node.id.as_str()).or_insert(node);
    }
    let lane_pool: HashMap<&str, &str> = layout
        .lanes
        .iter()
        .map(|lane| (lane.id.as_str(), lane.pool.as_str()))
        .collect();
    let node_pool: HashMap<&str, &str> = layout
        .nodes
        .iter()
        .filter_map(|node| {
            lane_pool
                .get(node.lane.as_str())
                .map(|pool| (node.id.as_str(), *pool))
        })
        .collect();

    let mut w = XmlWriter::new(export.indent);
    w.line(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    w.open(
        "bpmn:definitions",
        &[
            ("xmlns:bpmn", BPMN_NS),
            ("xmlns:bpmndi", BPMNDI_NS),
            ("xmlns:dc", DC_NS),
            ("xmlns:di", DI_NS),
            ("xmlns:xsi", XSI_NS),
            ("id", graph.definitions_id.as_str()),
            ("targetNamespace", export.target_namespace.as_str()),
            ("exporter", export.exporter.as_str()),
            ("exporterVersion", export.exporter_version.as_str()),
        ],
    );

    let plane_element = if layout.pools.is_empty() {
        w.empty(
            "bpmn:process",
            &[
                ("id", graph.process_id.as_str()),
                ("name", graph.name.as_str()),
                ("isExecutable", "false"),
            ],
        );
        graph.process_id.as_str()
    } else {
        write_collaboration(&mut w, layout);
        for pool in &layout.pools {
            let flows: Vec<&EdgeLayout> = layout
                .edges
                .iter()
                .filter(|edge| {
                    !edge.message && node_pool.get(edge.from.as_str()) == Some(&pool.id.as_str())
                })
                .collect();
            write_process(&mut w, pool, layout, &flows, &nodes_by_id);
        }
        COLLABORATION_ID
    };

    w.open("bpmndi:BPMNDiagram", &[("id", DIAGRAM_ID), ("name", graph.name.as_str())]);
    if layout.is_empty() {
        w.empty(
            "bpmndi:BPMNPlane",
            &[("id", PLANE_ID), ("bpmnElement", plane_element)],
        );
    } else {
        w.open(
            "bpmndi:BPMNPlane",
            &[("id", PLANE_ID), ("bpmnElement", plane_element)],
        );
        write_diagram(&mut w, layout);
        w.close("bpmndi:BPMNPlane");
    }
    w.close("bpmndi:BPMNDiagram");
    w.close("bpmn:definitions");
    w.finish()
}

pub fn write_output(document: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, document)?;
        }
        None => {
            print!("{}", document);
        }
    }
    Ok(())
}

fn write_collaboration(w: &mut XmlWriter, layout: &Layout) {
    w.open("bpmn:collaboration", &[("id", COLLABORATION_ID)]);
    for pool in &layout.pools {
        w.empty(
            "bpmn:participant",
            &[
                ("id", pool.id.as_str()),
                ("name", pool.name.as_str()),
                ("processRef", pool.process_id.as_str()),
            ],
        );
    }
    for edge in layout.edges.iter().filter(|edge| edge.message) {
        let mut attrs = vec![
            ("id", edge.id.as_str()),
            ("sourceRef", edge.from.as_str()),
            ("targetRef", edge.to.as_str()),
        ];
        if let Some(label) = &edge.label {
            attrs.push(("name", label.as_str()));
        }
        w.empty("bpmn:messageFlow", &attrs);
    }
    w.close("bpmn:collaboration");
}

fn write_process(
    w: &mut XmlWriter,
    pool: &PoolLayout,
    layout: &Layout,
    flows: &[&EdgeLayout],
    nodes_by_id: &HashMap<&str, &Node>,
) {
    w.open(
        "bpmn:process",
        &[
            ("id", pool.process_id.as_str()),
            ("name", pool.name.as_str()),
            ("isExecutable", "false"),
        ],
    );

    let lane_set_id = format!("LaneSet_{}", pool.process_id);
    w.open("bpmn:laneSet", &[("id", lane_set_id.as_str())]);
    for lane_id in &pool.lanes {
        let Some(lane) = layout.lane(lane_id) else {
            continue;
        };
        let members: Vec<&NodeLayout> =
            layout.nodes.iter().filter(|n| &n.lane == lane_id).collect();
        let attrs = [("id", lane.id.as_str()), ("name", lane.name.as_str())];
        if members.is_empty() {
            w.empty("bpmn:lane", &attrs);
            continue;
        }
        w.open("bpmn:lane", &attrs);
        for node in members {
            w.text("bpmn:flowNodeRef", &[], &node.id);
        }
        w.close("bpmn:lane");
    }
    w.close("bpmn:laneSet");

    for node in layout.nodes.iter().filter(|n| pool.lanes.contains(&n.lane)) {
        let incoming: Vec<&str> = flows
            .iter()
            .filter(|f| f.to == node.id)
            .map(|f| f.id.as_str())
            .collect();
        let outgoing: Vec<&str> = flows
            .iter()
            .filter(|f| f.from == node.id)
            .map(|f| f.id.as_str())
            .collect();
        write_flow_node(
            w,
            node,
            nodes_by_id.get(node.id.as_str()).copied(),
            &incoming,
            &outgoing,
        );
    }

    for flow in flows {
        let mut attrs = vec![
            ("id", flow.id.as_str()),
            ("sourceRef", flow.from.as_str()),
            ("targetRef", flow.to.as_str()),
        ];
        if let Some(label) = &flow.label {
            attrs.push(("name", label.as_str()));
        }
        match &flow.condition {
            Some(condition) => {
                w.open("bpmn:sequenceFlow", &attrs);
                w.text(
                    "bpmn:conditionExpression",
                    &[("xsi:type", "bpmn:tFormalExpression")],
                    condition,
                );
                w.close("bpmn:sequenceFlow");
            }
            None => w.empty("bpmn:sequenceFlow", &attrs),
        }
    }

    w.close("bpmn:process");
}

fn write_flow_node(
    w: &mut XmlWriter,
    layout: &NodeLayout,
    node: Option<&Node>,
    incoming: &[&str],
    outgoing: &[&str],
) {
    let tag = format!("bpmn:{}", layout.kind.bpmn_tag());
    let mut attrs = vec![("id", layout.id.as_str())];
    if let Some(node) = node.filter(|n| !n.name.is_empty()) {
        attrs.push(("name", node.name.as_str()));
    }
    let definition = node
        .and_then(|n| n.event_definition.as_ref())
        .filter(|_| layout.kind.is_event());

    if incoming.is_empty() && outgoing.is_empty() && definition.is_none() {
        w.empty(&tag, &attrs);
        return;
    }

    w.open(&tag, &attrs);
    for flow in incoming {
        w.text("bpmn:incoming", &[], flow);
    }
    for flow in outgoing {
        w.text("bpmn:outgoing", &[], flow);
    }
    match definition {
        Some(EventDefinition::Timer { duration }) => {
            let id = format!("TimerEventDefinition_{}", layout.id);
            match duration {
                Some(duration) => {
                    w.open("bpmn:timerEventDefinition", &[("id", id.as_str())]);
                    w.text(
                        "bpmn:timeDuration",
                        &[("xsi:type", "bpmn:tFormalExpression")],
                        duration,
                    );
                    w.close("bpmn:timerEventDefinition");
                }
                None => w.empty("bpmn:timerEventDefinition", &[("id", id.as_str())]),
            }
        }
        Some(EventDefinition::Message) => {
            let id = format!("MessageEventDefinition_{}", layout.id);
            w.empty("bpmn:messageEventDefinition", &[("id", id.as_str())]);
        }
        Some(EventDefinition::Error) => {
            let id = format!("ErrorEventDefinition_{}", layout.id);
            w.empty("bpmn:errorEventDefinition", &[("id", id.as_str())]);
        }
        None => {}
    }
    w.close(&tag);
}

fn write_diagram(w: &mut XmlWriter, layout: &Layout) {
    for pool in &layout.pools {
        write_shape(w, &pool.id, &pool.bounds(), &[("isHorizontal", "true")]);
    }
    for lane in &layout.lanes {
        write_shape(w, &lane.id, &lane.bounds(), &[("isHorizontal", "true")]);
    }
    for node in &layout.nodes {
        let extra: &[(&str, &str)] = match node.kind {
            NodeKind::ExclusiveGateway => &[("isMarkerVisible", "true")],
            NodeKind::SubProcess => &[("isExpanded", "true")],
            _ => &[],
        };
        write_shape(w, &node.id, &node.bounds(), extra);
    }
    for edge in &layout.edges {
        let id = format!("Edge_{}", edge.id);
        w.open(
            "bpmndi:BPMNEdge",
            &[("id", id.as_str()), ("bpmnElement", edge.id.as_str())],
        );
        for &(x, y) in &edge.points {
            let (x, y) = (fmt_num(x), fmt_num(y));
            w.empty("di:waypoint", &[("x", x.as_str()), ("y", y.as_str())]);
        }
        if let Some(bounds) = &edge.label_bounds {
            w.open("bpmndi:BPMNLabel", &[]);
            write_bounds(w, bounds);
            w.close("bpmndi:BPMNLabel");
        }
        w.close("bpmndi:BPMNEdge");
    }
}

fn write_shape(w: &mut XmlWriter, element: &str, bounds: &Bounds, extra: &[(&str, &str)]) {
    let id = format!("DI_{element}");
    let mut attrs = vec![("id", id.as_str()), ("bpmnElement", element)];
    attrs.extend_from_slice(extra);
    w.open("bpmndi:BPMNShape", &attrs);
    write_bounds(w, bounds);
    w.close("bpmndi:BPMNShape");
}

fn write_bounds(w: &mut XmlWriter, bounds: &Bounds) {
    let (x, y) = (fmt_num(bounds.x), fmt_num(bounds.y));
    let (width, height) = (fmt_num(bounds.width), fmt_num(bounds.height));
    w.empty(
        "dc:Bounds",
        &[
            ("x", x.as_str()),
            ("y", y.as_str()),
            ("width", width.as_str()),
            ("height", height.as_str()),
        ],
    );
}

fn warn_invalid_ids(layout: &Layout) {
    let ids = layout
        .pools
        .iter()
        .map(|p| p.id.as_str())
        .chain(layout.lanes.iter().map(|l| l.id.as_str()))
        .chain(layout.nodes.iter().map(|n| n.id.as_str()))
        .chain(layout.edges.iter().map(|e| e.id.as_str()));
    for id in ids {
        if !XML_ID_RE.is_match(id) {
            tracing::warn!(id = %id, "id is not a valid XML name");
        }
    }
}

/// Integers print bare, everything else with at most two decimals.
fn fmt_num(value: f32) -> String {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-3 {
        return format!("{}", rounded as i64);
    }
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

struct XmlWriter {
    out: String,
    indent: usize,
    depth: usize,
}

impl XmlWriter {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(&" ".repeat(self.depth * self.indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.line(&format!("<{tag}{}>", format_attrs(attrs)));
        self.depth += 1;
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.line(&format!("<{tag}{} />", format_attrs(attrs)));
    }

    fn text(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.line(&format!(
            "<{tag}{}>{}</{tag}>",
            format_attrs(attrs),
            escape_xml(text)
        ));
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{tag}>"));
    }

    fn finish(self) -> String {
        self.out
    }
}

fn format_attrs(attrs: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (key, value) in attrs {
        out.push_str(&format!(" {key}=\"{}\"", escape_xml(value)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::layout::compute_layout;
    use crate::parser::parse_graph;

    fn render(input: &str) -> String {
        let graph = parse_graph(input).unwrap();
        let layout = compute_layout(&graph, &LayoutConfig::default());
        render_bpmn(&graph, &layout, &ExportConfig::default())
    }

    #[test]
    fn numbers_are_compact_and_stable() {
        assert_eq!(fmt_num(120.0), "120");
        assert_eq!(fmt_num(-0.0), "0");
        assert_eq!(fmt_num(46.666_668), "46.67");
        assert_eq!(fmt_num(12.5), "12.5");
    }

    #[test]
    fn escapes_markup_in_names() {
        let doc = render(
            r#"{"nodes": [{"id": "t", "type": "task", "name": "Check <amount> & \"limit\""}]}"#,
        );
        assert!(doc.contains(r#"name="Check &lt;amount&gt; &amp; &quot;limit&quot;""#));
    }

    #[test]
    fn document_is_well_formed_and_traceable() {
        let doc = render(
            r#"{
                "lanes": [{"id": "L1", "name": "Clerk"}],
                "nodes": [
                    {"id": "s", "type": "startEvent", "laneId": "L1"},
                    {"id": "g", "type": "exclusiveGateway", "laneId": "L1"},
                    {"id": "t", "type": "task", "name": "Work", "laneId": "L1"},
                    {"id": "e", "type": "endEvent", "laneId": "L1"}
                ],
                "flows": [
                    {"id": "f1", "source": "s", "target": "g"},
                    {"id": "f2", "source": "g", "target": "t",
                     "label": "yes", "condition": "${ok}"},
                    {"id": "f3", "source": "g", "target": "e", "label": "no"},
                    {"id": "f4", "source": "t", "target": "e"}
                ]
            }"#,
        );
        let xml = roxmltree::Document::parse(&doc).unwrap();
        let root = xml.root_element();
        assert_eq!(root.tag_name().name(), "definitions");
        assert_eq!(root.attribute("id"), Some("Definitions_1"));

        let element_ids: Vec<&str> = xml
            .descendants()
            .filter(|n| n.tag_name().namespace() == Some(BPMN_NS))
            .filter_map(|n| n.attribute("id"))
            .collect();
        for shape in xml
            .descendants()
            .filter(|n| matches!(n.tag_name().name(), "BPMNShape" | "BPMNEdge"))
        {
            let target = shape.attribute("bpmnElement").unwrap();
            assert!(element_ids.contains(&target), "dangling bpmnElement {target}");
        }

        let gateway_shape = xml
            .descendants()
            .find(|n| n.attribute("id") == Some("DI_g"))
            .unwrap();
        assert_eq!(gateway_shape.attribute("isMarkerVisible"), Some("true"));
        assert!(doc.contains("<bpmn:flowNodeRef>t</bpmn:flowNodeRef>"));
        assert!(doc.contains(
            r#"<bpmn:conditionExpression xsi:type="bpmn:tFormalExpression">${ok}</bpmn:conditionExpression>"#
        ));
        let labelled = xml
            .descendants()
            .find(|n| n.attribute("id") == Some("Edge_f2"))
            .unwrap();
        assert!(labelled.descendants().any(|n| n.tag_name().name() == "BPMNLabel"));
    }

    #[test]
    fn empty_graph_yields_bare_process_and_plane() {
        let doc = render("{}");
        assert!(!doc.contains("bpmn:collaboration"));
        assert!(doc.contains(
            r#"<bpmn:process id="Process_1" name="Generated Process" isExecutable="false" />"#
        ));
        assert!(
            doc.contains(r#"<bpmndi:BPMNPlane id="BPMNPlane_1" bpmnElement="Process_1" />"#)
        );
        roxmltree::Document::parse(&doc).unwrap();
    }

    #[test]
    fn cross_pool_flow_becomes_message_flow() {
        let doc = render(
            r#"{
                "pools": [{"id": "P_A", "name": "Customer"}, {"id": "P_B", "name": "Shop"}],
                "lanes": [{"id": "LA", "poolId": "P_A"}, {"id": "LB", "poolId": "P_B"}],
                "nodes": [
                    {"id": "a", "type": "task", "laneId": "LA"},
                    {"id": "b", "type": "task", "laneId": "LB"}
                ],
                "flows": [{"id": "m", "source": "a", "target": "b"}]
            }"#,
        );
        assert!(doc.contains(r#"<bpmn:messageFlow id="m" sourceRef="a" targetRef="b" />"#));
        assert!(!doc.contains("<bpmn:sequenceFlow"));
        assert!(doc.contains(r#"processRef="Process_P_B""#));
    }

    #[test]
    fn timer_definition_is_emitted() {
        let doc = render(
            r#"{"nodes": [{"id": "wait", "type": "intermediateCatchEvent",
                "eventDefinition": "timer", "timer": {"iso8601": "PT48H"}}]}"#,
        );
        assert!(doc.contains(r#"<bpmn:timerEventDefinition id="TimerEventDefinition_wait">"#));
        assert!(doc.contains(">PT48H</bpmn:timeDuration>"));
    }
}
