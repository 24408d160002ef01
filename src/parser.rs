use crate::ir::{
    DEFAULT_DEFINITIONS_ID, DEFAULT_PROCESS_ID, DEFAULT_PROCESS_NAME, EventDefinition, Flow, Lane,
    Node, Pool, ProcessGraph,
};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid JSON graph: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid JSON5 graph: {0}")]
    Json5(#[from] json5::Error),
    #[error("invalid BPMN XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("BPMN document has no <process> element")]
    MissingProcess,
    #[error("{element} #{index} has no id")]
    MissingId { element: &'static str, index: usize },
    #[error("flow #{index} has no {end}")]
    MissingEndpoint { index: usize, end: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFile {
    definitions_id: Option<String>,
    process_id: Option<String>,
    name: Option<String>,
    process_name: Option<String>,
    #[serde(default)]
    pools: Vec<PoolEntry>,
    #[serde(default)]
    lanes: Vec<LaneEntry>,
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    flows: Vec<FlowEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolEntry {
    id: Option<String>,
    name: Option<String>,
    process_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaneEntry {
    id: Option<String>,
    name: Option<String>,
    pool_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEntry {
    id: Option<String>,
    #[serde(rename = "type")]
    node_type: Option<String>,
    kind: Option<String>,
    gateway_type: Option<String>,
    name: Option<String>,
    lane_id: Option<String>,
    event_definition: Option<String>,
    timer: Option<TimerEntry>,
}

#[derive(Debug, Deserialize)]
struct TimerEntry {
    iso8601: Option<String>,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowEntry {
    id: Option<String>,
    source: Option<String>,
    source_ref: Option<String>,
    source_id: Option<String>,
    target: Option<String>,
    target_ref: Option<String>,
    target_id: Option<String>,
    label: Option<String>,
    name: Option<String>,
    condition: Option<String>,
}

/// Parse a process graph from JSON.
pub fn parse_graph(input: &str) -> Result<ProcessGraph, GraphError> {
    let file: GraphFile = serde_json::from_str(input)?;
    build_graph(file)
}

/// Parse a process graph from JSON5 (comments, trailing commas, bare keys).
pub fn parse_graph_json5(input: &str) -> Result<ProcessGraph, GraphError> {
    let file: GraphFile = json5::from_str(input)?;
    build_graph(file)
}

pub fn parse_graph_file(path: &Path) -> Result<ProcessGraph, GraphError> {
    let contents = std::fs::read_to_string(path)?;
    if is_json5_path(path) {
        parse_graph_json5(&contents)
    } else {
        parse_graph(&contents)
    }
}

pub(crate) fn is_json5_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false)
}

fn build_graph(file: GraphFile) -> Result<ProcessGraph, GraphError> {
    let mut graph = ProcessGraph::new();
    graph.definitions_id =
        non_empty(file.definitions_id).unwrap_or_else(|| DEFAULT_DEFINITIONS_ID.to_string());
    graph.process_id = non_empty(file.process_id).unwrap_or_else(|| DEFAULT_PROCESS_ID.to_string());
    graph.name = non_empty(file.name)
        .or_else(|| non_empty(file.process_name))
        .unwrap_or_else(|| DEFAULT_PROCESS_NAME.to_string());

    for (index, entry) in file.pools.into_iter().enumerate() {
        let id = non_empty(entry.id).ok_or(GraphError::MissingId { element: "pool", index })?;
        let name = non_empty(entry.name).unwrap_or_else(|| id.clone());
        graph.pools.push(Pool {
            id,
            name,
            process_id: non_empty(entry.process_id),
        });
    }

    for (index, entry) in file.lanes.into_iter().enumerate() {
        let id = non_empty(entry.id).ok_or(GraphError::MissingId { element: "lane", index })?;
        let name = non_empty(entry.name).unwrap_or_else(|| id.clone());
        graph.lanes.push(Lane {
            id,
            name,
            pool_id: non_empty(entry.pool_id),
        });
    }

    for (index, entry) in file.nodes.into_iter().enumerate() {
        let id = non_empty(entry.id).ok_or(GraphError::MissingId { element: "node", index })?;
        let kind = non_empty(entry.node_type)
            .or_else(|| non_empty(entry.kind))
            .unwrap_or_default();
        let event_definition = parse_event_definition(entry.event_definition, entry.timer);
        graph.nodes.push(Node {
            kind,
            gateway_type: non_empty(entry.gateway_type),
            name: entry.name.unwrap_or_default(),
            lane_id: non_empty(entry.lane_id),
            event_definition,
            id,
        });
    }

    for (index, entry) in file.flows.into_iter().enumerate() {
        let source = non_empty(entry.source)
            .or_else(|| non_empty(entry.source_ref))
            .or_else(|| non_empty(entry.source_id))
            .ok_or(GraphError::MissingEndpoint { index, end: "source" })?;
        let target = non_empty(entry.target)
            .or_else(|| non_empty(entry.target_ref))
            .or_else(|| non_empty(entry.target_id))
            .ok_or(GraphError::MissingEndpoint { index, end: "target" })?;
        let id = non_empty(entry.id).unwrap_or_else(|| format!("F_{source}_{target}_{index}"));
        graph.flows.push(Flow {
            id,
            source,
            target,
            label: non_empty(entry.label).or_else(|| non_empty(entry.name)),
            condition: non_empty(entry.condition),
        });
    }

    Ok(graph)
}

fn parse_event_definition(
    raw: Option<String>,
    timer: Option<TimerEntry>,
) -> Option<EventDefinition> {
    let raw = non_empty(raw)?;
    match raw.to_ascii_lowercase().as_str() {
        "timer" => {
            let duration = timer.and_then(|t| non_empty(t.iso8601).or_else(|| non_empty(t.raw)));
            Some(EventDefinition::Timer { duration })
        }
        "message" => Some(EventDefinition::Message),
        "error" => Some(EventDefinition::Error),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_graph() {
        let input = r#"{
            "lanes": [{"id": "L1", "name": "Clerk"}],
            "nodes": [
                {"id": "s", "type": "startEvent", "name": "Start", "laneId": "L1"},
                {"id": "t", "type": "task", "name": "Work", "laneId": "L1"}
            ],
            "flows": [{"id": "f1", "source": "s", "target": "t"}]
        }"#;
        let graph = parse_graph(input).unwrap();
        assert_eq!(graph.process_id, "Process_1");
        assert_eq!(graph.lanes[0].name, "Clerk");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.flows[0].source, "s");
    }

    #[test]
    fn accepts_alternate_endpoint_keys_and_synthesizes_flow_ids() {
        let input = r#"{
            "nodes": [{"id": "a", "kind": "task"}, {"id": "b", "kind": "task"}],
            "flows": [
                {"sourceRef": "a", "targetId": "b", "name": "next"},
                {"id": "", "source": "b", "target": "a"}
            ]
        }"#;
        let graph = parse_graph(input).unwrap();
        assert_eq!(graph.flows[0].id, "F_a_b_0");
        assert_eq!(graph.flows[0].label.as_deref(), Some("next"));
        assert_eq!(graph.flows[1].id, "F_b_a_1");
        assert_eq!(graph.nodes[0].kind, "task");
        assert!(graph.nodes[0].lane_id.is_none());
    }

    #[test]
    fn missing_node_id_is_an_error() {
        let input = r#"{"nodes": [{"type": "task"}]}"#;
        let err = parse_graph(input).unwrap_err();
        assert!(matches!(err, GraphError::MissingId { element: "node", index: 0 }));
    }

    #[test]
    fn missing_flow_target_is_an_error() {
        let input = r#"{"nodes": [{"id": "a"}], "flows": [{"id": "f", "source": "a"}]}"#;
        let err = parse_graph(input).unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { end: "target", .. }));
    }

    #[test]
    fn parses_timer_event_definition() {
        let input = r#"{"nodes": [{
            "id": "wait", "type": "intermediateCatchEvent",
            "eventDefinition": "Timer", "timer": {"iso8601": "PT48H"}
        }]}"#;
        let graph = parse_graph(input).unwrap();
        assert_eq!(
            graph.nodes[0].event_definition,
            Some(EventDefinition::Timer {
                duration: Some("PT48H".to_string())
            })
        );
    }

    #[test]
    fn parses_json5() {
        let input = "{\n  // draft\n  nodes: [{id: 'a', type: 'task',},],\n}";
        let graph = parse_graph_json5(input).unwrap();
        assert_eq!(graph.nodes[0].id, "a");
    }
}
