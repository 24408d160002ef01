use crate::ir::{EventDefinition, Flow, Lane, Node, Pool, ProcessGraph};
use crate::parser::GraphError;
use roxmltree::{Document, Node as XmlNode};
use std::collections::{HashMap, HashSet};

const IMPORTED_LANE_ID: &str = "Lane_Imported";
const IMPORTED_LANE_NAME: &str = "Imported";
const FALLBACK_PROCESS_ID: &str = "Process_Imported";

/// Children of `<process>` that are not flow nodes.
const NON_FLOW_NODE_TAGS: &[&str] = &[
    "laneSet",
    "sequenceFlow",
    "documentation",
    "extensionElements",
    "association",
    "textAnnotation",
    "dataObject",
    "dataObjectReference",
    "dataStoreReference",
    "property",
    "ioSpecification",
];

/// Read an existing BPMN 2.0 document back into a process graph so it can be
/// laid out again. Diagram interchange is ignored.
pub fn parse_bpmn_xml(xml: &str) -> Result<ProcessGraph, GraphError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    let processes: Vec<XmlNode> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "process")
        .collect();
    let Some(first) = processes.first() else {
        return Err(GraphError::MissingProcess);
    };

    let participants: HashMap<&str, XmlNode> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "participant")
        .filter_map(|n| n.attribute("processRef").map(|process| (process, n)))
        .collect();

    let mut graph = ProcessGraph::new();
    if let Some(id) = root.attribute("id").filter(|id| !id.is_empty()) {
        graph.definitions_id = id.to_string();
    }
    graph.process_id = first
        .attribute("id")
        .filter(|id| !id.is_empty())
        .unwrap_or(FALLBACK_PROCESS_ID)
        .to_string();
    graph.name = first
        .attribute("name")
        .or_else(|| {
            participants
                .get(graph.process_id.as_str())
                .and_then(|p| p.attribute("name"))
        })
        .unwrap_or(graph.process_id.as_str())
        .to_string();

    let single = processes.len() == 1;
    let mut known_nodes: HashSet<String> = HashSet::new();
    for (idx, process) in processes.iter().enumerate() {
        let process_id = process
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{FALLBACK_PROCESS_ID}_{}", idx + 1));
        let participant = participants.get(process_id.as_str());
        let pool_id = participant.and_then(|p| p.attribute("id")).map(str::to_string);
        if let Some(pool_id) = &pool_id {
            graph.pools.push(Pool {
                id: pool_id.clone(),
                name: participant
                    .and_then(|p| p.attribute("name"))
                    .unwrap_or(pool_id)
                    .to_string(),
                process_id: Some(process_id.clone()),
            });
        }
        import_process(
            &mut graph,
            *process,
            &process_id,
            pool_id.as_deref(),
            single,
            &mut known_nodes,
        );
    }

    for message in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "messageFlow")
    {
        let id = message
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Flow_{}", graph.flows.len() + 1));
        graph.flows.push(Flow {
            id,
            source: message.attribute("sourceRef").unwrap_or_default().to_string(),
            target: message.attribute("targetRef").unwrap_or_default().to_string(),
            label: non_empty_attr(message, "name"),
            condition: None,
        });
    }

    tracing::info!(
        processes = processes.len(),
        nodes = graph.nodes.len(),
        flows = graph.flows.len(),
        "imported BPMN document"
    );
    Ok(graph)
}

fn import_process(
    graph: &mut ProcessGraph,
    process: XmlNode,
    process_id: &str,
    pool_id: Option<&str>,
    single: bool,
    known_nodes: &mut HashSet<String>,
) {
    let first_lane = graph.lanes.len();
    let mut lane_of: HashMap<String, String> = HashMap::new();
    for lane_set in children_named(process, "laneSet") {
        for lane in lane_set
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "lane")
        {
            let id = lane
                .attribute("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Lane_{}", graph.lanes.len() + 1));
            for node_ref in children_named(lane, "flowNodeRef") {
                let target = node_ref.text().unwrap_or_default().trim();
                if !target.is_empty() {
                    lane_of.insert(target.to_string(), id.clone());
                }
            }
            graph.lanes.push(Lane {
                name: lane.attribute("name").unwrap_or(&id).to_string(),
                id,
                pool_id: pool_id.map(str::to_string),
            });
        }
    }

    let first_node = graph.nodes.len();
    for child in process.children().filter(|n| n.is_element()) {
        let tag = child.tag_name().name();
        if NON_FLOW_NODE_TAGS.contains(&tag) {
            continue;
        }
        let Some(id) = child.attribute("id") else {
            continue;
        };
        if !known_nodes.insert(id.to_string()) {
            continue;
        }
        graph.nodes.push(Node {
            id: id.to_string(),
            kind: tag.to_string(),
            gateway_type: None,
            name: child.attribute("name").unwrap_or(id).to_string(),
            lane_id: None,
            event_definition: event_definition(child),
        });
    }

    for sequence in children_named(process, "sequenceFlow") {
        let id = sequence
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Flow_{}", graph.flows.len() + 1));
        let source = sequence.attribute("sourceRef").unwrap_or_default().to_string();
        let target = sequence.attribute("targetRef").unwrap_or_default().to_string();
        let condition = children_named(sequence, "conditionExpression")
            .next()
            .and_then(|c| c.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        for endpoint in [&source, &target] {
            if !endpoint.is_empty() && known_nodes.insert(endpoint.clone()) {
                tracing::debug!(node = %endpoint, "creating placeholder task for flow endpoint");
                graph.add_node(endpoint, "task", None);
            }
        }
        graph.flows.push(Flow {
            id,
            source,
            target,
            label: non_empty_attr(sequence, "name"),
            condition,
        });
    }

    if graph.lanes.len() == first_lane {
        let (id, name) = if single {
            (IMPORTED_LANE_ID.to_string(), IMPORTED_LANE_NAME.to_string())
        } else {
            (format!("Lane_{process_id}"), pool_id.unwrap_or(process_id).to_string())
        };
        graph.lanes.push(Lane {
            id,
            name,
            pool_id: pool_id.map(str::to_string),
        });
    }
    let default_lane = graph.lanes[first_lane].id.clone();
    for node in &mut graph.nodes[first_node..] {
        let lane = lane_of.get(&node.id).cloned().unwrap_or_else(|| default_lane.clone());
        node.lane_id = Some(lane);
    }
}

fn event_definition(node: XmlNode) -> Option<EventDefinition> {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "timerEventDefinition" => {
                let duration = child
                    .children()
                    .filter(|n| {
                        n.is_element()
                            && matches!(
                                n.tag_name().name(),
                                "timeDuration" | "timeDate" | "timeCycle"
                            )
                    })
                    .find_map(|n| n.text())
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string);
                return Some(EventDefinition::Timer { duration });
            }
            "messageEventDefinition" => return Some(EventDefinition::Message),
            "errorEventDefinition" => return Some(EventDefinition::Error),
            _ => {}
        }
    }
    None
}

fn children_named<'a, 'input>(
    node: XmlNode<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn non_empty_attr(node: XmlNode, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
