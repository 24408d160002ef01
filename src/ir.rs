use serde::{Deserialize, Serialize};

pub const DEFAULT_DEFINITIONS_ID: &str = "Definitions_1";
pub const DEFAULT_PROCESS_ID: &str = "Process_1";
pub const DEFAULT_PROCESS_NAME: &str = "Generated Process";
pub const DEFAULT_POOL_ID: &str = "Participant_1";
pub const SYSTEM_LANE_ID: &str = "Lane_System";
pub const SYSTEM_LANE_NAME: &str = "System";

/// Canonical process element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    StartEvent,
    EndEvent,
    Task,
    UserTask,
    ServiceTask,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    EventBasedGateway,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    SubProcess,
}

impl NodeKind {
    pub const ALL: [NodeKind; 12] = [
        NodeKind::StartEvent,
        NodeKind::EndEvent,
        NodeKind::Task,
        NodeKind::UserTask,
        NodeKind::ServiceTask,
        NodeKind::ExclusiveGateway,
        NodeKind::ParallelGateway,
        NodeKind::InclusiveGateway,
        NodeKind::EventBasedGateway,
        NodeKind::IntermediateCatchEvent,
        NodeKind::IntermediateThrowEvent,
        NodeKind::SubProcess,
    ];

    /// Resolves a raw kind spelling. Accepts snake_case, camelCase,
    /// hyphenated and the legacy short forms; anything else is a `Task`.
    pub fn from_alias(raw: &str) -> Self {
        Self::lookup(raw).unwrap_or(NodeKind::Task)
    }

    /// Like [`NodeKind::from_alias`], but a bare `gateway` is refined by the
    /// companion `gatewayType` field.
    pub fn resolve(raw: &str, gateway_type: Option<&str>) -> Self {
        if compact(raw) == "gateway" {
            return match gateway_type.map(compact).as_deref() {
                Some("parallel") => NodeKind::ParallelGateway,
                Some("inclusive") => NodeKind::InclusiveGateway,
                Some("event") | Some("eventbased") => NodeKind::EventBasedGateway,
                _ => NodeKind::ExclusiveGateway,
            };
        }
        Self::from_alias(raw)
    }

    fn lookup(raw: &str) -> Option<Self> {
        let key = compact(raw);
        let kind = match key.as_str() {
            "startevent" | "start" => NodeKind::StartEvent,
            "endevent" | "end" => NodeKind::EndEvent,
            "task" | "activity" => NodeKind::Task,
            "usertask" | "user" | "manualtask" => NodeKind::UserTask,
            "servicetask" | "service" | "scripttask" => NodeKind::ServiceTask,
            "exclusivegateway" | "exclusive" | "xor" | "gateway" => NodeKind::ExclusiveGateway,
            "parallelgateway" | "parallel" | "and" => NodeKind::ParallelGateway,
            "inclusivegateway" | "inclusive" | "or" => NodeKind::InclusiveGateway,
            "eventbasedgateway" | "eventgateway" => NodeKind::EventBasedGateway,
            "intermediatecatchevent" | "catchevent" | "catch" => NodeKind::IntermediateCatchEvent,
            "intermediatethrowevent" | "throwevent" | "throw" => NodeKind::IntermediateThrowEvent,
            "subprocess" | "sub" => NodeKind::SubProcess,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::StartEvent => "start_event",
            NodeKind::EndEvent => "end_event",
            NodeKind::Task => "task",
            NodeKind::UserTask => "user_task",
            NodeKind::ServiceTask => "service_task",
            NodeKind::ExclusiveGateway => "exclusive_gateway",
            NodeKind::ParallelGateway => "parallel_gateway",
            NodeKind::InclusiveGateway => "inclusive_gateway",
            NodeKind::EventBasedGateway => "event_based_gateway",
            NodeKind::IntermediateCatchEvent => "intermediate_catch_event",
            NodeKind::IntermediateThrowEvent => "intermediate_throw_event",
            NodeKind::SubProcess => "sub_process",
        }
    }

    /// BPMN 2.0 element tag.
    pub fn bpmn_tag(self) -> &'static str {
        match self {
            NodeKind::StartEvent => "startEvent",
            NodeKind::EndEvent => "endEvent",
            NodeKind::Task => "task",
            NodeKind::UserTask => "userTask",
            NodeKind::ServiceTask => "serviceTask",
            NodeKind::ExclusiveGateway => "exclusiveGateway",
            NodeKind::ParallelGateway => "parallelGateway",
            NodeKind::InclusiveGateway => "inclusiveGateway",
            NodeKind::EventBasedGateway => "eventBasedGateway",
            NodeKind::IntermediateCatchEvent => "intermediateCatchEvent",
            NodeKind::IntermediateThrowEvent => "intermediateThrowEvent",
            NodeKind::SubProcess => "subProcess",
        }
    }

    pub fn is_gateway(self) -> bool {
        matches!(
            self,
            NodeKind::ExclusiveGateway
                | NodeKind::ParallelGateway
                | NodeKind::InclusiveGateway
                | NodeKind::EventBasedGateway
        )
    }

    pub fn is_event(self) -> bool {
        matches!(
            self,
            NodeKind::StartEvent
                | NodeKind::EndEvent
                | NodeKind::IntermediateCatchEvent
                | NodeKind::IntermediateThrowEvent
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compact(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDefinition {
    Timer { duration: Option<String> },
    Message,
    Error,
}

#[derive(Debug, Clone)]
pub struct Pool {
    pub id: String,
    pub name: String,
    /// Process referenced by the participant; derived from the pool id when absent.
    pub process_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Lane {
    pub id: String,
    pub name: String,
    pub pool_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    /// Kind as spelled in the input; normalized by the layout indexer.
    pub kind: String,
    pub gateway_type: Option<String>,
    pub name: String,
    pub lane_id: Option<String>,
    pub event_definition: Option<EventDefinition>,
}

#[derive(Debug, Clone)]
pub struct Flow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessGraph {
    pub definitions_id: String,
    pub process_id: String,
    pub name: String,
    pub pools: Vec<Pool>,
    pub lanes: Vec<Lane>,
    pub nodes: Vec<Node>,
    pub flows: Vec<Flow>,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self {
            definitions_id: DEFAULT_DEFINITIONS_ID.to_string(),
            process_id: DEFAULT_PROCESS_ID.to_string(),
            name: DEFAULT_PROCESS_NAME.to_string(),
            pools: Vec::new(),
            lanes: Vec::new(),
            nodes: Vec::new(),
            flows: Vec::new(),
        }
    }

    pub fn add_lane(&mut self, id: &str, name: &str) {
        self.lanes.push(Lane {
            id: id.to_string(),
            name: name.to_string(),
            pool_id: None,
        });
    }

    pub fn add_node(&mut self, id: &str, kind: &str, lane_id: Option<&str>) {
        self.nodes.push(Node {
            id: id.to_string(),
            kind: kind.to_string(),
            gateway_type: None,
            name: id.to_string(),
            lane_id: lane_id.map(str::to_string),
            event_definition: None,
        });
    }

    pub fn add_flow(&mut self, id: &str, source: &str, target: &str) {
        self.flows.push(Flow {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
            condition: None,
        });
    }
}

impl Default for ProcessGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_resolve_to_themselves() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_alias(kind.as_str()), kind);
            assert_eq!(NodeKind::from_alias(kind.bpmn_tag()), kind);
        }
    }

    #[test]
    fn aliases_are_idempotent() {
        for raw in [
            "start-event",
            "userTask",
            "XOR",
            "sub-process",
            "bogus",
            "",
            "event_gateway",
        ] {
            let once = NodeKind::from_alias(raw);
            let twice = NodeKind::from_alias(once.as_str());
            assert_eq!(once, twice, "alias {raw:?}");
        }
    }

    #[test]
    fn legacy_spellings() {
        assert_eq!(NodeKind::from_alias("start"), NodeKind::StartEvent);
        assert_eq!(
            NodeKind::from_alias("Intermediate-Catch-Event"),
            NodeKind::IntermediateCatchEvent
        );
        assert_eq!(NodeKind::from_alias("eventBasedGateway"), NodeKind::EventBasedGateway);
        assert_eq!(NodeKind::from_alias("textAnnotation"), NodeKind::Task);
    }

    #[test]
    fn bare_gateway_uses_gateway_type() {
        assert_eq!(NodeKind::resolve("gateway", Some("parallel")), NodeKind::ParallelGateway);
        assert_eq!(NodeKind::resolve("gateway", Some("Inclusive")), NodeKind::InclusiveGateway);
        assert_eq!(NodeKind::resolve("gateway", None), NodeKind::ExclusiveGateway);
        assert_eq!(NodeKind::resolve("task", Some("parallel")), NodeKind::Task);
    }
}
