use crate::ir::NodeKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Width/height presets per node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSizes {
    pub event: (f32, f32),
    pub gateway: (f32, f32),
    pub task: (f32, f32),
    pub sub_process: (f32, f32),
}

impl Default for NodeSizes {
    fn default() -> Self {
        Self {
            event: (36.0, 36.0),
            gateway: (50.0, 50.0),
            task: (190.0, 78.0),
            sub_process: (240.0, 180.0),
        }
    }
}

impl NodeSizes {
    pub fn size_of(&self, kind: NodeKind) -> (f32, f32) {
        match kind {
            NodeKind::StartEvent
            | NodeKind::EndEvent
            | NodeKind::IntermediateCatchEvent
            | NodeKind::IntermediateThrowEvent => self.event,
            NodeKind::ExclusiveGateway
            | NodeKind::ParallelGateway
            | NodeKind::InclusiveGateway
            | NodeKind::EventBasedGateway => self.gateway,
            NodeKind::Task | NodeKind::UserTask | NodeKind::ServiceTask => self.task,
            NodeKind::SubProcess => self.sub_process,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Horizontal distance between level columns.
    pub column_width: f32,
    /// Minimum vertical distance between rows inside a lane.
    pub row_grid: f32,
    pub row_margin: f32,
    pub min_lane_height: f32,
    /// Height assumed for a lane that holds no nodes.
    pub empty_lane_node_height: f32,
    pub gateway_extra_padding: f32,
    /// Shift start events right so they sit close to their successor.
    pub align_start_events: bool,
    /// Move nodes without any flow after the last connected column.
    pub isolated_after_main: bool,
    pub pool_x: f32,
    pub pool_y: f32,
    pub pool_header_width: f32,
    pub lane_content_inset: f32,
    pub min_lane_width: f32,
    pub pool_pad_x: f32,
    pub sizes: NodeSizes,
    pub routing: RoutingConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: 250.0,
            row_grid: 220.0,
            row_margin: 24.0,
            min_lane_height: 200.0,
            empty_lane_node_height: 52.0,
            gateway_extra_padding: 16.0,
            align_start_events: true,
            isolated_after_main: true,
            pool_x: 8.0,
            pool_y: 0.0,
            pool_header_width: 40.0,
            lane_content_inset: 40.0,
            min_lane_width: 620.0,
            pool_pad_x: 80.0,
            sizes: NodeSizes::default(),
            routing: RoutingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Padding added around node boxes for collision tests.
    pub collision_padding: f32,
    /// Minimum horizontal run before a detour turns.
    pub detour_offset: f32,
    /// Extra horizontal run for detours out of a split or into a join.
    pub branch_detour_extra: f32,
    /// Base of the vertical shift used by detour variants.
    pub channel_grid: f32,
    pub min_vertical_step: f32,
    pub self_loop_offset: f32,
    pub label_width: f32,
    pub label_height: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            collision_padding: 6.0,
            detour_offset: 40.0,
            branch_detour_extra: 20.0,
            channel_grid: 140.0,
            min_vertical_step: 40.0,
            self_loop_offset: 30.0,
            label_width: 80.0,
            label_height: 20.0,
        }
    }
}

impl RoutingConfig {
    pub fn vertical_step(&self) -> f32 {
        (self.channel_grid / 3.0).max(self.min_vertical_step)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub exporter: String,
    pub exporter_version: String,
    pub target_namespace: String,
    pub indent: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            exporter: env!("CARGO_PKG_NAME").to_string(),
            exporter_version: env!("CARGO_PKG_VERSION").to_string(),
            target_namespace: "http://bpmn.io/schema/bpmn".to_string(),
            indent: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    routing: Option<RoutingConfigFile>,
    sizes: Option<NodeSizesFile>,
    export: Option<ExportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    column_width: Option<f32>,
    row_grid: Option<f32>,
    row_margin: Option<f32>,
    min_lane_height: Option<f32>,
    empty_lane_node_height: Option<f32>,
    gateway_extra_padding: Option<f32>,
    align_start_events: Option<bool>,
    isolated_after_main: Option<bool>,
    pool_x: Option<f32>,
    pool_y: Option<f32>,
    pool_header_width: Option<f32>,
    lane_content_inset: Option<f32>,
    min_lane_width: Option<f32>,
    pool_pad_x: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    collision_padding: Option<f32>,
    detour_offset: Option<f32>,
    branch_detour_extra: Option<f32>,
    channel_grid: Option<f32>,
    min_vertical_step: Option<f32>,
    self_loop_offset: Option<f32>,
    label_width: Option<f32>,
    label_height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NodeSizesFile {
    event: Option<[f32; 2]>,
    gateway: Option<[f32; 2]>,
    task: Option<[f32; 2]>,
    sub_process: Option<[f32; 2]>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ExportConfigFile {
    exporter: Option<String>,
    exporter_version: Option<String>,
    target_namespace: Option<String>,
    indent: Option<usize>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = if crate::parser::is_json5_path(path) {
        json5::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };
    Ok(merge_config(Config::default(), parsed))
}

/// Apply overrides from a JSON config string over the defaults.
pub fn config_from_str(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    Ok(merge_config(Config::default(), parsed))
}

fn merge_config(mut config: Config, parsed: ConfigFile) -> Config {
    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        if let Some(v) = layout.column_width {
            target.column_width = v;
        }
        if let Some(v) = layout.row_grid {
            target.row_grid = v;
        }
        if let Some(v) = layout.row_margin {
            target.row_margin = v;
        }
        if let Some(v) = layout.min_lane_height {
            target.min_lane_height = v;
        }
        if let Some(v) = layout.empty_lane_node_height {
            target.empty_lane_node_height = v;
        }
        if let Some(v) = layout.gateway_extra_padding {
            target.gateway_extra_padding = v;
        }
        if let Some(v) = layout.align_start_events {
            target.align_start_events = v;
        }
        if let Some(v) = layout.isolated_after_main {
            target.isolated_after_main = v;
        }
        if let Some(v) = layout.pool_x {
            target.pool_x = v;
        }
        if let Some(v) = layout.pool_y {
            target.pool_y = v;
        }
        if let Some(v) = layout.pool_header_width {
            target.pool_header_width = v;
        }
        if let Some(v) = layout.lane_content_inset {
            target.lane_content_inset = v;
        }
        if let Some(v) = layout.min_lane_width {
            target.min_lane_width = v;
        }
        if let Some(v) = layout.pool_pad_x {
            target.pool_pad_x = v;
        }
    }

    if let Some(routing) = parsed.routing {
        let target = &mut config.layout.routing;
        if let Some(v) = routing.collision_padding {
            target.collision_padding = v;
        }
        if let Some(v) = routing.detour_offset {
            target.detour_offset = v;
        }
        if let Some(v) = routing.branch_detour_extra {
            target.branch_detour_extra = v;
        }
        if let Some(v) = routing.channel_grid {
            target.channel_grid = v;
        }
        if let Some(v) = routing.min_vertical_step {
            target.min_vertical_step = v;
        }
        if let Some(v) = routing.self_loop_offset {
            target.self_loop_offset = v;
        }
        if let Some(v) = routing.label_width {
            target.label_width = v;
        }
        if let Some(v) = routing.label_height {
            target.label_height = v;
        }
    }

    if let Some(sizes) = parsed.sizes {
        let target = &mut config.layout.sizes;
        if let Some([w, h]) = sizes.event {
            target.event = (w, h);
        }
        if let Some([w, h]) = sizes.gateway {
            target.gateway = (w, h);
        }
        if let Some([w, h]) = sizes.task {
            target.task = (w, h);
        }
        if let Some([w, h]) = sizes.sub_process {
            target.sub_process = (w, h);
        }
    }

    if let Some(export) = parsed.export {
        if let Some(v) = export.exporter {
            config.export.exporter = v;
        }
        if let Some(v) = export.exporter_version {
            config.export.exporter_version = v;
        }
        if let Some(v) = export.target_namespace {
            config.export.target_namespace = v;
        }
        if let Some(v) = export.indent {
            config.export.indent = v;
        }
    }

    config
}
