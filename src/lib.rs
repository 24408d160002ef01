#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod import;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, ExportConfig, LayoutConfig, load_config};
pub use import::parse_bpmn_xml;
pub use ir::{NodeKind, ProcessGraph};
pub use layout::{Layout, compute_layout};
pub use parser::{GraphError, parse_graph, parse_graph_file};
pub use render::render_bpmn;

/// Lay out a graph and serialize it as BPMN XML in one call.
pub fn layout_to_bpmn(graph: &ProcessGraph, config: &Config) -> String {
    let layout = compute_layout(graph, &config.layout);
    render_bpmn(graph, &layout, &config.export)
}
