use crate::config::load_config;
use crate::import::parse_bpmn_xml;
use crate::ir::ProcessGraph;
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::parser::{parse_graph, parse_graph_json5};
use crate::render::{render_bpmn, write_output};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "bpmnl", version, about = "Auto-layout for BPMN process graphs")]
pub struct Args {
    /// Input graph (.json, .json5, or .bpmn with --import-bpmn) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "bpmn")]
    pub format: OutputFormat,

    /// Config JSON/JSON5 file with layout, routing, sizes and export overrides
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Treat the input as a BPMN 2.0 XML document and lay it out again
    #[arg(long = "import-bpmn")]
    pub import_bpmn: bool,

    /// Also write the computed geometry as JSON to this path
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// Horizontal distance between level columns (overrides the config file)
    #[arg(long = "column-width")]
    pub column_width: Option<f32>,

    /// Minimum vertical distance between rows in a lane (overrides the config file)
    #[arg(long = "row-grid")]
    pub row_grid: Option<f32>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Bpmn,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;
    if let Some(width) = args.column_width {
        config.layout.column_width = width;
    }
    if let Some(grid) = args.row_grid {
        config.layout.row_grid = grid;
    }
    let input = read_input(args.input.as_deref())?;
    let graph = parse_input(&input, args.input.as_deref(), args.import_bpmn)?;

    let layout = compute_layout(&graph, &config.layout);
    tracing::info!(
        nodes = layout.nodes.len(),
        edges = layout.edges.len(),
        width = layout.width,
        height = layout.height,
        "layout finished"
    );

    if let Some(path) = args.dump_layout.as_deref() {
        write_layout_dump(path, &layout)
            .with_context(|| format!("failed to write layout dump {}", path.display()))?;
    }

    let document = match args.format {
        OutputFormat::Bpmn => render_bpmn(&graph, &layout, &config.export),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&LayoutDump::from_layout(&layout))?;
            json.push('\n');
            json
        }
    };
    write_output(&document, args.output.as_deref())?;
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_input(input: &str, path: Option<&Path>, import_bpmn: bool) -> Result<ProcessGraph> {
    let extension = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let graph = if import_bpmn || matches!(extension.as_deref(), Some("bpmn" | "xml")) {
        parse_bpmn_xml(input)?
    } else if extension.as_deref() == Some("json5") {
        parse_graph_json5(input)?
    } else {
        parse_graph(input)?
    };
    Ok(graph)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
