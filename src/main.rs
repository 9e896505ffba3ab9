//! vSlice: hierarchical size and heatmap explorer.
//!
//! Thin binary entry point. Scans one location, applies value and heatmap
//! columns plus filters, and prints the top levels of the result. All logic
//! lives in the `vslice-core` and `vslice-app` crates.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use vslice_app::{AppPhase, AppState};
use vslice_core::model::{ItemTree, NodeIndex};
use vslice_core::{EngineConfig, Filter, ScanOrchestrator};

/// How often the session is ticked while a scan runs.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "vslice", version, about = "Hierarchical size and heatmap explorer")]
struct Cli {
    /// Directory or .tsv file to scan
    #[arg(required_unless_present = "list_seeds")]
    location: Option<String>,

    /// List the built-in scan locations and exit
    #[arg(long)]
    list_seeds: bool,

    /// Numeric column that sizes each level
    #[arg(short = 'c', long)]
    value_column: Option<String>,

    /// Numeric column used for the heatmap bucket
    #[arg(long)]
    heatmap: Option<String>,

    /// Filter as `<column> <operator> <text>`, e.g. "Extension == rs". Repeatable.
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// JSON engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Levels below the root to print
    #[arg(short, long, default_value_t = 2)]
    depth: u32,

    /// Children printed per level
    #[arg(short, long, default_value_t = 10)]
    top: usize,

    /// Also print the largest items anywhere under the root
    #[arg(long, default_value_t = 0)]
    items: usize,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut state = AppState::new(config)?;

    if cli.list_seeds {
        for seed in &state.seeds {
            println!("{:<12} {:<24} {}", seed.kind.as_str(), seed.display_name, seed.id);
        }
        return Ok(());
    }

    let Some(location) = cli.location.as_deref() else {
        bail!("no location given");
    };
    state.manual_location = location.to_string();
    if !state.spawn_manual_scan()? {
        bail!("scan of {location} was declined");
    }
    while state.phase == AppPhase::Scanning {
        state.tick();
        std::thread::sleep(TICK_INTERVAL);
    }

    apply_columns(&mut state, &cli)?;
    for expr in &cli.filters {
        let mut filter = Filter::parse(expr).with_context(|| format!("bad filter: {expr}"))?;
        let numeric = filter
            .column()
            .is_some_and(|c| state.value_columns().iter().any(|v| v == c));
        filter.set_value_column(numeric);
        if !state.add_filter(filter) {
            bail!("incomplete filter: {expr}");
        }
    }
    state.recalculate_now();

    print_summary(&state);
    print_tree(&state, cli.depth, cli.top)?;
    if cli.items > 0 {
        print_items(&state, cli.items);
    }
    Ok(())
}

fn apply_columns(state: &mut AppState, cli: &Cli) -> anyhow::Result<()> {
    if let Some(column) = &cli.value_column {
        if !state.value_columns().contains(column) {
            bail!(
                "'{column}' is not a numeric column; choose one of: {}",
                state.value_columns().join(", ")
            );
        }
        state.set_value_column(column);
    }
    if let Some(column) = &cli.heatmap {
        if !state.heatmap_columns().contains(column) {
            bail!(
                "'{column}' cannot be used for the heatmap; choose one of: {}",
                state.heatmap_columns().join(", ")
            );
        }
        state.set_heatmap_column(Some(column.clone()));
    }
    Ok(())
}

fn print_summary(state: &AppState) {
    let column = state.selected_value_column().unwrap_or_default();
    let mut line = format!("{}  [{column}]", state.scan_location);
    if let Some(heatmap) = state.selected_heatmap_column() {
        line.push_str(&format!("  heatmap: {heatmap}"));
    }
    if let Some(duration) = state.scan_duration {
        line.push_str(&format!("  {:.2}s", duration.as_secs_f64()));
    }
    if state.scan_was_cancelled {
        line.push_str("  (cancelled, partial)");
    }
    println!("{line}");

    if state.scan_error_count > 0 {
        eprintln!("{} location(s) could not be read", state.scan_error_count);
        for (path, message) in state.scan_errors.iter().take(5) {
            eprintln!("  {path}: {message}");
        }
    }
}

fn print_tree(state: &AppState, depth: u32, top: usize) -> anyhow::Result<()> {
    let (Some(orch), Some(tree)) = (state.current_orchestrator(), state.tree()) else {
        bail!("the scan produced no tree");
    };
    let tree = tree.lock();
    let root_total = tree.node(tree.root()).stats.total_value;
    let mut lines = Vec::new();
    collect_lines(&tree, orch, tree.root(), depth, top, root_total, &mut lines);
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn collect_lines(
    tree: &ItemTree,
    orch: &ScanOrchestrator,
    node: NodeIndex,
    max_depth: u32,
    top: usize,
    root_total: f64,
    out: &mut Vec<String>,
) {
    let n = tree.node(node);
    let share = if root_total > 0.0 {
        n.stats.total_value / root_total * 100.0
    } else {
        0.0
    };
    let bucket = n
        .stats
        .heatmap_bucket
        .map(|b| format!("  heat {b:>2}"))
        .unwrap_or_default();
    out.push(format!(
        "{:indent$}{:<32} {:>12} {:>6.1}%{bucket}",
        "",
        n.name.as_str(),
        orch.format_value(n.stats.total_value, root_total),
        share,
        indent = n.depth as usize * 2,
    ));

    if n.depth >= max_depth {
        return;
    }
    let children = tree.children_sorted_by_total(node);
    let hidden = children.len().saturating_sub(top);
    for child in children.into_iter().take(top) {
        collect_lines(tree, orch, child, max_depth, top, root_total, out);
    }
    if hidden > 0 {
        out.push(format!("{:indent$}... {hidden} more", "", indent = (n.depth as usize + 1) * 2));
    }
}

fn print_items(state: &AppState, count: usize) {
    let root = state.chart_root.unwrap_or(NodeIndex(0));
    let view = state.details(root, true);
    println!();
    println!("Largest items ({} matched):", view.matched);
    for row in view.rows.iter().take(count) {
        let heat = row
            .heatmap_value
            .map(|h| format!("  {h}"))
            .unwrap_or_default();
        println!("  {:>12}  {}{heat}", row.formatted, row.name);
    }
}
