/// End-to-end scan tests.
///
/// These run the real handlers against a real temporary directory or `.tsv`
/// file, through the orchestrator's background thread, and check the
/// recalculated tree that comes back.
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vslice_core::analysis::{common_values, detail_items};
use vslice_core::config::{EngineConfig, FileSystemOptions, SpreadsheetOptions};
use vslice_core::error::{ScanError, SeedError};
use vslice_core::handlers::filesystem::{EXTENSION, FILE_SIZE};
use vslice_core::handlers::{FileSystemHandler, HandlerRegistry, SourceKind, SpreadsheetHandler, TreeHandler};
use vslice_core::model::{standard, ItemTree, NodeIndex};
use vslice_core::{Aggregator, Filter, FilterOperator, FilterSet, ScanHandle, ScanOrchestrator, ScanProgress, Seed};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Create a reproducible directory tree:
///
/// ```text
/// root/
///   alpha/
///     a.txt   (100 bytes)
///     b.rs    (200 bytes)
///   beta/
///     c.png   (300 bytes)
///   d.zip     (400 bytes)
/// ```
///
/// Total file bytes: 1 000.
fn build_test_tree(root: &Path) {
    let alpha = root.join("alpha");
    let beta = root.join("beta");
    fs::create_dir_all(&alpha).unwrap();
    fs::create_dir_all(&beta).unwrap();

    write_bytes(&alpha.join("a.txt"), 100);
    write_bytes(&alpha.join("b.rs"), 200);
    write_bytes(&beta.join("c.png"), 300);
    write_bytes(&root.join("d.zip"), 400);
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

fn fs_orchestrator() -> ScanOrchestrator {
    let handler = Arc::new(FileSystemHandler::new(FileSystemOptions::default()));
    ScanOrchestrator::new(handler, Arc::new(Aggregator::global()), &EngineConfig::default())
}

/// Wait for the final progress message, then take the tree.
///
/// Waits up to 30 seconds, which is far more than a temp-dir scan needs.
fn finish(handle: ScanHandle) -> (ScanProgress, ItemTree) {
    let last = loop {
        match handle.progress_rx.recv_timeout(Duration::from_secs(30)) {
            Ok(ScanProgress::Error { .. }) => continue,
            Ok(msg) => break msg,
            Err(err) => panic!("scanner did not finish: {err}"),
        }
    };
    let outcome = handle.join().unwrap();
    (last, outcome.tree)
}

fn child_named(tree: &ItemTree, parent: NodeIndex, name: &str) -> NodeIndex {
    *tree
        .children(parent)
        .iter()
        .find(|&&c| tree.node(c).name == name)
        .unwrap_or_else(|| panic!("no child named {name}"))
}

// ── File system ──────────────────────────────────────────────────────────────

#[test]
fn scans_directory_and_totals_bytes() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let orch = fs_orchestrator();
    let seed = orch
        .handler()
        .try_resolve_location(tmp.path().to_str().unwrap())
        .unwrap();
    assert_eq!(orch.size_column(), FILE_SIZE);

    let handle = orch.start_scan(&seed, FilterSet::default()).unwrap();
    let (last, tree) = finish(handle);
    assert!(matches!(last, ScanProgress::Complete { error_count: 0, .. }));
    assert_eq!(orch.units_scanned_so_far(), 1_000);

    let root = tree.root();
    assert_eq!(tree.node(root).stats.total_value, 1_000.0);
    assert_eq!(tree.node(root).stats.content_value, 400.0);
    assert_eq!(tree.node(root).stats.total_item_count, 4);

    let alpha = child_named(&tree, root, "alpha");
    assert_eq!(tree.node(alpha).stats.total_value, 300.0);
    assert_eq!(tree.node(alpha).stats.local_item_count, 2);

    // Largest subtree first.
    let order: Vec<_> = tree
        .children_sorted_by_total(root)
        .into_iter()
        .map(|c| tree.node(c).name.to_string())
        .collect();
    assert_eq!(order, vec!["alpha", "beta"]);
}

#[test]
fn filters_and_item_count_apply_during_scan() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let orch = fs_orchestrator();
    orch.set_size_column(standard::ITEM_COUNT);
    let seed = Seed::from_path(tmp.path(), SourceKind::FileSystem);
    let filters = FilterSet::new(vec![Filter::on(EXTENSION, FilterOperator::DoesNotContain, "zip")]);

    let (_, tree) = finish(orch.start_scan(&seed, filters.clone()).unwrap());
    assert_eq!(tree.node(tree.root()).stats.total_value, 3.0);

    let details = detail_items(&tree, tree.root(), standard::ITEM_COUNT, &filters, true, 10);
    assert_eq!(details.items.len(), 3);
    assert!(details.items.iter().all(|d| d.record.name() != "d.zip"));

    let extensions = common_values(&tree, tree.root(), EXTENSION, 50);
    assert_eq!(extensions, vec!["png", "rs", "txt", "zip"]);
}

#[test]
fn heatmap_buckets_are_assigned() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let orch = fs_orchestrator();
    orch.set_heatmap_column(Some(FILE_SIZE.to_string()));
    let seed = Seed::from_path(tmp.path(), SourceKind::FileSystem);
    let (_, tree) = finish(orch.start_scan(&seed, FilterSet::default()).unwrap());

    assert!(tree.nodes().iter().all(|n| n.stats.heatmap_bucket.is_some()));
    // Own bytes: root 400, alpha 300, beta 300.
    let root_bucket = tree.node(tree.root()).stats.heatmap_bucket.unwrap();
    let beta = child_named(&tree, tree.root(), "beta");
    assert!(root_bucket >= tree.node(beta).stats.heatmap_bucket.unwrap());
}

#[test]
fn missing_directory_fails_before_scanning() {
    let tmp = TempDir::new().unwrap();
    let orch = fs_orchestrator();
    let seed = Seed::from_path(&tmp.path().join("nope"), SourceKind::FileSystem);

    assert!(matches!(
        orch.start_scan(&seed, FilterSet::default()),
        Err(ScanError::Seed(SeedError::DirectoryNotFound(_)))
    ));
    assert!(!orch.is_scanning());
}

#[test]
fn cancelled_scan_returns_partial_tree_without_error() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());

    let orch = fs_orchestrator();
    let seed = Seed::from_path(tmp.path(), SourceKind::FileSystem);
    let handle = orch.start_scan(&seed, FilterSet::default()).unwrap();
    handle.cancel();
    let (last, tree) = finish(handle);

    // The scan may have finished before the flag was seen.
    match last {
        ScanProgress::Cancelled => {
            assert!(tree.node(tree.root()).stats.total_value <= 1_000.0)
        }
        ScanProgress::Complete { .. } => {
            assert_eq!(tree.node(tree.root()).stats.total_value, 1_000.0)
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!orch.is_scanning());
}

// ── Spreadsheet ──────────────────────────────────────────────────────────────

const SHEET: &str = "File\tOwner\tLines\n\
                     src/main.rs\tann\t120\n\
                     src/scan/walk.rs\tbo\t80\n\
                     docs/guide.md\tann\t300\n\
                     README.md\tcy\t40\n";

#[test]
fn spreadsheet_scan_through_registry() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("code.tsv");
    fs::write(&file, SHEET).unwrap();

    let config = EngineConfig::default();
    let handlers = HandlerRegistry::with_builtin().instantiate(&config);
    let location = file.to_str().unwrap();
    let handler = handlers
        .iter()
        .find(|h| h.try_resolve_location(location).is_some())
        .unwrap()
        .clone();
    assert_eq!(handler.kind(), SourceKind::Spreadsheet);
    let seed = handler.try_resolve_location(location).unwrap();

    let orch = ScanOrchestrator::new(handler, Arc::new(Aggregator::global()), &config);
    assert!(orch.prepare(&seed).unwrap());
    assert_eq!(orch.handler().path_column(), "File");
    orch.set_size_column("Lines");

    let (last, tree) = finish(orch.start_scan(&seed, FilterSet::default()).unwrap());
    assert!(matches!(last, ScanProgress::Complete { .. }));
    assert_eq!(orch.units_scanned_so_far(), 4);

    let root = tree.root();
    assert_eq!(tree.node(root).name, "(root)");
    assert_eq!(tree.node(root).stats.total_value, 540.0);
    let src = child_named(&tree, root, "src");
    assert_eq!(tree.node(src).stats.total_value, 200.0);
    let scan = child_named(&tree, src, "scan");
    assert_eq!(tree.node(scan).full_path, "(root)/src/scan");
    assert_eq!(tree.node(scan).depth, 2);
}

#[test]
fn cancelling_a_large_spreadsheet_stops_the_load() {
    const ROWS: u64 = 200_000;
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("big.tsv");
    let mut body = String::from("File\tLines\n");
    for i in 0..ROWS {
        body.push_str(&format!("d{}/f{i}\t{}\n", i % 100, i % 7));
    }
    fs::write(&file, body).unwrap();

    let options = SpreadsheetOptions {
        batch_size: 500,
        ..SpreadsheetOptions::default()
    };
    let orch = ScanOrchestrator::new(
        Arc::new(SpreadsheetHandler::new(options)),
        Arc::new(Aggregator::global()),
        &EngineConfig::default(),
    );
    let seed = Seed::from_path(&file, SourceKind::Spreadsheet);
    let handle = orch.start_scan(&seed, FilterSet::default()).unwrap();

    // Rows are counted while the file is still being parsed.
    while orch.units_scanned_so_far() == 0 && !handle.is_finished() {
        std::hint::spin_loop();
    }
    handle.cancel();
    let (last, tree) = finish(handle);
    let units = orch.units_scanned_so_far();

    // The load may have finished before the flag was seen.
    match last {
        ScanProgress::Cancelled => {
            assert!(units <= ROWS);
            assert!(tree.record_count() as u64 <= units);
        }
        ScanProgress::Complete { .. } => assert_eq!(units, ROWS),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!orch.is_scanning());
}

#[test]
fn spreadsheet_placeholder_seed_is_rejected() {
    let handlers = HandlerRegistry::with_builtin().instantiate(&EngineConfig::default());
    let sheet = handlers
        .iter()
        .find(|h| h.kind() == SourceKind::Spreadsheet)
        .unwrap();
    let seed = &sheet.default_seeds()[0];
    assert!(matches!(sheet.validate_seed(seed), Err(SeedError::Unsupported(_))));
}
