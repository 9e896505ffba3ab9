/// Tab-separated spreadsheet handler.
///
/// Each data row becomes one item. A path column places the row in the tree:
/// the path is split on `/`, `\` or `|`, every segment but the last becomes a
/// folder under `(root)`, and the last segment names the item.
///
/// The pre-scan reads the header and a sample of rows to decide which columns
/// are numeric and which column holds paths. The result is kept as a
/// per-file schema inside the handler, so later scans of the same file skip
/// the sampling.
use super::{ensure_kind, Seed, SourceKind, TreeHandler};
use crate::config::SpreadsheetOptions;
use crate::error::{ScanError, SeedError, SourceError};
use crate::model::item_record::parse_number;
use crate::model::{standard, ColumnDef, ColumnKind, ColumnLayout, FieldValue, ItemRecord};
use crate::scanner::{DirectorySource, ScanContext};
use csv::StringRecord;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info};

/// Name of the folder every row hangs under.
pub const ROOT_NAME: &str = "(root)";

const PLACEHOLDER_SEED: &str = "Spreadsheet";
const PATH_DELIMITERS: [char; 3] = ['/', '\\', '|'];
/// Rows checked for duplicate values when choosing a path column.
const PATH_SAMPLE_ROWS: usize = 20;

/// What the pre-scan learned about one file.
#[derive(Debug)]
struct Schema {
    file: PathBuf,
    layout: Arc<ColumnLayout>,
    path_index: usize,
    size_column: String,
}

pub struct SpreadsheetHandler {
    options: SpreadsheetOptions,
    schema: RwLock<Option<Arc<Schema>>>,
    no_columns: Arc<ColumnLayout>,
}

impl SpreadsheetHandler {
    pub fn new(options: SpreadsheetOptions) -> Self {
        Self {
            options,
            schema: RwLock::new(None),
            no_columns: Arc::new(ColumnLayout::new([] as [&str; 0], [] as [&str; 0])),
        }
    }

    fn current_schema(&self) -> Option<Arc<Schema>> {
        self.schema.read().clone()
    }

    /// Schema for `file`, reading it if the cached one is for another file.
    fn schema_for(&self, file: &Path) -> Result<Arc<Schema>, SeedError> {
        if let Some(schema) = self.current_schema().filter(|s| s.file == file) {
            return Ok(schema);
        }
        let schema = Arc::new(read_schema(file, &self.options)?);
        *self.schema.write() = Some(schema.clone());
        Ok(schema)
    }
}

impl TreeHandler for SpreadsheetHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::Spreadsheet
    }

    fn columns(&self) -> Arc<ColumnLayout> {
        self.current_schema()
            .map_or_else(|| self.no_columns.clone(), |s| s.layout.clone())
    }

    fn default_size_column(&self) -> String {
        self.current_schema()
            .map_or_else(|| standard::ITEM_COUNT.to_string(), |s| s.size_column.clone())
    }

    fn default_seeds(&self) -> Vec<Seed> {
        vec![Seed::new(PLACEHOLDER_SEED, PLACEHOLDER_SEED, SourceKind::Spreadsheet)]
    }

    fn validate_seed(&self, seed: &Seed) -> Result<(), SeedError> {
        ensure_kind(self, seed)?;
        if seed.id == PLACEHOLDER_SEED {
            return Err(SeedError::Unsupported(
                "To scan a spreadsheet, open or drop a .tsv file. It needs at least one column \
                 holding item paths."
                    .to_string(),
            ));
        }
        let path = Path::new(&seed.id);
        if !path.is_file() {
            return Err(SeedError::FileNotFound(path.to_path_buf()));
        }
        if !is_tsv(path) {
            return Err(SeedError::Unsupported(format!(
                "{} is not a .tsv file",
                path.display()
            )));
        }
        Ok(())
    }

    fn try_resolve_location(&self, location: &str) -> Option<Seed> {
        let path = Path::new(location);
        (path.is_file() && is_tsv(path)).then(|| Seed::from_path(path, SourceKind::Spreadsheet))
    }

    fn handle_pre_scan(&self, seed: &Seed) -> Result<bool, SeedError> {
        self.validate_seed(seed)?;
        let schema = self.schema_for(Path::new(&seed.id))?;
        info!(
            file = %schema.file.display(),
            columns = schema.layout.len(),
            path_column = schema.layout.path_column(),
            size_column = %schema.size_column,
            "spreadsheet columns chosen"
        );
        Ok(true)
    }

    fn open_root(&self, seed: &Seed, ctx: &ScanContext) -> Result<Box<dyn DirectorySource>, ScanError> {
        self.validate_seed(seed)?;
        let schema = self.schema_for(Path::new(&seed.id))?;
        let load = Arc::new(SheetLoad {
            schema,
            delimiter: self.options.delimiter,
            batch_size: self.options.batch_size.max(1),
            scan: ctx.clone(),
            sheet: OnceLock::new(),
        });
        Ok(Box::new(SheetFolder::new(load, 0, ROOT_NAME.to_string(), ROOT_NAME.to_string())))
    }
}

fn is_tsv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("tsv"))
}

fn reader_for(file: &Path, delimiter: u8) -> csv::Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_path(file)
}

fn unreadable(file: &Path, err: impl ToString) -> SeedError {
    SeedError::Unreadable {
        path: file.to_path_buf(),
        message: err.to_string(),
    }
}

/// Read the header and type the columns from a sample of rows.
fn read_schema(file: &Path, options: &SpreadsheetOptions) -> Result<Schema, SeedError> {
    let mut reader = reader_for(file, options.delimiter).map_err(|e| unreadable(file, e))?;
    let names: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(file, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if names.iter().all(|n| n.trim().is_empty()) {
        return Err(SeedError::Unsupported(format!(
            "{} has no header row",
            file.display()
        )));
    }

    let mut has_text = vec![false; names.len()];
    let mut has_numbers = vec![false; names.len()];
    let mut samples: Vec<StringRecord> = Vec::new();
    for row in reader.records().take(options.sample_rows) {
        let row = match row {
            Ok(r) => r,
            Err(err) => {
                debug!(file = %file.display(), error = %err, "skipping unreadable sample row");
                continue;
            }
        };
        if row.len() < names.len() {
            continue;
        }
        for (i, cell) in row.iter().take(names.len()).enumerate() {
            if has_text[i] || cell.is_empty() {
                continue;
            }
            if parse_number(cell).is_some() {
                has_numbers[i] = true;
            } else {
                has_text[i] = true;
            }
        }
        if samples.len() < PATH_SAMPLE_ROWS {
            samples.push(row);
        }
    }

    let defs: Vec<ColumnDef> = names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnDef {
            name: name.clone(),
            kind: if has_numbers[i] && !has_text[i] {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            },
        })
        .collect();

    let path_index = choose_path_column(&defs, &samples, options.path_column.as_deref());
    let size_column = options
        .size_column
        .as_deref()
        .filter(|c| defs.iter().any(|d| d.name == *c && d.kind == ColumnKind::Numeric))
        .unwrap_or(standard::ITEM_COUNT)
        .to_string();
    let layout = ColumnLayout::from_defs(defs, names[path_index].clone());

    Ok(Schema {
        file: file.to_path_buf(),
        layout: Arc::new(layout),
        path_index,
        size_column,
    })
}

/// The configured column if it exists, else the first text column whose
/// sampled values are all distinct, else the first text column, else the
/// first column.
fn choose_path_column(defs: &[ColumnDef], samples: &[StringRecord], configured: Option<&str>) -> usize {
    if let Some(i) = configured.and_then(|c| defs.iter().position(|d| d.name == c)) {
        return i;
    }
    let text_columns: Vec<usize> = defs
        .iter()
        .enumerate()
        .filter(|(_, d)| d.kind == ColumnKind::Text)
        .map(|(i, _)| i)
        .collect();
    let unique = text_columns.iter().copied().find(|&i| {
        let mut seen = HashSet::new();
        samples.iter().all(|row| seen.insert(row.get(i).unwrap_or_default()))
    });
    unique.or_else(|| text_columns.first().copied()).unwrap_or(0)
}

/// Split a path cell into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(PATH_DELIMITERS)
        .filter(|s| !s.is_empty())
        .collect()
}

/// A parsed row: the folders it sits under and its record.
struct Row {
    folders: Vec<String>,
    record: ItemRecord,
}

fn parse_row(row: &StringRecord, layout: &Arc<ColumnLayout>, path_index: usize) -> Option<Row> {
    if row.len() < layout.len() {
        return None;
    }
    let path = row.get(path_index).unwrap_or_default();
    let mut segments = path_segments(path);
    let name = segments.pop().unwrap_or(ROOT_NAME).to_string();
    let full_path = std::iter::once(ROOT_NAME)
        .chain(segments.iter().copied())
        .chain(std::iter::once(name.as_str()))
        .collect::<Vec<_>>()
        .join("/");

    let fields = layout
        .columns()
        .iter()
        .zip(row.iter())
        .map(|(def, cell)| match (def.kind, parse_number(cell)) {
            _ if cell.is_empty() => FieldValue::Empty,
            (ColumnKind::Numeric, Some(v)) => FieldValue::Number(v),
            _ => FieldValue::from(cell),
        })
        .collect();

    Some(Row {
        folders: segments.into_iter().map(str::to_string).collect(),
        record: ItemRecord::with_fields(name, full_path, layout.clone(), fields),
    })
}

#[derive(Default)]
struct Folder {
    name: String,
    full_path: String,
    items: Vec<ItemRecord>,
    children: Vec<usize>,
    lookup: HashMap<String, usize>,
}

/// Whole spreadsheet as a folder arena. Index 0 is `(root)`.
struct Sheet {
    folders: Vec<Folder>,
}

impl Sheet {
    fn new() -> Self {
        Self {
            folders: vec![Folder {
                name: ROOT_NAME.to_string(),
                full_path: ROOT_NAME.to_string(),
                ..Folder::default()
            }],
        }
    }

    fn insert(&mut self, row: Row) {
        let mut at = 0;
        for segment in row.folders {
            at = match self.folders[at].lookup.get(&segment) {
                Some(&child) => child,
                None => {
                    let child = self.folders.len();
                    let full_path = format!("{}/{}", self.folders[at].full_path, segment);
                    self.folders[at].children.push(child);
                    self.folders[at].lookup.insert(segment.clone(), child);
                    self.folders.push(Folder {
                        name: segment,
                        full_path,
                        ..Folder::default()
                    });
                    child
                }
            };
        }
        self.folders[at].items.push(row.record);
    }
}

/// Shared state of one scan: the file is parsed the first time any folder
/// is listed. Parsed rows count as scanned units; a cancelled parse keeps
/// the batches finished so far.
struct SheetLoad {
    schema: Arc<Schema>,
    delimiter: u8,
    batch_size: usize,
    scan: ScanContext,
    sheet: OnceLock<Result<Sheet, SourceError>>,
}

impl SheetLoad {
    fn sheet(&self) -> Result<&Sheet, SourceError> {
        self.sheet
            .get_or_init(|| self.parse())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn parse(&self) -> Result<Sheet, SourceError> {
        let start = Instant::now();
        let file = &self.schema.file;
        let shown_path = file.to_string_lossy();
        let io_error = |err: csv::Error| SourceError::Io {
            path: shown_path.to_string(),
            message: err.to_string(),
        };

        let mut reader = reader_for(file, self.delimiter).map_err(io_error)?;
        let mut records = Vec::new();
        for row in reader.records() {
            match row {
                Ok(r) => records.push(r),
                Err(err) => debug!(file = %shown_path, error = %err, "skipping unreadable row"),
            }
        }

        let layout = &self.schema.layout;
        let path_index = self.schema.path_index;
        let ScanContext { cancel, counters } = &self.scan;
        let batches: Vec<Vec<Row>> = records
            .par_chunks(self.batch_size)
            .map(|chunk| {
                if cancel.is_cancelled() {
                    return Vec::new();
                }
                let rows = chunk
                    .iter()
                    .filter_map(|r| parse_row(r, layout, path_index))
                    .collect();
                counters.add_units(chunk.len() as u64);
                rows
            })
            .collect();

        let mut sheet = Sheet::new();
        let mut parsed = 0usize;
        for row in batches.into_iter().flatten() {
            sheet.insert(row);
            parsed += 1;
        }
        debug!(
            file = %shown_path,
            rows = records.len(),
            parsed,
            cancelled = cancel.is_cancelled(),
            folders = sheet.folders.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "spreadsheet parsed"
        );
        Ok(sheet)
    }
}

/// One folder of a parsed spreadsheet.
pub struct SheetFolder {
    load: Arc<SheetLoad>,
    index: usize,
    name: String,
    full_path: String,
}

impl SheetFolder {
    fn new(load: Arc<SheetLoad>, index: usize, name: String, full_path: String) -> Self {
        Self {
            load,
            index,
            name,
            full_path,
        }
    }
}

impl DirectorySource for SheetFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn list_items(&self) -> Result<Vec<ItemRecord>, SourceError> {
        Ok(self.load.sheet()?.folders[self.index].items.clone())
    }

    /// Rows are counted while the file is parsed.
    fn units_of(&self, _item: &ItemRecord) -> u64 {
        0
    }

    fn list_children(&self) -> Result<Vec<Box<dyn DirectorySource>>, SourceError> {
        let sheet = self.load.sheet()?;
        Ok(sheet.folders[self.index]
            .children
            .iter()
            .map(|&child| {
                let folder = &sheet.folders[child];
                Box::new(SheetFolder::new(
                    self.load.clone(),
                    child,
                    folder.name.clone(),
                    folder.full_path.clone(),
                )) as Box<dyn DirectorySource>
            })
            .collect())
    }
}
