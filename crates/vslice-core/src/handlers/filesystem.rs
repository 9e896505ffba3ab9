/// File system handler.
///
/// Walks real directories one level at a time. Each file becomes a record
/// with its size, modification time, attributes and extension; progress is
/// counted in bytes.
///
/// Symlinked directories are listed as plain items unless
/// [`FileSystemOptions::follow_symlinks`] is set, which keeps link cycles
/// from turning a scan into an endless walk.
use super::{ensure_kind, Seed, SourceKind, TreeHandler};
use crate::config::FileSystemOptions;
use crate::error::{ScanError, SeedError, SourceError};
use crate::model::format::UnitScale;
use crate::model::{ColumnLayout, FieldValue, ItemRecord};
use crate::scanner::{DirectorySource, ScanContext};
use chrono::{DateTime, Utc};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

pub const FILE_SIZE: &str = "FileSize";
pub const FILE_TIME: &str = "FileTime";
pub const ATTRIBUTES: &str = "Attributes";
pub const EXTENSION: &str = "Extension";

pub struct FileSystemHandler {
    options: FileSystemOptions,
    columns: Arc<ColumnLayout>,
}

impl FileSystemHandler {
    pub fn new(options: FileSystemOptions) -> Self {
        Self {
            options,
            columns: Arc::new(ColumnLayout::new(
                [FILE_SIZE],
                [FILE_TIME, ATTRIBUTES, EXTENSION],
            )),
        }
    }
}

impl TreeHandler for FileSystemHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::FileSystem
    }

    fn columns(&self) -> Arc<ColumnLayout> {
        self.columns.clone()
    }

    fn default_size_column(&self) -> String {
        FILE_SIZE.to_string()
    }

    fn default_seeds(&self) -> Vec<Seed> {
        filesystem_roots()
            .iter()
            .map(|root| Seed::from_path(root, SourceKind::FileSystem))
            .collect()
    }

    fn validate_seed(&self, seed: &Seed) -> Result<(), SeedError> {
        ensure_kind(self, seed)?;
        let path = Path::new(&seed.id);
        if path.is_dir() {
            Ok(())
        } else {
            Err(SeedError::DirectoryNotFound(path.to_path_buf()))
        }
    }

    fn try_resolve_location(&self, location: &str) -> Option<Seed> {
        let path = Path::new(location);
        path.is_dir()
            .then(|| Seed::from_path(path, SourceKind::FileSystem))
    }

    fn open_root(&self, seed: &Seed, _ctx: &ScanContext) -> Result<Box<dyn DirectorySource>, ScanError> {
        self.validate_seed(seed)?;
        let path = PathBuf::from(&seed.id);
        Ok(Box::new(FsDirectory::root(
            path,
            self.columns.clone(),
            self.options.clone(),
        )))
    }

    fn format_value(&self, column: &str, value: f64, root_total: f64) -> String {
        let scale = if column == FILE_SIZE {
            UnitScale::for_bytes(value)
        } else {
            UnitScale::for_total(root_total)
        };
        scale.format(value)
    }
}

/// Scan roots offered before the user picks a folder.
fn filesystem_roots() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        (b'A'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|p| p.is_dir())
            .collect()
    }
    #[cfg(not(windows))]
    {
        vec![PathBuf::from("/")]
    }
}

/// The root display name: for drives like "C:\", show "C:"; for folders,
/// show the folder name.
fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            let s = path.to_string_lossy();
            let trimmed = s.trim_end_matches(['\\', '/']);
            if trimmed.is_empty() {
                s.into_owned()
            } else {
                trimmed.to_string()
            }
        }
    }
}

struct FileEntry {
    name: String,
    path: PathBuf,
    metadata: Metadata,
    is_symlink: bool,
}

struct Listing {
    files: Vec<FileEntry>,
    dirs: Vec<PathBuf>,
}

/// One directory. The `read_dir` result is cached on first use, so both
/// listings see the same snapshot.
pub struct FsDirectory {
    path: PathBuf,
    name: String,
    full_path: String,
    columns: Arc<ColumnLayout>,
    options: FileSystemOptions,
    listing: OnceLock<Result<Listing, SourceError>>,
}

impl FsDirectory {
    pub fn root(path: PathBuf, columns: Arc<ColumnLayout>, options: FileSystemOptions) -> Self {
        let name = display_name(&path);
        Self::new(path, name, columns, options)
    }

    fn new(path: PathBuf, name: String, columns: Arc<ColumnLayout>, options: FileSystemOptions) -> Self {
        Self {
            full_path: path.to_string_lossy().into_owned(),
            path,
            name,
            columns,
            options,
            listing: OnceLock::new(),
        }
    }

    fn listing(&self) -> Result<&Listing, SourceError> {
        self.listing
            .get_or_init(|| read_listing(&self.path, &self.options))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn record(&self, entry: &FileEntry) -> ItemRecord {
        let meta = &entry.metadata;
        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
            .map_or(FieldValue::Empty, FieldValue::from);
        let extension = entry
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .map_or(FieldValue::Empty, FieldValue::from);

        ItemRecord::with_fields(
            entry.name.as_str(),
            entry.path.to_string_lossy(),
            self.columns.clone(),
            vec![
                FieldValue::from(meta.len()),
                modified,
                FieldValue::from(attributes(entry)),
                extension,
            ],
        )
    }
}

impl DirectorySource for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn list_items(&self) -> Result<Vec<ItemRecord>, SourceError> {
        Ok(self.listing()?.files.iter().map(|f| self.record(f)).collect())
    }

    fn list_children(&self) -> Result<Vec<Box<dyn DirectorySource>>, SourceError> {
        Ok(self
            .listing()?
            .dirs
            .iter()
            .map(|dir| {
                let name = display_name(dir);
                Box::new(FsDirectory::new(
                    dir.clone(),
                    name,
                    self.columns.clone(),
                    self.options.clone(),
                )) as Box<dyn DirectorySource>
            })
            .collect())
    }

    fn units_of(&self, item: &ItemRecord) -> u64 {
        item.value(FILE_SIZE) as u64
    }
}

fn read_listing(path: &Path, options: &FileSystemOptions) -> Result<Listing, SourceError> {
    let shown_path = path.to_string_lossy();
    let entries = fs::read_dir(path).map_err(|e| SourceError::from_io(shown_path.as_ref(), &e))?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(path = %shown_path, error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !options.include_hidden && name.starts_with('.') {
            continue;
        }
        let entry_path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                debug!(path = %entry_path.display(), error = %err, "cannot read file type");
                continue;
            }
        };

        let is_symlink = file_type.is_symlink();
        let metadata = if is_symlink && options.follow_symlinks {
            fs::metadata(&entry_path)
        } else {
            fs::symlink_metadata(&entry_path)
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(err) => {
                debug!(path = %entry_path.display(), error = %err, "cannot stat entry");
                continue;
            }
        };

        if metadata.is_dir() {
            dirs.push(entry_path);
        } else {
            files.push(FileEntry {
                name,
                path: entry_path,
                metadata,
                is_symlink,
            });
        }
    }

    // read_dir order is unspecified; sort for repeatable listings.
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.sort();
    Ok(Listing { files, dirs })
}

fn attributes(entry: &FileEntry) -> String {
    let mut flags = Vec::new();
    if entry.metadata.permissions().readonly() {
        flags.push("ReadOnly");
    }
    if entry.name.starts_with('.') {
        flags.push("Hidden");
    }
    if entry.is_symlink {
        flags.push("Symlink");
    }
    if flags.is_empty() {
        "Normal".to_string()
    } else {
        flags.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, bytes: usize) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(&vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn lists_files_and_children() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "b.txt", 20);
        write_file(tmp.path(), "a.LOG", 10);
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let handler = FileSystemHandler::new(FileSystemOptions::default());
        let seed = handler.try_resolve_location(tmp.path().to_str().unwrap()).unwrap();
        let root = handler.open_root(&seed, &ScanContext::default()).unwrap();

        let items = root.list_items().unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["a.LOG", "b.txt"]);
        assert_eq!(items[0].value(FILE_SIZE), 10.0);
        assert_eq!(items[0].text(EXTENSION).as_deref(), Some("log"));
        assert!(items[0].text(FILE_TIME).is_some());
        assert_eq!(root.units_of(&items[1]), 20);

        let children = root.list_children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "sub");

        // Listings are repeatable.
        assert_eq!(root.list_items().unwrap().len(), 2);
    }

    #[test]
    fn hidden_files_can_be_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), ".hidden", 1);
        write_file(tmp.path(), "shown", 1);

        let options = FileSystemOptions {
            include_hidden: false,
            ..FileSystemOptions::default()
        };
        let dir = FsDirectory::root(
            tmp.path().to_path_buf(),
            FileSystemHandler::new(options.clone()).columns(),
            options,
        );
        let items = dir.list_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name(), "shown");
    }

    #[test]
    fn missing_directory_is_a_source_error() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("gone");
        let dir = FsDirectory::root(
            gone,
            FileSystemHandler::new(FileSystemOptions::default()).columns(),
            FileSystemOptions::default(),
        );
        assert!(matches!(dir.list_items(), Err(SourceError::Io { .. })));
        assert!(dir.list_children().is_err());
    }

    #[test]
    fn seeds_validate_against_the_file_system() {
        let handler = FileSystemHandler::new(FileSystemOptions::default());
        assert!(!handler.default_seeds().is_empty());

        let tmp = tempfile::tempdir().unwrap();
        let missing = Seed::from_path(&tmp.path().join("nope"), SourceKind::FileSystem);
        assert!(matches!(
            handler.validate_seed(&missing),
            Err(SeedError::DirectoryNotFound(_))
        ));

        let wrong = Seed::from_path(tmp.path(), SourceKind::Spreadsheet);
        assert!(matches!(
            handler.validate_seed(&wrong),
            Err(SeedError::WrongHandler { .. })
        ));
        assert!(handler.try_resolve_location("/definitely/not/here").is_none());
    }

    #[test]
    fn sizes_format_as_bytes() {
        let handler = FileSystemHandler::new(FileSystemOptions::default());
        assert_eq!(handler.format_value(FILE_SIZE, 1536.0, 1e9), "1.5 KB");
        assert_eq!(handler.format_value("Item Count", 5.0, 10.0), "5.0");
    }

    #[test]
    fn root_names() {
        assert_eq!(display_name(Path::new("/data/photos")), "photos");
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
