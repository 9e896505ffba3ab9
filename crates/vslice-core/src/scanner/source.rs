/// The enumeration seam between the scanner and a data domain.
use crate::error::SourceError;
use crate::model::ItemRecord;

/// One container of a hierarchical source: a directory, a registry key, a
/// path prefix of a spreadsheet.
///
/// Listings are repeatable: calling either method again yields the same
/// result. A failure affects only this container; the scanner logs it and
/// carries on with the rest of the tree.
pub trait DirectorySource: Send {
    /// Display name of this level.
    fn name(&self) -> &str;

    /// Full path of this level.
    fn full_path(&self) -> &str;

    /// Leaf items directly inside this container.
    fn list_items(&self) -> Result<Vec<ItemRecord>, SourceError>;

    /// Child containers, in the order they should appear.
    fn list_children(&self) -> Result<Vec<Box<dyn DirectorySource>>, SourceError>;

    /// Progress units one item accounts for. Defaults to one per item.
    fn units_of(&self, _item: &ItemRecord) -> u64 {
        1
    }
}
