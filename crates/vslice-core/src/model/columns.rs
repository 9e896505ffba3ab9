/// Column layouts shared by all records produced from one source.
///
/// A layout is built once per handler (or per spreadsheet) and shared by
/// every [`ItemRecord`](super::ItemRecord) through an `Arc`, so each record
/// only stores its field values.
use std::collections::HashMap;

/// Names of the computed columns every record exposes.
pub mod standard {
    /// Always `1`; summing it counts items.
    pub const ITEM_COUNT: &str = "Item Count";
    /// The record's full path.
    pub const PATH: &str = "__Path";
    /// The record's own name.
    pub const NAME: &str = "__Name";
    /// Depth of the node holding the record (scan root = 0).
    pub const PATH_DEPTH: &str = "__PathDepth";

    /// Returns `true` if `name` is one of the computed columns.
    pub fn is_standard(name: &str) -> bool {
        matches!(name, ITEM_COUNT | PATH | NAME | PATH_DEPTH)
    }
}

/// How a stored column is meant to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// One stored column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered, typed set of stored columns with name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Vec<ColumnDef>,
    lookup: HashMap<String, usize>,
    path_column: String,
}

impl ColumnLayout {
    /// Build a layout from numeric and text column names, numeric first.
    ///
    /// The path column is the computed [`standard::PATH`].
    pub fn new<N, T>(numeric: N, text: T) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let defs = numeric
            .into_iter()
            .map(|n| ColumnDef {
                name: n.into(),
                kind: ColumnKind::Numeric,
            })
            .chain(text.into_iter().map(|n| ColumnDef {
                name: n.into(),
                kind: ColumnKind::Text,
            }))
            .collect();
        Self::from_defs(defs, standard::PATH.to_string())
    }

    /// Build a layout that keeps the source's own column order, as a
    /// spreadsheet does. `path_column` names the stored column holding paths.
    pub fn from_defs(columns: Vec<ColumnDef>, path_column: String) -> Self {
        let lookup = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            columns,
            lookup,
            path_column,
        }
    }

    /// Storage slot for `name`, if it is a stored column.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Kind of a stored or computed column.
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        match name {
            standard::ITEM_COUNT | standard::PATH_DEPTH => Some(ColumnKind::Numeric),
            standard::PATH | standard::NAME => Some(ColumnKind::Text),
            _ => self.index_of(name).map(|i| self.columns[i].kind),
        }
    }

    /// Number of stored columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column used as the item's path in detail displays.
    pub fn path_column(&self) -> &str {
        &self.path_column
    }

    /// Columns that can drive sizes and heatmaps: item count, path depth,
    /// then every stored numeric column.
    pub fn value_columns(&self) -> Vec<String> {
        [standard::ITEM_COUNT, standard::PATH_DEPTH]
            .into_iter()
            .map(str::to_string)
            .chain(
                self.columns
                    .iter()
                    .filter(|c| c.kind == ColumnKind::Numeric)
                    .map(|c| c.name.clone()),
            )
            .collect()
    }

    /// Every column a detail view can show.
    pub fn all_columns(&self) -> Vec<String> {
        [
            standard::PATH,
            standard::NAME,
            standard::ITEM_COUNT,
            standard::PATH_DEPTH,
        ]
        .into_iter()
        .map(str::to_string)
        .chain(self.columns.iter().map(|c| c.name.clone()))
        .collect()
    }

    /// Returns `true` if `name` is readable on records with this layout.
    pub fn has_column(&self, name: &str) -> bool {
        standard::is_standard(name) || self.lookup.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_columns_start_with_standard_numeric() {
        let layout = ColumnLayout::new(["FileSize"], ["FileTime"]);
        assert_eq!(
            layout.value_columns(),
            vec![standard::ITEM_COUNT, standard::PATH_DEPTH, "FileSize"]
        );
    }

    #[test]
    fn all_columns_include_text() {
        let layout = ColumnLayout::new(["FileSize"], ["FileTime", "Attributes"]);
        let all = layout.all_columns();
        assert_eq!(all.len(), 7);
        assert!(all.iter().any(|c| c == "Attributes"));
        assert_eq!(all[0], standard::PATH);
    }

    #[test]
    fn kinds_cover_standard_and_stored() {
        let layout = ColumnLayout::new(["Size"], ["Owner"]);
        assert_eq!(layout.kind_of("Size"), Some(ColumnKind::Numeric));
        assert_eq!(layout.kind_of("Owner"), Some(ColumnKind::Text));
        assert_eq!(layout.kind_of(standard::NAME), Some(ColumnKind::Text));
        assert_eq!(layout.kind_of(standard::ITEM_COUNT), Some(ColumnKind::Numeric));
        assert_eq!(layout.kind_of("Missing"), None);
    }

    #[test]
    fn fixed_order_layout_keeps_source_order() {
        let layout = ColumnLayout::from_defs(
            vec![
                ColumnDef { name: "File".into(), kind: ColumnKind::Text },
                ColumnDef { name: "Lines".into(), kind: ColumnKind::Numeric },
            ],
            "File".into(),
        );
        assert_eq!(layout.index_of("File"), Some(0));
        assert_eq!(layout.index_of("Lines"), Some(1));
        assert_eq!(layout.path_column(), "File");
    }
}
