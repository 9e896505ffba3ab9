/// Columnar leaf record: one file, row, registry value or mail item.
///
/// A record stores one [`FieldValue`] per stored column of its shared
/// [`ColumnLayout`]. Computed columns (item count, name, path, path depth)
/// are answered from the record itself.
use super::columns::{standard, ColumnLayout};
use crate::error::ModelError;
use compact_str::CompactString;
use std::borrow::Cow;
use std::sync::Arc;

/// A single stored field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value was recorded for this column.
    #[default]
    Empty,
    Number(f64),
    Text(CompactString),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(CompactString::new(v))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(CompactString::from(v))
    }
}

impl From<CompactString> for FieldValue {
    fn from(v: CompactString) -> Self {
        Self::Text(v)
    }
}

/// Parse a numeric cell, rejecting NaN and infinities.
#[inline]
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One leaf item.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    name: CompactString,
    full_path: String,
    path_depth: u32,
    layout: Arc<ColumnLayout>,
    fields: Box<[FieldValue]>,
}

impl ItemRecord {
    /// Create a record with every stored field empty.
    pub fn new(
        name: impl Into<CompactString>,
        full_path: impl Into<String>,
        layout: Arc<ColumnLayout>,
    ) -> Self {
        let fields = vec![FieldValue::Empty; layout.len()].into_boxed_slice();
        Self {
            name: name.into(),
            full_path: full_path.into(),
            path_depth: 0,
            layout,
            fields,
        }
    }

    /// Create a record from a full row of fields in layout order.
    ///
    /// Short rows are padded with [`FieldValue::Empty`]; extra fields are
    /// dropped.
    pub fn with_fields(
        name: impl Into<CompactString>,
        full_path: impl Into<String>,
        layout: Arc<ColumnLayout>,
        mut fields: Vec<FieldValue>,
    ) -> Self {
        fields.resize(layout.len(), FieldValue::Empty);
        Self {
            name: name.into(),
            full_path: full_path.into(),
            path_depth: 0,
            layout,
            fields: fields.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    #[inline]
    pub fn layout(&self) -> &Arc<ColumnLayout> {
        &self.layout
    }

    /// Depth of the node that owns this record.
    #[inline]
    pub fn path_depth(&self) -> u32 {
        self.path_depth
    }

    pub(crate) fn set_path_depth(&mut self, depth: u32) {
        self.path_depth = depth;
    }

    /// Numeric magnitude of `column`.
    ///
    /// Signs carry no meaning for aggregation, so the absolute value is
    /// returned. Missing, empty, non-numeric and non-finite values read as 0.
    pub fn value(&self, column: &str) -> f64 {
        match column {
            standard::ITEM_COUNT => return 1.0,
            standard::PATH_DEPTH => return f64::from(self.path_depth),
            standard::NAME => return parse_number(&self.name).map_or(0.0, f64::abs),
            standard::PATH => return parse_number(&self.full_path).map_or(0.0, f64::abs),
            _ => {}
        }
        match self.stored(column) {
            Some(FieldValue::Number(v)) if v.is_finite() => v.abs(),
            Some(FieldValue::Text(t)) => parse_number(t).map_or(0.0, f64::abs),
            _ => 0.0,
        }
    }

    /// Text form of `column`, or `None` if the column is unknown or empty.
    pub fn text(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            standard::ITEM_COUNT => return Some(Cow::Borrowed("1")),
            standard::PATH_DEPTH => return Some(Cow::Owned(self.path_depth.to_string())),
            standard::NAME => return Some(Cow::Borrowed(self.name.as_str())),
            standard::PATH => return Some(Cow::Borrowed(self.full_path.as_str())),
            _ => {}
        }
        match self.stored(column)? {
            FieldValue::Empty => None,
            FieldValue::Number(v) => Some(Cow::Owned(v.to_string())),
            FieldValue::Text(t) => Some(Cow::Borrowed(t.as_str())),
        }
    }

    /// Set a stored field. Only used while a source is building the record.
    pub fn set_value(
        &mut self,
        column: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), ModelError> {
        if standard::is_standard(column) {
            return Err(ModelError::ReadOnlyColumn(column.to_string()));
        }
        let idx = self
            .layout
            .index_of(column)
            .ok_or_else(|| ModelError::UnknownColumn(column.to_string()))?;
        self.fields[idx] = value.into();
        Ok(())
    }

    #[inline]
    fn stored(&self, column: &str) -> Option<&FieldValue> {
        self.layout.index_of(column).map(|i| &self.fields[i])
    }
}
