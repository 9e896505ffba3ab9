/// Filter editing.
///
/// The session always has one filter being edited plus any number of stored
/// filters. Both take part in every recalculation; the current filter simply
/// allows everything until it is complete.
use vslice_core::model::standard;
use vslice_core::{Filter, FilterOperator, FilterSet};

#[derive(Debug, Clone, Default)]
pub struct FilterEditor {
    current: Filter,
    stored: Vec<Filter>,
}

impl FilterEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Filter {
        &self.current
    }

    pub fn stored(&self) -> &[Filter] {
        &self.stored
    }

    /// Select the column of the current filter. `is_value_column` makes
    /// comparisons numeric.
    pub fn set_column(&mut self, column: Option<String>, is_value_column: bool) {
        self.current.set_column(column);
        self.current.set_value_column(is_value_column);
    }

    pub fn set_operator(&mut self, operator: FilterOperator) {
        self.current.set_operator(operator);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.current.set_text(text);
    }

    pub fn set_case_sensitive(&mut self, yes: bool) {
        self.current.set_case_sensitive(yes);
    }

    /// Move the current filter to the stored list if it is valid. Returns
    /// `true` if it was stored.
    pub fn remember(&mut self) -> bool {
        if !self.current.is_valid() {
            return false;
        }
        let filter = std::mem::take(&mut self.current);
        self.stored.push(filter);
        true
    }

    /// Store a complete filter directly. Invalid filters are rejected.
    pub fn add(&mut self, filter: Filter) -> bool {
        if !filter.is_valid() {
            return false;
        }
        self.stored.push(filter);
        true
    }

    /// Start over with an empty current filter.
    pub fn reset_current(&mut self) {
        self.current = Filter::new();
    }

    /// Remove the stored filter with `id`. Returns `true` if one was removed.
    pub fn delete(&mut self, id: u32) -> bool {
        match self.stored.iter().position(|f| f.id() == id) {
            Some(pos) => {
                self.stored.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drop every filter, stored and current.
    pub fn clear_all(&mut self) {
        self.stored.clear();
        self.reset_current();
    }

    /// Store a filter hiding everything under `path`.
    pub fn exclude_path(&mut self, path: &str) {
        self.stored
            .push(Filter::on(standard::PATH, FilterOperator::DoesNotContain, path));
    }

    /// Snapshot for a scan or recalculation: the current filter first, then
    /// the stored ones.
    pub fn snapshot(&self) -> FilterSet {
        std::iter::once(self.current.clone())
            .chain(self.stored.iter().cloned())
            .collect()
    }
}
