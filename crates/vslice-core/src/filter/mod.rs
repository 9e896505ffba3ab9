/// Item filters.
///
/// A [`Filter`] is one predicate over one column of an [`ItemRecord`]. Filters
/// are fail-open: a filter that is incomplete or cannot be compiled allows
/// every item, so a half-typed filter never blanks the chart.
///
/// A [`FilterSet`] is an immutable snapshot of filters combined with AND. It
/// is what scans and recalculations receive, so editing filters while either
/// runs cannot change the set mid-pass.
pub mod date;

use crate::error::FilterParseError;
use crate::model::{parse_number, ItemRecord};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

pub use date::parse_date_time;

static NEXT_FILTER_ID: AtomicU32 = AtomicU32::new(1);

fn next_filter_id() -> u32 {
    NEXT_FILTER_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// The fixed set of comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "==")]
    EqualTo,
    #[serde(rename = "!=")]
    NotEqualTo,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    Contains,
    DoesNotContain,
    BeforeDate,
    AfterDate,
    Regex,
}

impl FilterOperator {
    /// Every operator, in the order a picker shows them.
    pub const ALL: [FilterOperator; 9] = [
        Self::EqualTo,
        Self::GreaterThan,
        Self::LessThan,
        Self::NotEqualTo,
        Self::Contains,
        Self::DoesNotContain,
        Self::BeforeDate,
        Self::AfterDate,
        Self::Regex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EqualTo => "==",
            Self::NotEqualTo => "!=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Contains => "Contains",
            Self::DoesNotContain => "DoesNotContain",
            Self::BeforeDate => "BeforeDate",
            Self::AfterDate => "AfterDate",
            Self::Regex => "Regex",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterParseError;

    /// Symbols match exactly; named operators match ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FilterParseError::UnknownOperator(s.to_string()))
    }
}

/// Filter state derived from the user-editable fields.
#[derive(Debug, Clone)]
enum Compiled {
    /// Fail-open: allows everything.
    Invalid,
    Comparison { number: Option<f64>, folded: String },
    Substring { folded: String },
    Pattern(Regex),
    Date(DateTime<Utc>),
}

/// One predicate over a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "FilterDef", into = "FilterDef")]
pub struct Filter {
    id: u32,
    column: Option<String>,
    operator: FilterOperator,
    text: String,
    case_sensitive: bool,
    value_column: bool,
    compiled: Compiled,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    /// An empty filter with a fresh id. It is invalid until a column and
    /// some text are set.
    pub fn new() -> Self {
        Self {
            id: next_filter_id(),
            column: None,
            operator: FilterOperator::EqualTo,
            text: String::new(),
            case_sensitive: false,
            value_column: false,
            compiled: Compiled::Invalid,
        }
    }

    /// Shorthand for a complete case-insensitive text filter.
    pub fn on(column: impl Into<String>, operator: FilterOperator, text: impl Into<String>) -> Self {
        Self::new()
            .with_column(column)
            .with_operator(operator)
            .with_text(text)
    }

    /// Parse `<column> <operator> <text>`.
    ///
    /// The column may contain spaces; the first whitespace-separated token
    /// that names an operator splits the expression.
    pub fn parse(expr: &str) -> Result<Self, FilterParseError> {
        let tokens = tokens_with_offsets(expr);
        let op_pos = tokens
            .iter()
            .position(|(_, t)| t.parse::<FilterOperator>().is_ok())
            .ok_or_else(|| match tokens.get(1) {
                Some((_, t)) => FilterParseError::UnknownOperator((*t).to_string()),
                None => FilterParseError::Malformed(expr.to_string()),
            })?;
        if op_pos == 0 || op_pos + 1 >= tokens.len() {
            return Err(FilterParseError::Malformed(expr.to_string()));
        }
        let operator: FilterOperator = tokens[op_pos].1.parse()?;
        let column = tokens[..op_pos]
            .iter()
            .map(|(_, t)| *t)
            .collect::<Vec<_>>()
            .join(" ");
        let text = expr[tokens[op_pos + 1].0..].trim_end();
        Ok(Self::on(column, operator, text))
    }

    // ── Builder-style setters ────────────────────────────────────

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.set_column(Some(column.into()));
        self
    }

    pub fn with_operator(mut self, operator: FilterOperator) -> Self {
        self.set_operator(operator);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.set_case_sensitive(yes);
        self
    }

    pub fn value_column(mut self, yes: bool) -> Self {
        self.set_value_column(yes);
        self
    }

    // ── In-place setters (each recompiles) ───────────────────────

    pub fn set_column(&mut self, column: Option<String>) {
        self.column = column.filter(|c| !c.is_empty());
        self.recompile();
    }

    pub fn set_operator(&mut self, operator: FilterOperator) {
        self.operator = operator;
        self.recompile();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.recompile();
    }

    pub fn set_case_sensitive(&mut self, yes: bool) {
        self.case_sensitive = yes;
        self.recompile();
    }

    /// Mark the column as numeric so `==`, `!=`, `>` and `<` compare numbers.
    pub fn set_value_column(&mut self, yes: bool) {
        self.value_column = yes;
    }

    // ── Accessors ────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn is_value_column(&self) -> bool {
        self.value_column
    }

    /// A filter is valid when it has a column, non-empty text, and the text
    /// compiles for the operator (a pattern for `Regex`, a date for the date
    /// operators).
    pub fn is_valid(&self) -> bool {
        !matches!(self.compiled, Compiled::Invalid)
    }

    fn recompile(&mut self) {
        self.compiled = self.compile();
    }

    fn compile(&self) -> Compiled {
        if self.column.is_none() || self.text.is_empty() {
            return Compiled::Invalid;
        }
        match self.operator {
            FilterOperator::Regex => RegexBuilder::new(&self.text)
                .case_insensitive(!self.case_sensitive)
                .build()
                .map_or(Compiled::Invalid, Compiled::Pattern),
            FilterOperator::BeforeDate | FilterOperator::AfterDate => {
                parse_date_time(&self.text).map_or(Compiled::Invalid, Compiled::Date)
            }
            FilterOperator::Contains | FilterOperator::DoesNotContain => Compiled::Substring {
                folded: self.fold(&self.text),
            },
            FilterOperator::EqualTo
            | FilterOperator::NotEqualTo
            | FilterOperator::GreaterThan
            | FilterOperator::LessThan => Compiled::Comparison {
                number: parse_number(&self.text),
                folded: self.text.to_lowercase(),
            },
        }
    }

    fn fold(&self, text: &str) -> String {
        if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }

    /// Returns `true` if `item` passes this filter.
    ///
    /// Never fails: an invalid filter, a column the item does not have, or an
    /// item value that cannot be read for the operator all allow the item.
    pub fn should_allow(&self, item: &ItemRecord) -> bool {
        let Some(column) = self.column.as_deref() else {
            return true;
        };
        if !item.layout().has_column(column) {
            return true;
        }

        match &self.compiled {
            Compiled::Invalid => true,

            Compiled::Pattern(re) => match item.text(column) {
                Some(value) => re.is_match(&value),
                None => true,
            },

            Compiled::Substring { folded } => {
                let Some(value) = item.text(column) else {
                    return true;
                };
                let found = self.fold(&value).contains(folded.as_str());
                if self.operator == FilterOperator::DoesNotContain {
                    !found
                } else {
                    found
                }
            }

            Compiled::Date(bound) => {
                let Some(value) = item.text(column).as_deref().and_then(parse_date_time) else {
                    return true;
                };
                if self.operator == FilterOperator::BeforeDate {
                    value < *bound
                } else {
                    value > *bound
                }
            }

            Compiled::Comparison { number, folded } => {
                let ordering = match number {
                    Some(n) if self.value_column => item.value(column).partial_cmp(n),
                    _ => match item.text(column) {
                        Some(value) => Some(self.compare_text(&value, folded)),
                        None => return true,
                    },
                };
                // NaN on either side compares unequal to everything.
                match (self.operator, ordering) {
                    (FilterOperator::EqualTo, o) => o == Some(Ordering::Equal),
                    (FilterOperator::NotEqualTo, o) => o != Some(Ordering::Equal),
                    (FilterOperator::GreaterThan, o) => o == Some(Ordering::Greater),
                    (_, o) => o == Some(Ordering::Less),
                }
            }
        }
    }

    /// Case-folded ordering; a case-sensitive filter breaks folded ties by
    /// the exact text.
    fn compare_text(&self, value: &str, folded_filter: &str) -> Ordering {
        let folded = value.to_lowercase().as_str().cmp(folded_filter);
        if self.case_sensitive {
            folded.then_with(|| value.cmp(self.text.as_str()))
        } else {
            folded
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.column.as_deref().unwrap_or(""),
            self.operator,
            self.text
        )
    }
}

/// Serialized form of a [`Filter`]. The id is session-local and the compiled
/// state is derived, so neither is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FilterDef {
    column: Option<String>,
    #[serde(default)]
    operator: FilterOperator,
    #[serde(default)]
    text: String,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    value_column: bool,
}

impl From<FilterDef> for Filter {
    fn from(def: FilterDef) -> Self {
        let mut filter = Filter::new();
        filter.column = def.column.filter(|c| !c.is_empty());
        filter.operator = def.operator;
        filter.text = def.text;
        filter.case_sensitive = def.case_sensitive;
        filter.value_column = def.value_column;
        filter.recompile();
        filter
    }
}

impl From<Filter> for FilterDef {
    fn from(f: Filter) -> Self {
        Self {
            column: f.column,
            operator: f.operator,
            text: f.text,
            case_sensitive: f.case_sensitive,
            value_column: f.value_column,
        }
    }
}

/// Whitespace-separated tokens with their byte offsets in `s`.
fn tokens_with_offsets(s: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, ch) in s.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(st)) => {
                out.push((st, &s[st..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, &s[st..]));
    }
    out
}

/// Immutable snapshot of filters, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct FilterSet(Arc<[Filter]>);

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters.into())
    }

    /// Returns `true` if every filter allows `item`. An empty set allows
    /// everything.
    #[inline]
    pub fn allows(&self, item: &ItemRecord) -> bool {
        self.0.iter().all(|f| f.should_allow(item))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Filter>> for FilterSet {
    fn from(filters: Vec<Filter>) -> Self {
        Self::new(filters)
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnLayout;

    fn item(text: &str, numeric: f64) -> ItemRecord {
        let layout = Arc::new(ColumnLayout::new(["Numeric"], ["Text", "When"]));
        let mut r = ItemRecord::new("item", "root/item", layout);
        r.set_value("Text", text).unwrap();
        r.set_value("Numeric", numeric).unwrap();
        r
    }

    #[test]
    fn equal_to_text_and_numbers() {
        let it = item("Wow!", 222.4);
        let mut f = Filter::on("Text", FilterOperator::EqualTo, "wow!");
        assert!(f.should_allow(&it));

        f.set_case_sensitive(true);
        assert!(!f.should_allow(&it));

        f.set_text("Wo");
        assert!(!f.should_allow(&it));

        f.set_column(Some("NonExistent".into()));
        f.set_text("Wow!");
        assert!(f.should_allow(&it));

        f.set_column(Some("Numeric".into()));
        f.set_text("222.4");
        assert!(f.should_allow(&it));

        f.set_text("222.40");
        assert!(!f.should_allow(&it));

        f.set_value_column(true);
        assert!(f.should_allow(&it));

        f.set_text("222.401");
        assert!(!f.should_allow(&it));

        f.set_text("1000");
        assert!(f.should_allow(&item("Wow!", 1000.0)));

        // Non-numeric text on a value column falls back to text comparison.
        f.set_text("a");
        assert!(!f.should_allow(&it));
    }

    #[test]
    fn not_equal_to_mirrors_equal_to() {
        let it = item("Wow!", 222.4);
        let mut f = Filter::on("Text", FilterOperator::NotEqualTo, "wow!");
        assert!(!f.should_allow(&it));
        f.set_case_sensitive(true);
        assert!(f.should_allow(&it));

        f.set_column(Some("Numeric".into()));
        f.set_text("222.40");
        assert!(f.should_allow(&it));
        f.set_value_column(true);
        assert!(!f.should_allow(&it));
        f.set_text("a");
        assert!(f.should_allow(&it));
    }

    #[test]
    fn inequalities() {
        let it = item("Wow!", 222.4);
        let gt = |f: &Filter| f.clone().with_operator(FilterOperator::GreaterThan).should_allow(&it);
        let lt = |f: &Filter| f.clone().with_operator(FilterOperator::LessThan).should_allow(&it);

        let mut f = Filter::on("Text", FilterOperator::GreaterThan, "wzzz");
        assert!(!gt(&f) && lt(&f));
        f.set_case_sensitive(true);
        assert!(!gt(&f) && lt(&f));
        f.set_text("Wow!");
        assert!(!gt(&f) && !lt(&f));

        f.set_column(Some("NonExistent".into()));
        assert!(gt(&f) && lt(&f));

        f.set_column(Some("Numeric".into()));
        f.set_text("11111");
        assert!(gt(&f) && !lt(&f));
        f.set_value_column(true);
        assert!(!gt(&f) && lt(&f));
        f.set_text("222.401");
        assert!(!gt(&f) && lt(&f));
        f.set_text("222.40");
        assert!(!gt(&f) && !lt(&f));
        f.set_text("a");
        assert!(lt(&f));
    }

    #[test]
    fn contains_folds_case_unless_sensitive() {
        let it = item("Wow!", 222.4);
        let mut f = Filter::on("Text", FilterOperator::Contains, "OW");
        let not = |f: &Filter| f.clone().with_operator(FilterOperator::DoesNotContain).should_allow(&it);

        assert!(f.should_allow(&it) && !not(&f));
        f.set_case_sensitive(true);
        assert!(!f.should_allow(&it) && not(&f));
        f.set_text("ZZ");
        assert!(!f.should_allow(&it) && not(&f));
        f.set_case_sensitive(false);
        f.set_text("!");
        assert!(f.should_allow(&it) && !not(&f));

        f.set_column(Some("NonExistent".into()));
        assert!(f.should_allow(&it) && not(&f));

        f.set_column(Some("Numeric".into()));
        f.set_value_column(true);
        f.set_text("2.");
        assert!(f.should_allow(&it) && !not(&f));
        f.set_text("a");
        assert!(!f.should_allow(&it) && not(&f));
    }

    #[test]
    fn scenario_contains_lowercase_pattern() {
        let it = item("Wow!", 0.0);
        assert!(Filter::on("Text", FilterOperator::Contains, "ow").should_allow(&it));
        assert!(!Filter::on("Text", FilterOperator::Contains, "OW")
            .case_sensitive(true)
            .should_allow(&it));
    }

    #[test]
    fn regex_matches_and_fails_open() {
        let it = item("BUBBLES!", 222.4);
        let mut f = Filter::on("Text", FilterOperator::Regex, "[bu]+les");
        assert!(f.should_allow(&it));
        f.set_case_sensitive(true);
        assert!(!f.should_allow(&it));
        f.set_text("blah");
        assert!(!f.should_allow(&it));

        f.set_column(Some("Numeric".into()));
        f.set_text(r"2+\.4");
        assert!(f.should_allow(&it));

        f.set_text("2(");
        assert!(!f.is_valid());
        assert!(f.should_allow(&it));
    }

    #[test]
    fn dates_compare_strictly() {
        let layout = Arc::new(ColumnLayout::new(["Numeric"], ["Text", "When"]));
        let mut it = ItemRecord::new("item", "root/item", layout);
        it.set_value("When", "2018/10/10").unwrap();
        it.set_value("Text", "not a date").unwrap();

        let before = Filter::on("When", FilterOperator::BeforeDate, "2018/10/11");
        let after = Filter::on("When", FilterOperator::AfterDate, "2018/10/11");
        assert!(before.should_allow(&it));
        assert!(!after.should_allow(&it));

        let same_day = Filter::on("When", FilterOperator::BeforeDate, "2018-10-10");
        assert!(!same_day.should_allow(&it));

        assert!(before.clone().with_column("Text").should_allow(&it));
        assert!(before.clone().with_column("Missing").should_allow(&it));

        let bad = Filter::on("When", FilterOperator::AfterDate, "dfdfdf");
        assert!(!bad.is_valid());
        assert!(bad.should_allow(&it));
    }

    #[test]
    fn incomplete_filters_are_invalid() {
        assert!(!Filter::new().is_valid());
        assert!(!Filter::new().with_column("Text").is_valid());
        assert!(!Filter::new().with_text("x").is_valid());
        assert!(Filter::on("Text", FilterOperator::EqualTo, "x").is_valid());
    }

    #[test]
    fn set_requires_every_filter() {
        let it = item("Wow!", 5.0);
        let pass = Filter::on("Text", FilterOperator::Contains, "w");
        let fail = Filter::on("Numeric", FilterOperator::GreaterThan, "10").value_column(true);

        assert!(FilterSet::default().allows(&it));
        assert!(FilterSet::new(vec![pass.clone()]).allows(&it));
        assert!(!FilterSet::new(vec![pass, fail]).allows(&it));
    }

    #[test]
    fn ids_are_unique_and_survive_clone() {
        let a = Filter::new();
        let b = Filter::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn parses_expressions() {
        let f = Filter::parse("Item Count > 3").unwrap();
        assert_eq!(f.column(), Some("Item Count"));
        assert_eq!(f.operator(), FilterOperator::GreaterThan);
        assert_eq!(f.text(), "3");

        let f = Filter::parse("__Name contains my  file").unwrap();
        assert_eq!(f.operator(), FilterOperator::Contains);
        assert_eq!(f.text(), "my  file");

        assert!(matches!(
            Filter::parse("Size ~ 3"),
            Err(FilterParseError::UnknownOperator(_))
        ));
        assert!(matches!(
            Filter::parse("== 3"),
            Err(FilterParseError::Malformed(_))
        ));
        assert!(matches!(
            Filter::parse("Size =="),
            Err(FilterParseError::Malformed(_))
        ));
    }

    #[test]
    fn serde_keeps_definition() {
        let f = Filter::on("Text", FilterOperator::Regex, "^a").case_sensitive(true);
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"Regex\""));
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), f.to_string());
        assert!(back.is_case_sensitive());
        assert!(back.is_valid());
    }
}
