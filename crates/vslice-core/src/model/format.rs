/// Value formatting.
///
/// All aggregates are `f64`. Every value shown for one tree goes through a
/// [`UnitScale`]: byte columns step through binary units per value, every
/// other column shares one decimal unit chosen from the root total so that
/// a whole chart reads in the same unit.

/// Binary byte units with the decimals each is shown with.
const BYTE_UNITS: [(&str, usize); 5] = [("B", 0), ("KB", 1), ("MB", 1), ("GB", 2), ("TB", 2)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    /// Whole numbers above 100, one decimal above 0.1, three below.
    Adaptive,
    /// Exactly this many decimals.
    Fixed(usize),
    /// Rounded whole number with thousands separators.
    Grouped,
}

/// Unit and precision for a displayed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    pub divisor: f64,
    pub suffix: &'static str,
    precision: Precision,
}

impl UnitScale {
    /// Plain counts: no unit, thousands separators.
    pub const COUNT: Self = Self {
        divisor: 1.0,
        suffix: "",
        precision: Precision::Grouped,
    };

    /// Pick the decimal unit for a tree whose root totals `root_total`.
    ///
    /// The thresholds leave at least a hundred units in the root, so the
    /// largest wedges never read as fractions.
    pub fn for_total(root_total: f64) -> Self {
        let milli = root_total / 1_000.0;
        let (divisor, suffix) = if milli > 1e8 {
            (1e9, "G")
        } else if milli > 1e5 {
            (1e6, "M")
        } else if milli > 100.0 {
            (1e3, "K")
        } else {
            (1.0, "")
        };
        Self {
            divisor,
            suffix,
            precision: Precision::Adaptive,
        }
    }

    /// The largest binary unit, up to TB, that keeps `bytes` at one or more.
    pub fn for_bytes(bytes: f64) -> Self {
        let mut divisor = 1.0;
        let mut unit = 0;
        while unit + 1 < BYTE_UNITS.len() && bytes.abs() >= divisor * 1024.0 {
            divisor *= 1024.0;
            unit += 1;
        }
        let (suffix, decimals) = BYTE_UNITS[unit];
        Self {
            divisor,
            suffix,
            precision: Precision::Fixed(decimals),
        }
    }

    /// Format `value` in this unit.
    pub fn format(&self, value: f64) -> String {
        let scaled = value / self.divisor;
        let number = match self.precision {
            Precision::Fixed(decimals) => format!("{scaled:.decimals$}"),
            Precision::Grouped => group_thousands(&format!("{scaled:.0}")),
            Precision::Adaptive if scaled > 100.0 => group_thousands(&format!("{scaled:.0}")),
            Precision::Adaptive if scaled > 0.1 => format!("{scaled:.1}"),
            Precision::Adaptive if scaled == 0.0 => "0".to_string(),
            Precision::Adaptive => format!("{scaled:.3}"),
        };
        if self.suffix.is_empty() {
            number
        } else {
            format!("{number} {}", self.suffix)
        }
    }
}

/// Progress and item counts, e.g. `1,234,567`.
pub fn format_count(count: u64) -> String {
    UnitScale::COUNT.format(count as f64)
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}
