//! Column type classification
//!
//! Keyword sets follow DuckDB 1.x type names and their aliases.

use quack_ir::Category;

const NUMERIC_TYPES: &[&str] = &[
    "bigint", "dec", "decimal", "double", "float", "float4", "float8", "hugeint", "int",
    "int1", "int128", "int16", "int2", "int32", "int4", "int64", "int8", "integer",
    "integral", "long", "numeric", "real", "short", "signed", "smallint", "tinyint",
    "ubigint", "uhugeint", "uint128", "uint16", "uint32", "uint64", "uint8", "uinteger",
    "usmallint", "utinyint", "varint",
];

const TEXT_TYPES: &[&str] = &["bpchar", "char", "nvarchar", "string", "text", "varchar"];

const TEMPORAL_TYPES: &[&str] = &[
    "date",
    "datetime",
    "time",
    "timestamp",
    "timestamp_ms",
    "timestamp_ns",
    "timestamp_s",
    "timestamp_us",
    "timestamptz",
    "timestamp with time zone",
    "timetz",
    "time with time zone",
    "interval",
];

/// Which parts of a point in time a temporal type carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// Calendar date and clock time
    Timestamp,
    Date,
    /// Clock time without a date
    Time,
    /// A duration
    Interval,
}

fn base_keyword(raw_type: &str) -> String {
    raw_type
        .trim()
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Refine a temporal type; `None` for anything that is not temporal
pub fn temporal_kind(raw_type: &str) -> Option<TemporalKind> {
    if classify(raw_type) != Category::Temporal {
        return None;
    }
    let kind = match base_keyword(raw_type).as_str() {
        "date" => TemporalKind::Date,
        "time" | "timetz" | "time with time zone" => TemporalKind::Time,
        "interval" => TemporalKind::Interval,
        _ => TemporalKind::Timestamp,
    };
    Some(kind)
}

/// Map a raw storage type to its semantic category
///
/// Parameterized types match on their base keyword (`DECIMAL(10,2)` is
/// numeric). List and composite types, and anything unrecognized, are
/// [`Category::Other`].
pub fn classify(raw_type: &str) -> Category {
    let trimmed = raw_type.trim();
    if trimmed.ends_with(']') {
        return Category::Other;
    }

    let base = base_keyword(trimmed);

    if NUMERIC_TYPES.contains(&base.as_str()) {
        Category::Numeric
    } else if TEXT_TYPES.contains(&base.as_str()) {
        Category::Text
    } else if TEMPORAL_TYPES.contains(&base.as_str()) {
        Category::Temporal
    } else {
        Category::Other
    }
}
