//! Categorical encoding with a fit mode and an apply mode
//!
//! Codes are dense integers assigned in first-seen order during fit. The
//! position of a category in the persisted list IS its code, so the table
//! serializes as a plain ordered list and nothing else.
//!
//! Apply mode never mutates a table and never fails: a category absent at fit
//! time maps to [`UNSEEN_CODE`] and is reported as an unseen-category
//! condition for monitoring.

use crate::errors::{PipelineError, Result};
use crate::record::RawPropertyRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// Reserved out-of-band code for categories never seen during fit.
pub const UNSEEN_CODE: i64 = -1;

/// Mapping from category string to its dense code for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct EncodingTable {
    categories: Vec<String>,
    index: HashMap<String, i64>,
}

/// Outcome of applying a table to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub code: i64,
    /// Set when the value was absent at fit time and `code` is the sentinel
    pub unseen: bool,
}

impl EncodingTable {
    /// Fit mode: assign each distinct value the next code in first-seen order.
    ///
    /// Input order fully determines the codes; nothing is sorted or routed
    /// through an unordered set before assignment.
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories = Vec::new();
        let mut index = HashMap::new();
        for value in values {
            let value = value.as_ref();
            if !index.contains_key(value) {
                index.insert(value.to_string(), categories.len() as i64);
                categories.push(value.to_string());
            }
        }
        Self { categories, index }
    }

    /// Apply mode: look up a value, falling back to [`UNSEEN_CODE`].
    pub fn apply(&self, value: &str) -> Encoded {
        match self.index.get(value) {
            Some(&code) => Encoded {
                code,
                unseen: false,
            },
            None => Encoded {
                code: UNSEEN_CODE,
                unseen: true,
            },
        }
    }

    /// Categories in code order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl TryFrom<Vec<String>> for EncodingTable {
    type Error = String;

    fn try_from(categories: Vec<String>) -> std::result::Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(categories.len());
        for (code, category) in categories.iter().enumerate() {
            if index.insert(category.clone(), code as i64).is_some() {
                return Err(format!("duplicate category `{category}` in encoding table"));
            }
        }
        Ok(Self { categories, index })
    }
}

impl From<EncodingTable> for Vec<String> {
    fn from(table: EncodingTable) -> Self {
        table.categories
    }
}

/// The categorical columns carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalColumn {
    Neighborhood,
    PostalCode,
    PropertyType,
}

impl CategoricalColumn {
    pub const ALL: [CategoricalColumn; 3] = [
        CategoricalColumn::Neighborhood,
        CategoricalColumn::PostalCode,
        CategoricalColumn::PropertyType,
    ];

    /// Key under which the table is persisted in `feature_info.encoders`.
    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::Neighborhood => "neighborhood",
            CategoricalColumn::PostalCode => "postal_code",
            CategoricalColumn::PropertyType => "property_type",
        }
    }

    pub fn value_of(self, record: &RawPropertyRecord) -> &str {
        match self {
            CategoricalColumn::Neighborhood => &record.neighborhood,
            CategoricalColumn::PostalCode => &record.postal_code,
            CategoricalColumn::PropertyType => &record.property_type,
        }
    }
}

impl fmt::Display for CategoricalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One encoding table per categorical column.
///
/// Built once by [`CategoricalEncoder::fit`], persisted, and loaded
/// read-only by the serving process. There is deliberately no method that
/// adds a category to an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalEncoder {
    neighborhood: EncodingTable,
    postal_code: EncodingTable,
    property_type: EncodingTable,
}

impl CategoricalEncoder {
    /// Fit all three tables over records in the given order.
    pub fn fit<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a RawPropertyRecord>,
        I::IntoIter: Clone,
    {
        let records = records.into_iter();
        let table_for = |column: CategoricalColumn| {
            EncodingTable::fit(records.clone().map(|r| column.value_of(r)))
        };
        Self {
            neighborhood: table_for(CategoricalColumn::Neighborhood),
            postal_code: table_for(CategoricalColumn::PostalCode),
            property_type: table_for(CategoricalColumn::PropertyType),
        }
    }

    /// Rebuild from persisted tables. Every categorical column must be present.
    pub fn from_tables(tables: &BTreeMap<String, EncodingTable>) -> Result<Self> {
        let take = |column: CategoricalColumn| {
            tables.get(column.name()).cloned().ok_or_else(|| {
                PipelineError::schema(format!("missing encoding table for `{column}`"))
            })
        };
        Ok(Self {
            neighborhood: take(CategoricalColumn::Neighborhood)?,
            postal_code: take(CategoricalColumn::PostalCode)?,
            property_type: take(CategoricalColumn::PropertyType)?,
        })
    }

    /// Tables keyed by persisted column name.
    pub fn to_tables(&self) -> BTreeMap<String, EncodingTable> {
        CategoricalColumn::ALL
            .iter()
            .map(|&c| (c.name().to_string(), self.table(c).clone()))
            .collect()
    }

    pub fn table(&self, column: CategoricalColumn) -> &EncodingTable {
        match column {
            CategoricalColumn::Neighborhood => &self.neighborhood,
            CategoricalColumn::PostalCode => &self.postal_code,
            CategoricalColumn::PropertyType => &self.property_type,
        }
    }

    /// Apply mode for one column. Unseen values are logged, never raised.
    pub fn apply(&self, column: CategoricalColumn, value: &str) -> Encoded {
        let encoded = self.table(column).apply(value);
        if encoded.unseen {
            warn!(
                column = column.name(),
                value,
                sentinel = UNSEEN_CODE,
                "unseen category mapped to sentinel"
            );
        }
        encoded
    }

    /// Apply mode for a record's column.
    pub fn encode(&self, column: CategoricalColumn, record: &RawPropertyRecord) -> Encoded {
        self.apply(column, column.value_of(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::midtown_record;

    #[test]
    fn codes_follow_first_seen_order() {
        let table = EncodingTable::fit(["Midtown", "Downtown", "Midtown", "Frayser", "Downtown"]);
        assert_eq!(table.categories(), &["Midtown", "Downtown", "Frayser"]);
        assert_eq!(table.apply("Midtown").code, 0);
        assert_eq!(table.apply("Downtown").code, 1);
        assert_eq!(table.apply("Frayser").code, 2);
    }

    #[test]
    fn fit_then_apply_reproduces_fit_codes() {
        let values = ["b", "a", "c", "a", "b", "d"];
        let table = EncodingTable::fit(values);
        let codes: Vec<i64> = values.iter().map(|v| table.apply(v).code).collect();
        assert_eq!(codes, vec![0, 1, 2, 1, 0, 3]);
    }

    #[test]
    fn unseen_maps_to_sentinel_without_growing() {
        let table = EncodingTable::fit(["Condo", "Townhouse"]);
        let before = table.clone();
        for _ in 0..5 {
            let encoded = table.apply("Castle");
            assert_eq!(encoded.code, UNSEEN_CODE);
            assert!(encoded.unseen);
        }
        assert_eq!(table, before);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_string_is_a_category_like_any_other() {
        let table = EncodingTable::fit(["", "x"]);
        assert_eq!(table.apply("").code, 0);
        assert!(!table.apply("").unseen);
    }

    #[test]
    fn serializes_as_positional_list() {
        let table = EncodingTable::fit(["Single Family", "Condo"]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"["Single Family","Condo"]"#);

        let restored: EncodingTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, table);
        assert_eq!(restored.apply("Condo").code, 1);
    }

    #[test]
    fn duplicate_categories_are_rejected_on_load() {
        let result: std::result::Result<EncodingTable, _> =
            serde_json::from_str(r#"["Condo","Condo"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn encoder_fits_every_column() {
        let first = midtown_record();
        let mut second = midtown_record();
        second.neighborhood = "Downtown".to_string();
        second.postal_code = "38103".to_string();
        second.property_type = "Condo".to_string();

        let encoder = CategoricalEncoder::fit([&first, &second]);
        assert_eq!(encoder.encode(CategoricalColumn::Neighborhood, &second).code, 1);
        assert_eq!(encoder.encode(CategoricalColumn::PostalCode, &first).code, 0);
        assert_eq!(encoder.encode(CategoricalColumn::PropertyType, &second).code, 1);
    }

    #[test]
    fn from_tables_requires_all_columns() {
        let encoder = CategoricalEncoder::fit([&midtown_record()]);
        let mut tables = encoder.to_tables();
        assert_eq!(CategoricalEncoder::from_tables(&tables).unwrap(), encoder);

        tables.remove("postal_code");
        let err = CategoricalEncoder::from_tables(&tables).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
