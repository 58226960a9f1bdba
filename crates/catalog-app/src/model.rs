// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::ids::*;
use crate::validation::{format_cents, format_cents_input};

pub const PRODUCTS_COLLECTION: &str = "products";
pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [5, 10, 20];
pub const DEFAULT_ROWS_PER_PAGE: usize = 10;
pub const SUCCESS_TOAST_LIFE: Duration = Duration::from_millis(3000);
pub const ERROR_TOAST_LIFE: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemField {
    Name,
    Description,
    Category,
    Price,
    Amount,
}

impl ItemField {
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Description,
        Self::Category,
        Self::Price,
        Self::Amount,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Category => "category",
            Self::Price => "price",
            Self::Amount => "amount",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Description => "Description",
            Self::Category => "Category",
            Self::Price => "Price",
            Self::Amount => "Amount",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Name => 0,
            Self::Description => 1,
            Self::Category => 2,
            Self::Price => 3,
            Self::Amount => 4,
        }
    }
}

/// Static (field, header) pair for the product table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field: ItemField,
    pub header: &'static str,
}

pub const COLUMNS: [ColumnDescriptor; 5] = [
    ColumnDescriptor {
        field: ItemField::Name,
        header: ItemField::Name.label(),
    },
    ColumnDescriptor {
        field: ItemField::Description,
        header: ItemField::Description.label(),
    },
    ColumnDescriptor {
        field: ItemField::Category,
        header: ItemField::Category.label(),
    },
    ColumnDescriptor {
        field: ItemField::Price,
        header: ItemField::Price.label(),
    },
    ColumnDescriptor {
        field: ItemField::Amount,
        header: ItemField::Amount.label(),
    },
];

/// Field values of a product, as stored in a document. Missing document
/// keys decode to blank values. Documents carry `price` in currency units;
/// numeric fields also accept floats and numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFields {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(
        rename = "price",
        serialize_with = "numeric::serialize_price",
        deserialize_with = "numeric::deserialize_price"
    )]
    pub price_cents: i64,
    #[serde(deserialize_with = "numeric::deserialize_amount")]
    pub amount: i64,
}

impl ItemFields {
    pub fn display(&self, field: ItemField) -> String {
        match field {
            ItemField::Name => self.name.clone(),
            ItemField::Description => self.description.clone(),
            ItemField::Category => self.category.clone(),
            ItemField::Price => format_cents(self.price_cents),
            ItemField::Amount => self.amount.to_string(),
        }
    }

    /// Value as it appears in an editable form buffer.
    pub fn input_value(&self, field: ItemField) -> String {
        match field {
            ItemField::Price => format_cents_input(self.price_cents),
            _ => self.display(field),
        }
    }

    pub fn to_document_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).context("encode product fields")? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("product fields encoded to non-object {other}"),
        }
    }

    pub fn from_document_fields(fields: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(fields.clone())).context("decode product fields")
    }
}

/// A document as delivered by the store: identifier plus schema-less fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

/// Flat product record: identifier (once persisted) plus fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    #[serde(flatten)]
    pub fields: ItemFields,
}

impl ItemRecord {
    pub fn new(fields: ItemFields) -> Self {
        Self { id: None, fields }
    }

    pub fn persisted(id: impl Into<ItemId>, fields: ItemFields) -> Self {
        Self {
            id: Some(id.into()),
            fields,
        }
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let fields = ItemFields::from_document_fields(&document.fields)
            .with_context(|| format!("document {}", document.id))?;
        Ok(Self::persisted(document.id.clone(), fields))
    }

    /// Case-insensitive substring match over every visible column.
    pub fn matches_filter(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        COLUMNS.iter().any(|column| {
            self.fields
                .display(column.field)
                .to_lowercase()
                .contains(&needle)
        })
    }
}

/// Projects a full collection snapshot into records, in snapshot order.
/// Returns the records plus the documents that failed to decode.
pub fn project_snapshot(documents: &[Document]) -> (Vec<ItemRecord>, Vec<(DocumentId, String)>) {
    let mut records = Vec::with_capacity(documents.len());
    let mut rejected = Vec::new();
    for document in documents {
        match ItemRecord::from_document(document) {
            Ok(record) => records.push(record),
            Err(error) => rejected.push((document.id.clone(), format!("{error:#}"))),
        }
    }
    (records, rejected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastSeverity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub severity: ToastSeverity,
    pub summary: String,
    pub detail: String,
    pub life: Duration,
}

impl Toast {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            severity: ToastSeverity::Success,
            summary: "Success".to_owned(),
            detail: detail.into(),
            life: SUCCESS_TOAST_LIFE,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            severity: ToastSeverity::Error,
            summary: "Error".to_owned(),
            detail: detail.into(),
            life: ERROR_TOAST_LIFE,
        }
    }
}

mod numeric {
    use crate::validation::{parse_required_cents, parse_required_int};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::{Number, Value};

    pub(super) fn serialize_price<S: Serializer>(
        cents: &i64,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if cents % 100 == 0 {
            serializer.serialize_i64(cents / 100)
        } else {
            serializer.serialize_f64(*cents as f64 / 100.0)
        }
    }

    pub(super) fn deserialize_price<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<i64, D::Error> {
        let cents = match Value::deserialize(deserializer)? {
            Value::Null => Some(0),
            Value::Number(number) => number_cents(&number),
            Value::String(text) if text.trim().is_empty() => Some(0),
            Value::String(text) => parse_required_cents(&text)
                .ok()
                .or_else(|| text.trim().parse::<f64>().ok().and_then(|units| round(units * 100.0))),
            other => return Err(D::Error::custom(format!("price must be numeric, found {other}"))),
        };
        cents.ok_or_else(|| D::Error::custom("price is not a representable number"))
    }

    pub(super) fn deserialize_amount<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<i64, D::Error> {
        let amount = match Value::deserialize(deserializer)? {
            Value::Null => Some(0),
            Value::Number(number) => number.as_i64().or_else(|| number.as_f64().and_then(round)),
            Value::String(text) if text.trim().is_empty() => Some(0),
            Value::String(text) => parse_required_int(&text)
                .ok()
                .or_else(|| text.trim().parse::<f64>().ok().and_then(round)),
            other => return Err(D::Error::custom(format!("amount must be numeric, found {other}"))),
        };
        amount.ok_or_else(|| D::Error::custom("amount is not a representable number"))
    }

    fn number_cents(number: &Number) -> Option<i64> {
        match number.as_i64() {
            Some(units) => units.checked_mul(100),
            None => number.as_f64().and_then(|units| round(units * 100.0)),
        }
    }

    fn round(value: f64) -> Option<i64> {
        let rounded = value.round();
        (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64)
            .then_some(rounded as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        COLUMNS, Document, ItemField, ItemFields, ItemRecord, ToastSeverity, project_snapshot,
    };
    use crate::{DocumentId, ItemId};
    use serde_json::{Map, Value, json};

    fn chair() -> ItemFields {
        ItemFields {
            name: "Chair".to_owned(),
            description: "Wood".to_owned(),
            category: "Furniture".to_owned(),
            price_cents: 1_000,
            amount: 3,
        }
    }

    fn document(id: &str, value: Value) -> Document {
        let Value::Object(fields) = value else {
            panic!("test document must be an object");
        };
        Document {
            id: DocumentId::new(id),
            fields,
        }
    }

    #[test]
    fn columns_follow_field_order() {
        let fields = COLUMNS.iter().map(|column| column.field).collect::<Vec<_>>();
        assert_eq!(fields, ItemField::ALL.to_vec());
        assert_eq!(COLUMNS[3].header, "Price");
        for field in ItemField::ALL {
            assert!(chair().to_document_fields().is_ok_and(|map| map.contains_key(field.as_str())));
            assert_eq!(ItemField::ALL[field.index()], field);
        }
    }

    #[test]
    fn document_fields_use_store_keys() -> anyhow::Result<()> {
        let fields = chair().to_document_fields()?;
        assert_eq!(fields.get("name"), Some(&json!("Chair")));
        assert_eq!(fields.get("price"), Some(&json!(10)));
        assert_eq!(fields.get("amount"), Some(&json!(3)));
        assert!(!fields.contains_key("id"));
        Ok(())
    }

    #[test]
    fn sparse_document_decodes_with_blank_fields() -> anyhow::Result<()> {
        let record = ItemRecord::from_document(&document("1", json!({ "name": "A" })))?;
        assert_eq!(record.id, Some(ItemId::new("1")));
        assert_eq!(record.fields.name, "A");
        assert_eq!(record.fields.category, "");
        assert_eq!(record.fields.amount, 0);
        Ok(())
    }

    #[test]
    fn snapshot_projection_keeps_order_and_reports_bad_documents() {
        let documents = vec![
            document("2", json!({ "name": "B" })),
            document("x", json!({ "name": "broken", "amount": "lots" })),
            document("1", json!({ "name": "A" })),
        ];
        let (records, rejected) = project_snapshot(&documents);
        let ids = records
            .iter()
            .filter_map(|record| record.id.as_ref().map(ItemId::as_str))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, DocumentId::new("x"));
    }

    #[test]
    fn empty_document_is_a_blank_record() -> anyhow::Result<()> {
        let record = ItemRecord::from_document(&Document {
            id: DocumentId::new("empty"),
            fields: Map::new(),
        })?;
        assert_eq!(record.fields, ItemFields::default());
        Ok(())
    }

    #[test]
    fn filter_matches_any_visible_column_case_insensitively() {
        let record = ItemRecord::persisted("42", chair());
        assert!(record.matches_filter("chair"));
        assert!(record.matches_filter("FURN"));
        assert!(record.matches_filter("$10.00"));
        assert!(record.matches_filter("3"));
        assert!(record.matches_filter(""));
        // the query is matched verbatim
        assert!(!record.matches_filter(" chair"));
        assert!(!record.matches_filter("table"));
        // ids are not a visible column
        assert!(!record.matches_filter("42"));
    }

    #[test]
    fn fractional_price_is_stored_in_currency_units() -> anyhow::Result<()> {
        let fields = ItemFields {
            price_cents: 1_050,
            ..chair()
        }
        .to_document_fields()?;
        assert_eq!(fields.get("price"), Some(&json!(10.5)));
        assert_eq!(ItemFields::from_document_fields(&fields)?.price_cents, 1_050);
        Ok(())
    }

    #[test]
    fn numeric_like_values_decode_leniently() -> anyhow::Result<()> {
        let cases = [
            (json!({ "price": 10, "amount": 3 }), 1_000, 3),
            (json!({ "price": 10.5, "amount": 3.0 }), 1_050, 3),
            (json!({ "price": "10", "amount": "3" }), 1_000, 3),
            (json!({ "price": " 12.25 ", "amount": "1,200" }), 1_225, 1_200),
            (json!({ "price": 0.1, "amount": -2 }), 10, -2),
            (json!({ "price": null, "amount": "" }), 0, 0),
        ];
        for (value, price_cents, amount) in cases {
            let record = ItemRecord::from_document(&document("n", value.clone()))?;
            assert_eq!(record.fields.price_cents, price_cents, "{value}");
            assert_eq!(record.fields.amount, amount, "{value}");
        }

        for value in [
            json!({ "price": "ten" }),
            json!({ "price": true }),
            json!({ "amount": [1] }),
            json!({ "amount": "lots" }),
        ] {
            assert!(ItemRecord::from_document(&document("bad", value.clone())).is_err(), "{value}");
        }
        Ok(())
    }

    #[test]
    fn record_serializes_flat() -> anyhow::Result<()> {
        let value = serde_json::to_value(ItemRecord::persisted("42", chair()))?;
        assert_eq!(value["id"], json!("42"));
        assert_eq!(value["name"], json!("Chair"));

        let unsaved = serde_json::to_value(ItemRecord::new(chair()))?;
        assert!(unsaved.get("id").is_none());
        Ok(())
    }

    #[test]
    fn toast_constructors_use_fixed_summaries() {
        let ok = super::Toast::success("Product created!");
        assert_eq!(ok.severity, ToastSeverity::Success);
        assert_eq!(ok.summary, "Success");
        assert_eq!(ok.life.as_millis(), 3000);

        let failed = super::Toast::error("boom");
        assert_eq!(failed.severity, ToastSeverity::Error);
        assert_eq!(failed.summary, "Error");
    }
}
