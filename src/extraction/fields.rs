use serde_json::{Map, Value};

use crate::types::{DocumentType, LineItem, MISSING_FIELD};

/// Which response keys feed each summary column for one document type.
/// Keys are tried in order; the first non-empty value wins, otherwise the column is `-`.
#[derive(Debug)]
pub struct FieldSchema {
    pub primary_entity: &'static [&'static str],
    pub total: &'static [&'static str],
    pub currency: &'static [&'static str],
    pub line_items: Option<&'static [&'static str]>,
}

const LINE_ITEM_KEYS: &[&str] = &["lineItems", "line_items"];

static RECEIPT: FieldSchema = FieldSchema {
    primary_entity: &["vendor"],
    total: &["total"],
    currency: &["currency"],
    line_items: Some(LINE_ITEM_KEYS),
};

static HOTEL_INVOICE: FieldSchema = FieldSchema {
    primary_entity: &["hotelName", "hotel_name"],
    total: &["total"],
    currency: &["currency"],
    line_items: Some(LINE_ITEM_KEYS),
};

static UTILITY_BILL: FieldSchema = FieldSchema {
    primary_entity: &["billNumber", "bill_number"],
    total: &["amountDue", "amount_due"],
    currency: &["currency"],
    line_items: None,
};

const ITEM_DESCRIPTION: &[&str] = &["description"];
const ITEM_QUANTITY: &[&str] = &["quantity"];
const ITEM_UNIT_PRICE: &[&str] = &["price", "unitPrice", "unit_price"];
const ITEM_AMOUNT: &[&str] = &["amount"];

pub fn schema_for(document_type: DocumentType) -> &'static FieldSchema {
    match document_type {
        DocumentType::Receipt => &RECEIPT,
        DocumentType::HotelInvoice => &HOTEL_INVOICE,
        DocumentType::UtilityBill => &UTILITY_BILL,
    }
}

/// Summary columns and line items pulled out of one processed document.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedFields {
    pub primary_entity: String,
    pub total_amount: String,
    pub currency: String,
    /// `None` for document types without a line-item table.
    pub line_items: Option<Vec<LineItem>>,
}

/// Render a scalar field as text, preferring semantic value properties over raw content.
pub fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => ["value", "text", "name", "amount", "content"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(field_text)),
        Value::Null | Value::Array(_) => None,
    }
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(field_text))
}

fn text_or_placeholder(fields: &Map<String, Value>, keys: &[&str]) -> String {
    first_text(fields, keys).unwrap_or_else(|| MISSING_FIELD.to_string())
}

fn line_item(value: &Value) -> Option<LineItem> {
    // Items may be wrapped like other fields: { "value": { "description": .. } }.
    let obj = value
        .as_object()
        .map(|o| match o.get("value").and_then(|v| v.as_object()) {
            Some(inner) => inner,
            None => o,
        })?;
    Some(LineItem {
        description: text_or_placeholder(obj, ITEM_DESCRIPTION),
        quantity: text_or_placeholder(obj, ITEM_QUANTITY),
        unit_price: text_or_placeholder(obj, ITEM_UNIT_PRICE),
        amount: text_or_placeholder(obj, ITEM_AMOUNT),
    })
}

fn line_items(fields: &Map<String, Value>, keys: &[&str]) -> Vec<LineItem> {
    let items = keys.iter().find_map(|key| {
        let v = fields.get(*key)?;
        v.as_array()
            .or_else(|| v.get("value").and_then(|inner| inner.as_array()))
    });
    items
        .map(|arr| arr.iter().filter_map(line_item).collect())
        .unwrap_or_default()
}

pub fn map_fields(document_type: DocumentType, fields: &Map<String, Value>) -> MappedFields {
    let schema = schema_for(document_type);
    MappedFields {
        primary_entity: text_or_placeholder(fields, schema.primary_entity),
        total_amount: text_or_placeholder(fields, schema.total),
        currency: text_or_placeholder(fields, schema.currency),
        line_items: schema.line_items.map(|keys| line_items(fields, keys)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn maps_receipt_fields_and_items() {
        let fields = obj(json!({
            "vendor": "Corner Cafe",
            "total": 23.4,
            "currency": "EUR",
            "lineItems": [
                {"description": "Espresso", "quantity": 2, "price": 2.5, "amount": 5.0},
                {"description": "Sandwich", "amount": 18.4}
            ]
        }));
        let mapped = map_fields(DocumentType::Receipt, &fields);
        assert_eq!(mapped.primary_entity, "Corner Cafe");
        assert_eq!(mapped.total_amount, "23.4");
        assert_eq!(mapped.currency, "EUR");
        let items = mapped.line_items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, "2.5");
        assert_eq!(items[1].quantity, MISSING_FIELD);
        assert_eq!(items[1].unit_price, MISSING_FIELD);
    }

    #[test]
    fn maps_hotel_invoice_with_wrapped_values() {
        let fields = obj(json!({
            "hotelName": {"value": "Grand Hotel", "confidence": 0.93},
            "total": {"value": 310},
            "lineItems": {"value": [{"value": {"description": "Room", "amount": 300}}]}
        }));
        let mapped = map_fields(DocumentType::HotelInvoice, &fields);
        assert_eq!(mapped.primary_entity, "Grand Hotel");
        assert_eq!(mapped.total_amount, "310");
        assert_eq!(mapped.currency, MISSING_FIELD);
        assert_eq!(mapped.line_items.unwrap()[0].description, "Room");
    }

    #[test]
    fn utility_bill_has_no_line_items() {
        let fields = obj(json!({"billNumber": "INV-77", "amountDue": "81.20", "lineItems": []}));
        let mapped = map_fields(DocumentType::UtilityBill, &fields);
        assert_eq!(mapped.primary_entity, "INV-77");
        assert_eq!(mapped.total_amount, "81.20");
        assert!(mapped.line_items.is_none());
    }

    #[test]
    fn empty_fields_fall_back_to_placeholder() {
        let mapped = map_fields(DocumentType::Receipt, &Map::new());
        assert_eq!(mapped.primary_entity, MISSING_FIELD);
        assert_eq!(mapped.total_amount, MISSING_FIELD);
        assert_eq!(mapped.currency, MISSING_FIELD);
        assert_eq!(mapped.line_items, Some(vec![]));

        let blank = obj(json!({"vendor": "   ", "total": null}));
        let mapped = map_fields(DocumentType::Receipt, &blank);
        assert_eq!(mapped.primary_entity, MISSING_FIELD);
        assert_eq!(mapped.total_amount, MISSING_FIELD);
    }
}
