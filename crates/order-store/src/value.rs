//! Conversion between plain JSON and the Firestore REST value envelope.
//!
//! Firestore wraps every field in a typed envelope (`{"stringValue": ...}`,
//! `{"integerValue": "42"}`, ...). Orders are serialized through serde and
//! converted generically, so the document layout follows the serde
//! representation of [`Order`] field for field.

use serde_json::{json, Map, Value};

use order_core::{Order, OrderId, StoreError};

/// Wrap a plain JSON value in the Firestore envelope.
pub(crate) fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // integerValue is a decimal string on the wire
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_firestore_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(fields) => {
            let mapped: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), to_firestore_value(v)))
                .collect();
            json!({ "mapValue": { "fields": mapped } })
        }
    }
}

/// Unwrap a Firestore envelope back to plain JSON.
pub(crate) fn from_firestore_value(value: &Value) -> Value {
    let Some(envelope) = value.as_object() else {
        return Value::Null;
    };
    if let Some(s) = envelope.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(raw) = envelope.get("integerValue").and_then(Value::as_str) {
        return raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null);
    }
    if let Some(d) = envelope.get("doubleValue").and_then(Value::as_f64) {
        return json!(d);
    }
    if let Some(b) = envelope.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    // Timestamps come back RFC 3339, which chrono deserializes directly.
    if let Some(ts) = envelope.get("timestampValue").and_then(Value::as_str) {
        return Value::String(ts.to_string());
    }
    if let Some(array) = envelope.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(map) = envelope.get("mapValue") {
        let fields: Map<String, Value> = map
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Object(fields);
    }
    Value::Null
}

/// Serialize an order into Firestore document fields.
pub(crate) fn order_to_fields(order: &Order) -> Result<Map<String, Value>, StoreError> {
    let plain = serde_json::to_value(order)
        .map_err(|e| StoreError::Decode(format!("failed to serialize order: {}", e)))?;
    let Value::Object(fields) = plain else {
        return Err(StoreError::Decode("order did not serialize to an object".to_string()));
    };
    Ok(fields
        .iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect())
}

/// Decode a Firestore document (with its resource `name`) into an order.
pub(crate) fn order_from_document(document: &Value) -> Result<(OrderId, Order), StoreError> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document has no name".to_string()))?;
    let id = name
        .rsplit('/')
        .next()
        .ok_or_else(|| StoreError::Decode(format!("malformed document name: {}", name)))?;

    let fields = document
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::Decode(format!("document {} has no fields", id)))?;
    let plain: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), from_firestore_value(v)))
        .collect();

    let order: Order = serde_json::from_value(Value::Object(plain))
        .map_err(|e| StoreError::Decode(format!("document {}: {}", id, e)))?;
    Ok((OrderId(id.to_string()), order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use order_core::{Address, ClientInfo, PaymentStatus, Work};

    fn sample_order() -> Order {
        Order {
            platform_count: 42,
            quotation_id: 1042,
            request_number: Some("S01042".to_string()),
            payment_status: PaymentStatus::Pending,
            client: ClientInfo {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            },
            address: Address {
                street: "Rue Haute".to_string(),
                number: "12".to_string(),
                zipcode: "1000".to_string(),
                city: "Bruxelles".to_string(),
            },
            work: Work::default(),
            delivery: None,
            pdfs: Default::default(),
            effects: Default::default(),
            source: "simulateur_ui".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            paid_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn scalar_envelopes() {
        assert_eq!(
            to_firestore_value(&json!("pending")),
            json!({ "stringValue": "pending" })
        );
        assert_eq!(
            to_firestore_value(&json!(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            to_firestore_value(&json!(1.5)),
            json!({ "doubleValue": 1.5 })
        );
        assert_eq!(from_firestore_value(&json!({ "integerValue": "42" })), json!(42));
        assert_eq!(
            from_firestore_value(&json!({ "timestampValue": "2026-03-01T09:00:00Z" })),
            json!("2026-03-01T09:00:00Z")
        );
    }

    #[test]
    fn order_round_trips_through_document() {
        let order = sample_order();
        let fields = order_to_fields(&order).unwrap();
        let document = json!({
            "name": "projects/p/databases/(default)/documents/requests/abc123",
            "fields": fields,
        });
        let (id, decoded) = order_from_document(&document).unwrap();
        assert_eq!(id.0, "abc123");
        assert_eq!(decoded, order);
    }

    #[test]
    fn nested_map_survives() {
        let value = json!({ "client": { "email": "ada@example.com" }, "tags": ["a", "b"] });
        let envelope = to_firestore_value(&value);
        assert_eq!(from_firestore_value(&envelope), value);
    }
}
