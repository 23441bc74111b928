//! [`OrderStore`] over the Firestore REST API.
//!
//! The platform counter lives at `meta/counters` and is advanced inside a
//! Firestore transaction, so two concurrent intakes can never share a count.
//! Order documents live in the `requests` collection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use order_core::{
    Delivery, DeliveryStatus, Order, OrderId, OrderStore, PdfKind, PdfRef, StoreError,
};

use crate::auth::TokenProvider;
use crate::value::{order_from_document, order_to_fields, to_firestore_value};

const ORDERS_COLLECTION: &str = "requests";
const COUNTER_DOC: &str = "meta/counters";
const COUNTER_FIELD: &str = "requests";

/// Contended counter transactions are retried a few times before giving up.
const COUNTER_ATTEMPTS: u32 = 5;

/// Firestore-backed order store.
#[derive(Clone)]
pub struct FirestoreStore {
    http: Client,
    tokens: Arc<TokenProvider>,
    project_id: String,
}

impl FirestoreStore {
    pub(crate) fn new(http: Client, tokens: Arc<TokenProvider>, project_id: String) -> Self {
        Self {
            http,
            tokens,
            project_id,
        }
    }

    fn documents_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    fn document_name(&self, path: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}",
            self.project_id, path
        )
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let token = self.tokens.bearer_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if !status.is_success() {
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound(body.to_string()));
            }
            return Err(StoreError::Http(format!("{}: {}", status, body)));
        }
        Ok(body)
    }

    /// Run a structured query against the orders collection.
    async fn query_orders(&self, filter: Value, limit: u32) -> Result<Vec<(OrderId, Order)>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url());
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": ORDERS_COLLECTION }],
                "where": filter,
                "limit": limit,
            }
        });

        let results = self.authorized(self.http.post(&url).json(&body)).await?;
        let entries = results
            .as_array()
            .ok_or_else(|| StoreError::Decode("runQuery did not return an array".to_string()))?;

        let mut orders = Vec::new();
        for entry in entries {
            // A query can yield a trailing readTime-only entry with no document.
            let Some(document) = entry.get("document") else {
                continue;
            };
            match order_from_document(document) {
                Ok(pair) => orders.push(pair),
                Err(e) => warn!(error = %e, "skipping undecodable order document"),
            }
        }
        Ok(orders)
    }

    /// Partial update of one order document.
    async fn patch(
        &self,
        id: &OrderId,
        field_paths: &[&str],
        fields: Value,
    ) -> Result<(), StoreError> {
        let mask: String = field_paths
            .iter()
            .map(|path| format!("updateMask.fieldPaths={}", path))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!(
            "{}/{}/{}?currentDocument.exists=true&{}",
            self.documents_url(),
            ORDERS_COLLECTION,
            id,
            mask
        );
        self.authorized(self.http.patch(&url).json(&json!({ "fields": fields })))
            .await?;
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<String, StoreError> {
        let url = format!("{}:beginTransaction", self.documents_url());
        let body = self.authorized(self.http.post(&url).json(&json!({}))).await?;
        body.get("transaction")
            .and_then(Value::as_str)
            .map(|t| t.to_string())
            .ok_or_else(|| StoreError::Transaction("no transaction id returned".to_string()))
    }

    async fn try_reserve_count(&self) -> Result<i64, StoreError> {
        let transaction = self.begin_transaction().await?;

        let counter_url = format!(
            "{}/{}?transaction={}",
            self.documents_url(),
            COUNTER_DOC,
            urlencode(&transaction)
        );
        let current = match self.authorized(self.http.get(&counter_url)).await {
            Ok(doc) => doc
                .pointer(&format!("/fields/{}/integerValue", COUNTER_FIELD))
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse::<i64>().ok())
                .unwrap_or(0),
            Err(StoreError::NotFound(_)) => 0,
            Err(e) => return Err(e),
        };
        let next = current + 1;

        let commit_url = format!("{}:commit", self.documents_url());
        let body = json!({
            "transaction": transaction,
            "writes": [{
                "update": {
                    "name": self.document_name(COUNTER_DOC),
                    "fields": { COUNTER_FIELD: { "integerValue": next.to_string() } },
                },
                "updateMask": { "fieldPaths": [COUNTER_FIELD] },
            }],
        });
        self.authorized(self.http.post(&commit_url).json(&body))
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(next)
    }
}

fn urlencode(raw: &str) -> String {
    percent_encoding::utf8_percent_encode(raw, percent_encoding::NON_ALPHANUMERIC).to_string()
}

fn timestamp_value(at: DateTime<Utc>) -> Value {
    to_firestore_value(&json!(at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)))
}

#[async_trait]
impl OrderStore for FirestoreStore {
    async fn reserve_count(&self) -> Result<i64, StoreError> {
        let mut last_error = None;
        for attempt in 1..=COUNTER_ATTEMPTS {
            match self.try_reserve_count().await {
                Ok(count) => {
                    debug!(count, "platform count reserved");
                    return Ok(count);
                }
                Err(StoreError::Transaction(reason)) => {
                    warn!(attempt, %reason, "counter transaction aborted, retrying");
                    last_error = Some(StoreError::Transaction(reason));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| StoreError::Transaction("counter reservation failed".to_string())))
    }

    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError> {
        let url = format!("{}/{}", self.documents_url(), ORDERS_COLLECTION);
        let fields = order_to_fields(order)?;
        let created = self
            .authorized(self.http.post(&url).json(&json!({ "fields": fields })))
            .await?;
        let name = created
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("created document has no name".to_string()))?;
        let id = name
            .rsplit('/')
            .next()
            .ok_or_else(|| StoreError::Decode(format!("malformed document name: {}", name)))?;
        debug!(id, count = order.platform_count, "order document created");
        Ok(OrderId(id.to_string()))
    }

    async fn find_by_count(&self, count: i64) -> Result<Option<(OrderId, Order)>, StoreError> {
        let filter = json!({
            "fieldFilter": {
                "field": { "fieldPath": "platform_count" },
                "op": "EQUAL",
                "value": { "integerValue": count.to_string() },
            }
        });
        Ok(self.query_orders(filter, 1).await?.into_iter().next())
    }

    async fn find_by_count_and_email(
        &self,
        count: i64,
        email: &str,
    ) -> Result<Option<(OrderId, Order)>, StoreError> {
        let filter = json!({
            "compositeFilter": {
                "op": "AND",
                "filters": [
                    {
                        "fieldFilter": {
                            "field": { "fieldPath": "platform_count" },
                            "op": "EQUAL",
                            "value": { "integerValue": count.to_string() },
                        }
                    },
                    {
                        "fieldFilter": {
                            "field": { "fieldPath": "client.email" },
                            "op": "EQUAL",
                            "value": { "stringValue": email },
                        }
                    },
                ],
            }
        });
        Ok(self.query_orders(filter, 1).await?.into_iter().next())
    }

    async fn list_pending_payment(&self) -> Result<Vec<(OrderId, Order)>, StoreError> {
        // Indexed on payment_status so the sweep never scans the collection.
        let filter = json!({
            "fieldFilter": {
                "field": { "fieldPath": "payment_status" },
                "op": "IN",
                "value": {
                    "arrayValue": {
                        "values": [
                            { "stringValue": "pending" },
                            { "stringValue": "pending_payment" },
                        ]
                    }
                },
            }
        });
        self.query_orders(filter, 300).await
    }

    async fn mark_paid(&self, id: &OrderId, paid_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.patch(
            id,
            &["payment_status", "paid_at", "updated_at"],
            json!({
                "payment_status": { "stringValue": "paid" },
                "paid_at": timestamp_value(paid_at),
                "updated_at": timestamp_value(paid_at),
            }),
        )
        .await
    }

    async fn set_delivery(&self, id: &OrderId, delivery: &Delivery) -> Result<(), StoreError> {
        let plain = serde_json::to_value(delivery)
            .map_err(|e| StoreError::Decode(format!("failed to serialize delivery: {}", e)))?;
        self.patch(
            id,
            &["delivery", "updated_at"],
            json!({
                "delivery": to_firestore_value(&plain),
                "updated_at": timestamp_value(delivery.initialized_at),
            }),
        )
        .await
    }

    async fn set_delivery_status(
        &self,
        id: &OrderId,
        status: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let stamp_field = match status {
            DeliveryStatus::Shipped => "shipped_at",
            DeliveryStatus::Received => "received_at",
            DeliveryStatus::Pending => {
                return Err(StoreError::Transaction(
                    "cannot move a delivery back to pending".to_string(),
                ))
            }
        };
        let mut delivery_fields = Map::new();
        delivery_fields.insert(
            "status".to_string(),
            json!({ "stringValue": status.to_string() }),
        );
        delivery_fields.insert(stamp_field.to_string(), timestamp_value(at));

        let status_path = format!("delivery.{}", stamp_field);
        self.patch(
            id,
            &["delivery.status", status_path.as_str(), "updated_at"],
            json!({
                "delivery": { "mapValue": { "fields": delivery_fields } },
                "updated_at": timestamp_value(at),
            }),
        )
        .await
    }

    async fn record_pdf(&self, id: &OrderId, kind: PdfKind, pdf: &PdfRef) -> Result<(), StoreError> {
        let plain = serde_json::to_value(pdf)
            .map_err(|e| StoreError::Decode(format!("failed to serialize pdf ref: {}", e)))?;
        let mut pdf_fields = Map::new();
        pdf_fields.insert(kind.as_str().to_string(), to_firestore_value(&plain));

        let path = format!("pdfs.{}", kind.as_str());
        self.patch(
            id,
            &[path.as_str(), "updated_at"],
            json!({
                "pdfs": { "mapValue": { "fields": pdf_fields } },
                "updated_at": timestamp_value(pdf.created_at),
            }),
        )
        .await
    }

    async fn mark_effect(&self, id: &OrderId, effect: &str) -> Result<(), StoreError> {
        // Array-union transform: appending an existing element is a no-op,
        // so replays stay idempotent.
        let url = format!("{}:commit", self.documents_url());
        let body = json!({
            "writes": [{
                "transform": {
                    "document": self.document_name(&format!("{}/{}", ORDERS_COLLECTION, id)),
                    "fieldTransforms": [{
                        "fieldPath": "effects",
                        "appendMissingElements": {
                            "values": [{ "stringValue": effect }]
                        },
                    }],
                },
            }],
        });
        self.authorized(self.http.post(&url).json(&body)).await?;
        Ok(())
    }
}
