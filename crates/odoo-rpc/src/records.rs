//! [`RecordStore`] / [`RecordSession`] implementations over `call_kw`.
//!
//! Odoo returns `false` where a field is unset, so every read goes through
//! the `value_*` helpers instead of trusting the declared type.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use order_core::{
    FunnelSession, InvoicePaymentState, NewCustomer, NewFunnelSession, NewOpportunity,
    NewQuotation, PaymentTransaction, ProductLine, RecordError, RecordSession, RecordStore,
    ReportKind,
};

use crate::client::{OdooClient, OdooSession};

const FUNNEL_MODEL: &str = "x_funnel_sessions";

fn report_name(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Quotation => "sale.report_saleorder",
        ReportKind::Invoice => "account.report_invoice",
        ReportKind::DeliveryNote => "stock.report_deliveryslip",
    }
}

/// Read a string field, treating Odoo's `false` as absent.
fn value_str(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}

fn value_i64(value: &Value) -> Option<i64> {
    value.as_i64()
}

fn funnel_create_values(session: &NewFunnelSession) -> Value {
    let mut values = json!({
        "x_name": session.session_id,
        "x_studio_session_id": session.session_id,
        "x_studio_step_reached": session.step,
        "x_studio_order_sent": session.order_sent,
        "x_studio_clicked_order_count": session.clicked_order_count,
    });
    if let Some(consumption) = session.consumption_input {
        values["x_studio_consumption_input"] = json!(consumption);
    }
    if let Some(lang) = &session.lang {
        values["x_studio_lang"] = json!(lang);
    }
    values
}

fn first_record(mut records: Vec<Value>) -> Option<Value> {
    if records.is_empty() {
        None
    } else {
        Some(records.remove(0))
    }
}

#[async_trait]
impl RecordStore for OdooClient {
    type Session = OdooSession;

    async fn connect(&self) -> Result<OdooSession, RecordError> {
        self.login().await
    }
}

impl OdooSession {
    /// `create` on a model, returning the new record id.
    async fn create_record(&self, model: &str, values: Value) -> Result<i64, RecordError> {
        let id: i64 = self
            .call_kw(model, "create", json!([values]), json!({}))
            .await?;
        debug!(model, id, "record created");
        Ok(id)
    }

    /// `read` a single record, returning the requested fields.
    async fn read_record(
        &self,
        model: &str,
        record_id: i64,
        fields: &[&str],
    ) -> Result<Option<Value>, RecordError> {
        let records: Vec<Value> = self
            .call_kw(
                model,
                "read",
                json!([[record_id], fields]),
                json!({}),
            )
            .await?;
        Ok(first_record(records))
    }

    /// `search_read` with a domain, returning matching records.
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        limit: u32,
    ) -> Result<Vec<Value>, RecordError> {
        self.call_kw(
            model,
            "search_read",
            json!([domain, fields]),
            json!({ "limit": limit }),
        )
        .await
    }
}

#[async_trait]
impl RecordSession for OdooSession {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<i64, RecordError> {
        let mut values = json!({
            "name": customer.name,
            "email": customer.email,
            "phone": customer.phone,
            "street": customer.street,
            "zip": customer.zip,
            "city": customer.city,
        });
        if let Some(vat) = &customer.vat {
            values["vat"] = json!(vat);
        }
        self.create_record("res.partner", values).await
    }

    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<i64, RecordError> {
        let values = json!({
            "name": opportunity.title,
            "contact_name": opportunity.contact_name,
            "email_from": opportunity.email,
            "phone": opportunity.phone,
            "street": opportunity.street,
            "zip": opportunity.zip,
            "city": opportunity.city,
            "partner_id": opportunity.partner_id,
            "partner_name": opportunity.partner_name,
            "expected_revenue": opportunity.invest_ttc,
            "description": opportunity.description,
            "x_studio_consumption": opportunity.consumption,
            "x_studio_capacity": opportunity.capacity,
            "x_studio_delivery_pref": opportunity.delivery_pref,
        });
        self.create_record("crm.lead", values).await
    }

    async fn create_quotation(&self, quotation: &NewQuotation) -> Result<i64, RecordError> {
        let values = json!({
            "partner_id": quotation.partner_id,
            "x_studio_platform_count": quotation.platform_count,
            "x_studio_delivery_pref": quotation.delivery_pref,
            "note": quotation.note,
        });
        self.create_record("sale.order", values).await
    }

    async fn add_quotation_line(
        &self,
        quotation_id: i64,
        line: &ProductLine,
    ) -> Result<(), RecordError> {
        let values = json!({
            "order_id": quotation_id,
            "product_id": line.product_ref,
            "product_uom_qty": line.quantity,
            "price_unit": line.unit_price,
        });
        self.create_record("sale.order.line", values).await?;
        Ok(())
    }

    async fn quotation_name(&self, quotation_id: i64) -> Result<Option<String>, RecordError> {
        let record = self.read_record("sale.order", quotation_id, &["name"]).await?;
        Ok(record.and_then(|r| value_str(&r["name"])))
    }

    async fn portal_url(&self, quotation_id: i64) -> Result<Option<String>, RecordError> {
        let path: Value = self
            .call_kw("sale.order", "get_portal_url", json!([[quotation_id]]), json!({}))
            .await?;
        Ok(value_str(&path).map(|p| self.absolute_url(&p)))
    }

    async fn quotation_state(&self, quotation_id: i64) -> Result<String, RecordError> {
        let record = self
            .read_record("sale.order", quotation_id, &["state"])
            .await?
            .ok_or_else(|| {
                RecordError::NotFound(format!("sale.order {} not found", quotation_id))
            })?;
        value_str(&record["state"])
            .ok_or_else(|| RecordError::Decode(format!("sale.order {} has no state", quotation_id)))
    }

    async fn find_payment_transaction(
        &self,
        provider_reference: &str,
    ) -> Result<Option<PaymentTransaction>, RecordError> {
        let records = self
            .search_read(
                "payment.transaction",
                json!([["provider_reference", "=", provider_reference]]),
                &["state", "sale_order_ids"],
                1,
            )
            .await?;
        Ok(first_record(records).map(|record| PaymentTransaction {
            state: value_str(&record["state"]).unwrap_or_default(),
            sale_order_ids: record["sale_order_ids"]
                .as_array()
                .map(|ids| ids.iter().filter_map(value_i64).collect())
                .unwrap_or_default(),
        }))
    }

    async fn platform_count(&self, quotation_id: i64) -> Result<Option<i64>, RecordError> {
        let record = self
            .read_record("sale.order", quotation_id, &["x_studio_platform_count"])
            .await?;
        Ok(record.and_then(|r| value_i64(&r["x_studio_platform_count"])))
    }

    async fn find_posted_invoice(&self, quotation_id: i64) -> Result<Option<i64>, RecordError> {
        let invoice_ids = self.invoice_ids(quotation_id).await?;
        if invoice_ids.is_empty() {
            return Ok(None);
        }
        let records = self
            .search_read(
                "account.move",
                json!([["id", "in", invoice_ids], ["state", "=", "posted"]]),
                &["id"],
                1,
            )
            .await?;
        Ok(first_record(records).and_then(|r| value_i64(&r["id"])))
    }

    async fn invoice_payment_state(
        &self,
        quotation_id: i64,
    ) -> Result<InvoicePaymentState, RecordError> {
        let invoice_ids = self.invoice_ids(quotation_id).await?;
        let Some(first_id) = invoice_ids.first().copied() else {
            return Ok(InvoicePaymentState::NoInvoice);
        };
        let record = self
            .read_record("account.move", first_id, &["payment_state"])
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("account.move {} not found", first_id)))?;
        let state = value_str(&record["payment_state"]).unwrap_or_default();
        Ok(InvoicePaymentState::State(state))
    }

    async fn render_report(
        &self,
        kind: ReportKind,
        record_id: i64,
    ) -> Result<Vec<u8>, RecordError> {
        self.fetch_report_pdf(report_name(kind), record_id).await
    }

    async fn find_funnel_session(
        &self,
        session_id: &str,
    ) -> Result<Option<FunnelSession>, RecordError> {
        let records = self
            .search_read(
                FUNNEL_MODEL,
                json!([["x_studio_session_id", "=", session_id]]),
                &["id", "x_studio_clicked_order_count", "x_studio_event_log"],
                1,
            )
            .await?;
        let Some(record) = first_record(records) else {
            return Ok(None);
        };
        let record_id = value_i64(&record["id"]).ok_or_else(|| {
            RecordError::Decode(format!("funnel session {} has no id", session_id))
        })?;
        Ok(Some(FunnelSession {
            record_id,
            clicked_order_count: value_i64(&record["x_studio_clicked_order_count"]).unwrap_or(0),
            event_log: value_str(&record["x_studio_event_log"]).unwrap_or_default(),
        }))
    }

    async fn create_funnel_session(&self, session: &NewFunnelSession) -> Result<i64, RecordError> {
        self.create_record(FUNNEL_MODEL, funnel_create_values(session))
            .await
    }

    async fn update_funnel_session(
        &self,
        record_id: i64,
        values: &Map<String, Value>,
    ) -> Result<(), RecordError> {
        let updated: bool = self
            .call_kw(
                FUNNEL_MODEL,
                "write",
                json!([[record_id], values]),
                json!({}),
            )
            .await?;
        if !updated {
            return Err(RecordError::Rpc(format!(
                "write on {} {} returned false",
                FUNNEL_MODEL, record_id
            )));
        }
        Ok(())
    }
}

impl OdooSession {
    async fn invoice_ids(&self, quotation_id: i64) -> Result<Vec<i64>, RecordError> {
        let record = self
            .read_record("sale.order", quotation_id, &["invoice_ids"])
            .await?
            .ok_or_else(|| {
                RecordError::NotFound(format!("sale.order {} not found", quotation_id))
            })?;
        Ok(record["invoice_ids"]
            .as_array()
            .map(|ids| ids.iter().filter_map(value_i64).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_read_as_none() {
        // Odoo serializes null-ish fields as `false`.
        let record = json!({ "name": false, "x_studio_platform_count": false });
        assert_eq!(value_str(&record["name"]), None);
        assert_eq!(value_i64(&record["x_studio_platform_count"]), None);
    }

    #[test]
    fn funnel_creation_stamps_the_reached_step() {
        let values = funnel_create_values(&NewFunnelSession {
            session_id: "sess-1".to_string(),
            step: "battery".to_string(),
            ..Default::default()
        });
        assert_eq!(values["x_studio_step_reached"], "battery");
        assert_eq!(values["x_studio_session_id"], "sess-1");
        assert!(values.get("x_studio_current_step").is_none());
    }

    #[test]
    fn report_names_match_templates() {
        assert_eq!(report_name(ReportKind::Quotation), "sale.report_saleorder");
        assert_eq!(report_name(ReportKind::Invoice), "account.report_invoice");
        assert_eq!(
            report_name(ReportKind::DeliveryNote),
            "stock.report_deliveryslip"
        );
    }
}
