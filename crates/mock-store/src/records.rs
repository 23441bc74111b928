use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use order_core::{
    FunnelSession, InvoicePaymentState, NewCustomer, NewFunnelSession, NewOpportunity,
    NewQuotation, PaymentTransaction, ProductLine, RecordError, RecordSession, RecordStore,
    ReportKind,
};

#[derive(Default)]
struct State {
    next_id: i64,
    sessions_opened: u32,
    fail_connect: bool,

    customers: Vec<NewCustomer>,
    opportunities: Vec<NewOpportunity>,
    quotations: Vec<(i64, NewQuotation)>,
    lines: Vec<(i64, ProductLine)>,

    quotation_states: BTreeMap<i64, String>,
    platform_counts: BTreeMap<i64, i64>,
    transactions: BTreeMap<String, PaymentTransaction>,
    /// (invoice id, polls remaining before it turns up)
    invoices: BTreeMap<i64, (i64, u32)>,
    invoice_states: BTreeMap<i64, String>,

    funnel_sessions: BTreeMap<String, FunnelSession>,
    funnel_updates: Vec<(i64, Map<String, Value>)>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        500 + self.next_id
    }
}

/// Scriptable in-memory ERP.
#[derive(Clone, Default)]
pub struct MockRecords {
    state: Arc<Mutex<State>>,
}

impl MockRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail, to exercise error paths.
    pub fn fail_connect(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    /// Script the workflow state returned for a quotation.
    pub fn set_quotation_state(&self, quotation_id: i64, state: &str) {
        self.state
            .lock()
            .unwrap()
            .quotation_states
            .insert(quotation_id, state.to_string());
    }

    /// Script the platform count stamped on a quotation.
    pub fn set_platform_count(&self, quotation_id: i64, count: i64) {
        self.state
            .lock()
            .unwrap()
            .platform_counts
            .insert(quotation_id, count);
    }

    /// Script a payment transaction looked up by provider reference.
    pub fn add_transaction(&self, reference: &str, state: &str, sale_order_ids: Vec<i64>) {
        self.state.lock().unwrap().transactions.insert(
            reference.to_string(),
            PaymentTransaction {
                state: state.to_string(),
                sale_order_ids,
            },
        );
    }

    /// Script a posted invoice that becomes visible after `polls` lookups.
    pub fn set_invoice_after(&self, quotation_id: i64, invoice_id: i64, polls: u32) {
        self.state
            .lock()
            .unwrap()
            .invoices
            .insert(quotation_id, (invoice_id, polls));
    }

    /// Script an immediately visible posted invoice.
    pub fn set_invoice(&self, quotation_id: i64, invoice_id: i64) {
        self.set_invoice_after(quotation_id, invoice_id, 0);
    }

    /// Script the payment state of a quotation's invoice.
    pub fn set_invoice_payment_state(&self, quotation_id: i64, state: &str) {
        self.state
            .lock()
            .unwrap()
            .invoice_states
            .insert(quotation_id, state.to_string());
    }

    /// Seed an existing funnel session.
    pub fn seed_funnel_session(&self, session: FunnelSession, session_id: &str) {
        self.state
            .lock()
            .unwrap()
            .funnel_sessions
            .insert(session_id.to_string(), session);
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.lock().unwrap().sessions_opened
    }

    pub fn customers(&self) -> Vec<NewCustomer> {
        self.state.lock().unwrap().customers.clone()
    }

    pub fn opportunities(&self) -> Vec<NewOpportunity> {
        self.state.lock().unwrap().opportunities.clone()
    }

    pub fn quotations(&self) -> Vec<(i64, NewQuotation)> {
        self.state.lock().unwrap().quotations.clone()
    }

    pub fn lines(&self) -> Vec<(i64, ProductLine)> {
        self.state.lock().unwrap().lines.clone()
    }

    pub fn funnel_updates(&self) -> Vec<(i64, Map<String, Value>)> {
        self.state.lock().unwrap().funnel_updates.clone()
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    type Session = MockSession;

    async fn connect(&self) -> Result<MockSession, RecordError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(RecordError::Auth("scripted connect failure".to_string()));
        }
        state.sessions_opened += 1;
        Ok(MockSession {
            state: self.state.clone(),
        })
    }
}

/// One fake session; shares state with the [`MockRecords`] that minted it.
#[derive(Clone)]
pub struct MockSession {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl RecordSession for MockSession {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<i64, RecordError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.customers.push(customer.clone());
        Ok(id)
    }

    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<i64, RecordError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.opportunities.push(opportunity.clone());
        Ok(id)
    }

    async fn create_quotation(&self, quotation: &NewQuotation) -> Result<i64, RecordError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.quotations.push((id, quotation.clone()));
        state
            .platform_counts
            .insert(id, quotation.platform_count);
        Ok(id)
    }

    async fn add_quotation_line(
        &self,
        quotation_id: i64,
        line: &ProductLine,
    ) -> Result<(), RecordError> {
        self.state
            .lock()
            .unwrap()
            .lines
            .push((quotation_id, *line));
        Ok(())
    }

    async fn quotation_name(&self, quotation_id: i64) -> Result<Option<String>, RecordError> {
        Ok(Some(format!("S{:05}", quotation_id)))
    }

    async fn portal_url(&self, quotation_id: i64) -> Result<Option<String>, RecordError> {
        Ok(Some(format!(
            "https://erp.example/my/orders/{}?access_token=mock",
            quotation_id
        )))
    }

    async fn quotation_state(&self, quotation_id: i64) -> Result<String, RecordError> {
        let state = self.state.lock().unwrap();
        state
            .quotation_states
            .get(&quotation_id)
            .cloned()
            .ok_or_else(|| RecordError::NotFound(format!("sale.order {}", quotation_id)))
    }

    async fn find_payment_transaction(
        &self,
        provider_reference: &str,
    ) -> Result<Option<PaymentTransaction>, RecordError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .get(provider_reference)
            .cloned())
    }

    async fn platform_count(&self, quotation_id: i64) -> Result<Option<i64>, RecordError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .platform_counts
            .get(&quotation_id)
            .copied())
    }

    async fn find_posted_invoice(&self, quotation_id: i64) -> Result<Option<i64>, RecordError> {
        let mut state = self.state.lock().unwrap();
        match state.invoices.get_mut(&quotation_id) {
            Some((invoice_id, 0)) => Ok(Some(*invoice_id)),
            Some((_, polls)) => {
                *polls -= 1;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn invoice_payment_state(
        &self,
        quotation_id: i64,
    ) -> Result<InvoicePaymentState, RecordError> {
        let state = self.state.lock().unwrap();
        Ok(match state.invoice_states.get(&quotation_id) {
            Some(payment_state) => InvoicePaymentState::State(payment_state.clone()),
            None => InvoicePaymentState::NoInvoice,
        })
    }

    async fn render_report(
        &self,
        kind: ReportKind,
        record_id: i64,
    ) -> Result<Vec<u8>, RecordError> {
        let label = match kind {
            ReportKind::Quotation => "quotation",
            ReportKind::Invoice => "invoice",
            ReportKind::DeliveryNote => "delivery-note",
        };
        Ok(format!("%PDF-1.4 mock {} {}", label, record_id).into_bytes())
    }

    async fn find_funnel_session(
        &self,
        session_id: &str,
    ) -> Result<Option<FunnelSession>, RecordError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .funnel_sessions
            .get(session_id)
            .cloned())
    }

    async fn create_funnel_session(&self, session: &NewFunnelSession) -> Result<i64, RecordError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.funnel_sessions.insert(
            session.session_id.clone(),
            FunnelSession {
                record_id: id,
                clicked_order_count: session.clicked_order_count,
                event_log: String::new(),
            },
        );
        Ok(id)
    }

    async fn update_funnel_session(
        &self,
        record_id: i64,
        values: &Map<String, Value>,
    ) -> Result<(), RecordError> {
        let mut state = self.state.lock().unwrap();
        // Writes land on the stored record so later reads see them.
        if let Some(session) = state
            .funnel_sessions
            .values_mut()
            .find(|session| session.record_id == record_id)
        {
            if let Some(log) = values.get("x_studio_event_log").and_then(Value::as_str) {
                session.event_log = log.to_string();
            }
            if let Some(clicked) = values
                .get("x_studio_clicked_order_count")
                .and_then(Value::as_i64)
            {
                session.clicked_order_count = clicked;
            }
        }
        state.funnel_updates.push((record_id, values.clone()));
        Ok(())
    }
}
