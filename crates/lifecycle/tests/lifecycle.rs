//! End-to-end lifecycle tests against the in-memory fakes.

use lifecycle::{
    IntakeClient, IntakeRequest, Lifecycle, LifecycleConfig, PaymentOutcome, ScanOutcome,
    SimulationSummary,
};
use mock_store::{MockBlobStore, MockOrderStore, MockRecords, RecordingMailer};
use order_core::{
    effects, BlobStore, DeliveryStatus, FunnelSession, PaymentStatus, PdfKind, ProductLine,
    TelemetryOutcome, TelemetryRequest, WorkKind,
};

type TestLifecycle = Lifecycle<MockRecords, MockOrderStore, MockBlobStore, RecordingMailer>;

struct Platform {
    lifecycle: TestLifecycle,
    records: MockRecords,
    orders: MockOrderStore,
    blobs: MockBlobStore,
    mailer: RecordingMailer,
}

fn platform() -> Platform {
    platform_with(LifecycleConfig::new("office@voltra.example"))
}

fn platform_with(config: LifecycleConfig) -> Platform {
    let records = MockRecords::new();
    let orders = MockOrderStore::new();
    let blobs = MockBlobStore::new();
    let mailer = RecordingMailer::new();
    let lifecycle = Lifecycle::new(
        records.clone(),
        orders.clone(),
        blobs.clone(),
        mailer.clone(),
        config,
    );
    Platform {
        lifecycle,
        records,
        orders,
        blobs,
        mailer,
    }
}

fn line(product_ref: i64, quantity: i64, unit_price: f64) -> ProductLine {
    ProductLine {
        product_ref,
        quantity,
        unit_price,
    }
}

fn pv_request() -> IntakeRequest {
    IntakeRequest {
        client: IntakeClient {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+3221234567".into(),
            street: "Rue Haute".into(),
            street_number: "12".into(),
            zip: "1000".into(),
            city: "Bruxelles".into(),
            ..Default::default()
        },
        simulation: SimulationSummary {
            consumption: 3500.0,
            capacity: 5.0,
            invest_ttc: 7200.0,
            description: "Simulation PV + batterie".into(),
        },
        order_products: vec![line(16, 4, 200.0), line(27, 1, 300.0)],
        source: None,
    }
}

#[tokio::test]
async fn intake_classifies_work_and_sends_quote() {
    let p = platform();

    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();

    assert_eq!(outcome.platform_count, 1);
    assert_eq!(outcome.work.kind, WorkKind::Pv);
    assert_eq!(outcome.work.panel_count, 4);
    assert!(outcome.portal_url.is_some());

    let order = p.orders.order(&outcome.order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.has_pdf(PdfKind::DevisUnsigned));
    assert!(order.effect_done(effects::EMAIL_QUOTE));

    // ERP got customer, opportunity, quotation, and both lines.
    assert_eq!(p.records.customers().len(), 1);
    assert_eq!(p.records.opportunities().len(), 1);
    assert_eq!(p.records.quotations().len(), 1);
    assert_eq!(p.records.lines().len(), 2);

    // Quote email with the portal link and the PDF attached.
    let sent = p.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ada@example.com"]);
    assert!(sent[0].html.contains("Signer mon devis"));
    assert_eq!(sent[0].attachments.len(), 1);

    // The uploaded object is the rendered report.
    let path = format!(
        "requests/1/devis-unsigned-{}.pdf",
        outcome.quotation_id
    );
    assert!(p.blobs.object(&path).is_some());
}

#[tokio::test]
async fn invalid_line_aborts_before_any_external_write() {
    let p = platform();
    let mut request = pv_request();
    request.order_products[1].quantity = 0;

    let result = p.lifecycle.intake(&request).await;
    assert!(result.is_err());

    // Nothing was reserved or created anywhere.
    assert!(p.orders.all().is_empty());
    assert!(p.records.customers().is_empty());
    assert_eq!(p.records.sessions_opened(), 0);
    assert!(p.mailer.sent().is_empty());

    // The counter was not burned: the next intake still gets count 1.
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    assert_eq!(outcome.platform_count, 1);
}

#[tokio::test]
async fn counts_are_strictly_increasing() {
    let p = platform();
    let a = p.lifecycle.intake(&pv_request()).await.unwrap();
    let b = p.lifecycle.intake(&pv_request()).await.unwrap();
    let c = p.lifecycle.intake(&pv_request()).await.unwrap();
    assert_eq!(
        (a.platform_count, b.platform_count, c.platform_count),
        (1, 2, 3)
    );
}

#[tokio::test(start_paused = true)]
async fn payment_confirmation_finalizes_the_order() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    let quotation_id = outcome.quotation_id;

    p.records.add_transaction("pi_42", "done", vec![quotation_id]);
    p.records.set_quotation_state(quotation_id, "sale");
    // Invoice turns up on the third poll, inside the 5-attempt budget.
    p.records.set_invoice_after(quotation_id, 9001, 2);

    let result = p.lifecycle.confirm_payment("pi_42").await.unwrap();
    assert_eq!(result, PaymentOutcome::Paid { invoiced: true });

    let order = p.orders.order(&outcome.order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.paid_at.is_some());
    assert!(order.has_pdf(PdfKind::Invoice));
    assert!(order.has_pdf(PdfKind::DevisSigned));
    assert!(order.has_pdf(PdfKind::SupplierDeliveryNote));
    assert!(order.effect_done(effects::EMAIL_FULFILLMENT));
    assert!(order.effect_done(effects::EMAIL_CUSTOMER_PAID));

    let delivery = order.delivery.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert!(delivery.token.len() >= 32);

    // Quote email from intake, then fulfillment + customer confirmation.
    let subjects = p.mailer.subjects();
    assert_eq!(subjects.len(), 3);
    assert!(subjects[1].contains("Nouvelle commande payée"));
    assert!(subjects[2].contains("Confirmation de paiement"));
}

#[tokio::test(start_paused = true)]
async fn replayed_payment_event_changes_nothing() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);

    let first = p.lifecycle.confirm_payment("pi_42").await.unwrap();
    assert_eq!(first, PaymentOutcome::Paid { invoiced: true });
    let order_before = p.orders.order(&outcome.order_id).unwrap();
    let emails_before = p.mailer.sent().len();

    let replay = p.lifecycle.confirm_payment("pi_42").await.unwrap();
    assert_eq!(replay, PaymentOutcome::AlreadyPaid);
    assert_eq!(p.orders.order(&outcome.order_id).unwrap(), order_before);
    assert_eq!(p.mailer.sent().len(), emails_before);
}

#[tokio::test(start_paused = true)]
async fn unsettled_or_unknown_transactions_are_ignored() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();

    assert_eq!(
        p.lifecycle.confirm_payment("pi_missing").await.unwrap(),
        PaymentOutcome::Ignored
    );

    p.records
        .add_transaction("pi_pending", "pending", vec![outcome.quotation_id]);
    assert_eq!(
        p.lifecycle.confirm_payment("pi_pending").await.unwrap(),
        PaymentOutcome::Ignored
    );

    let order = p.orders.order(&outcome.order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn invoice_budget_exhaustion_defers_to_reconciliation() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    // Invoice would only appear on the seventh poll; the budget is five.
    p.records.set_invoice_after(outcome.quotation_id, 9001, 6);

    let result = p.lifecycle.confirm_payment("pi_42").await.unwrap();
    assert_eq!(result, PaymentOutcome::Paid { invoiced: false });

    let order = p.orders.order(&outcome.order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    // No invoice, no delivery record, no paid emails.
    assert!(!order.has_pdf(PdfKind::Invoice));
    assert!(order.delivery.is_none());
    assert!(!order.effect_done(effects::EMAIL_CUSTOMER_PAID));
}

#[tokio::test(start_paused = true)]
async fn scans_walk_the_delivery_state_machine_once() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    let count = outcome.platform_count;

    // Before payment there is no delivery record.
    assert_eq!(
        p.lifecycle.record_scan(count).await.unwrap(),
        ScanOutcome::NotReady
    );
    assert_eq!(
        p.lifecycle.record_scan(999).await.unwrap(),
        ScanOutcome::NotFound
    );

    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);
    p.lifecycle.confirm_payment("pi_42").await.unwrap();

    assert_eq!(
        p.lifecycle.record_scan(count).await.unwrap(),
        ScanOutcome::Shipped
    );
    assert_eq!(
        p.lifecycle.record_scan(count).await.unwrap(),
        ScanOutcome::Received
    );

    let order = p.orders.order(&outcome.order_id).unwrap();
    let delivery = order.delivery.clone().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Received);
    assert!(delivery.shipped_at.is_some());
    assert!(delivery.received_at.is_some());

    // A further scan mutates nothing.
    let before = p.mailer.sent().len();
    assert_eq!(
        p.lifecycle.record_scan(count).await.unwrap(),
        ScanOutcome::AlreadyProcessed
    );
    assert_eq!(p.orders.order(&outcome.order_id).unwrap(), order);
    assert_eq!(p.mailer.sent().len(), before);

    let subjects = p.mailer.subjects();
    assert_eq!(
        subjects
            .iter()
            .filter(|s| s.contains("expédiée"))
            .count(),
        1
    );
    assert_eq!(
        subjects.iter().filter(|s| s.contains("livrée")).count(),
        1
    );
}

#[tokio::test]
async fn reconciliation_marks_settled_invoices_paid() {
    let p = platform();
    let paid = p.lifecycle.intake(&pv_request()).await.unwrap();
    let waiting = p.lifecycle.intake(&pv_request()).await.unwrap();

    p.records
        .set_invoice_payment_state(paid.quotation_id, "paid");
    p.records
        .set_invoice_payment_state(waiting.quotation_id, "not_paid");

    let summary = p.lifecycle.reconcile_pending().await.unwrap();
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.errors, 0);

    assert_eq!(
        p.orders.order(&paid.order_id).unwrap().payment_status,
        PaymentStatus::Paid
    );
    assert_eq!(
        p.orders.order(&waiting.order_id).unwrap().payment_status,
        PaymentStatus::Pending
    );

    // A second sweep has nothing left for the settled order.
    let again = p.lifecycle.reconcile_pending().await.unwrap();
    assert_eq!(again.pending, 1);
    assert_eq!(again.updated, 0);
}

#[tokio::test]
async fn telemetry_creates_then_updates_then_noops() {
    let p = platform();

    let created = p
        .lifecycle
        .record_telemetry(&TelemetryRequest {
            session_id: "sess-1".into(),
            step: Some("start".into()),
            lang: Some("fr".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let record_id = match created {
        TelemetryOutcome::Created { record_id } => record_id,
        other => panic!("expected Created, got {:?}", other),
    };

    let updated = p
        .lifecycle
        .record_telemetry(&TelemetryRequest {
            session_id: "sess-1".into(),
            step: Some("battery".into()),
            increment_clicked_order: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated, TelemetryOutcome::Updated { record_id });

    // A bogus enum value is dropped; only the log line is written.
    let noop = p
        .lifecycle
        .record_telemetry(&TelemetryRequest {
            session_id: "sess-1".into(),
            step: Some("bogus_step".into()),
            device: Some("smartwatch".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(noop, TelemetryOutcome::Noop { record_id });

    let updates = p.records.funnel_updates();
    let (_, last) = updates.last().unwrap();
    assert_eq!(last.len(), 1);
    assert!(last.contains_key("x_studio_event_log"));
    // Three calls, three appended log lines.
    let log = last["x_studio_event_log"].as_str().unwrap();
    assert_eq!(log.lines().count(), 3);

    // The clicked counter was incremented exactly once.
    let clicked_update = updates
        .iter()
        .find_map(|(_, values)| values.get("x_studio_clicked_order_count"))
        .unwrap();
    assert_eq!(clicked_update.as_i64(), Some(1));
}

#[tokio::test]
async fn telemetry_requires_a_session_id() {
    let p = platform();
    let result = p
        .lifecycle
        .record_telemetry(&TelemetryRequest::default())
        .await;
    assert!(result.is_err());
    assert_eq!(p.records.sessions_opened(), 0);
}

#[tokio::test]
async fn quote_pdf_requires_payment() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();

    let err = p
        .lifecycle
        .fetch_quote_pdf(outcome.platform_count, "ada@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, lifecycle::LifecycleError::NotPaid(_)));

    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);
    p.lifecycle.confirm_payment("pi_42").await.unwrap();

    let bytes = p
        .lifecycle
        .fetch_quote_pdf(outcome.platform_count, "ada@example.com")
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    // Wrong email behaves like an unknown order.
    let err = p
        .lifecycle
        .fetch_quote_pdf(outcome.platform_count, "mallory@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, lifecycle::LifecycleError::UnknownOrder(_)));
}

#[tokio::test(start_paused = true)]
async fn failed_scan_email_is_recorded_and_not_retried() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);
    p.lifecycle.confirm_payment("pi_42").await.unwrap();

    let before = p.mailer.sent().len();
    p.mailer.fail_sends();

    assert_eq!(
        p.lifecycle.record_scan(outcome.platform_count).await.unwrap(),
        ScanOutcome::Shipped
    );

    // The effect is recorded after the failed attempt, so the send is
    // never retried.
    let order = p.orders.order(&outcome.order_id).unwrap();
    assert!(order.effect_done(effects::EMAIL_SHIPPED));
    assert_eq!(p.mailer.sent().len(), before);

    // And the state machine keeps moving.
    assert_eq!(
        p.lifecycle.record_scan(outcome.platform_count).await.unwrap(),
        ScanOutcome::Received
    );
    let order = p.orders.order(&outcome.order_id).unwrap();
    assert!(order.effect_done(effects::EMAIL_RECEIVED));
    assert_eq!(order.delivery.unwrap().status, DeliveryStatus::Received);
}

#[tokio::test(start_paused = true)]
async fn failing_mailer_does_not_block_payment_finalization() {
    let config = LifecycleConfig::new("office@voltra.example")
        .with_legal_attachment("cgv.pdf", "legal/cgv.pdf");
    let p = platform_with(config);
    p.mailer.fail_sends();

    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);

    let result = p.lifecycle.confirm_payment("pi_42").await.unwrap();
    assert_eq!(result, PaymentOutcome::Paid { invoiced: true });

    // State, documents, and the delivery record all survive the outage.
    let order = p.orders.order(&outcome.order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.has_pdf(PdfKind::Invoice));
    assert!(order.has_pdf(PdfKind::DevisSigned));
    assert!(order.delivery.is_some());

    // Paid emails only record their effect on success, so a replay can
    // still deliver them once the mailer recovers.
    assert!(!order.effect_done(effects::EMAIL_FULFILLMENT));
    assert!(!order.effect_done(effects::EMAIL_CUSTOMER_PAID));
    assert!(p.mailer.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn customer_confirmation_carries_legal_attachments() {
    let config = LifecycleConfig::new("office@voltra.example")
        .with_legal_attachment("cgv.pdf", "legal/cgv.pdf");
    let p = platform_with(config);
    p.blobs
        .upload("legal/cgv.pdf", b"%PDF-1.4 cgv", "application/pdf")
        .await
        .unwrap();

    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();
    p.records
        .add_transaction("pi_42", "done", vec![outcome.quotation_id]);
    p.records.set_quotation_state(outcome.quotation_id, "sale");
    p.records.set_invoice(outcome.quotation_id, 9001);
    p.lifecycle.confirm_payment("pi_42").await.unwrap();

    let sent = p.mailer.sent();
    let customer = sent
        .iter()
        .find(|email| email.subject.contains("Confirmation de paiement"))
        .unwrap();
    // Signed quote, invoice, and the fixed legal document.
    assert_eq!(customer.attachments.len(), 3);
    assert!(customer
        .attachments
        .iter()
        .any(|attachment| attachment.filename == "cgv.pdf"));
}

#[tokio::test]
async fn record_store_outage_fails_intake_cleanly() {
    let p = platform();
    p.records.fail_connect();

    let result = p.lifecycle.intake(&pv_request()).await;
    assert!(result.is_err());

    // No order document, no email; only the reserved count is burned.
    assert!(p.orders.all().is_empty());
    assert!(p.mailer.sent().is_empty());
}

#[tokio::test]
async fn telemetry_updates_a_preexisting_session() {
    let p = platform();
    p.records.seed_funnel_session(
        FunnelSession {
            record_id: 777,
            clicked_order_count: 2,
            event_log: "[2026-02-01T10:00:00+00:00] step=start completed=0 clicked=0".into(),
        },
        "sess-old",
    );

    let outcome = p
        .lifecycle
        .record_telemetry(&TelemetryRequest {
            session_id: "sess-old".into(),
            increment_clicked_order: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome, TelemetryOutcome::Updated { record_id: 777 });

    let updates = p.records.funnel_updates();
    let (record_id, values) = updates.last().unwrap();
    assert_eq!(*record_id, 777);
    assert_eq!(values["x_studio_clicked_order_count"].as_i64(), Some(3));
    assert_eq!(
        values["x_studio_event_log"].as_str().unwrap().lines().count(),
        2
    );
}

#[tokio::test]
async fn archive_is_idempotent() {
    let p = platform();
    let outcome = p.lifecycle.intake(&pv_request()).await.unwrap();

    // Intake already archived the unsigned quote.
    let archived = p
        .lifecycle
        .save_quote_pdf(outcome.platform_count, "ada@example.com")
        .await
        .unwrap();
    assert!(archived.already_archived);
    assert_eq!(p.blobs.paths().len(), 1);
}
