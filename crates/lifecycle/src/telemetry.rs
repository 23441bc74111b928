//! Funnel telemetry upsert, keyed by client session id.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use order_core::{
    sanitize_telemetry, BlobStore, EmailSender, NewFunnelSession, OrderStore, RecordSession,
    RecordStore, TelemetryOutcome, TelemetryRequest, ValidationError,
};

use crate::error::LifecycleError;
use crate::Lifecycle;

impl<R, O, B, M> Lifecycle<R, O, B, M>
where
    R: RecordStore,
    O: OrderStore,
    B: BlobStore,
    M: EmailSender,
{
    /// Upsert one telemetry call: create-if-absent, else partial update.
    ///
    /// The event log is appended on every call, including calls where no
    /// recognized field changed; those report [`TelemetryOutcome::Noop`].
    pub async fn record_telemetry(
        &self,
        request: &TelemetryRequest,
    ) -> Result<TelemetryOutcome, LifecycleError> {
        if request.session_id.trim().is_empty() {
            return Err(ValidationError::Missing("session_id").into());
        }

        let session = self.records.connect().await?;
        let sanitized = sanitize_telemetry(request);
        let log_line = request.event_log_line(Utc::now());
        let clicked = request.increment_clicked_order == Some(1);

        match session.find_funnel_session(&request.session_id).await? {
            None => {
                let record_id = session
                    .create_funnel_session(&NewFunnelSession {
                        session_id: request.session_id.clone(),
                        step: sanitized
                            .get("x_studio_step_reached")
                            .and_then(Value::as_str)
                            .unwrap_or("start")
                            .to_string(),
                        order_sent: request.completed == Some(true),
                        clicked_order_count: i64::from(clicked),
                        consumption_input: request.consumption_input,
                        lang: sanitized
                            .get("x_studio_lang")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .await?;

                let mut values = sanitized;
                values.insert("x_studio_event_log".into(), log_line.into());
                session.update_funnel_session(record_id, &values).await?;

                debug!(session_id = %request.session_id, record_id, "funnel session created");
                Ok(TelemetryOutcome::Created { record_id })
            }
            Some(existing) => {
                let changed = !sanitized.is_empty() || clicked;

                let mut values = sanitized;
                if clicked {
                    values.insert(
                        "x_studio_clicked_order_count".into(),
                        (existing.clicked_order_count + 1).into(),
                    );
                }
                // Appended, never replaced.
                let log = if existing.event_log.is_empty() {
                    log_line
                } else {
                    format!("{}\n{}", existing.event_log, log_line)
                };
                values.insert("x_studio_event_log".into(), log.into());

                session
                    .update_funnel_session(existing.record_id, &values)
                    .await?;

                let record_id = existing.record_id;
                debug!(session_id = %request.session_id, record_id, changed, "funnel session updated");
                Ok(if changed {
                    TelemetryOutcome::Updated { record_id }
                } else {
                    TelemetryOutcome::Noop { record_id }
                })
            }
        }
    }
}
