//! Funnel telemetry sanitization.
//!
//! Every enumerated field is checked against an explicit allow-list before
//! being applied; disallowed values are silently dropped rather than
//! rejected. Free-form numeric and text fields pass through uninspected.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Permitted funnel steps (the record-store field is a selection).
pub const ALLOWED_STEPS: [&str; 5] = ["start", "battery", "pv", "results", "order"];
/// Permitted interface languages.
pub const ALLOWED_LANGS: [&str; 3] = ["fr", "nl", "en"];
/// Permitted countries.
pub const ALLOWED_COUNTRIES: [&str; 2] = ["be", "fr"];
/// Permitted device classes.
pub const ALLOWED_DEVICES: [&str; 3] = ["desktop", "mobile", "tablet"];
/// Permitted installation options.
pub const ALLOWED_INSTALL_OPTIONS: [&str; 3] = ["battery_only", "battery_pv", "none"];
/// Permitted PV-presence answers.
pub const ALLOWED_PV: [&str; 2] = ["yes", "no"];
/// Permitted acquisition sources.
pub const ALLOWED_SOURCES: [&str; 5] = ["ads", "direct", "organic", "referral", "unknown"];

/// One telemetry call from the funnel frontend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryRequest {
    pub session_id: String,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub increment_clicked_order: Option<i64>,
    #[serde(default)]
    pub consumption_input: Option<f64>,
    #[serde(default)]
    pub know_conso: Option<bool>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub battery_model: Option<String>,
    #[serde(default)]
    pub battery_count: Option<i64>,
    #[serde(default)]
    pub install_option: Option<String>,
    #[serde(default)]
    pub has_pv: Option<String>,
    #[serde(default)]
    pub pv_panels: Option<i64>,
    #[serde(default)]
    pub pose_type: Option<String>,
    #[serde(default)]
    pub gain_eur: Option<f64>,
    #[serde(default)]
    pub payback_year: Option<f64>,
    #[serde(default)]
    pub invest_ttc: Option<f64>,
    #[serde(default)]
    pub command_sent: Option<bool>,
}

impl TelemetryRequest {
    /// The timestamped summary line appended to the event log on every call.
    pub fn event_log_line(&self, now: DateTime<Utc>) -> String {
        format!(
            "[{}] step={} completed={} clicked={}",
            now.to_rfc3339(),
            self.step.as_deref().unwrap_or(""),
            u8::from(self.completed == Some(true)),
            u8::from(self.increment_clicked_order == Some(1)),
        )
    }
}

/// Outcome of a telemetry upsert, distinguishing a log-only call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOutcome {
    /// A new session record was created.
    Created { record_id: i64 },
    /// Recognized fields changed on an existing record.
    Updated { record_id: i64 },
    /// Only the event log line was appended.
    Noop { record_id: i64 },
}

fn allowed<'a>(value: &'a Option<String>, list: &[&str]) -> Option<&'a str> {
    value
        .as_deref()
        .filter(|candidate| list.contains(candidate))
}

/// Build the sanitized field update for a telemetry call.
///
/// Keys are record-store field names. The event log is handled separately
/// by the caller, which appends rather than replaces.
pub fn sanitize_telemetry(req: &TelemetryRequest) -> Map<String, Value> {
    let mut values = Map::new();

    if let Some(step) = allowed(&req.step, &ALLOWED_STEPS) {
        values.insert("x_studio_step_reached".into(), step.into());
    }
    if let Some(lang) = allowed(&req.lang, &ALLOWED_LANGS) {
        values.insert("x_studio_lang".into(), lang.into());
    }
    if let Some(country) = allowed(&req.country, &ALLOWED_COUNTRIES) {
        values.insert("x_studio_country".into(), country.into());
    }
    if let Some(device) = allowed(&req.device, &ALLOWED_DEVICES) {
        values.insert("x_studio_device".into(), device.into());
    }
    if let Some(source) = allowed(&req.source, &ALLOWED_SOURCES) {
        values.insert("x_studio_source".into(), source.into());
    }
    if let Some(option) = allowed(&req.install_option, &ALLOWED_INSTALL_OPTIONS) {
        values.insert("x_studio_install_option".into(), option.into());
    }
    if let Some(has_pv) = allowed(&req.has_pv, &ALLOWED_PV) {
        values.insert("x_studio_has_pv".into(), has_pv.into());
    }

    // Free-form fields pass through uninspected.
    if let Some(consumption) = req.consumption_input {
        values.insert("x_studio_consumption_input".into(), consumption.into());
    }
    if let Some(know_conso) = req.know_conso {
        values.insert("x_studio_know_conso".into(), know_conso.into());
    }
    if let Some(model) = &req.battery_model {
        values.insert("x_studio_battery_model".into(), model.as_str().into());
    }
    if let Some(count) = req.battery_count {
        values.insert("x_studio_battery_count".into(), count.into());
    }
    if let Some(panels) = req.pv_panels {
        // Stored as text in the record store.
        values.insert("x_studio_pv_panels".into(), panels.to_string().into());
    }
    if let Some(pose) = &req.pose_type {
        values.insert("x_studio_pose_type".into(), pose.as_str().into());
    }
    if let Some(gain) = req.gain_eur {
        values.insert("x_studio_gain_eur".into(), gain.into());
    }
    if let Some(payback) = req.payback_year {
        values.insert("x_studio_payback_year".into(), payback.into());
    }
    if let Some(invest) = req.invest_ttc {
        values.insert("x_studio_invest_ttc".into(), invest.into());
    }
    if let Some(sent) = req.command_sent {
        values.insert("x_studio_command_sent".into(), sent.into());
    }
    if req.completed == Some(true) {
        values.insert("x_studio_order_sent".into(), true.into());
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_step_is_applied() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            step: Some("battery".into()),
            ..Default::default()
        };
        let values = sanitize_telemetry(&req);
        assert_eq!(values["x_studio_step_reached"], "battery");
    }

    #[test]
    fn bogus_enum_values_are_dropped_silently() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            step: Some("bogus_value".into()),
            lang: Some("de".into()),
            device: Some("watch".into()),
            ..Default::default()
        };
        let values = sanitize_telemetry(&req);
        assert!(values.is_empty());
    }

    #[test]
    fn free_form_fields_pass_through() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            consumption_input: Some(3500.0),
            pose_type: Some("flat roof".into()),
            pv_panels: Some(8),
            ..Default::default()
        };
        let values = sanitize_telemetry(&req);
        assert_eq!(values["x_studio_consumption_input"], 3500.0);
        assert_eq!(values["x_studio_pose_type"], "flat roof");
        assert_eq!(values["x_studio_pv_panels"], "8");
    }

    #[test]
    fn completed_only_sets_order_sent_when_true() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            completed: Some(false),
            ..Default::default()
        };
        assert!(sanitize_telemetry(&req).is_empty());
    }

    #[test]
    fn event_log_line_format() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            step: Some("pv".into()),
            completed: Some(true),
            ..Default::default()
        };
        let now = DateTime::parse_from_rfc3339("2026-02-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let line = req.event_log_line(now);
        assert!(line.starts_with("[2026-02-01T10:00:00"));
        assert!(line.contains("step=pv"));
        assert!(line.ends_with("completed=1 clicked=0"));
    }
}
