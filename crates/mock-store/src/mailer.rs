use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use order_core::{EmailError, EmailSender, OutboundEmail};

/// Records every message instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail, to exercise warn-and-continue paths.
    pub fn fail_sends(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Subjects sent so far, in order.
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|email| email.subject.clone())
            .collect()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        if *self.fail.lock().unwrap() {
            return Err(EmailError::Rejected("scripted send failure".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
