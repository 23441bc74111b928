//! Outbound email message types.

/// An email message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Primary recipients
    pub to: Vec<String>,
    /// Reply-To address
    pub reply_to: Option<String>,
    /// Email subject
    pub subject: String,
    /// HTML body
    pub html: String,
    /// File attachments
    pub attachments: Vec<EmailAttachment>,
}

impl OutboundEmail {
    /// Create a new email with a single recipient.
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            reply_to: None,
            subject: subject.into(),
            html: html.into(),
            attachments: Vec::new(),
        }
    }

    /// Set the Reply-To address.
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Add an attachment.
    pub fn attach(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A file attachment for an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    /// Filename to display
    pub filename: String,
    /// MIME content type (e.g., "application/pdf")
    pub content_type: String,
    /// Raw file data
    pub data: Vec<u8>,
}

impl EmailAttachment {
    /// Create an attachment from raw data.
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// A PDF attachment.
    pub fn pdf(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(filename, "application/pdf", data)
    }
}
