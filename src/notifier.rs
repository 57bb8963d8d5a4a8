use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::MailSettings;
use crate::models::SupportTicket;

/// OutboundEmail
///
/// A fully rendered plain-text message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail transport is not configured")]
    NotConfigured,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Notifier
///
/// Outbound notification contract. Every caller treats delivery as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError>;
}

pub type NotifierState = Arc<dyn Notifier>;

/// LogMailer
///
/// Records outbound messages, addressed for the configured relay, in the structured
/// log. It does not speak SMTP; a real transport is another `Notifier` impl. Without
/// relay credentials every send fails with `NotConfigured`.
#[derive(Clone, Debug)]
pub struct LogMailer {
    settings: MailSettings,
}

impl LogMailer {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Notifier for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError> {
        if self.settings.username.is_empty() || self.settings.password.is_empty() {
            return Err(NotifyError::NotConfigured);
        }

        tracing::info!(
            relay = %format!("{}:{}", self.settings.server, self.settings.port),
            from = %self.settings.default_sender,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "outbound email"
        );
        Ok(())
    }
}

/// notify_best_effort
///
/// Sends `email` and reports whether it went out. Failures are logged, never returned.
pub async fn notify_best_effort(notifier: &NotifierState, email: OutboundEmail) -> bool {
    let to = email.to.clone();
    match notifier.send(email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(to = %to, error = %e, "notification not delivered");
            false
        }
    }
}

// --- Message Templates ---

pub fn invitation_email(
    to: &str,
    inviter: &str,
    invite_link: &str,
    message: Option<&str>,
) -> OutboundEmail {
    let note = message
        .filter(|m| !m.is_empty())
        .unwrap_or("Join us to share and discover educational resources!");
    OutboundEmail {
        to: to.to_string(),
        subject: "You're invited to join EduLibrary!".to_string(),
        body: format!(
            "Hello!\n\n{inviter} has invited you to join EduLibrary - a collaborative digital library platform.\n\n{note}\n\nClick the link below to join:\n{invite_link}\n\nBest regards,\nThe EduLibrary Team\n"
        ),
    }
}

pub fn new_ticket_email(admin_email: &str, ticket: &SupportTicket) -> OutboundEmail {
    OutboundEmail {
        to: admin_email.to_string(),
        subject: format!("New Support Ticket: {}", ticket.title),
        body: format!(
            "New support ticket created:\n\nTitle: {}\nPriority: {}\nUser: {}\nDescription: {}\n\nPlease log in to the admin panel to respond.\n",
            ticket.title,
            ticket.priority.as_str(),
            ticket.owner_username,
            ticket.description
        ),
    }
}

pub fn ticket_update_email(ticket: &SupportTicket) -> OutboundEmail {
    OutboundEmail {
        to: ticket.owner_email.clone(),
        subject: format!("Support Ticket Update: {}", ticket.title),
        body: format!(
            "Hello {},\n\nYour support ticket \"{}\" has been updated.\n\nAdmin Response: {}\nStatus: {}\n\nThank you for using EduLibrary!\n",
            ticket.owner_username,
            ticket.title,
            ticket.admin_response.as_deref().unwrap_or_default(),
            ticket.status.as_str()
        ),
    }
}

/// MockNotifier
///
/// Records every message for assertions; `should_fail` simulates a broken relay.
#[derive(Default)]
pub struct MockNotifier {
    pub should_fail: bool,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), NotifyError> {
        if self.should_fail {
            return Err(NotifyError::Delivery("Mock relay refused".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}
