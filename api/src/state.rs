use std::sync::Arc;

use contact_shared::Mailbox;

use crate::config::AppConfig;
use crate::relay::EmailRelay;
use crate::validation::FieldSanitizer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<dyn EmailRelay>,
    pub sanitizer: Arc<FieldSanitizer>,
    pub sender: Arc<Mailbox>,
    pub recipient: Arc<Mailbox>,
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(relay: Arc<dyn EmailRelay>, config: &AppConfig) -> Self {
        Self {
            relay,
            sanitizer: Arc::new(FieldSanitizer::new(&config.sanitizer)),
            sender: Arc::new(config.mail.sender.clone()),
            recipient: Arc::new(config.mail.recipient.clone()),
            expose_error_details: config.expose_error_details,
        }
    }
}
