//! The single plain-text message sent while verifying an account.

use chrono::Utc;

/// A minimal RFC 5322 text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl TestMessage {
    /// Builds the default verification message sent from `address` to `to`.
    #[must_use]
    pub fn verification(address: &str, to: &str) -> Self {
        Self {
            from: address.to_string(),
            to: to.to_string(),
            subject: "mailroute submission check".to_string(),
            body: format!(
                "This message confirms that {address} can submit mail through the discovered server."
            ),
        }
    }

    /// Renders headers and body with CRLF line endings.
    #[must_use]
    pub fn render(&self) -> String {
        let date = Utc::now().to_rfc2822();
        let mut message = String::with_capacity(self.body.len() + 256);

        for (name, value) in [
            ("Date", date.as_str()),
            ("From", self.from.as_str()),
            ("To", self.to.as_str()),
            ("Subject", self.subject.as_str()),
            ("MIME-Version", "1.0"),
            ("Content-Type", "text/plain; charset=utf-8"),
        ] {
            message.push_str(name);
            message.push_str(": ");
            message.push_str(value);
            message.push_str("\r\n");
        }
        message.push_str("\r\n");

        for line in self.body.lines() {
            message.push_str(line);
            message.push_str("\r\n");
        }

        message
    }
}
