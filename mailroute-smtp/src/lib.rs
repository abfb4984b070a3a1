//! Async SMTP client for submission checks.
//!
//! Supports plain and implicit-TLS connections, STARTTLS upgrade, EHLO
//! capability inspection and SASL PLAIN/LOGIN authentication.
//!
//! ```no_run
//! use mailroute_smtp::SmtpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:2525".parse()?;
//! let mut client = SmtpClient::connect(addr, "smtp.example.test").await?;
//! client.read_greeting().await?;
//!
//! let ehlo = client.ehlo("client.example.test").await?;
//! if ehlo.has_extension("STARTTLS") {
//!     client.starttls().await?;
//!     client.ehlo("client.example.test").await?;
//! }
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod message;
mod response;

pub use client::SmtpClient;
pub use error::{ClientError, Result};
pub use message::TestMessage;
pub use response::{Response, ResponseLine};
