//! SMTP capability checks and full account verification.
//!
//! Both run the same opening sequence against an [`Endpoint`]:
//! 1. Resolve the host (or take its configured route)
//! 2. Connect, with TLS from the first byte on port 465
//! 3. Read the greeting and send EHLO
//! 4. On port 587, upgrade with STARTTLS when offered and repeat EHLO
//!
//! A capability check stops there. Verification goes on to authenticate and
//! submit a single test message.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use mailroute_common::tracing;
use mailroute_smtp::{Response, SmtpClient, TestMessage};
use serde::{Deserialize, Serialize};

use crate::{credential::Credential, endpoint::Endpoint, error::VerifyError};

/// Answers whether an endpoint speaks SMTP well enough to be worth verifying.
#[async_trait]
pub trait CapabilityCheck: Send + Sync {
    /// Returns `true` if the greeting and EHLO (and STARTTLS, where used) succeed.
    /// Faults are logged and reported as `false`.
    async fn is_capable(&self, endpoint: &Endpoint) -> bool;
}

/// Authenticates an account against an endpoint and submits one message.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
        message: &TestMessage,
    ) -> Result<(), VerifyError>;
}

/// Timeouts and TLS policy for SMTP sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Connect timeout in seconds, TLS handshake included (default: 5)
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each command's reply in seconds (default: 10)
    #[serde(default = "default_command_secs")]
    pub command_secs: u64,

    /// Name sent with EHLO (default: "localhost")
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    /// Refuse to authenticate on port 587 without STARTTLS (default: true)
    #[serde(default = "default_require_tls")]
    pub require_tls: bool,

    /// Accept invalid TLS certificates
    ///
    /// **SECURITY WARNING**: Only use for testing against local servers.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Fixed socket addresses for `host:port` endpoints, bypassing resolution
    ///
    /// ```ron
    /// routes: {
    ///     "smtp.example.test:587": "127.0.0.1:2587",
    /// }
    /// ```
    #[serde(default)]
    pub routes: HashMap<String, SocketAddr>,
}

const fn default_connect_secs() -> u64 {
    5
}

const fn default_command_secs() -> u64 {
    10
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

const fn default_require_tls() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            command_secs: default_command_secs(),
            helo_name: default_helo_name(),
            require_tls: default_require_tls(),
            accept_invalid_certs: false,
            routes: HashMap::new(),
        }
    }
}

/// [`CapabilityCheck`] and [`Verifier`] over `mailroute-smtp`.
#[derive(Debug, Clone, Default)]
pub struct SmtpSession {
    config: SessionConfig,
}

impl SmtpSession {
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_secs)
    }

    const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_secs)
    }

    async fn resolve(&self, endpoint: &Endpoint) -> Result<SocketAddr, VerifyError> {
        if let Some(addr) = self.config.routes.get(&endpoint.address()) {
            return Ok(*addr);
        }

        let lookup = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port.number()));
        let mut addrs = tokio::time::timeout(self.connect_timeout(), lookup)
            .await
            .map_err(|_| VerifyError::Timeout(format!("resolving {}", endpoint.host)))?
            .map_err(|e| VerifyError::Unresolvable(format!("{}: {e}", endpoint.host)))?;

        addrs
            .next()
            .ok_or_else(|| VerifyError::Unresolvable(endpoint.host.clone()))
    }

    /// Awaits one command's reply within the command timeout.
    async fn step<F>(&self, stage: &str, command: F) -> Result<Response, VerifyError>
    where
        F: Future<Output = mailroute_smtp::Result<Response>> + Send,
    {
        let timeout = self.command_timeout();
        Ok(tokio::time::timeout(timeout, command)
            .await
            .map_err(|_| VerifyError::Timeout(format!("{stage} after {timeout:?}")))??)
    }

    /// Like [`Self::step`], but any reply other than 2xx is an error.
    async fn expect_success<F>(&self, stage: &str, command: F) -> Result<Response, VerifyError>
    where
        F: Future<Output = mailroute_smtp::Result<Response>> + Send,
    {
        let response = self.step(stage, command).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(VerifyError::rejected(stage, &response))
        }
    }

    /// Connects, greets and negotiates TLS. Returns the session and the
    /// EHLO reply that describes it.
    async fn open(&self, endpoint: &Endpoint) -> Result<(SmtpClient, Response), VerifyError> {
        let addr = self.resolve(endpoint).await?;
        let accept_invalid_certs = self.config.accept_invalid_certs;

        if accept_invalid_certs {
            tracing::warn!(
                %endpoint,
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        let connect = async {
            if endpoint.port.implicit_tls() {
                SmtpClient::connect_tls(addr, endpoint.host.clone(), accept_invalid_certs).await
            } else {
                SmtpClient::connect(addr, endpoint.host.clone())
                    .await
                    .map(|client| client.accept_invalid_certs(accept_invalid_certs))
            }
        };
        let mut client = tokio::time::timeout(self.connect_timeout(), connect)
            .await
            .map_err(|_| VerifyError::Timeout(format!("connecting to {endpoint}")))??;

        self.expect_success("greeting", client.read_greeting())
            .await?;

        let helo = self.config.helo_name.as_str();
        let mut ehlo = self.expect_success("EHLO", client.ehlo(helo)).await?;

        if endpoint.port.explicit_upgrade() && ehlo.has_extension("STARTTLS") {
            self.expect_success("STARTTLS", client.starttls()).await?;
            // RFC 3207: capabilities must be re-read over the secured channel.
            ehlo = self.expect_success("EHLO", client.ehlo(helo)).await?;
            tracing::debug!(%endpoint, "TLS negotiated via STARTTLS");
        }

        Ok((client, ehlo))
    }

    async fn quit(&self, endpoint: &Endpoint, client: &mut SmtpClient) {
        if let Err(e) = self.step("QUIT", client.quit()).await {
            tracing::debug!(%endpoint, error = %e, "QUIT failed");
        }
    }

    async fn authenticate(
        &self,
        endpoint: &Endpoint,
        client: &mut SmtpClient,
        ehlo: &Response,
        credential: &Credential,
    ) -> Result<(), VerifyError> {
        if endpoint.port.explicit_upgrade() && !client.is_tls() && self.config.require_tls {
            return Err(VerifyError::CapabilityUnsupported(format!(
                "{endpoint} does not offer STARTTLS"
            )));
        }

        let mechanisms = ehlo.auth_mechanisms();
        if mechanisms.is_empty() {
            return Err(VerifyError::CapabilityUnsupported(format!(
                "{endpoint} does not offer AUTH"
            )));
        }

        let (address, secret) = (credential.address(), credential.secret());
        let response = if mechanisms.iter().any(|m| m == "PLAIN") {
            self.step("AUTH", client.auth_plain(address, secret)).await?
        } else if mechanisms.iter().any(|m| m == "LOGIN") {
            self.step("AUTH", client.auth_login(address, secret)).await?
        } else {
            return Err(VerifyError::CapabilityUnsupported(format!(
                "{endpoint} offers only AUTH {}",
                mechanisms.join(" ")
            )));
        };

        if response.is_success() {
            Ok(())
        } else {
            Err(VerifyError::auth_failed(&response))
        }
    }

    async fn submit(
        &self,
        client: &mut SmtpClient,
        message: &TestMessage,
    ) -> Result<(), VerifyError> {
        self.expect_success("MAIL FROM", client.mail_from(&message.from))
            .await?;
        self.expect_success("RCPT TO", client.rcpt_to(&message.to))
            .await?;

        let data = self.step("DATA", client.data()).await?;
        if !data.is_intermediate() {
            return Err(VerifyError::rejected("DATA", &data));
        }

        self.expect_success("message data", client.send_data(&message.render()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityCheck for SmtpSession {
    async fn is_capable(&self, endpoint: &Endpoint) -> bool {
        match self.open(endpoint).await {
            Ok((mut client, _)) => {
                self.quit(endpoint, &mut client).await;
                tracing::info!(%endpoint, capable = true, "Capability check finished");
                true
            }
            Err(e) => {
                tracing::info!(%endpoint, capable = false, error = %e, "Capability check finished");
                false
            }
        }
    }
}

#[async_trait]
impl Verifier for SmtpSession {
    async fn verify(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
        message: &TestMessage,
    ) -> Result<(), VerifyError> {
        let (mut client, ehlo) = self.open(endpoint).await?;

        let result = async {
            self.authenticate(endpoint, &mut client, &ehlo, credential)
                .await?;
            self.submit(&mut client, message).await
        }
        .await;

        self.quit(endpoint, &mut client).await;
        result
    }
}
