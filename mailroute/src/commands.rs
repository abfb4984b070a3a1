//! The `discover` and `verify` subcommands.

use std::io::Write;

use mailroute_discovery::{
    CapabilityCheck, Credential, Discovery, Lookup, Verification, Verifier,
};
use mailroute_smtp::TestMessage;

/// Environment variable holding the account secret for `verify`.
pub const SECRET_VAR: &str = "MAILROUTE_SECRET";

/// Prints the candidate endpoints for `domain`, one per line.
///
/// Returns `true` if at least one endpoint was found.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub async fn discover<L, C>(
    discovery: &Discovery<L, C>,
    domain: &str,
    out: &mut impl Write,
) -> anyhow::Result<bool>
where
    L: Lookup,
    C: CapabilityCheck,
{
    match discovery.candidates(domain).await {
        Ok(endpoints) if endpoints.is_empty() => {
            writeln!(out, "{domain}: no submission endpoint found")?;
            Ok(false)
        }
        Ok(endpoints) => {
            for endpoint in &endpoints {
                writeln!(out, "{domain}: {endpoint}")?;
            }
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "{domain}: {e}")?;
            Ok(false)
        }
    }
}

/// Verifies `credential`, sending the test message to `recipient`
/// (the account itself when `None`), and prints the outcome.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub async fn verify<L, C, V>(
    discovery: &Discovery<L, C>,
    verifier: &V,
    credential: &Credential,
    recipient: Option<&str>,
    out: &mut impl Write,
) -> anyhow::Result<Verification>
where
    L: Lookup,
    C: CapabilityCheck,
    V: Verifier + ?Sized,
{
    let recipient = recipient.unwrap_or_else(|| credential.address());
    let message = TestMessage::verification(credential.address(), recipient);

    let verification = discovery
        .verify_account(verifier, credential, &message)
        .await;
    writeln!(out, "{}: {verification}", credential.address())?;

    Ok(verification)
}
