//! User-Agent string shared by every request the crate issues.

/// Identifies the tool and its purpose to the catalog host.
const UA_PURPOSE: &str = "code-list-mirror";

/// Default User-Agent for catalog, probe and transfer requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("codelist-sync/{version} ({UA_PURPOSE})")
}
