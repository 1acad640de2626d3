//! Bootstrapping a context.
//!
//! Production and development contexts start the same session; development
//! additionally attaches [`DebugTools`](crate::DebugTools).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use storelink_core::StoreName;
use storelink_store::StoreRegistry;
use storelink_sync::{Channel, SyncConfig};

use crate::error::{Error, Result};
use crate::session::{ContextSession, SessionConfig};

/// Build flavor of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    /// Shipped build. No debug tools.
    #[default]
    Production,
    /// Local build. Sessions attach [`DebugTools`](crate::DebugTools).
    Development,
}

impl Flavor {
    /// Whether debug tools are attached.
    pub fn is_development(self) -> bool {
        matches!(self, Flavor::Development)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Production => f.write_str("production"),
            Flavor::Development => f.write_str("development"),
        }
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "production" | "prod" => Ok(Flavor::Production),
            "development" | "dev" => Ok(Flavor::Development),
            other => Err(Error::InvalidOperation(format!("unknown flavor: {other}"))),
        }
    }
}

/// Start an owning context: answers requests for every store in the
/// registry and pushes change notifications.
pub fn initialize_owner<C: Channel + 'static>(
    channel: Arc<C>,
    flavor: Flavor,
    sync: SyncConfig,
    registry: Arc<StoreRegistry>,
) -> Result<ContextSession<C>> {
    tracing::info!(flavor = %flavor, stores = registry.len(), "initializing owner context");
    ContextSession::builder(channel)
        .config(SessionConfig { flavor, sync })
        .own(registry)
        .start()
}

/// Start a consuming context and populate every proxy once.
///
/// Stores that fail to populate stay unset; the failures are logged and
/// the session is still returned, since later change notifications will
/// refresh them.
pub async fn initialize_consumer<C: Channel + 'static>(
    channel: Arc<C>,
    flavor: Flavor,
    sync: SyncConfig,
    stores: &[StoreName],
) -> Result<ContextSession<C>> {
    tracing::info!(flavor = %flavor, stores = stores.len(), "initializing consumer context");
    let session = ContextSession::builder(channel)
        .config(SessionConfig { flavor, sync })
        .mirror(stores)
        .start()?;

    let report = session.get_all_states().await?;
    for (store, error) in &report.failed {
        tracing::warn!(store = %store, error = %error, "initial state fetch failed");
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_parse() {
        assert_eq!("dev".parse::<Flavor>().unwrap(), Flavor::Development);
        assert_eq!("production".parse::<Flavor>().unwrap(), Flavor::Production);
        assert!("staging".parse::<Flavor>().is_err());
        assert_eq!(Flavor::default(), Flavor::Production);
        assert!(!Flavor::Production.is_development());
    }
}
