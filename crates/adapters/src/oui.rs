//! MAC address vendor lookups against an embedded OUI database.

use crate::error::AdapterError;
use async_trait::async_trait;
use mac_oui::Oui;

#[async_trait]
pub trait OuiAdapter: Send + Sync {
    async fn lookup(&self, mac: &str) -> Result<Option<String>, AdapterError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpOuiAdapter;

#[async_trait]
impl OuiAdapter for NoOpOuiAdapter {
    async fn lookup(&self, _mac: &str) -> Result<Option<String>, AdapterError> {
        Ok(None)
    }
}

/// Wraps `mac_oui`'s bundled IEEE OUI table. The lookup itself is
/// synchronous and in-memory; `async_trait` keeps the interface uniform
/// with adapters that do real I/O.
pub struct EmbeddedOuiAdapter {
    db: Oui,
}

impl EmbeddedOuiAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        let db = Oui::default().map_err(|e| AdapterError::Request(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl OuiAdapter for EmbeddedOuiAdapter {
    async fn lookup(&self, mac: &str) -> Result<Option<String>, AdapterError> {
        Ok(self
            .db
            .lookup_by_mac(mac)
            .ok()
            .flatten()
            .map(|entry| entry.company_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_op_adapter_resolves_nothing() {
        let adapter = NoOpOuiAdapter;
        assert_eq!(adapter.lookup("aa:bb:cc:dd:ee:ff").await.unwrap(), None);
    }
}
