use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};
use crate::protocol::PRINTER_SERVICE_TYPE;

/// Stable key for a printer, derived from its service name alone.
///
/// Removal announcements carry nothing but the name, so hostname, address
/// and TXT data must never feed into the digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterIdentity(String);

impl PrinterIdentity {
    pub fn from_service_name(name: &str) -> Self {
        Self(hex::encode(Sha256::digest(name.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrinterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell printers apart in logs
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// A resolved printer announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub identity: PrinterIdentity,

    /// Full DNS-SD instance name, e.g. "Office (a0:1b:23)._printer._tcp.local."
    pub name: String,

    /// Resolved hostname, e.g. "canoncfcad9.local."
    pub server: String,

    /// Admin page hint from the TXT record, if present and well formed
    pub admin_url: Option<String>,

    /// When the announcement was resolved
    pub resolved_at: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, server: impl Into<String>, admin_url: Option<String>) -> Self {
        let name = name.into();
        Self {
            identity: PrinterIdentity::from_service_name(&name),
            name,
            server: server.into(),
            admin_url,
            resolved_at: Utc::now(),
        }
    }

    /// Instance name without the service type suffix.
    pub fn display_name(&self) -> &str {
        strip_service_suffix(&self.name)
    }
}

/// Removes a trailing ".<service type>" from an instance name, if present.
pub fn strip_service_suffix(name: &str) -> &str {
    name.strip_suffix(PRINTER_SERVICE_TYPE)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(name)
}
