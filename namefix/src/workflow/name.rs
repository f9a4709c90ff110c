use std::sync::OnceLock;
use regex::Regex;
use shared::types::strip_service_suffix;

/// Vendor default names end in the last three octets of the MAC, e.g.
/// "Canon MF743C (a0:1b:23)".
const DEVICE_SUFFIX: &str = r"^(?P<name>.*?) \([0-9a-fA-F:]{8}\)";

fn device_suffix() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(DEVICE_SUFFIX).ok())
        .as_ref()
}

/// Default new name for a printer: the advertised name without its
/// parenthesized device identifier. Falls back to the name itself, minus
/// the service type suffix. Never fails.
pub fn default_name(advertised: &str) -> String {
    let name = strip_service_suffix(advertised);

    match device_suffix().and_then(|re| re.captures(name)) {
        Some(caps) => caps["name"].to_string(),
        None => name.to_string(),
    }
}

/// The user's override when it has any content, otherwise the default.
pub fn resolve_new_name(name_override: Option<&str>, current: &str) -> String {
    match name_override.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_name(current),
    }
}
