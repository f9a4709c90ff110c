/// mDNS service type advertised by network printers
pub const PRINTER_SERVICE_TYPE: &str = "_printer._tcp.local.";

/// TXT record key carrying the printer's admin page URL
pub const TXT_ADMIN_URL: &str = "adminurl";

/// Number of advancing steps in a reset workflow
pub const TOTAL_STEPS: u8 = 4;
