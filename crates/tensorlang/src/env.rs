use std::env;
use std::sync::OnceLock;

static TENSORLANG_PRINT_LOCATIONS: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Whether printed modules carry `loc(...)` annotations unless a config says otherwise.
pub(crate) fn print_locations_enabled() -> bool {
    *TENSORLANG_PRINT_LOCATIONS.get_or_init(|| match env::var("TENSORLANG_PRINT_LOCATIONS") {
        Ok(value) => parse_bool(&value).unwrap_or(true),
        Err(_) => true,
    })
}
