/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse an integer configuration value, or return `None` if it is absent or invalid. The error is returned alongside
/// so that the caller can log it in context.
pub fn parse_integer<T: std::str::FromStr>(value: Option<String>) -> Option<Result<T, String>>
where T::Err: std::fmt::Display {
    value.map(|v| v.trim().parse::<T>().map_err(|e| format!("'{v}' is not a valid value. {e}")))
}
