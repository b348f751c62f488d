pub fn get_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Human readable timestamp shown in comment preambles.
pub fn get_display_timestamp() -> String {
    chrono::Utc::now()
        .format("%-I:%M%p UTC, %-d %b %Y")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_timestamp_format() {
        let ts = get_timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_get_display_timestamp() {
        assert!(get_display_timestamp().contains("UTC"));
    }
}
