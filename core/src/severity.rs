//! Maps governance policy severities onto the numeric total_risk scale used
//! by Insights findings.

/// Unrecognized or missing severities map to "0".
pub fn total_risk(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => "4",
        "high" => "3",
        "medium" => "2",
        "low" => "1",
        _ => "0",
    }
}
