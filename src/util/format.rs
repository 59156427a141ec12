use num_format::{CustomFormat, Grouping};

/// Digit grouping for counters in log lines, e.g. `1_250_000`
pub fn number_format() -> CustomFormat {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .minus_sign("-")
        .separator("_")
        .build()
        .unwrap_or_default()
}
