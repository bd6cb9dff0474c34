use crate::CarrierApiError;

/// The platform sends monetary amounts as decimal strings, e.g. `"12.50"`.
pub fn parse_decimal(value: &str) -> Result<f64, CarrierApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CarrierApiError::InvalidAmount(format!("Invalid decimal value: {value}")))
}

/// Tags arrive as a single comma-separated string.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

/// For `page`/`per_page` endpoints, a page shorter than requested is the last one.
pub fn is_last_page(received: usize, per_page: u32) -> bool {
    received < per_page as usize
}
