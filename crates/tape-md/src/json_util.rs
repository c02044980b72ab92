//! Shared JSON parsing helpers.

use tape_core::types::PriceLevel;

/// Read a price or quantity as its exact text.
///
/// Exchanges send decimals as JSON strings (`"30000.50"`); a bare number is
/// accepted too and rendered as serde_json prints it.
#[inline]
pub fn decimal_text(v: Option<&serde_json::Value>) -> Option<String> {
    let v = v?;
    if let Some(s) = v.as_str() {
        Some(s.to_string())
    } else if v.is_number() {
        Some(v.to_string())
    } else {
        None
    }
}

/// Parse up to `max` `["price", "qty", ...]` levels.
///
/// Extra elements beyond price and quantity are ignored. A level that is not
/// an array of at least two decimals is an error, naming its index.
pub fn parse_levels(levels: &[serde_json::Value], max: usize) -> Result<Vec<PriceLevel>, String> {
    levels
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, level)| {
            let arr = level.as_array().ok_or_else(|| format!("level {i} is not an array"))?;
            let price = decimal_text(arr.first()).ok_or_else(|| format!("level {i} has no price"))?;
            let volume = decimal_text(arr.get(1)).ok_or_else(|| format!("level {i} has no quantity"))?;
            Ok(PriceLevel { price, volume })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strings_and_numbers() {
        assert_eq!(decimal_text(Some(&json!("0.00100000"))).as_deref(), Some("0.00100000"));
        assert_eq!(decimal_text(Some(&json!(42))).as_deref(), Some("42"));
        assert_eq!(decimal_text(Some(&json!(null))), None);
        assert_eq!(decimal_text(None), None);
    }

    #[test]
    fn levels_capped_and_verbatim() {
        let raw = json!([["101.10", "2.5"], ["101.20", "1"], ["101.30", "7", "extra"]]);
        let levels = parse_levels(raw.as_array().unwrap(), 2).unwrap();
        assert_eq!(levels, vec![PriceLevel::new("101.10", "2.5"), PriceLevel::new("101.20", "1")]);
    }

    #[test]
    fn malformed_level_is_reported() {
        let raw = json!([["1", "1"], ["2"]]);
        let err = parse_levels(raw.as_array().unwrap(), 5).unwrap_err();
        assert!(err.contains("level 1"));
    }
}
