//! Parsing for the processor's Brazilian-real price strings.

/// Parse a BRL price string into centavos.
///
/// The processor sends prices as display strings in Brazilian format: comma
/// decimal separator, optional dot thousands separator, optional `R$` prefix
/// (`"R$ 39,90"`, `"1.234,56"`). Plain dot-decimal strings (`"39.90"`) are
/// accepted too. Returns `None` for anything that is not a non-negative
/// amount.
pub fn parse_brl_cents(raw: &str) -> Option<i64> {
    let stripped = raw.trim().trim_start_matches("R$").trim();
    if stripped.is_empty() {
        return None;
    }

    // Comma present means Brazilian format: dots are thousands separators.
    let normalized = if stripped.contains(',') {
        stripped.replace('.', "").replace(',', ".")
    } else {
        stripped.to_string()
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some((value * 100.0).round() as i64)
}
