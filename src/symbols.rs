// =============================================================================
// Symbol Normalizer — exchange tickers to price-source lookup keys
// =============================================================================
//
// The reference page lists share classes with a dot (`BRK.B`), the price
// source expects a hyphen (`BRK-B`).  Special cases are checked first, in
// order, before the generic dot-to-hyphen rule.

/// Explicit rewrites applied before the generic rule.
const SPECIAL_CASES: &[(&str, &str)] = &[("BRK.B", "BRK-B"), ("BF.B", "BF-B")];

/// Map a raw ticker to the form the price source expects.
///
/// No validation is performed on the result.
pub fn normalize_symbol(raw: &str) -> String {
    if let Some((_, fixed)) = SPECIAL_CASES.iter().find(|(from, _)| *from == raw) {
        return (*fixed).to_string();
    }
    raw.replace('.', "-")
}
