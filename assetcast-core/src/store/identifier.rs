//! SQL identifier allow-list and the `{ticker}_{model}` table naming convention.
//!
//! Values always travel as bound parameters. Identifiers cannot be bound, so
//! every table or column name is checked here before it is spliced into SQL.

use super::StoreError;

pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Accept `[A-Za-z_][A-Za-z0-9_]*` up to [`MAX_IDENTIFIER_LEN`] characters.
pub fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    let invalid = |reason: &str| StoreError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    let first = chars.next().ok_or_else(|| invalid("empty"))?;
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("longer than 128 characters"));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(invalid(&format!("contains '{bad}'")));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(invalid("the sqlite_ prefix is reserved"));
    }
    Ok(name)
}

/// Double-quote a validated identifier for interpolation.
pub(crate) fn quoted(name: &str) -> Result<String, StoreError> {
    validate_identifier(name).map(|n| format!("\"{n}\""))
}

/// Table name for an (asset, model) pair: dashes become underscores and
/// spaces are removed, e.g. `("BTC-USD", "lstm")` → `BTC_USD_lstm`.
pub fn table_name(ticker: &str, model: &str) -> Result<String, StoreError> {
    let ticker: String = ticker
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| if c == '-' { '_' } else { c })
        .collect();
    let model: String = model.chars().filter(|c| *c != ' ').collect();
    let name = format!("{ticker}_{model}");
    validate_identifier(&name)?;
    Ok(name)
}
