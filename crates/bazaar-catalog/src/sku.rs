//! SKU suggestions
//!
//! `BEV-COLA-ZERO-0007`: up to three category characters, up to four of the
//! first word of the name, up to four of the variant, then a sequence
//! number. Only ASCII letters and digits survive, uppercased.

const MAX_PROBES: u32 = 50;
const FALLBACK_PREFIX: &str = "SKU";

fn clean(raw: &str, max: usize) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(max)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Prefix from product attributes
pub fn prefix(name: &str, category: Option<&str>, variant: Option<&str>) -> String {
    let first_word = name.split_whitespace().next().unwrap_or_default();
    let parts = [
        category.map(|c| clean(c, 3)),
        Some(clean(first_word, 4)),
        variant.map(|v| clean(v, 4)),
    ];

    let prefix = parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if prefix.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        prefix
    }
}

/// First free `PREFIX-NNNN` starting at `start`, probing at most 50 numbers
pub fn suggest<F>(prefix: &str, start: u64, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut candidate = format!("{prefix}-{start:04}");
    for offset in 1..=u64::from(MAX_PROBES) {
        if !taken(&candidate) {
            break;
        }
        candidate = format!("{prefix}-{:04}", start + offset);
    }
    candidate
}
