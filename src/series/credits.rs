use regex::Regex;
use std::sync::LazyLock;

use crate::analyzer::tally::Tally;

static FEATURING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)featuring").unwrap());

/// Split a credit string into artist names.
///
/// `&` wins over `featuring`; anything else is a single artist. Never fails:
/// if splitting leaves only blanks, the trimmed credit is used as is.
pub fn split_credits(credit: &str) -> Vec<String> {
    let pieces: Vec<&str> = if credit.contains('&') {
        credit.split('&').collect()
    } else if credit.to_lowercase().contains("featuring") {
        FEATURING_RE.split(credit).collect()
    } else {
        vec![credit]
    };

    let names: Vec<String> = pieces
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        vec![credit.trim().to_string()]
    } else {
        names
    }
}

/// Chart weight of a rank: #1 → 100, #100 → 1, off-chart ranks → 0.
pub fn popularity_weight(this_week: u32) -> f64 {
    101u32.saturating_sub(this_week) as f64
}

/// Add this entry's weight to every credited artist's running total for the week.
pub fn allocate(credit: &str, this_week: u32, totals: &mut Tally<f64>) {
    let weight = popularity_weight(this_week);
    for name in split_credits(credit) {
        totals.add(&name, weight);
    }
}
