//! Count-text normalization and channel-label rewriting.

use std::collections::BTreeMap;
use std::str::FromStr;

use mktpulse_core::RankedEntry;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Parses a human-formatted count such as `"1.2K"`, `"3M"`, `"12,408"` or `"250"`.
///
/// Commas are thousands separators; `K` multiplies by 1,000 and `M` by
/// 1,000,000 (case-insensitive). Fractional results are rounded to the
/// nearest whole count. Returns `None` for anything else, including negatives.
#[must_use]
pub fn normalize_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let (number, multiplier) = match trimmed.chars().last()? {
        'k' | 'K' => (&trimmed[..trimmed.len() - 1], Decimal::from(1_000)),
        'm' | 'M' => (&trimmed[..trimmed.len() - 1], Decimal::from(1_000_000)),
        _ => (trimmed, Decimal::ONE),
    };
    let digits: String = number.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = Decimal::from_str(&digits).ok()?;
    value
        .checked_mul(multiplier)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

/// Rewrites raw channel names (`"t.co / referral"`) to display labels using a
/// configured source-domain mapping.
#[derive(Debug, Clone, Default)]
pub struct ChannelLabeler {
    labels: BTreeMap<String, String>,
}

impl ChannelLabeler {
    #[must_use]
    pub fn new(mapping: &BTreeMap<String, String>) -> Self {
        Self {
            labels: mapping
                .iter()
                .map(|(domain, label)| (canonical_domain(domain), label.clone()))
                .collect(),
        }
    }

    /// Returns the display label for `raw`, or `raw` unchanged when its source
    /// domain is not mapped. Only the part before `" / "` is matched.
    #[must_use]
    pub fn label(&self, raw: &str) -> String {
        let source = raw.split(" / ").next().unwrap_or(raw);
        self.labels
            .get(&canonical_domain(source))
            .cloned()
            .unwrap_or_else(|| raw.trim().to_string())
    }

    /// Relabels every entry. Entries that collapse onto the same label are
    /// left separate here; ranking merges them.
    #[must_use]
    pub fn relabel(&self, entries: Vec<RankedEntry>) -> Vec<RankedEntry> {
        entries
            .into_iter()
            .map(|e| RankedEntry::new(self.label(&e.key), e.count))
            .collect()
    }
}

fn canonical_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    lower
        .strip_prefix("www.")
        .map_or(lower.clone(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_scale_counts() {
        assert_eq!(normalize_count("1.2K"), Some(1_200));
        assert_eq!(normalize_count("3M"), Some(3_000_000));
        assert_eq!(normalize_count("250"), Some(250));
        assert_eq!(normalize_count("2.5m"), Some(2_500_000));
    }

    #[test]
    fn commas_are_thousands_separators() {
        assert_eq!(normalize_count("12,408"), Some(12_408));
        assert_eq!(normalize_count("1,024.6K"), Some(1_024_600));
    }

    #[test]
    fn fractional_counts_round() {
        assert_eq!(normalize_count("1.2345K"), Some(1_235));
        assert_eq!(normalize_count("17.6"), Some(18));
    }

    #[test]
    fn half_counts_round_away_from_zero() {
        assert_eq!(normalize_count("0.5"), Some(1));
        assert_eq!(normalize_count("2.5"), Some(3));
        assert_eq!(normalize_count("1.0005K"), Some(1_001));
    }

    #[test]
    fn oversized_counts_are_rejected_instead_of_overflowing() {
        assert_eq!(normalize_count("79228162514264337593543950335M"), None);
        assert_eq!(normalize_count("79228162514264337593543950335K"), None);
        assert_eq!(normalize_count("99999999999999999999999"), None);
    }

    #[test]
    fn rejects_non_counts() {
        assert_eq!(normalize_count(""), None);
        assert_eq!(normalize_count("K"), None);
        assert_eq!(normalize_count("-5"), None);
        assert_eq!(normalize_count("12 followers"), None);
        assert_eq!(normalize_count("1.2.3"), None);
    }

    #[test]
    fn labeler_rewrites_mapped_source_domains() {
        let mut mapping = BTreeMap::new();
        mapping.insert("t.co".to_string(), "X".to_string());
        mapping.insert("www.lnkd.in".to_string(), "LinkedIn".to_string());
        let labeler = ChannelLabeler::new(&mapping);

        assert_eq!(labeler.label("t.co / referral"), "X");
        assert_eq!(labeler.label("LNKD.IN / referral"), "LinkedIn");
        assert_eq!(labeler.label("google / organic"), "google / organic");
    }

    #[test]
    fn relabel_keeps_counts() {
        let mut mapping = BTreeMap::new();
        mapping.insert("t.co".to_string(), "X".to_string());
        let labeler = ChannelLabeler::new(&mapping);
        let out = labeler.relabel(vec![
            RankedEntry::new("t.co / referral", 9),
            RankedEntry::new("(direct) / (none)", 30),
        ]);
        assert_eq!(
            out,
            vec![RankedEntry::new("X", 9), RankedEntry::new("(direct) / (none)", 30)]
        );
    }
}
