use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::render::RenderedPage;

/// Symbols a text node must contain to count as a price fragment. Currencies are
/// not told apart: every match is compared by magnitude alone.
pub static RE_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AU\$|A\$|CNY|\$|¥|￥").expect("invalid regex: currency symbol"));

static RE_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:AU\$|A\$|CNY|\$|¥|￥)\s?((?:[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?:\.[0-9]{1,2})?)")
        .expect("invalid regex: price")
});

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Price floor ({floor}) must be below the ceiling ({ceiling})")]
    InvertedBand { floor: f64, ceiling: f64 },
    #[error("Price bounds must be finite and non-negative")]
    InvalidBound,
}

/// Thresholds used to separate ticket prices from page noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePolicy {
    /// Amounts at or below this are dropped before the fallback decision.
    pub min_token: f64,
    /// Exclusive lower bound of the plausible band.
    pub floor: f64,
    /// Exclusive upper bound of the plausible band.
    pub ceiling: f64,
}

impl Default for PricePolicy {
    fn default() -> Self {
        Self {
            min_token: 40.0,
            floor: 10.0,
            ceiling: 5000.0,
        }
    }
}

impl PricePolicy {
    pub fn validate(self) -> Result<Self, PolicyError> {
        let bounds = [self.min_token, self.floor, self.ceiling];
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(PolicyError::InvalidBound);
        }
        if self.floor >= self.ceiling {
            return Err(PolicyError::InvertedBand {
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        Ok(self)
    }

    fn is_token(&self, amount: f64) -> bool {
        amount > self.min_token
    }

    fn in_band(&self, amount: f64) -> bool {
        amount > self.floor && amount < self.ceiling
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Smallest of the surviving candidates.
pub fn lowest(candidates: &[f64]) -> Option<f64> {
    candidates.iter().copied().reduce(f64::min)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceExtractor {
    policy: PricePolicy,
}

impl PriceExtractor {
    pub fn new(policy: PricePolicy) -> Self {
        Self { policy }
    }

    fn amounts<'a>(&'a self, text: &'a str) -> impl Iterator<Item = f64> + 'a {
        RE_PRICE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
            .filter(|amount| self.policy.is_token(*amount))
    }

    /// Every amount that survives the token threshold and the plausibility band.
    ///
    /// Fragments are scanned first; the full `html` is only consulted when no
    /// fragment yields an amount above the token threshold.
    pub fn candidates<S: AsRef<str>>(&self, fragments: &[S], html: &str) -> Vec<f64> {
        let mut found: Vec<f64> = fragments
            .iter()
            .flat_map(|fragment| self.amounts(fragment.as_ref()))
            .collect();

        if found.is_empty() {
            log::debug!("No price fragments survived, scanning full page content");
            found = self.amounts(html).collect();
        }

        found.retain(|amount| self.policy.in_band(*amount));
        found
    }

    pub fn extract<S: AsRef<str>>(&self, fragments: &[S], html: &str) -> Option<f64> {
        let candidates = self.candidates(fragments, html);
        log::debug!("Price candidates: {:?}", candidates);
        lowest(&candidates)
    }

    pub fn extract_page(&self, page: &RenderedPage) -> Option<f64> {
        let fragments = page.text_fragments(&RE_CURRENCY);
        self.extract(&fragments, page.html())
    }
}
