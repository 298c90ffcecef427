//! Maps a sale's product naming and price to one of the three plan tiers.
//!
//! Classification is total: keyword match wins, then exact price match
//! against the promotional and standard tables, then a threshold fallback.
//! A sale that matches nothing lands on the highest tier, so a mislabeled
//! checkout never locks a paying customer out of features they bought.

use scalazap_shared::PlanTier;

const UNLIMITED_KEYWORDS: &[&str] = &["unlimited", "ilimitado"];
const PROFESSIONAL_KEYWORDS: &[&str] = &["professional", "profissional"];
const STARTER_KEYWORDS: &[&str] = &["starter", "basico", "básico"];

/// Launch-promo checkout prices, in centavos.
const PROMOTIONAL_PRICES: &[(i64, PlanTier)] = &[
    (1990, PlanTier::Starter),
    (3990, PlanTier::Professional),
    (5990, PlanTier::Unlimited),
];

/// List prices, in centavos.
const STANDARD_PRICES: &[(i64, PlanTier)] = &[
    (4990, PlanTier::Starter),
    (9700, PlanTier::Professional),
    (19700, PlanTier::Unlimited),
];

/// Classify a sale into a plan tier from its product name, offer name and
/// price in centavos. Never fails; see the module doc for the fallback order.
pub fn classify(product_name: &str, offer_name: &str, price_cents: Option<i64>) -> PlanTier {
    let haystack = format!("{} {}", product_name, offer_name).to_lowercase();

    // Keyword match first, higher tiers checked before lower ones so that
    // names like "Starter para Profissional upgrade" resolve upward.
    if contains_any(&haystack, UNLIMITED_KEYWORDS) {
        return PlanTier::Unlimited;
    }
    if contains_any(&haystack, PROFESSIONAL_KEYWORDS) {
        return PlanTier::Professional;
    }
    if contains_any(&haystack, STARTER_KEYWORDS) {
        return PlanTier::Starter;
    }

    let Some(cents) = price_cents else {
        return PlanTier::Unlimited;
    };

    for &(price, tier) in PROMOTIONAL_PRICES {
        if cents == price {
            return tier;
        }
    }
    for &(price, tier) in STANDARD_PRICES {
        if cents == price {
            return tier;
        }
    }

    if cents <= 4990 {
        PlanTier::Starter
    } else if cents <= 9700 {
        PlanTier::Professional
    } else {
        PlanTier::Unlimited
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
