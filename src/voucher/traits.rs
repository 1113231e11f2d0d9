//! Deterministic Trait Generation
//!
//! Picks one value per trait category for a minted prize. The selection
//! runs in integer milli-units so any party with the same inputs lands
//! on the same index, with no floating-point in the path. The bias is
//! intentional: higher difficulty and deeper escrow push the index
//! toward the tail of each category's value list.

use std::collections::BTreeMap;

use crate::cabinet::config::PrizeDef;
use crate::core::address::Address;

/// Generated trait assignments, sorted by category for determinism.
pub type CustomTraits = BTreeMap<String, String>;

/// Milli-unit cap on the difficulty contribution.
const DIFFICULTY_WEIGHT_CAP: u64 = 1000;
/// Milli-unit cap on the escrow contribution.
const TOKENS_WEIGHT_CAP: u64 = 500;
/// Denominator of the full milli-unit range.
const MILLI_RANGE: u64 = 2000;

/// Select one value per category of the prize's trait table.
///
/// For a category with `len` values:
/// `index = ((seed % 1000) + min(difficulty * 100, 1000)
///           + min(tokens * 10, 500)) * len / 2000`, clamped to `len - 1`.
/// The seed is the player address's leading four bytes.
///
/// Entries in `overrides` replace the generated value for their category;
/// override keys that are not categories of this prize are ignored.
pub fn generate_custom_traits(
    player: &Address,
    prize: &PrizeDef,
    difficulty: u8,
    tokens_escrowed: u64,
    overrides: Option<&CustomTraits>,
) -> CustomTraits {
    let seed = player.trait_seed();
    let milli = (seed % 1000)
        + (u64::from(difficulty) * 100).min(DIFFICULTY_WEIGHT_CAP)
        + (tokens_escrowed * 10).min(TOKENS_WEIGHT_CAP);

    let mut traits = CustomTraits::new();
    for (category, values) in &prize.trait_categories {
        if values.is_empty() {
            continue;
        }
        let len = values.len() as u64;
        let index = (milli * len / MILLI_RANGE).min(len - 1) as usize;
        traits.insert(category.clone(), values[index].clone());
    }

    if let Some(overrides) = overrides {
        for (category, value) in overrides {
            if traits.contains_key(category) {
                traits.insert(category.clone(), value.clone());
            }
        }
    }

    traits
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Address {
        // Leading bytes 0x52908400 = 1385202688, so seed % 1000 == 688
        Address::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap()
    }

    fn prize() -> PrizeDef {
        PrizeDef {
            key: "plush-bear".to_string(),
            rarity: "common".to_string(),
            grab_difficulty: 1.0,
            trait_categories: BTreeMap::from([
                (
                    "fur".to_string(),
                    vec![
                        "brown".to_string(),
                        "honey".to_string(),
                        "snow".to_string(),
                        "midnight".to_string(),
                    ],
                ),
                (
                    "eyes".to_string(),
                    vec!["button".to_string(), "amber".to_string()],
                ),
            ]),
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let a = generate_custom_traits(&player(), &prize(), 5, 1, None);
        let b = generate_custom_traits(&player(), &prize(), 5, 1, None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_known_index_arithmetic() {
        // milli = 688 + 500 + 10 = 1198; fur has 4 values so
        // index = 1198 * 4 / 2000 = 2 ("snow"); eyes has 2 so
        // index = 1198 * 2 / 2000 = 1 ("amber")
        let traits = generate_custom_traits(&player(), &prize(), 5, 1, None);
        assert_eq!(traits.get("fur").map(String::as_str), Some("snow"));
        assert_eq!(traits.get("eyes").map(String::as_str), Some("amber"));
    }

    #[test]
    fn test_contributions_are_capped() {
        // Difficulty 10 and a huge escrow cap at 1000 + 500; with
        // seed % 1000 == 688 the milli total is 2188, which indexes past
        // the end of fur without the clamp
        let traits = generate_custom_traits(&player(), &prize(), 10, 1_000_000, None);
        assert_eq!(traits.get("fur").map(String::as_str), Some("midnight"));
    }

    #[test]
    fn test_index_never_exceeds_list() {
        // Worst case milli is 999 + 1000 + 500 = 2499, which would index
        // past the end without the clamp
        for difficulty in 1..=10u8 {
            for tokens in [0u64, 1, 50, 10_000] {
                let traits = generate_custom_traits(&player(), &prize(), difficulty, tokens, None);
                assert!(prize().trait_categories["fur"]
                    .contains(traits.get("fur").expect("fur assigned")));
            }
        }
    }

    #[test]
    fn test_overrides_replace_generated_values() {
        let overrides = CustomTraits::from([
            ("fur".to_string(), "rainbow".to_string()),
            ("hat".to_string(), "top".to_string()),
        ]);
        let traits = generate_custom_traits(&player(), &prize(), 5, 1, Some(&overrides));
        assert_eq!(traits.get("fur").map(String::as_str), Some("rainbow"));
        // Unknown categories are dropped, not invented
        assert!(!traits.contains_key("hat"));
    }

    #[test]
    fn test_empty_category_skipped() {
        let mut p = prize();
        p.trait_categories
            .insert("aura".to_string(), Vec::new());
        let traits = generate_custom_traits(&player(), &p, 5, 1, None);
        assert!(!traits.contains_key("aura"));
    }
}
