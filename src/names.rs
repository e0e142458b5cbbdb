//! Name Generator (C4) — human-friendly, collision-free two-word node ids.
//!
//! Ids are drawn from a curated adjective/animal vocabulary and must match
//! `^[a-z]+-[a-z]+$` (spec §3 invariant 5).

use rand::seq::SliceRandom;
use std::collections::HashSet;

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "dusty", "eager", "fleet", "gentle", "hardy", "idle", "jolly",
    "keen", "lively", "mellow", "nimble", "orderly", "plucky", "quiet", "ruddy", "steady", "tidy",
    "upbeat", "vivid", "wry", "zealous", "bold", "crisp", "dapper", "earnest", "frugal",
    "grounded",
];

const ANIMALS: &[&str] = &[
    "otter", "falcon", "badger", "heron", "lynx", "marten", "osprey", "puffin", "quokka", "raven",
    "swift", "tapir", "urial", "vole", "wombat", "yak", "zebu", "ibex", "jackal", "kudu", "loris",
    "mink", "newt", "ocelot", "pika", "serval", "toucan", "viper", "wren", "civet",
];

/// Generate two-word identifiers (`adjective-animal`) that are unique within
/// a given set of already-used ids, as required when adding nodes to an
/// existing cluster (spec §4.6 `addNode`).
///
/// The adjective x animal vocabulary yields 900 distinct ids; callers never
/// request more than 10 at a time (the `addNode` count bound in spec §8),
/// so the deterministic product is exhausted in practice only after many
/// repeated add/remove cycles on the same cluster.
pub fn generate_unique(count: usize, existing: &HashSet<String>) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut used: HashSet<String> = existing.clone();

    let mut candidates: Vec<String> = Vec::with_capacity(ADJECTIVES.len() * ANIMALS.len());
    for adjective in ADJECTIVES {
        for animal in ANIMALS {
            let id = format!("{adjective}-{animal}");
            if !used.contains(&id) {
                candidates.push(id);
            }
        }
    }
    candidates.shuffle(&mut rng);

    let generated: Vec<String> = candidates.into_iter().take(count).collect();
    for id in &generated {
        used.insert(id.clone());
    }
    generated
}

/// Whether `id` matches the curated-vocabulary shape `^[a-z]+-[a-z]+$`.
pub fn is_valid_two_word_id(id: &str) -> bool {
    let Some((first, second)) = id.split_once('-') else {
        return false;
    };
    !first.is_empty()
        && !second.is_empty()
        && !second.contains('-')
        && first.chars().all(|c| c.is_ascii_lowercase())
        && second.chars().all(|c| c.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_count_with_no_duplicates() {
        let existing = HashSet::new();
        let ids = generate_unique(10, &existing);
        assert_eq!(ids.len(), 10);
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(unique.len(), 10);
        for id in &ids {
            assert!(is_valid_two_word_id(id), "invalid id shape: {id}");
        }
    }

    #[test]
    fn avoids_existing_ids() {
        let mut existing = HashSet::new();
        existing.insert("brave-otter".to_string());
        let ids = generate_unique(50, &existing);
        assert!(!ids.contains(&"brave-otter".to_string()));
    }

    #[test]
    fn validates_curated_shape() {
        assert!(is_valid_two_word_id("brave-otter"));
        assert!(!is_valid_two_word_id("Brave-Otter"));
        assert!(!is_valid_two_word_id("brave_otter"));
        assert!(!is_valid_two_word_id("braveotter"));
        assert!(!is_valid_two_word_id("brave-otter-2"));
    }
}
