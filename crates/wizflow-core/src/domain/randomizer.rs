//! Seeded random source for reproducible flows.
//!
//! Every seeded draw goes through [`Randomizer::random_int`], which bumps the call
//! counter. Identifiers for new subjects come from the thread-local generator instead,
//! so creating a character never shifts the seeded sequence.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::domain::context::EquipmentMode;
use crate::error::{CoreError, CoreResult};

const STANDARD_ARRAY: [i32; 6] = [15, 14, 13, 12, 10, 8];

/// Abilities in the order the standard array is dealt to them
pub const ABILITIES: [&str; 6] = [
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
];

pub const ALIGNMENTS: [&str; 9] = [
    "Lawful Good",
    "Neutral Good",
    "Chaotic Good",
    "Lawful Neutral",
    "True Neutral",
    "Chaotic Neutral",
    "Lawful Evil",
    "Neutral Evil",
    "Chaotic Evil",
];

const NAME_PREFIXES: [&str; 26] = [
    "Ael", "Bal", "Cor", "Dar", "Eld", "Fen", "Gar", "Hal", "Ith", "Jar", "Kel", "Lor", "Mal",
    "Nor", "Orn", "Pel", "Quar", "Ren", "Sar", "Tor", "Und", "Val", "Wyr", "Xan", "Yel", "Zar",
];

const NAME_SUFFIXES: [&str; 20] = [
    "an", "en", "in", "on", "ar", "er", "ir", "or", "ak", "ek", "ik", "ok", "us", "is", "os",
    "ath", "eth", "ith", "oth", "uth",
];

const ID_ADJECTIVES: [&str; 20] = [
    "brave", "swift", "bold", "wise", "dark", "silver", "golden", "iron", "shadow", "storm",
    "frost", "flame", "ancient", "mighty", "silent", "noble", "wild", "fierce", "cunning",
    "valiant",
];

const ID_NOUNS: [&str; 20] = [
    "warrior", "mage", "hunter", "rogue", "knight", "sage", "wanderer", "guardian", "seeker",
    "warden", "blade", "arrow", "shield", "wolf", "dragon", "hawk", "raven", "phoenix", "titan",
    "oracle",
];

/// Ability scores dealt from the standard array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityScores {
    pub scores: BTreeMap<String, i32>,
    pub method: &'static str,
}

/// Deterministic random source, one per flow execution
#[derive(Debug, Clone)]
pub struct Randomizer {
    seed: u64,
    rng: ChaCha8Rng,
    call_count: u64,
}

impl Randomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            call_count: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of seeded draws made so far
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Uniform integer in `[min, max]`.
    pub fn random_int(&mut self, min: i64, max: i64) -> CoreResult<i64> {
        if min > max {
            return Err(CoreError::RandomizerError(format!(
                "invalid range [{}, {}]",
                min, max
            )));
        }
        self.call_count += 1;
        Ok(self.rng.gen_range(min..=max))
    }

    /// Uniform index into a collection of `len` items; `None` when empty.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.call_count += 1;
        Some(self.rng.gen_range(0..len))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).map(|i| &items[i])
    }

    /// Like [`Randomizer::choose`] but never returns an item equal to `exclude`.
    pub fn choose_other<'a, T: PartialEq>(&mut self, items: &'a [T], exclude: Option<&T>) -> Option<&'a T> {
        let candidates: Vec<&'a T> = items.iter().filter(|i| Some(*i) != exclude).collect();
        self.choose(&candidates).copied()
    }

    /// Fisher-Yates shuffle in place, one draw per position from the end.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            self.call_count += 1;
            let j = self.rng.gen_range(0..=i);
            items.swap(i, j);
        }
    }

    /// `count` distinct items; every item, unshuffled and without drawing, when `count >= items.len()`.
    pub fn pick_random<T: Clone>(&mut self, items: &[T], count: usize) -> Vec<T> {
        if items.len() <= count {
            return items.to_vec();
        }
        let mut shuffled = items.to_vec();
        self.shuffle(&mut shuffled);
        shuffled.truncate(count);
        shuffled
    }

    pub fn random_ability_scores(&mut self) -> AbilityScores {
        let mut values = STANDARD_ARRAY;
        self.shuffle(&mut values);
        let scores = ABILITIES
            .iter()
            .zip(values.iter())
            .map(|(ability, value)| (ability.to_string(), *value))
            .collect();
        AbilityScores {
            scores,
            method: "standard_array",
        }
    }

    pub fn random_name(&mut self) -> String {
        let prefix = self.choose(&NAME_PREFIXES).copied().unwrap_or("Ael");
        let suffix = self.choose(&NAME_SUFFIXES).copied().unwrap_or("an");
        format!("{}{}", prefix, suffix)
    }

    pub fn random_alignment(&mut self) -> &'static str {
        self.choose(&ALIGNMENTS).copied().unwrap_or("True Neutral")
    }

    pub fn random_equipment_mode(&mut self) -> EquipmentMode {
        self.choose(&EquipmentMode::ALL)
            .copied()
            .unwrap_or(EquipmentMode::Equipment)
    }

    /// Opaque public identifier (`adjective-noun-xxxx`). Not seeded.
    pub fn generate_public_id(&self) -> String {
        let mut rng = thread_rng();
        let adjective = ID_ADJECTIVES[rng.gen_range(0..ID_ADJECTIVES.len())];
        let noun = ID_NOUNS[rng.gen_range(0..ID_NOUNS.len())];
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        format!("{}-{}-{}", adjective, noun, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draw_sequence(seed: u64) -> (Vec<i64>, Vec<u32>, String, u64) {
        let mut r = Randomizer::new(seed);
        let ints = (0..20).map(|_| r.random_int(0, 100).unwrap()).collect();
        let picks = r.pick_random(&(0..10).collect::<Vec<u32>>(), 4);
        let name = r.random_name();
        (ints, picks, name, r.call_count())
    }

    #[test]
    fn same_seed_same_sequence() {
        for seed in [1_u64, 42, 999_999] {
            assert_eq!(draw_sequence(seed), draw_sequence(seed));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        assert_ne!(draw_sequence(1).0, draw_sequence(2).0);
    }

    #[test]
    fn random_int_is_inclusive_and_counted() {
        let mut r = Randomizer::new(7);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..500 {
            let v = r.random_int(3, 5).unwrap();
            assert!((3..=5).contains(&v));
            seen_min |= v == 3;
            seen_max |= v == 5;
        }
        assert!(seen_min && seen_max);
        assert_eq!(r.call_count(), 500);
    }

    #[test]
    fn inverted_range_is_an_error() {
        let mut r = Randomizer::new(7);
        assert!(r.random_int(5, 3).is_err());
        assert_eq!(r.call_count(), 0);
    }

    #[test]
    fn pick_random_returns_all_items_without_drawing_when_count_covers_them() {
        let mut r = Randomizer::new(7);
        let items = vec!["a", "b"];
        assert_eq!(r.pick_random(&items, 2), items);
        assert_eq!(r.pick_random(&items, 5), items);
        assert_eq!(r.call_count(), 0);
    }

    #[test]
    fn pick_random_returns_distinct_items() {
        let mut r = Randomizer::new(11);
        let items: Vec<u32> = (0..8).collect();
        let picked = r.pick_random(&items, 3);
        assert_eq!(picked.len(), 3);
        let mut dedup = picked.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), 3);
        // one draw per shuffle position
        assert_eq!(r.call_count(), 7);
    }

    #[test]
    fn choose_other_skips_the_excluded_item() {
        let mut r = Randomizer::new(13);
        let races = ["elf", "dwarf"];
        for _ in 0..20 {
            assert_eq!(r.choose_other(&races, Some(&"elf")), Some(&"dwarf"));
        }
        assert_eq!(r.choose_other(&["elf"], Some(&"elf")), None);
    }

    #[test]
    fn ability_scores_use_the_standard_array() {
        let mut r = Randomizer::new(3);
        let scores = r.random_ability_scores();
        let mut values: Vec<i32> = scores.scores.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, vec![8, 10, 12, 13, 14, 15]);
        assert_eq!(scores.method, "standard_array");
        assert_eq!(scores.scores.len(), 6);
    }

    #[test]
    fn public_id_does_not_consume_seeded_draws() {
        let mut a = Randomizer::new(5);
        let mut b = Randomizer::new(5);
        let id = a.generate_public_id();
        assert_eq!(id.split('-').count(), 3);
        assert_eq!(a.call_count(), 0);
        assert_eq!(a.random_int(0, 1000).unwrap(), b.random_int(0, 1000).unwrap());
    }
}
