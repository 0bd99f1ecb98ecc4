// src/loot.rs
use rand::{seq::SliceRandom, Rng};

use crate::types::{Coordinate, LootStash};

pub const DEFAULT_COUNT: usize = 3;
/// Max offset in degrees on each axis, a few hundred meters at mid latitudes.
pub const MAX_OFFSET: f64 = 0.003;

pub const CATALOG: [&str; 7] = [
    "Canned Ration",
    "Antibiotics",
    "Water Bottle",
    "9mm Ammo",
    "Medkit",
    "Gas Mask Filter",
    "Flashlight Battery",
];

pub fn spawn_loot(center: Coordinate, count: usize) -> Vec<LootStash> {
    spawn_loot_with(&mut rand::thread_rng(), center, count)
}

pub fn spawn_loot_with<R: Rng + ?Sized>(
    rng: &mut R,
    center: Coordinate,
    count: usize,
) -> Vec<LootStash> {
    (0..count)
        .map(|_| {
            // clamped so a center on the pole or antimeridian never yields invalid geometry
            let lat = (center.lat + rng.gen_range(-MAX_OFFSET..=MAX_OFFSET)).clamp(-90.0, 90.0);
            let lng = (center.lng + rng.gen_range(-MAX_OFFSET..=MAX_OFFSET)).clamp(-180.0, 180.0);
            let item = CATALOG.choose(rng).copied().unwrap_or(CATALOG[0]);
            LootStash {
                id: rng.gen_range(1000..=9999),
                lat,
                lng,
                item: item.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn stays_within_offset_and_catalog() {
        let center = Coordinate::new(10.0, 20.0).unwrap();
        let stashes = spawn_loot(center, 1000);
        assert_eq!(stashes.len(), 1000);
        for s in &stashes {
            assert!((s.lat - 10.0).abs() <= MAX_OFFSET + 1e-12, "lat {}", s.lat);
            assert!((s.lng - 20.0).abs() <= MAX_OFFSET + 1e-12, "lng {}", s.lng);
            assert!(CATALOG.contains(&s.item.as_str()), "item {}", s.item);
            assert!((1000..=9999).contains(&s.id));
        }
    }

    #[test]
    fn default_count_is_three() {
        let center = Coordinate::new(0.0, 0.0).unwrap();
        assert_eq!(spawn_loot(center, DEFAULT_COUNT).len(), 3);
        assert!(spawn_loot(center, 0).is_empty());
    }

    #[test]
    fn seeded_rng_reaches_whole_catalog() {
        let mut rng = StdRng::seed_from_u64(7);
        let center = Coordinate::new(-33.9, 151.2).unwrap();
        let items: HashSet<String> = spawn_loot_with(&mut rng, center, 500)
            .into_iter()
            .map(|s| s.item)
            .collect();
        assert_eq!(items.len(), CATALOG.len());
    }

    #[test]
    fn same_seed_same_output() {
        let center = Coordinate::new(1.0, 1.0).unwrap();
        let a = spawn_loot_with(&mut StdRng::seed_from_u64(42), center, 5);
        let b = spawn_loot_with(&mut StdRng::seed_from_u64(42), center, 5);
        assert_eq!(a, b);
    }
}
