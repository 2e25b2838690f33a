//! Virus.

use glam::Vec2;
use protocol::Color;

use super::{Body, Entity, EntityId};

/// Default virus color (green).
pub const VIRUS_COLOR: Color = Color::new(51, 255, 51);

impl Entity {
    /// Create a new virus.
    pub fn virus(id: EntityId, position: Vec2, size: f32, tick: u64) -> Self {
        Entity::new(id, Body::Virus, position, size, VIRUS_COLOR, tick)
    }
}

/// Masses of the fragments a cell of `cell_mass` breaks into when it eats a
/// virus, given `cells_left` free slots and a minimum of `split_min` mass
/// per fragment. The popped cell keeps whatever is not handed out.
pub fn pop_split_masses(cell_mass: f32, cells_left: usize, split_min: f32) -> Vec<f32> {
    let mut splits = Vec::new();
    if cells_left == 0 {
        return splits;
    }

    // Too little mass to fill every slot: split into a power of two.
    if cell_mass / (cells_left as f32) < split_min {
        let mut split_count: usize = 2;
        let mut split_mass = cell_mass / split_count as f32;
        while split_mass > split_min && 2 * split_count < cells_left {
            split_count *= 2;
            split_mass = cell_mass / split_count as f32;
        }
        // The original cell keeps one share.
        split_mass = cell_mass / (split_count + 1) as f32;
        splits.resize(split_count, split_mass);
        return splits;
    }

    // Hand out half the mass in halving steps, then spread the remainder
    // once the pieces would fall below `split_min`.
    let mut mass_left = cell_mass / 2.0;
    let mut split_mass = cell_mass / 2.0;
    let mut remaining = cells_left;
    while remaining > 0 {
        remaining -= 1;
        if remaining > 0 && mass_left / (remaining as f32) < split_min {
            split_mass = mass_left / remaining as f32;
            while remaining > 0 {
                remaining -= 1;
                splits.push(split_mass);
            }
        }
        while split_mass >= mass_left && remaining > 0 {
            split_mass /= 2.0;
        }
        splits.push(split_mass);
        mass_left -= split_mass;
    }
    splits
}

/// Directions for `count` viruses shot along `heading`, fanned evenly
/// around the circle when more than one.
pub fn shot_directions(heading: Vec2, count: usize) -> Vec<Vec2> {
    let heading = heading.try_normalize().unwrap_or(Vec2::X);
    (0..count)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / count as f32;
            Vec2::from_angle(angle).rotate(heading)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_cell_splits_in_powers_of_two() {
        let splits = pop_split_masses(400.0, 15, 36.0);
        assert_eq!(splits.len(), 8);
        for mass in &splits {
            assert!((mass - 400.0 / 9.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_large_cell_hands_out_half() {
        let splits = pop_split_masses(2000.0, 4, 36.0);
        assert_eq!(splits, vec![500.0, 250.0, 125.0, 125.0]);
        let total: f32 = splits.iter().sum();
        assert_eq!(total, 1000.0);
    }

    #[test]
    fn test_no_free_slots() {
        assert!(pop_split_masses(2000.0, 0, 36.0).is_empty());
    }

    #[test]
    fn test_shot_directions_fan_out() {
        let single = shot_directions(Vec2::new(0.0, 2.0), 1);
        assert_eq!(single, vec![Vec2::Y]);

        let pair = shot_directions(Vec2::X, 2);
        assert!((pair[0] - Vec2::X).length() < 1e-5);
        assert!((pair[1] + Vec2::X).length() < 1e-5);
    }
}
