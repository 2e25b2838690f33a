//! Collision geometry and mass conversion.

use glam::Vec2;

/// Mass = size² / 100.
pub const MASS_CONVERSION: f32 = 100.0;

/// Divisor on the prey's size in the eat overlap test.
pub const EAT_OVERLAP_DIV: f32 = 3.0;

/// Result of checking collision between two cells.
#[derive(Debug)]
pub struct CollisionResult {
    /// Combined radius of both cells
    pub r: f32,
    /// Distance X component
    pub dx: f32,
    /// Distance Y component
    pub dy: f32,
    /// Actual distance
    pub d: f32,
    /// Squared distance
    pub squared: f32,
    /// Push amount for rigid collisions
    pub push: f32,
}

impl CollisionResult {
    /// Check if cells are actually colliding.
    #[inline]
    pub fn is_colliding(&self) -> bool {
        self.d < self.r
    }

    /// Whether an eater of `eater_size` overlaps prey of `prey_size` deeply
    /// enough to swallow it: `d < eater - prey / 3`.
    #[inline]
    pub fn can_swallow(&self, eater_size: f32, prey_size: f32) -> bool {
        let threshold = eater_size - prey_size / EAT_OVERLAP_DIV;
        threshold > 0.0 && self.squared < threshold * threshold
    }

    /// Separation vector from the first cell towards the second.
    #[inline]
    pub fn push_vector(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy) * self.push
    }
}

/// Check collision between two cells.
#[inline]
pub fn check_cell_collision(cell_pos: Vec2, cell_size: f32, check_pos: Vec2, check_size: f32) -> CollisionResult {
    let r = cell_size + check_size;
    let dx = check_pos.x - cell_pos.x;
    let dy = check_pos.y - cell_pos.y;
    let squared = dx * dx + dy * dy;
    let sqrt = squared.sqrt();

    let push = if sqrt > 0.0 {
        ((r - sqrt) / sqrt).min(r - sqrt)
    } else {
        0.0
    };

    CollisionResult {
        r,
        dx,
        dy,
        d: sqrt,
        squared,
        push,
    }
}

/// Calculate mass from size.
#[inline]
pub fn size_to_mass(size: f32) -> f32 {
    (size * size) / MASS_CONVERSION
}

/// Calculate size from mass.
#[inline]
pub fn mass_to_size(mass: f32) -> f32 {
    (MASS_CONVERSION * mass.max(0.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mass_conversion() {
        let mass = 100.0;
        let size = mass_to_size(mass);
        assert_eq!(size, 100.0);
        let back = size_to_mass(size);
        assert!((back - mass).abs() < 0.001);
        assert!(mass_to_size(10.0) < mass_to_size(11.0));
    }

    #[test]
    fn test_collision_check() {
        let result = check_cell_collision(Vec2::new(0.0, 0.0), 50.0, Vec2::new(30.0, 0.0), 20.0);
        assert!(result.is_colliding()); // 50 + 20 = 70, distance = 30
        assert_eq!(result.d, 30.0);
    }

    #[test]
    fn test_no_collision() {
        let result = check_cell_collision(Vec2::new(0.0, 0.0), 10.0, Vec2::new(100.0, 0.0), 10.0);
        assert!(!result.is_colliding()); // 10 + 10 = 20, distance = 100
    }

    #[test]
    fn test_swallow_threshold() {
        // Threshold for 100 eating 30 is 90.
        let close = check_cell_collision(Vec2::ZERO, 100.0, Vec2::new(89.0, 0.0), 30.0);
        let far = check_cell_collision(Vec2::ZERO, 100.0, Vec2::new(91.0, 0.0), 30.0);
        assert!(close.can_swallow(100.0, 30.0));
        assert!(!far.can_swallow(100.0, 30.0));
    }

    #[test]
    fn test_push_separates() {
        let result = check_cell_collision(Vec2::ZERO, 50.0, Vec2::new(60.0, 0.0), 50.0);
        // Overlap of 40 along +x.
        assert!((result.push_vector() - Vec2::new(40.0, 0.0)).length() < 1e-3);
    }
}
