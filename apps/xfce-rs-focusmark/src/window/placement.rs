use crate::config::MarkerSize;
use crate::core::backend::Rect;

/// Where an overlay sits on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A marker-sized block flush with the target's top-right corner.
    Active,
    /// The whole target.
    Inactive,
}

impl Placement {
    /// Overlay rectangle in the target's own coordinate space (the overlay is
    /// a child of the target, so the target's position does not matter).
    pub fn resolve(&self, target: Rect, marker: MarkerSize) -> Rect {
        match self {
            Placement::Active => {
                let x = (target.width as i32 - marker.width as i32).max(0);
                Rect::new(x.min(i16::MAX as i32) as i16, 0, marker.width, marker.height)
            }
            Placement::Inactive => target.at_origin(),
        }
    }
}
