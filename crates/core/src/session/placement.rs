//! Placement of contextual panels next to the pointer.
//!
//! Every panel (name entry, record detail, delete confirmation) is anchored to
//! the pixel the user interacted with and flipped away from the viewport edge
//! it would overflow.

/// Gap between the anchor pixel and the panel corner.
pub const PANEL_OFFSET: f64 = 10.0;

/// A position in viewport pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Pixel) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(self) -> Pixel {
        Pixel::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Calculates the top-left corner of a panel anchored at `anchor`.
///
/// The default position is below and to the right of the anchor. The panel
/// flips to the left when it would cross the right edge and above when it
/// would cross the bottom edge. The result never has a negative coordinate.
///
/// # Arguments
/// * `anchor` - The pixel that was clicked
/// * `panel` - Size of the panel box
/// * `viewport` - Size of the map viewport
pub fn place_panel(anchor: Pixel, panel: Size, viewport: Size) -> Pixel {
    let mut x = anchor.x + PANEL_OFFSET;
    let mut y = anchor.y + PANEL_OFFSET;

    if x + panel.width > viewport.width {
        x = anchor.x - PANEL_OFFSET - panel.width;
    }
    if y + panel.height > viewport.height {
        y = anchor.y - PANEL_OFFSET - panel.height;
    }

    Pixel::new(x.max(0.0), y.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size::new(800.0, 600.0);
    const PANEL: Size = Size::new(100.0, 50.0);

    #[test]
    fn test_default_position() {
        let at = place_panel(Pixel::new(100.0, 100.0), PANEL, VIEWPORT);
        assert_eq!(at, Pixel::new(110.0, 110.0));
    }

    #[test]
    fn test_bottom_right_corner_flips_both_ways() {
        let at = place_panel(Pixel::new(790.0, 590.0), PANEL, VIEWPORT);
        assert_eq!(at, Pixel::new(680.0, 530.0));
    }

    #[test]
    fn test_right_edge_flips_horizontally_only() {
        let at = place_panel(Pixel::new(750.0, 20.0), PANEL, VIEWPORT);
        assert_eq!(at, Pixel::new(640.0, 30.0));
    }

    #[test]
    fn test_bottom_edge_flips_vertically_only() {
        let at = place_panel(Pixel::new(20.0, 580.0), PANEL, VIEWPORT);
        assert_eq!(at, Pixel::new(30.0, 520.0));
    }

    #[test]
    fn test_exact_fit_does_not_flip() {
        // 690 + 10 + 100 == 800 exactly.
        let at = place_panel(Pixel::new(690.0, 540.0), PANEL, VIEWPORT);
        assert_eq!(at, Pixel::new(700.0, 550.0));
    }

    #[test]
    fn test_clamped_when_panel_is_larger_than_viewport() {
        let tiny = Size::new(90.0, 40.0);
        let at = place_panel(Pixel::new(50.0, 20.0), PANEL, tiny);
        assert_eq!(at, Pixel::new(0.0, 0.0));
    }
}
