//! Magazine geometry
//!
//! Maps a tool number to the XY location of its pocket. Pockets are laid out
//! in a straight line along X or Y starting at pocket 1; tools outside
//! `1..=pocket_count` have no pocket and resolve to the manual position.

use rapidchange_core::ToolId;
use rapidchange_settings::{Alignment, AtcConfig, Direction};

/// Pocket layout derived from the validated configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PocketLayout {
    pub alignment: Alignment,
    pub direction: Direction,
    pub pocket_count: u32,
    pub pocket_offset: f32,
    /// XY of pocket 1
    pub origin: (f32, f32),
    /// Where tools without a pocket are handed over by the operator
    pub manual_position: (f32, f32),
}

impl PocketLayout {
    /// Build the layout for a configuration
    ///
    /// The manual position is the tool setter when one is configured,
    /// otherwise pocket 1.
    pub fn new(config: &AtcConfig) -> Self {
        let origin = (config.pocket1_x, config.pocket1_y);
        let manual_position = config
            .tool_setter
            .as_ref()
            .map(|setter| (setter.x, setter.y))
            .unwrap_or(origin);
        Self {
            alignment: config.alignment,
            direction: config.direction,
            pocket_count: config.pocket_count,
            pocket_offset: config.pocket_offset,
            origin,
            manual_position,
        }
    }

    /// Check whether a tool is stored in the magazine
    pub fn tool_has_pocket(&self, tool: ToolId) -> bool {
        tool.is_some() && tool.0 <= self.pocket_count
    }

    /// XY of the tool's pocket, `None` when it has no pocket
    pub fn pocket_position(&self, tool: ToolId) -> Option<(f32, f32)> {
        if !self.tool_has_pocket(tool) {
            return None;
        }
        let offset = (tool.0 - 1) as f32 * self.pocket_offset * self.direction.sign();
        let (x, y) = self.origin;
        Some(match self.alignment {
            Alignment::X => (x + offset, y),
            Alignment::Y => (x, y + offset),
        })
    }

    /// Pocket XY, or the manual position for tools without a pocket
    pub fn resolved_position(&self, tool: ToolId) -> (f32, f32) {
        self.pocket_position(tool).unwrap_or(self.manual_position)
    }
}

impl From<&AtcConfig> for PocketLayout {
    fn from(config: &AtcConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(alignment: Alignment, direction: Direction) -> PocketLayout {
        PocketLayout {
            alignment,
            direction,
            pocket_count: 6,
            pocket_offset: 45.0,
            origin: (0.0, 0.0),
            manual_position: (300.0, 12.0),
        }
    }

    #[test]
    fn test_pocket_boundaries() {
        let layout = layout(Alignment::X, Direction::Positive);
        assert!(!layout.tool_has_pocket(ToolId(0)));
        assert!(layout.tool_has_pocket(ToolId(1)));
        assert!(layout.tool_has_pocket(ToolId(6)));
        assert!(!layout.tool_has_pocket(ToolId(7)));
    }

    #[test]
    fn test_pocket_position_x_positive() {
        let layout = layout(Alignment::X, Direction::Positive);
        assert_eq!(layout.pocket_position(ToolId(1)), Some((0.0, 0.0)));
        assert_eq!(layout.pocket_position(ToolId(3)), Some((90.0, 0.0)));
        assert_eq!(layout.pocket_position(ToolId(7)), None);
    }

    #[test]
    fn test_pocket_position_y_negative() {
        let mut layout = layout(Alignment::Y, Direction::Negative);
        layout.origin = (10.0, 400.0);
        assert_eq!(layout.pocket_position(ToolId(2)), Some((10.0, 355.0)));
    }

    #[test]
    fn test_resolved_position_falls_back_to_manual() {
        let layout = layout(Alignment::X, Direction::Positive);
        assert_eq!(layout.resolved_position(ToolId(2)), (45.0, 0.0));
        assert_eq!(layout.resolved_position(ToolId(12)), (300.0, 12.0));
        assert_eq!(layout.resolved_position(ToolId::NONE), (300.0, 12.0));
    }

    #[test]
    fn test_empty_magazine() {
        let mut layout = layout(Alignment::X, Direction::Positive);
        layout.pocket_count = 0;
        assert!(!layout.tool_has_pocket(ToolId(1)));
    }
}
