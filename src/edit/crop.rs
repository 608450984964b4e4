use crate::edit::state::CropRect;
use crate::error::Result;

/// Corners of the crop rectangle a user can drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];
}

/// Interactive crop rectangle editing in frame coordinates
///
/// Starts as the full frame. Dragged corners are clamped to the frame and the
/// rectangle is re-normalized after every move, so it never leaves the frame.
/// A rectangle may collapse to zero width or height while dragging; that is
/// only rejected on [`confirm`](Self::confirm).
#[derive(Debug, Clone)]
pub struct CropEditor {
    frame_width: u32,
    frame_height: u32,
    rect: [u32; 4],
    grab_radius: u32,
    dragging: Option<Corner>,
}

impl CropEditor {
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            rect: [0, 0, frame_width, frame_height],
            grab_radius: 10,
            dragging: None,
        }
    }

    /// Corner hit radius in frame pixels
    pub fn with_grab_radius(mut self, radius: u32) -> Self {
        self.grab_radius = radius;
        self
    }

    /// Current `[x1, y1, x2, y2]`
    pub fn rect(&self) -> [u32; 4] {
        self.rect
    }

    fn corner_position(&self, corner: Corner) -> (u32, u32) {
        let [x1, y1, x2, y2] = self.rect;
        match corner {
            Corner::TopLeft => (x1, y1),
            Corner::TopRight => (x2, y1),
            Corner::BottomLeft => (x1, y2),
            Corner::BottomRight => (x2, y2),
        }
    }

    /// Start dragging the corner under `(x, y)`, if any
    pub fn press(&mut self, x: i64, y: i64) -> Option<Corner> {
        let radius = i64::from(self.grab_radius);
        self.dragging = Corner::ALL.into_iter().find(|&corner| {
            let (cx, cy) = self.corner_position(corner);
            (x - i64::from(cx)).abs() <= radius && (y - i64::from(cy)).abs() <= radius
        });
        self.dragging
    }

    /// Move the dragged corner to `(x, y)`, clamped into the frame
    pub fn drag_to(&mut self, x: i64, y: i64) {
        let Some(corner) = self.dragging else {
            return;
        };
        let x = x.clamp(0, i64::from(self.frame_width)) as u32;
        let y = y.clamp(0, i64::from(self.frame_height)) as u32;

        match corner {
            Corner::TopLeft => {
                self.rect[0] = x;
                self.rect[1] = y;
            }
            Corner::TopRight => {
                self.rect[2] = x;
                self.rect[1] = y;
            }
            Corner::BottomLeft => {
                self.rect[0] = x;
                self.rect[3] = y;
            }
            Corner::BottomRight => {
                self.rect[2] = x;
                self.rect[3] = y;
            }
        }

        let [x1, y1, x2, y2] = self.rect;
        self.rect = [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)];
    }

    pub fn release(&mut self) {
        self.dragging = None;
    }

    /// The edited rectangle, `InvalidRegion` if it has no area
    pub fn confirm(&self) -> Result<CropRect> {
        let [x1, y1, x2, y2] = self.rect;
        CropRect::new(x1, y1, x2, y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_as_full_frame() {
        let editor = CropEditor::new(640, 480);
        assert_eq!(editor.rect(), [0, 0, 640, 480]);
        assert_eq!(editor.confirm().unwrap(), CropRect::full(640, 480).unwrap());
    }

    #[test]
    fn test_press_picks_nearby_corner() {
        let mut editor = CropEditor::new(640, 480);
        assert_eq!(editor.press(635, 475), Some(Corner::BottomRight));
        assert_eq!(editor.press(320, 240), None);
        assert_eq!(editor.press(-3, 2), Some(Corner::TopLeft));
    }

    #[test]
    fn test_drag_is_clamped_to_frame() {
        let mut editor = CropEditor::new(640, 480);
        editor.press(640, 480);
        editor.drag_to(9000, -50);
        assert_eq!(editor.rect(), [0, 0, 640, 0]);
    }

    #[test]
    fn test_drag_past_opposite_corner_normalizes() {
        let mut editor = CropEditor::new(100, 100);
        editor.press(0, 0);
        editor.drag_to(150, 60);
        let [x1, y1, x2, y2] = editor.rect();
        assert!(x1 <= x2 && y1 <= y2);
        assert_eq!(editor.rect(), [100, 60, 100, 100]);
        assert!(editor.confirm().is_err());
    }

    #[test]
    fn test_drag_without_press_is_ignored() {
        let mut editor = CropEditor::new(100, 100);
        editor.drag_to(50, 50);
        assert_eq!(editor.rect(), [0, 0, 100, 100]);

        editor.press(100, 100);
        editor.release();
        editor.drag_to(50, 50);
        assert_eq!(editor.rect(), [0, 0, 100, 100]);
    }

    #[test]
    fn test_confirm_after_drag() {
        let mut editor = CropEditor::new(100, 100).with_grab_radius(4);
        editor.press(98, 98);
        editor.drag_to(60, 40);
        editor.release();
        let rect = editor.confirm().unwrap();
        assert_eq!((rect.width(), rect.height()), (60, 40));
    }
}
