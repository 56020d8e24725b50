use serde::Serialize;

pub const SURFACE_WIDTH: f64 = 350.0;
pub const DEFAULT_SURFACE_HEIGHT: f64 = 100.0;
pub const SURFACE_MARGIN: f64 = 20.0;

/// Usable screen region in logical units, excluding taskbars and docks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WorkArea {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Places a surface of `width` x `height` in the bottom-right corner of the
/// work area, `margin` away from both edges. Oversized surfaces are shrunk
/// so they stay inside the margins.
pub fn anchor_bottom_right(work_area: WorkArea, width: f64, height: f64, margin: f64) -> Bounds {
    let max_width = (work_area.width - 2.0 * margin).max(0.0);
    let max_height = (work_area.height - 2.0 * margin).max(0.0);
    let width = sanitize(width).min(max_width);
    let height = sanitize(height).min(max_height);

    Bounds {
        x: work_area.right() - width - margin,
        y: work_area.bottom() - height - margin,
        width,
        height,
    }
}

fn sanitize(length: f64) -> f64 {
    if length.is_finite() { length.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK_AREA: WorkArea = WorkArea {
        x: 0.0,
        y: 0.0,
        width: 1440.0,
        height: 860.0,
    };

    fn assert_inside(bounds: Bounds, area: WorkArea) {
        assert!(bounds.x + bounds.width <= area.right() - SURFACE_MARGIN + f64::EPSILON);
        assert!(bounds.y + bounds.height <= area.bottom() - SURFACE_MARGIN + f64::EPSILON);
        assert!(bounds.x >= area.x);
        assert!(bounds.y >= area.y);
    }

    #[test]
    fn default_surface_sits_in_bottom_right_corner() {
        let bounds = anchor_bottom_right(WORK_AREA, SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT, SURFACE_MARGIN);
        assert_eq!(
            bounds,
            Bounds {
                x: 1440.0 - 350.0 - 20.0,
                y: 860.0 - 100.0 - 20.0,
                width: 350.0,
                height: 100.0,
            }
        );
    }

    #[test]
    fn any_measured_height_stays_within_work_area() {
        let steps = 200;
        for step in 0..=steps {
            let height = WORK_AREA.height * f64::from(step) / f64::from(steps);
            let bounds = anchor_bottom_right(WORK_AREA, SURFACE_WIDTH, height, SURFACE_MARGIN);
            assert_inside(bounds, WORK_AREA);
        }
    }

    #[test]
    fn offset_work_area_is_respected() {
        let area = WorkArea {
            x: 1920.0,
            y: 25.0,
            width: 1280.0,
            height: 775.0,
        };
        let bounds = anchor_bottom_right(area, SURFACE_WIDTH, 240.0, SURFACE_MARGIN);
        assert_eq!(bounds.x, 1920.0 + 1280.0 - 350.0 - 20.0);
        assert_eq!(bounds.y, 25.0 + 775.0 - 240.0 - 20.0);
        assert_inside(bounds, area);
    }

    #[test]
    fn invalid_heights_collapse_to_zero() {
        let nan = anchor_bottom_right(WORK_AREA, SURFACE_WIDTH, f64::NAN, SURFACE_MARGIN);
        assert_eq!(nan.height, 0.0);
        let negative = anchor_bottom_right(WORK_AREA, SURFACE_WIDTH, -5.0, SURFACE_MARGIN);
        assert_eq!(negative.height, 0.0);
        assert_inside(negative, WORK_AREA);
    }

    #[test]
    fn tiny_work_area_never_yields_negative_sizes() {
        let area = WorkArea {
            x: 0.0,
            y: 0.0,
            width: 30.0,
            height: 30.0,
        };
        let bounds = anchor_bottom_right(area, SURFACE_WIDTH, 500.0, SURFACE_MARGIN);
        assert_eq!(bounds.width, 0.0);
        assert_eq!(bounds.height, 0.0);
    }
}
