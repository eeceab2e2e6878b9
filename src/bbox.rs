//! Bounding box geometry: centers, areas, IoU and size/distance measures

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left, `(x2, y2)` bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Create from top-left corner and size
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Create a box of the given size centered on `center`
    pub fn from_center(center: Point2<f32>, width: f32, height: f32) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.xmin + self.xmax) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.ymin + self.ymax) / 2.0
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.center_x(), self.center_y())
    }

    /// Characteristic length of the box, `sqrt(area)`
    pub fn scale(&self) -> f32 {
        self.area().max(0.0).sqrt()
    }

    /// Same size, moved so its center lands on `center`
    pub fn recentered(&self, center: Point2<f32>) -> Self {
        Self::from_center(center, self.width(), self.height())
    }

    /// Finite coordinates with strictly positive width and height
    pub fn is_valid(&self) -> bool {
        self.to_bounds().iter().all(|v| v.is_finite()) && self.xmax > self.xmin && self.ymax > self.ymin
    }

    /// Convert to bounds array [xmin, ymin, xmax, ymax]
    pub fn to_bounds(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Convert to [x, y, w, h] with top-left origin
    pub fn to_xywh(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bbox({:.1}, {:.1}, {:.1}, {:.1})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Calculate IoU between two bounding boxes
pub fn calculate_iou(bbox1: &Bbox, bbox2: &Bbox) -> f32 {
    let x1 = bbox1.xmin.max(bbox2.xmin);
    let y1 = bbox1.ymin.max(bbox2.ymin);
    let x2 = bbox1.xmax.min(bbox2.xmax);
    let y2 = bbox1.ymax.min(bbox2.ymax);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = bbox1.area() + bbox2.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// `min(area_a, area_b) / max(area_a, area_b)`, 0 when either area is empty
pub fn area_ratio(area_a: f32, area_b: f32) -> f32 {
    let (small, large) = if area_a < area_b {
        (area_a, area_b)
    } else {
        (area_b, area_a)
    };
    if small <= 0.0 || large <= 0.0 {
        0.0
    } else {
        small / large
    }
}

pub fn size_ratio(bbox1: &Bbox, bbox2: &Bbox) -> f32 {
    area_ratio(bbox1.area(), bbox2.area())
}

/// Euclidean distance between two points
pub fn distance(a: &Point2<f32>, b: &Point2<f32>) -> f32 {
    (a - b).norm()
}

/// Center distance divided by the larger box scale
pub fn normalized_center_distance(bbox1: &Bbox, bbox2: &Bbox) -> f32 {
    let scale = bbox1.scale().max(bbox2.scale());
    if scale <= 0.0 {
        return f32::INFINITY;
    }
    distance(&bbox1.center(), &bbox2.center()) / scale
}

/// Per-frame displacement between two centers observed `frames` apart
pub fn velocity_between(from: &Point2<f32>, to: &Point2<f32>, frames: u32) -> Vector2<f32> {
    if frames == 0 {
        return Vector2::zeros();
    }
    (to - from) / frames as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bbox_properties() {
        let bbox = Bbox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.center_x(), 5.0);
        assert_eq!(bbox.center_y(), 2.5);
    }

    #[test]
    fn test_iou_calculation() {
        let bbox1 = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = Bbox::new(5.0, 5.0, 15.0, 15.0);
        let iou = calculate_iou(&bbox1, &bbox2);
        assert_abs_diff_eq!(iou, 25.0 / 175.0, epsilon = 0.001);

        let far = Bbox::new(100.0, 100.0, 110.0, 110.0);
        assert_eq!(calculate_iou(&bbox1, &far), 0.0);
    }

    #[test]
    fn test_size_ratio_is_symmetric() {
        let small = Bbox::from_xywh(0.0, 0.0, 10.0, 10.0);
        let large = Bbox::from_xywh(0.0, 0.0, 20.0, 10.0);
        assert_abs_diff_eq!(size_ratio(&small, &large), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(size_ratio(&large, &small), 0.5, epsilon = 1e-6);
        assert_eq!(area_ratio(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_recentered_keeps_size() {
        let bbox = Bbox::from_xywh(10.0, 10.0, 20.0, 40.0);
        let moved = bbox.recentered(Point2::new(100.0, 100.0));
        assert_abs_diff_eq!(moved.width(), 20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(moved.height(), 40.0, epsilon = 1e-5);
        assert_abs_diff_eq!(moved.center_x(), 100.0, epsilon = 1e-5);
    }

    #[test]
    fn test_validity() {
        assert!(Bbox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bbox::new(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Bbox::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_velocity_between() {
        let v = velocity_between(&Point2::new(0.0, 0.0), &Point2::new(10.0, -4.0), 2);
        assert_abs_diff_eq!(v.x, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(v.y, -2.0, epsilon = 1e-6);
        assert_eq!(velocity_between(&Point2::origin(), &Point2::new(1.0, 1.0), 0), Vector2::zeros());
    }
}
