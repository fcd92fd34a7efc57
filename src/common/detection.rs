/// Axis-aligned box in image coordinates, `x1/y1` top-left inclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DetBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl DetBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from center coordinates and extents, the layout the
    /// YOLO head emits.
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    pub fn iou(&self, other: &Self) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Clamps the box to `[0, width] x [0, height]`.
    pub fn clamp(mut self, width: f32, height: f32) -> Self {
        self.x1 = self.x1.clamp(0.0, width);
        self.y1 = self.y1.clamp(0.0, height);
        self.x2 = self.x2.clamp(0.0, width);
        self.y2 = self.y2.clamp(0.0, height);
        self
    }

    pub fn as_x1y1_x2y2_i32(&self) -> (i32, i32, i32, i32) {
        (
            self.x1.round() as i32,
            self.y1.round() as i32,
            self.x2.round() as i32,
            self.y2.round() as i32,
        )
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: DetBox,
}

impl Detection {
    pub fn new(class_id: usize, label: impl Into<String>, confidence: f32, bbox: DetBox) -> Self {
        Self {
            class_id,
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = DetBox::new(0.0, 0.0, 10.0, 10.0);
        let b = DetBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = DetBox::new(5.0, 5.0, 15.0, 25.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_keeps_box_inside_image() {
        let clamped = DetBox::new(-10.0, -5.0, 700.0, 500.0).clamp(640.0, 480.0);
        assert_eq!(clamped, DetBox::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn cxcywh_round_trips_to_corners() {
        let b = DetBox::from_cxcywh(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b, DetBox::new(40.0, 35.0, 60.0, 45.0));
    }
}
