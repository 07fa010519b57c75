use serde::Serialize;

/// Pixel-space box in the coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self {
            x_min: xc - w / 2.,
            y_min: yc - h / 2.,
            x_max: xc + w / 2.,
            y_max: yc + h / 2.,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let w = (self.x_max.min(other.x_max) - self.x_min.max(other.x_min)).max(0.);
        let h = (self.y_max.min(other.y_max) - self.y_min.max(other.y_min)).max(0.);
        w * h
    }

    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersection(other) / union
    }

    pub fn clamp_to(self, width: f32, height: f32) -> Self {
        Self {
            x_min: self.x_min.clamp(0., width),
            y_min: self.y_min.clamp(0., height),
            x_max: self.x_max.clamp(0., width),
            y_max: self.y_max.clamp(0., height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl LabelColor {
    pub const FALLBACK: LabelColor = LabelColor {
        red: 0,
        green: 255,
        blue: 0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorLabel {
    pub label: String,
    pub color: LabelColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub color: LabelColor,
}

impl Detection {
    pub fn labelled(
        class_id: usize,
        confidence: f32,
        bbox: BoundingBox,
        labels: &[ColorLabel],
    ) -> Self {
        match labels.get(class_id) {
            Some(color_label) => Self {
                class_id,
                class_name: color_label.label.clone(),
                confidence,
                bbox,
                color: color_label.color,
            },
            None => Self {
                class_id,
                class_name: format!("Unknown class {}", class_id),
                confidence,
                bbox,
                color: LabelColor::FALLBACK,
            },
        }
    }
}
