use glam::{Mat3, Vec3};

/// Width and height of an image grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pinhole intrinsics: focal lengths and principal point, in pixels of the
/// resolution they were calibrated for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    pub const fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Reads the terms from a 3x3 K matrix laid out as
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]` (rows).
    pub fn from_matrix(k: &Mat3) -> Self {
        Self {
            fx: k.x_axis.x,
            fy: k.y_axis.y,
            cx: k.z_axis.x,
            cy: k.z_axis.y,
        }
    }

    pub fn to_matrix(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.fx, 0.0, 0.0),
            Vec3::new(0.0, self.fy, 0.0),
            Vec3::new(self.cx, self.cy, 1.0),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx > 0.0
            && self.fy > 0.0
    }
}

/// Rescales intrinsics calibrated at `from` so they describe the same camera
/// sampled at `to`. Focal and principal terms are divided by the per-axis
/// ratio `from / to`.
pub fn scale_intrinsics(intrinsics: &Intrinsics, from: Resolution, to: Resolution) -> Intrinsics {
    let ratio_x = from.width as f32 / to.width as f32;
    let ratio_y = from.height as f32 / to.height as f32;
    Intrinsics {
        fx: intrinsics.fx / ratio_x,
        fy: intrinsics.fy / ratio_y,
        cx: intrinsics.cx / ratio_x,
        cy: intrinsics.cy / ratio_y,
    }
}
