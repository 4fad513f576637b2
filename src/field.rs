// Displacement field: one (dx, dy) offset per source pixel.
// The compositor reads output(x,y) from source(x - dx, y - dy).

/// A single offset, in source-pixel units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0.0, dy: 0.0 };

    #[inline]
    pub fn magnitude(self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// W×H grid of offsets. Only the brush writes to it; only a reload resizes it.
#[derive(Clone, Debug)]
pub struct DisplacementField {
    width: usize,
    height: usize,
    offsets: Vec<Offset>,
}

impl DisplacementField {
    /// All-zero field (identity warp).
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, offsets: vec![Offset::ZERO; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Offset {
        self.offsets[y * self.width + x]
    }

    /// Accumulate into one cell. Strokes compose additively.
    #[inline]
    pub fn add(&mut self, x: usize, y: usize, dx: f32, dy: f32) {
        let o = &mut self.offsets[y * self.width + x];
        o.dx += dx;
        o.dy += dy;
    }

    /// Back to the identity warp, keeping the allocation.
    pub fn reset(&mut self) {
        self.offsets.fill(Offset::ZERO);
    }

    pub fn is_identity(&self) -> bool {
        self.offsets.iter().all(|o| *o == Offset::ZERO)
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// Largest offset length anywhere in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.offsets.iter().map(|o| o.magnitude()).fold(0.0, f32::max)
    }
}
