//! Greedy pagination of measured blocks

/// Spacing added to every measured block height, matching the container gap.
pub const BLOCK_SPACING: f32 = 20.0;

/// An item paired with its measured height (spacing included).
#[derive(Debug, Clone, PartialEq)]
pub struct Measured<T> {
    pub item: T,
    pub height: f32,
}

impl<T> Measured<T> {
    pub fn new(item: T, height: f32) -> Self {
        Self { item, height }
    }
}

/// Blocks rendered together into one output image.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<T> {
    pub items: Vec<T>,
    /// Sum of the measured heights of `items`
    pub height: f32,
}

impl<T> Segment<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pack `blocks` into segments of at most `threshold` pixels.
///
/// Single pass, order preserving, no splitting: a block that would push the
/// running segment over the threshold closes it first, unless the segment is
/// still empty. A block taller than the threshold therefore ends up alone in
/// its own segment.
pub fn paginate<T>(blocks: Vec<Measured<T>>, threshold: f32) -> Vec<Segment<T>> {
    let mut segments = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut height = 0.0f32;

    for block in blocks {
        if height + block.height > threshold && !current.is_empty() {
            segments.push(Segment {
                items: std::mem::take(&mut current),
                height,
            });
            height = 0.0;
        }
        current.push(block.item);
        height += block.height;
    }
    if !current.is_empty() {
        segments.push(Segment {
            items: current,
            height,
        });
    }
    segments
}
