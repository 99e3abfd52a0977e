/// Item heights for the merged sequence.
///
/// Unmeasured rows use the estimated height until the surface reports a
/// measurement. `offsets[i]` is the top of row `i`; `offsets[len]` is the
/// total content height.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeights {
    estimated: f32,
    measured: Vec<Option<f32>>,
    offsets: Vec<f32>,
}

impl ItemHeights {
    pub fn new(estimated: f32) -> Self {
        Self {
            estimated: sanitize_height(estimated, 1.0),
            measured: Vec::new(),
            offsets: vec![0.0],
        }
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    /// Grows or truncates the model; existing measurements below `len` survive.
    pub fn resize(&mut self, len: usize) {
        let previous = self.measured.len();
        if len == previous {
            return;
        }

        self.measured.resize(len, None);
        self.offsets.truncate(previous.min(len) + 1);
        self.rebuild_offsets_from(previous.min(len));
    }

    /// Records a measured height; returns true when the layout changed.
    pub fn record(&mut self, index: usize, height: f32) -> bool {
        let Some(slot) = self.measured.get_mut(index) else {
            return false;
        };

        let height = sanitize_height(height, 0.0);
        if slot.is_some_and(|current| (current - height).abs() < f32::EPSILON) {
            return false;
        }

        *slot = Some(height);
        self.rebuild_offsets_from(index);
        true
    }

    pub fn height_of(&self, index: usize) -> f32 {
        self.measured
            .get(index)
            .map(|slot| slot.unwrap_or(self.estimated))
            .unwrap_or(0.0)
    }

    /// Top offset of `index`, clamped to the total height.
    pub fn offset_of(&self, index: usize) -> f32 {
        self.offsets[index.min(self.len())]
    }

    pub fn total_height(&self) -> f32 {
        self.offsets[self.len()]
    }

    /// Index of the row containing `offset`, clamped to the last row.
    ///
    /// Returns 0 for an empty model.
    pub fn index_at(&self, offset: f32) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }

        // Count rows whose bottom edge is at or above the offset.
        let above = self.offsets[1..].partition_point(|bottom| *bottom <= offset);
        above.min(len - 1)
    }

    fn rebuild_offsets_from(&mut self, index: usize) {
        self.offsets.truncate(index + 1);
        let mut cursor = self.offsets[index];
        for slot in &self.measured[index..] {
            cursor += slot.unwrap_or(self.estimated);
            self.offsets.push(cursor);
        }
    }
}

fn sanitize_height(height: f32, floor: f32) -> f32 {
    if height.is_finite() {
        height.max(floor)
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_until_measured() {
        let mut heights = ItemHeights::new(10.0);
        heights.resize(4);

        assert_eq!(heights.total_height(), 40.0);
        assert!(heights.record(1, 25.0));
        assert!(!heights.record(1, 25.0));
        assert!(!heights.record(9, 25.0));

        assert_eq!(heights.offset_of(2), 35.0);
        assert_eq!(heights.total_height(), 55.0);
        assert_eq!(heights.height_of(1), 25.0);
        assert_eq!(heights.height_of(3), 10.0);
    }

    #[test]
    fn maps_offsets_to_rows() {
        let mut heights = ItemHeights::new(10.0);
        heights.resize(3);

        assert_eq!(heights.index_at(0.0), 0);
        assert_eq!(heights.index_at(9.9), 0);
        assert_eq!(heights.index_at(10.0), 1);
        assert_eq!(heights.index_at(29.0), 2);
        assert_eq!(heights.index_at(500.0), 2);
        assert_eq!(ItemHeights::new(10.0).index_at(5.0), 0);
    }

    #[test]
    fn truncation_keeps_leading_measurements() {
        let mut heights = ItemHeights::new(10.0);
        heights.resize(5);
        let _ = heights.record(0, 30.0);
        let _ = heights.record(4, 30.0);

        heights.resize(2);
        assert_eq!(heights.total_height(), 40.0);

        heights.resize(3);
        assert_eq!(heights.total_height(), 50.0);
        assert_eq!(heights.offset_of(99), 50.0);
    }

    #[test]
    fn rejects_non_finite_measurements() {
        let mut heights = ItemHeights::new(f32::NAN);
        heights.resize(1);
        let _ = heights.record(0, f32::INFINITY);

        assert_eq!(heights.total_height(), 0.0);
        assert_eq!(ItemHeights::new(f32::NAN).estimated, 1.0);
    }
}
