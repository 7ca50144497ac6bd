use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::shape::Shape;

/// A bounded, concurrency-safe sample of recently completed job shapes.
///
/// Shared between the completion-report path (producer, called from
/// [`crate::scaler::handle::Scaler::add_completed_job`]) and the scaling tick
/// (consumer), so it is the one piece of scaler state that genuinely needs
/// mutual exclusion — see spec §5.
#[derive(Debug)]
pub struct RecentShapesWindow {
    capacity: usize,
    shapes: Mutex<VecDeque<Shape>>,
}

impl RecentShapesWindow {
    /// Default capacity when none is configured: the last 1000 completed
    /// shapes.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Seeds the window with 10 copies of a default shape sized to the
    /// smallest node type, so the packer has a prior before any real job has
    /// completed. The prior washes out once enough real completions arrive.
    pub fn seeded(capacity: usize, default_shape: Shape) -> Self {
        let mut shapes = VecDeque::with_capacity(capacity);
        for _ in 0..10 {
            shapes.push_back(default_shape);
        }
        RecentShapesWindow { capacity, shapes: Mutex::new(shapes) }
    }

    pub fn add(&self, shape: Shape) {
        let mut guard = self.shapes.lock().unwrap();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(shape);
    }

    pub fn snapshot(&self) -> Vec<Shape> {
        self.shapes.lock().unwrap().iter().copied().collect()
    }
}
