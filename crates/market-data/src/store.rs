use crate::error::MarketDataError;
use crate::types::DataPoint;
use crate::Result;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 50;

/// Fixed-capacity window of data points, oldest first.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    points: Vec<DataPoint>,
    capacity: usize,
}

impl SeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Build a store from an initial history; only the newest `capacity`
    /// points are kept.
    pub fn from_points(capacity: usize, points: Vec<DataPoint>) -> Result<Self> {
        if capacity == 0 {
            return Err(MarketDataError::InvalidCapacity(capacity));
        }
        check_ordering(&points)?;

        let skip = points.len().saturating_sub(capacity);
        Ok(Self {
            points: points.into_iter().skip(skip).collect(),
            capacity,
        })
    }

    pub fn append(&mut self, point: DataPoint) -> &[DataPoint] {
        if self.points.len() >= self.capacity {
            let evicted = self.points.remove(0);
            debug!(timestamp = evicted.timestamp, "Evicted oldest point");
        }
        self.points.push(point);
        &self.points
    }

    /// Swap in a rewritten history of the same length and ordering.
    pub fn replace_all(&mut self, points: Vec<DataPoint>) -> Result<&[DataPoint]> {
        if points.len() != self.points.len() {
            return Err(MarketDataError::LengthMismatch {
                expected: self.points.len(),
                actual: points.len(),
            });
        }
        check_ordering(&points)?;

        self.points = points;
        Ok(&self.points)
    }

    /// Drop the oldest point, if any.
    pub fn evict_oldest(&mut self) -> Option<DataPoint> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.remove(0))
    }

    pub fn latest(&self) -> Option<&DataPoint> {
        self.points.last()
    }

    /// Second-to-last point
    pub fn previous(&self) -> Option<&DataPoint> {
        self.points.len().checked_sub(2).map(|i| &self.points[i])
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn snapshot(&self) -> Vec<DataPoint> {
        self.points.clone()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn check_ordering(points: &[DataPoint]) -> Result<()> {
    match points
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        Some(i) => Err(MarketDataError::UnorderedTimestamps { index: i + 1 }),
        None => Ok(()),
    }
}
