use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::DataError;
use crate::math::matrix::Matrix;

/// A finite set of training images that can be read at any resolution on
/// the level pyramid.
///
/// Images are rows of `channels × res × res` values in `[-1, 1]`, channel
/// planes first.
pub trait ImageSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn channels(&self) -> usize;

    /// Native resolution; every lower level is reached by 2× pooling.
    fn max_resolution(&self) -> usize;

    /// Rows `indices` of the dataset at `resolution`.
    fn load(&self, indices: &[usize], resolution: usize) -> Result<Matrix, DataError>;

    fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size.max(1))
    }
}

/// One shuffled pass over an [`ImageSource`]. The final batch may be short.
///
/// The order is drawn up front, so iterating does not hold the caller's rng.
pub struct Batches<'a, S: ImageSource + ?Sized> {
    source: &'a S,
    order: Vec<usize>,
    resolution: usize,
    batch_size: usize,
    cursor: usize,
}

impl<'a, S: ImageSource + ?Sized> Batches<'a, S> {
    pub fn shuffled<R: Rng + ?Sized>(source: &'a S, resolution: usize, batch_size: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..source.len()).collect();
        order.shuffle(rng);
        Batches { source, order, resolution, batch_size: batch_size.max(1), cursor: 0 }
    }

    /// Dataset order; used for reference statistics.
    pub fn sequential(source: &'a S, resolution: usize, batch_size: usize) -> Self {
        Batches {
            source,
            order: (0..source.len()).collect(),
            resolution,
            batch_size: batch_size.max(1),
            cursor: 0,
        }
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}

impl<'a, S: ImageSource + ?Sized> Iterator for Batches<'a, S> {
    type Item = Result<Matrix, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.source.load(&self.order[self.cursor..end], self.resolution);
        self.cursor = end;
        Some(batch)
    }
}
