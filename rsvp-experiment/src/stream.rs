use crate::error::TrialError;
use rand::Rng;
use rand::seq::index;
use rsvp_core::ImageRef;

/// The images of one trial in presentation order, one of them the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    images: Vec<ImageRef>,
    target_index: usize,
}

impl Stream {
    /// Draw `length` distinct pool entries in uniformly random order and
    /// pick the target position uniformly, independent of the draw.
    pub fn generate<R: Rng + ?Sized>(
        pool: &[ImageRef],
        length: usize,
        rng: &mut R,
    ) -> Result<Self, TrialError> {
        if pool.is_empty() {
            return Err(TrialError::missing("images_pool"));
        }
        if length == 0 || length > pool.len() {
            return Err(TrialError::InvalidParameters(format!(
                "stream_length {length} must be between 1 and the pool size {}",
                pool.len()
            )));
        }

        let images = index::sample(rng, pool.len(), length)
            .into_iter()
            .map(|i| pool[i].clone())
            .collect();
        let target_index = rng.random_range(0..length);
        Ok(Self {
            images,
            target_index,
        })
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn get(&self, index: usize) -> Option<&ImageRef> {
        self.images.get(index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn target(&self) -> &ImageRef {
        &self.images[self.target_index]
    }

    /// JSON array of the references, as stored in the result record.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.images).unwrap_or_else(|_| String::from("[]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn pool(n: usize) -> Vec<ImageRef> {
        (0..n).map(|i| ImageRef::new(format!("img{i}.png"))).collect()
    }

    #[test]
    fn streams_are_distinct_draws_from_pool() {
        let pool = pool(10);
        let mut rng = StdRng::seed_from_u64(7);
        for length in 1..=10 {
            for _ in 0..20 {
                let s = Stream::generate(&pool, length, &mut rng).unwrap();
                assert_eq!(s.len(), length);
                let unique: HashSet<_> = s.images().iter().collect();
                assert_eq!(unique.len(), length);
                assert!(s.images().iter().all(|i| pool.contains(i)));
                assert!(s.target_index() < length);
                assert_eq!(s.target(), &s.images()[s.target_index()]);
            }
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let pool = pool(26);
        let a = Stream::generate(&pool, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = Stream::generate(&pool, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_position_and_image_gets_drawn() {
        let pool = pool(5);
        let mut rng = StdRng::seed_from_u64(3);
        let mut targets = HashSet::new();
        let mut firsts = HashSet::new();
        for _ in 0..500 {
            let s = Stream::generate(&pool, 3, &mut rng).unwrap();
            targets.insert(s.target_index());
            firsts.insert(s.images()[0].clone());
        }
        assert_eq!(targets.len(), 3);
        assert_eq!(firsts.len(), 5);
    }

    #[test]
    fn rejects_lengths_outside_pool() {
        let pool = pool(10);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            Stream::generate(&pool, 11, &mut rng),
            Err(TrialError::InvalidParameters(_))
        ));
        assert!(Stream::generate(&pool, 0, &mut rng).is_err());
        assert!(Stream::generate(&[], 1, &mut rng).is_err());
    }

    #[test]
    fn serializes_as_json_array() {
        let pool = vec![ImageRef::from("a.png")];
        let s = Stream::generate(&pool, 1, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(s.to_json(), "[\"a.png\"]");
    }
}
