use serde::{Deserialize, Serialize};

/// One reconstruction unit: a reference image and the source images it is
/// matched against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub ref_image_id: usize,
    pub src_image_ids: Vec<usize>,
    /// Longest image side at the finest working level.
    #[serde(default = "default_image_size")]
    pub cur_image_size: usize,
}

fn default_image_size() -> usize {
    3200
}

impl Problem {
    pub fn new(ref_image_id: usize, src_image_ids: Vec<usize>) -> Self {
        Self {
            ref_image_id,
            src_image_ids,
            cur_image_size: default_image_size(),
        }
    }

    /// All image ids, reference first.
    pub fn image_ids(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.ref_image_id).chain(self.src_image_ids.iter().copied())
    }

    pub fn num_images(&self) -> usize {
        1 + self.src_image_ids.len()
    }

    /// Keep only the first `max` source ids; returns how many were dropped.
    pub fn truncate_sources(&mut self, max: usize) -> usize {
        let dropped = self.src_image_ids.len().saturating_sub(max);
        self.src_image_ids.truncate(max);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_the_leading_sources() {
        let mut problem = Problem::new(7, (0..40).collect());
        assert_eq!(problem.truncate_sources(31), 9);
        assert_eq!(problem.num_images(), 32);
        assert_eq!(problem.src_image_ids.last(), Some(&30));
        assert_eq!(problem.truncate_sources(31), 0);
        assert_eq!(problem.image_ids().next(), Some(7));
    }
}
