use smallvec::SmallVec;

/// Meniscus positions along one throat, ascending, in `[0, 1]` from the lower
/// indexed pore.
pub type Menisci = SmallVec<[f64; 2]>;

/// Per-throat ordered meniscus lists.
///
/// Every meniscus of a throat moves by the same displacement, so the ordering
/// is preserved by [`MeniscusStore::shift`]; new menisci only ever enter at an
/// end of the throat.
#[derive(Debug, Clone, Default)]
pub struct MeniscusStore {
    throats: Vec<Menisci>,
}

impl MeniscusStore {
    pub fn new(num_throats: usize) -> Self {
        Self {
            throats: vec![Menisci::new(); num_throats],
        }
    }

    pub fn get(&self, throat: usize) -> &[f64] {
        &self.throats[throat]
    }

    pub fn count(&self, throat: usize) -> usize {
        self.throats[throat].len()
    }

    pub fn is_empty(&self, throat: usize) -> bool {
        self.throats[throat].is_empty()
    }

    /// Meniscus closest to the lower indexed pore.
    pub fn first(&self, throat: usize) -> Option<f64> {
        self.throats[throat].first().copied()
    }

    /// Meniscus closest to the higher indexed pore.
    pub fn last(&self, throat: usize) -> Option<f64> {
        self.throats[throat].last().copied()
    }

    /// Moves every meniscus of `throat` by `dx`.
    pub fn shift(&mut self, throat: usize, dx: f64) {
        for m in &mut self.throats[throat] {
            *m += dx;
        }
    }

    /// New meniscus at the lower indexed end (position 0).
    pub fn push_near(&mut self, throat: usize) {
        self.throats[throat].insert(0, 0.0);
    }

    /// New meniscus at the higher indexed end (position 1).
    pub fn push_far(&mut self, throat: usize) {
        self.throats[throat].push(1.0);
    }

    pub fn pop_near(&mut self, throat: usize) -> Option<f64> {
        if self.throats[throat].is_empty() {
            None
        } else {
            Some(self.throats[throat].remove(0))
        }
    }

    pub fn pop_far(&mut self, throat: usize) -> Option<f64> {
        self.throats[throat].pop()
    }

    /// Replaces all menisci of `throat` with a single one at `position`.
    pub fn collapse_to(&mut self, throat: usize, position: f64) {
        let list = &mut self.throats[throat];
        list.clear();
        list.push(position);
    }

    pub fn clear(&mut self, throat: usize) {
        self.throats[throat].clear();
    }

    /// True if the positions of `throat` are ascending.
    pub fn is_sorted(&self, throat: usize) -> bool {
        self.throats[throat].windows(2).all(|w| w[0] <= w[1])
    }

    /// Number of menisci per throat.
    pub fn counts(&self) -> Vec<usize> {
        self.throats.iter().map(|m| m.len()).collect()
    }

    /// Owned copy of every throat's positions.
    pub fn to_vecs(&self) -> Vec<Vec<f64>> {
        self.throats.iter().map(|m| m.to_vec()).collect()
    }
}
