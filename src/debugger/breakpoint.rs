/// Set of breakpoint addresses, kept sorted.
#[derive(Clone, Debug, Default)]
pub struct Breakpoints(Vec<u16>);

impl Breakpoints {
    pub fn contains(&self, address: u16) -> bool {
        self.0.binary_search(&address).is_ok()
    }

    /// Returns whether the address was newly added.
    pub fn insert(&mut self, address: u16) -> bool {
        match self.0.binary_search(&address) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, address);
                true
            }
        }
    }

    /// Returns whether a breakpoint was found with given address.
    pub fn remove(&mut self, address: u16) -> bool {
        match self.0.binary_search(&address) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u16>> for Breakpoints {
    fn from(mut vec: Vec<u16>) -> Self {
        vec.sort_unstable();
        vec.dedup();
        Self(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_and_idempotent() {
        let mut breakpoints = Breakpoints::from(vec![0x3005, 0x3001, 0x3005]);
        assert_eq!(breakpoints.len(), 2);
        assert!(breakpoints.insert(0x3003));
        assert!(!breakpoints.insert(0x3003));
        assert_eq!(breakpoints.iter().collect::<Vec<_>>(), [0x3001, 0x3003, 0x3005]);
        assert!(breakpoints.remove(0x3001));
        assert!(!breakpoints.remove(0x3001));
        assert!(!breakpoints.contains(0x3001));
        assert!(breakpoints.contains(0x3005));
        breakpoints.clear();
        assert!(breakpoints.is_empty());
    }
}
