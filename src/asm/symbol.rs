use fxhash::FxBuildHasher;
use indexmap::IndexMap;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Label definition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Symbol {
    pub address: u16,
    /// 1-based source line of the definition.
    pub line: usize,
}

/// Label to address map, in definition order.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    map: FxMap<String, Symbol>,
}

impl SymbolTable {
    /// Add a label, or return the line of its earlier definition.
    pub fn define(&mut self, label: &str, address: u16, line: usize) -> Result<(), usize> {
        if let Some(existing) = self.map.get(label) {
            return Err(existing.line);
        }
        self.map.insert(label.to_string(), Symbol { address, line });
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<u16> {
        self.map.get(label).map(|symbol| symbol.address)
    }

    /// First label defined at `address`.
    pub fn label_at(&self, address: u16) -> Option<&str> {
        self.map
            .iter()
            .find(|(_, symbol)| symbol.address == address)
            .map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Symbol)> {
        self.map.iter().map(|(label, symbol)| (label.as_str(), *symbol))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
