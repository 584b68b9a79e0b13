use std::collections::HashMap;

use num_bigint::BigInt;

// ---- Labels ----

/// Opaque identity of a position in the instruction stream.
///
/// Labels are handles into a [`LabelArena`]; two labels are the same symbol
/// only if they came from the same `fresh` call (or are the same reserved label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    /// The word holding the initial scope pointer; the stack starts two words past it.
    pub const STACK_BEGIN: Label = Label(0);
    /// The bump-allocation cursor.
    pub const RAM_POINTER: Label = Label(1);
    /// Static record of the built-in scope.
    pub const BUILTIN_SCOPE: Label = Label(2);
    /// Static record of the global scope.
    pub const GLOBAL_SCOPE: Label = Label(3);
    /// Entry of the shared scope-allocation routine.
    pub const ALLOCATE_SCOPE: Label = Label(4);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

const RESERVED: [&str; 5] = [
    "stackBegin",
    "ramPointer",
    "builtinScope",
    "globalScope",
    "allocateScope",
];

/// Hands out labels and remembers a debug name for each.
#[derive(Debug, Clone)]
pub struct LabelArena {
    names: Vec<String>,
}

impl LabelArena {
    pub fn new() -> Self {
        LabelArena {
            names: RESERVED.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn fresh(&mut self, name: &str) -> Label {
        let label = Label(self.names.len() as u32);
        self.names.push(name.to_string());
        label
    }

    pub fn name(&self, label: Label) -> &str {
        self.names.get(label.index()).map(String::as_str).unwrap_or("?")
    }

    /// `name#index`, unique across the arena.
    pub fn describe(&self, label: Label) -> String {
        format!("{}#{}", self.name(label), label.index())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for LabelArena {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Instruction stream ----

/// The content of one memory word before linking.
///
/// `Sum` parts are plain words, so a folded dependent can never carry a
/// label of its own and is never independently addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    Num(BigInt),
    /// Address of whichever element carries the label.
    Addr(Label),
    /// Folded at link time once every part is resolved.
    Sum(Vec<Word>),
}

impl Word {
    pub fn sum(parts: Vec<Word>) -> Word {
        Word::Sum(parts)
    }
}

impl From<i32> for Word {
    fn from(n: i32) -> Self {
        Word::Num(BigInt::from(n))
    }
}

impl From<i64> for Word {
    fn from(n: i64) -> Self {
        Word::Num(BigInt::from(n))
    }
}

impl From<BigInt> for Word {
    fn from(n: BigInt) -> Self {
        Word::Num(n)
    }
}

impl From<Label> for Word {
    fn from(label: Label) -> Self {
        Word::Addr(label)
    }
}

/// A word together with the labels that name its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub word: Word,
    pub labels: Vec<Label>,
}

impl Cell {
    pub fn new(word: impl Into<Word>) -> Self {
        Cell { word: word.into(), labels: Vec::new() }
    }

    pub fn labeled(word: impl Into<Word>, label: Label) -> Self {
        Cell { word: word.into(), labels: vec![label] }
    }

    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// One element of an unlinked instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Cell(Cell),
    /// Attach this label to the next emitted cell.
    Hanging(Label),
}

impl Item {
    pub fn word(word: impl Into<Word>) -> Self {
        Item::Cell(Cell::new(word))
    }

    pub fn labeled(word: impl Into<Word>, label: Label) -> Self {
        Item::Cell(Cell::labeled(word, label))
    }
}

impl From<Cell> for Item {
    fn from(cell: Cell) -> Self {
        Item::Cell(cell)
    }
}

// ---- Linking ----

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("unresolved symbol: {name}")]
    UnresolvedSymbol { name: String },
    #[error("label {name} is placed on more than one word")]
    DuplicateLabel { name: String },
    #[error("label {name} hangs off the end of the program")]
    DanglingLabel { name: String },
}

/// A linked program: flat words plus the address of every placed label.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub words: Vec<BigInt>,
    positions: HashMap<Label, usize>,
}

impl Assembly {
    pub fn address(&self, label: Label) -> Option<usize> {
        self.positions.get(&label).copied()
    }

    /// Placed labels in address order.
    pub fn symbols(&self) -> Vec<(Label, usize)> {
        let mut symbols: Vec<(Label, usize)> = self.positions.iter().map(|(l, a)| (*l, *a)).collect();
        symbols.sort_by_key(|&(label, addr)| (addr, label));
        symbols
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Collapse hanging labels, place every label, then resolve every word.
pub fn assemble(items: Vec<Item>, labels: &LabelArena) -> Result<Assembly, AssembleError> {
    let mut cells: Vec<Cell> = Vec::with_capacity(items.len());
    let mut pending: Vec<Label> = Vec::new();
    for item in items {
        match item {
            Item::Hanging(label) => pending.push(label),
            Item::Cell(mut cell) => {
                cell.labels.append(&mut pending);
                cells.push(cell);
            }
        }
    }
    if let Some(label) = pending.first() {
        return Err(AssembleError::DanglingLabel { name: labels.describe(*label) });
    }

    let mut positions = HashMap::new();
    for (addr, cell) in cells.iter().enumerate() {
        for label in &cell.labels {
            if positions.insert(*label, addr).is_some() {
                return Err(AssembleError::DuplicateLabel { name: labels.describe(*label) });
            }
        }
    }
    log::trace!("placed {} labels over {} words", positions.len(), cells.len());

    let words = cells
        .iter()
        .map(|cell| resolve(&cell.word, &positions, labels))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Assembly { words, positions })
}

fn resolve(
    word: &Word,
    positions: &HashMap<Label, usize>,
    labels: &LabelArena,
) -> Result<BigInt, AssembleError> {
    match word {
        Word::Num(n) => Ok(n.clone()),
        Word::Addr(label) => positions
            .get(label)
            .map(|&addr| BigInt::from(addr))
            .ok_or_else(|| AssembleError::UnresolvedSymbol { name: labels.describe(*label) }),
        Word::Sum(parts) => parts.iter().map(|part| resolve(part, positions, labels)).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(words: &[BigInt]) -> Vec<i64> {
        words.iter().map(|w| i64::try_from(w).unwrap()).collect()
    }

    #[test]
    fn literals_pass_through() {
        let labels = LabelArena::new();
        let asm = assemble(vec![Item::word(1), Item::word(-7), Item::word(99)], &labels).unwrap();
        assert_eq!(nums(&asm.words), vec![1, -7, 99]);
    }

    #[test]
    fn forward_reference_resolves() {
        let mut labels = LabelArena::new();
        let target = labels.fresh("target");
        let items = vec![
            Item::word(target),
            Item::word(0),
            Item::labeled(42, target),
        ];
        let asm = assemble(items, &labels).unwrap();
        assert_eq!(nums(&asm.words), vec![2, 0, 42]);
        assert_eq!(asm.address(target), Some(2));
    }

    #[test]
    fn hanging_label_attaches_to_next_cell() {
        let mut labels = LabelArena::new();
        let here = labels.fresh("here");
        let items = vec![Item::word(7), Item::Hanging(here), Item::word(8), Item::word(here)];
        let asm = assemble(items, &labels).unwrap();
        assert_eq!(nums(&asm.words), vec![7, 8, 1]);
    }

    #[test]
    fn stacked_hanging_labels_alias_one_cell() {
        let mut labels = LabelArena::new();
        let a = labels.fresh("a");
        let b = labels.fresh("b");
        let items = vec![Item::Hanging(a), Item::Hanging(b), Item::word(5)];
        let asm = assemble(items, &labels).unwrap();
        assert_eq!(asm.address(a), Some(0));
        assert_eq!(asm.address(b), Some(0));
        assert_eq!(asm.len(), 1);
    }

    #[test]
    fn fold_sums_resolved_dependents() {
        let mut labels = LabelArena::new();
        let base = labels.fresh("base");
        let items = vec![
            Item::word(Word::sum(vec![Word::Addr(base), Word::from(3)])),
            Item::word(Word::sum(vec![Word::from(-1), Word::sum(vec![Word::Addr(base)])])),
            Item::labeled(0, base),
        ];
        let asm = assemble(items, &labels).unwrap();
        assert_eq!(nums(&asm.words), vec![5, 1, 0]);
    }

    #[test]
    fn unresolved_symbol_is_named() {
        let mut labels = LabelArena::new();
        let missing = labels.fresh("missing");
        let err = assemble(vec![Item::word(missing)], &labels).unwrap_err();
        assert!(matches!(err, AssembleError::UnresolvedSymbol { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn dangling_label_is_rejected() {
        let mut labels = LabelArena::new();
        let end = labels.fresh("end");
        let err = assemble(vec![Item::word(1), Item::Hanging(end)], &labels).unwrap_err();
        assert!(matches!(err, AssembleError::DanglingLabel { .. }));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut labels = LabelArena::new();
        let twice = labels.fresh("twice");
        let err = assemble(vec![Item::labeled(1, twice), Item::labeled(2, twice)], &labels).unwrap_err();
        assert!(matches!(err, AssembleError::DuplicateLabel { .. }));
    }

    #[test]
    fn every_symbol_lands_in_bounds() {
        let mut labels = LabelArena::new();
        let items: Vec<Item> = (0..10)
            .map(|i| {
                let l = labels.fresh("cell");
                Item::labeled(i, l)
            })
            .collect();
        let asm = assemble(items, &labels).unwrap();
        assert_eq!(asm.symbols().len(), 10);
        assert!(asm.symbols().iter().all(|&(_, addr)| addr < asm.len()));
    }

    #[test]
    fn reserved_labels_have_names() {
        let labels = LabelArena::new();
        assert_eq!(labels.name(Label::RAM_POINTER), "ramPointer");
        assert_eq!(labels.describe(Label::GLOBAL_SCOPE), "globalScope#3");
    }
}
