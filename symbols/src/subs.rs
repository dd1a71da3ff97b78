//! Types dealing with the substitution tables of the demangler and
//! remangler.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::node::{Kind, Node};

/// Upper bound of the words an identifier substitution can refer to, one per
/// letter.
pub const MAX_NUM_WORDS: usize = 26;

/// Upper bound of a repeated substitution, e.g. `S2i`.
pub const MAX_REPEAT_COUNT: u64 = 2048;

/// Whether a word of an identifier can start at `c`.
#[inline]
pub fn is_word_start(c: u8) -> bool {
    !c.is_ascii_digit() && c != b'_' && c != 0
}

/// Whether `c`, following `prev`, is the first character after a word.
#[inline]
pub fn is_word_end(c: u8, prev: u8) -> bool {
    c == b'_' || c == 0 || (!prev.is_ascii_uppercase() && c.is_ascii_uppercase())
}

/// Standard library entities with a fixed single letter substitution, `S`
/// followed by the letter.
static STANDARD_TYPES: [(u8, Kind, &str); 49] = [
    (b'A', Kind::Structure, "AutoreleasingUnsafeMutablePointer"),
    (b'a', Kind::Structure, "Array"),
    (b'b', Kind::Structure, "Bool"),
    (b'c', Kind::Structure, "UnicodeScalar"),
    (b'D', Kind::Structure, "Dictionary"),
    (b'd', Kind::Structure, "Double"),
    (b'f', Kind::Structure, "Float"),
    (b'h', Kind::Structure, "Set"),
    (b'I', Kind::Structure, "DefaultIndices"),
    (b'i', Kind::Structure, "Int"),
    (b'J', Kind::Structure, "Character"),
    (b'N', Kind::Structure, "ClosedRange"),
    (b'n', Kind::Structure, "Range"),
    (b'O', Kind::Structure, "ObjectIdentifier"),
    (b'P', Kind::Structure, "UnsafePointer"),
    (b'p', Kind::Structure, "UnsafeMutablePointer"),
    (b'R', Kind::Structure, "UnsafeBufferPointer"),
    (b'r', Kind::Structure, "UnsafeMutableBufferPointer"),
    (b'S', Kind::Structure, "String"),
    (b's', Kind::Structure, "Substring"),
    (b'u', Kind::Structure, "UInt"),
    (b'V', Kind::Structure, "UnsafeRawPointer"),
    (b'v', Kind::Structure, "UnsafeMutableRawPointer"),
    (b'W', Kind::Structure, "UnsafeRawBufferPointer"),
    (b'w', Kind::Structure, "UnsafeMutableRawBufferPointer"),
    (b'q', Kind::Enum, "Optional"),
    (b'B', Kind::Protocol, "BinaryFloatingPoint"),
    (b'E', Kind::Protocol, "Encodable"),
    (b'e', Kind::Protocol, "Decodable"),
    (b'F', Kind::Protocol, "FloatingPoint"),
    (b'G', Kind::Protocol, "RandomNumberGenerator"),
    (b'H', Kind::Protocol, "Hashable"),
    (b'j', Kind::Protocol, "Numeric"),
    (b'K', Kind::Protocol, "BidirectionalCollection"),
    (b'k', Kind::Protocol, "RandomAccessCollection"),
    (b'L', Kind::Protocol, "Comparable"),
    (b'l', Kind::Protocol, "Collection"),
    (b'M', Kind::Protocol, "MutableCollection"),
    (b'm', Kind::Protocol, "RangeReplaceableCollection"),
    (b'Q', Kind::Protocol, "Equatable"),
    (b'T', Kind::Protocol, "Sequence"),
    (b't', Kind::Protocol, "IteratorProtocol"),
    (b'U', Kind::Protocol, "UnsignedInteger"),
    (b'X', Kind::Protocol, "RangeExpression"),
    (b'x', Kind::Protocol, "Strideable"),
    (b'Y', Kind::Protocol, "RawRepresentable"),
    (b'y', Kind::Protocol, "StringProtocol"),
    (b'Z', Kind::Protocol, "SignedInteger"),
    (b'z', Kind::Protocol, "BinaryInteger"),
];

/// Kind and name of the standard library entity a substitution letter
/// stands for.
pub fn standard_type(letter: u8) -> Result<(Kind, &'static str)> {
    STANDARD_TYPES
        .iter()
        .find(|(c, _, _)| *c == letter)
        .map(|&(_, kind, name)| (kind, name))
        .ok_or(Error::UnknownShorthand)
}

/// Substitution letter of a standard library entity, if it has one.
pub fn standard_letter(name: &str) -> Option<u8> {
    STANDARD_TYPES
        .iter()
        .find(|(_, _, n)| *n == name)
        .map(|&(c, _, _)| c)
}

/// The table of nodes a demangled symbol can refer back to.
///
/// Entries are appended in the order the grammar marks them substitutable
/// and are never removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubstitutionTable {
    nodes: Vec<Node>,
}

impl SubstitutionTable {
    #[inline]
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(16),
        }
    }

    /// Record a substitutable node, returning its slot.
    #[inline]
    pub fn insert(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Resolve a back reference.
    #[inline]
    pub fn get(&self, idx: usize) -> Result<&Node> {
        self.nodes.get(idx).ok_or(Error::UnknownBackReference)
    }
}

/// Translate an operator character into its mangled form.
pub fn translate_operator_char(c: char) -> char {
    match c {
        '&' => 'a',
        '@' => 'c',
        '/' => 'd',
        '=' => 'e',
        '>' => 'g',
        '<' => 'l',
        '*' => 'm',
        '!' => 'n',
        '|' => 'o',
        '+' => 'p',
        '?' => 'q',
        '%' => 'r',
        '-' => 's',
        '~' => 't',
        '^' => 'x',
        '.' => 'z',
        _ => c,
    }
}

/// A node the remangler has already emitted, keyed structurally.
///
/// When `treat_as_identifier` is set, only the text matters: an operator
/// compares equal to an identifier spelling its mangled form.
#[derive(Debug, Clone)]
pub struct SubstitutionEntry {
    node: Node,
    hash: u64,
    treat_as_identifier: bool,
}

impl SubstitutionEntry {
    pub fn new(node: &Node, treat_as_identifier: bool) -> Self {
        let mut hash = 0;
        deep_hash(&mut hash, node, treat_as_identifier);

        Self {
            node: node.clone(),
            hash,
            treat_as_identifier,
        }
    }

    fn identifier_chars(node: &Node) -> impl Iterator<Item = char> + '_ {
        let is_operator = matches!(
            node.kind(),
            Kind::InfixOperator | Kind::PrefixOperator | Kind::PostfixOperator
        );

        node.text().unwrap_or("").chars().map(move |c| {
            if is_operator {
                translate_operator_char(c)
            } else {
                c
            }
        })
    }
}

fn combine(hash: &mut u64, value: u64) {
    *hash = hash.wrapping_mul(33).wrapping_add(value);
}

fn deep_hash(hash: &mut u64, node: &Node, treat_as_identifier: bool) {
    if treat_as_identifier {
        combine(hash, Kind::Identifier as u64);
        for c in SubstitutionEntry::identifier_chars(node) {
            combine(hash, c as u64);
        }
        return;
    }

    combine(hash, node.kind() as u64);
    if let Some(index) = node.index() {
        combine(hash, index);
    } else if let Some(text) = node.text() {
        for c in text.chars() {
            combine(hash, c as u64);
        }
    }

    for child in node.children() {
        deep_hash(hash, child, false);
    }
}

impl PartialEq for SubstitutionEntry {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash || self.treat_as_identifier != other.treat_as_identifier {
            return false;
        }

        if self.treat_as_identifier {
            if self.node.kind() == other.node.kind() {
                return self.node.text() == other.node.text();
            }

            return Self::identifier_chars(&self.node).eq(Self::identifier_chars(&other.node));
        }

        self.node == other.node
    }
}

impl Eq for SubstitutionEntry {}

impl Hash for SubstitutionEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// The remangler's side of the substitution table.
#[derive(Debug, Default)]
pub struct EntryTable {
    slots: FxHashMap<SubstitutionEntry, usize>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn find(&self, entry: &SubstitutionEntry) -> Option<usize> {
        self.slots.get(entry).copied()
    }

    /// Record an entry that hasn't been seen yet.
    pub fn insert(&mut self, entry: SubstitutionEntry) {
        let idx = self.slots.len();
        self.slots.entry(entry).or_insert(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_types() {
        assert_eq!(standard_type(b'i'), Ok((Kind::Structure, "Int")));
        assert_eq!(standard_type(b'q'), Ok((Kind::Enum, "Optional")));
        assert_eq!(standard_type(b'H'), Ok((Kind::Protocol, "Hashable")));
        assert_eq!(standard_type(b'o'), Err(Error::UnknownShorthand));
        assert_eq!(standard_letter("Dictionary"), Some(b'D'));
        assert_eq!(standard_letter("Dictionary2"), None);
    }

    #[test]
    fn word_boundaries() {
        assert!(is_word_start(b'a'));
        assert!(!is_word_start(b'7'));
        assert!(!is_word_start(b'_'));
        assert!(is_word_end(b'B', b'a'));
        assert!(!is_word_end(b'B', b'A'));
        assert!(is_word_end(b'_', b'A'));
        assert!(is_word_end(0, b'x'));
    }

    #[test]
    fn back_references() {
        let mut table = SubstitutionTable::new();
        assert_eq!(table.insert(Node::with_text(Kind::Module, "M")), 0);
        assert_eq!(table.get(0), Ok(&Node::with_text(Kind::Module, "M")));
        assert_eq!(table.get(1), Err(Error::UnknownBackReference));
    }

    #[test]
    fn structural_entries() {
        let a = Node::new(Kind::Type).child_of(Node::with_text(Kind::Module, "M"));
        let b = a.clone();

        let mut table = EntryTable::new();
        table.insert(SubstitutionEntry::new(&a, false));
        assert_eq!(table.find(&SubstitutionEntry::new(&b, false)), Some(0));
        assert_eq!(table.find(&SubstitutionEntry::new(&b, true)), None);
    }

    #[test]
    fn operators_match_identifiers() {
        let op = Node::with_text(Kind::InfixOperator, "+");
        let ident = Node::with_text(Kind::Identifier, "p");

        assert_eq!(
            SubstitutionEntry::new(&op, true),
            SubstitutionEntry::new(&ident, true)
        );
        assert_ne!(
            SubstitutionEntry::new(&op, false),
            SubstitutionEntry::new(&ident, false)
        );
    }
}
