//! Cheap questions about a mangled symbol that don't need a printed name.

use crate::demangle::MANGLING_PREFIXES;
use crate::node::{Kind, Node};

/// Length of the mangling prefix of `symbol`, zero if it isn't a Swift
/// symbol.
fn prefix_len(symbol: &str) -> usize {
    MANGLING_PREFIXES
        .iter()
        .find(|prefix| symbol.starts_with(*prefix))
        .map_or(0, |prefix| prefix.len())
}

/// Whether `symbol` starts with one of the Swift mangling prefixes.
pub fn is_mangled_name(symbol: &str) -> bool {
    prefix_len(symbol) != 0
}

/// Whether `symbol` refers to an imported Objective-C class or protocol.
pub fn is_objc_symbol(symbol: &str) -> bool {
    let unprefixed = &symbol[prefix_len(symbol)..];
    unprefixed.starts_with("So") || unprefixed.starts_with("SC")
}

fn top_level(symbol: &str) -> Option<Node> {
    let global = crate::demangle(symbol).ok()?;
    if global.kind() != Kind::Global || global.children().is_empty() {
        return None;
    }

    global.into_children().into_iter().next()
}

/// Whether `symbol` is a compiler generated thunk.
pub fn is_thunk_symbol(symbol: &str) -> bool {
    if !is_mangled_name(symbol) {
        return false;
    }

    const THUNK_SUFFIXES: [&str; 8] = ["TA", "Ta", "To", "TO", "TR", "Tr", "TW", "fC"];
    if !THUNK_SUFFIXES.iter().any(|suffix| symbol.ends_with(suffix)) {
        return false;
    }

    // the suffix alone has too many false positives
    let node = match top_level(symbol) {
        Some(node) => node,
        None => return false,
    };

    matches!(
        node.kind(),
        Kind::ObjCAttribute
            | Kind::NonObjCAttribute
            | Kind::PartialApplyObjCForwarder
            | Kind::PartialApplyForwarder
            | Kind::ReabstractionThunkHelper
            | Kind::ReabstractionThunk
            | Kind::ProtocolWitness
            | Kind::Allocator
    )
}

/// The symbol a thunk forwards to, if it can be derived from the mangling.
///
/// An allocating constructor forwards to its initializing constructor.
pub fn thunk_target(symbol: &str) -> Option<String> {
    if !is_thunk_symbol(symbol) {
        return None;
    }

    if ["TR", "Tr", "TW"].iter().any(|suffix| symbol.ends_with(suffix)) {
        return None;
    }

    let stem = &symbol[..symbol.len() - 2];
    if symbol.ends_with("fC") {
        return Some(format!("{stem}fc"));
    }

    Some(stem.to_string())
}

/// Whether the entity `symbol` names is called with the Swift calling
/// convention, accessors and witnesses called from the runtime aren't.
pub fn has_swift_calling_convention(symbol: &str) -> bool {
    let node = match top_level(symbol) {
        Some(node) => node,
        None => return false,
    };

    !matches!(
        node.kind(),
        Kind::TypeMetadataAccessFunction
            | Kind::ValueWitness
            | Kind::ProtocolWitnessTableAccessor
            | Kind::GenericProtocolWitnessTableInstantiationFunction
            | Kind::LazyProtocolWitnessTableAccessor
            | Kind::AssociatedTypeMetadataAccessor
            | Kind::AssociatedTypeWitnessTableAccessor
            | Kind::BaseWitnessTableAccessor
            | Kind::ObjCAttribute
    )
}

/// Name of the module the entity `symbol` names is declared in.
pub fn module_name(symbol: &str) -> Option<String> {
    let mut node = crate::demangle(symbol).ok()?;
    loop {
        node = match node.kind() {
            Kind::Module => return node.text().map(str::to_string),
            Kind::TypeMangling | Kind::Type => node.into_children().into_iter().next()?,
            Kind::Global => node
                .into_children()
                .into_iter()
                .find(|child| !child.kind().is_function_attr())?,
            _ if node.is_specialized() => node.unspecialized().ok()?,
            kind if kind.is_context() => node.into_children().into_iter().next()?,
            _ => return None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        assert!(is_mangled_name("$s4main3fooyyF"));
        assert!(is_mangled_name("_$s4main3fooyyF"));
        assert!(is_mangled_name("_T04main3fooyyF"));
        assert!(!is_mangled_name("_ZN4main3fooEv"));
        assert!(!is_mangled_name("main"));
    }

    #[test]
    fn objc_symbols() {
        assert!(is_objc_symbol("$sSo8NSObjectC"));
        assert!(is_objc_symbol("So8NSObjectC"));
        assert!(!is_objc_symbol("$s4main1SV"));
    }

    #[test]
    fn allocating_constructors() {
        let symbol = "$s4test3StrCACycfC";
        assert!(is_thunk_symbol(symbol));
        assert_eq!(thunk_target(symbol).as_deref(), Some("$s4test3StrCACycfc"));
        assert!(has_swift_calling_convention(symbol));
    }

    #[test]
    fn witness_tables() {
        let symbol = "$sSiSHsWP";
        assert!(!is_thunk_symbol(symbol));
        assert_eq!(thunk_target(symbol), None);
        assert!(!has_swift_calling_convention("$sSiSHsWa"));
    }

    #[test]
    fn modules() {
        assert_eq!(
            module_name("$s1b1CC16funcWithCallback3fooyyyXE_tF").as_deref(),
            Some("b")
        );
        assert_eq!(module_name("$s4test3StrCACycfC").as_deref(), Some("test"));
        assert_eq!(module_name("garbage"), None);
    }
}
