//! Demangler, printer and remangler for Swift symbols.
//!
//! ```text
//! $s4test3StrCACycfC  ->  test.Str.__allocating_init() -> test.Str
//! ```
//!
//! A mangled name is decoded into a [`Node`] tree, which can be printed in a
//! human readable form or encoded back into its mangled form.

mod classify;
mod demangle;
mod error;
mod node;
mod print;
mod punycode;
mod remangle;
mod scanner;
mod subs;

pub use classify::{
    has_swift_calling_convention, is_mangled_name, is_objc_symbol, is_thunk_symbol, module_name,
    thunk_target,
};
pub use demangle::{
    Demangler, MANGLING_MODULE_CLANG_IMPORTER, MANGLING_MODULE_OBJC, MANGLING_PREFIXES,
    MAX_NODE_DEPTH, MAX_NODE_WEIGHT,
};
pub use error::{Error, Result};
pub use node::{Directness, Kind, Node, Payload, ValueWitnessKind};
pub use print::{generic_param_name, DemangleOptions, Printer};
pub use remangle::Remangler;

/// Module of the standard library.
pub const STDLIB_NAME: &str = "Swift";

/// Decode a mangled symbol, including its mangling prefix.
pub fn demangle(symbol: &str) -> Result<Node> {
    demangle_bytes(symbol.as_bytes())
}

/// Like [`demangle`], for symbols that aren't valid UTF-8 because they embed
/// symbolic references.
pub fn demangle_bytes(symbol: &[u8]) -> Result<Node> {
    Demangler::new(symbol).demangle_symbol()
}

/// Decode a bare type mangling such as `SaySiG`.
pub fn demangle_type(mangled: &str) -> Result<Node> {
    Demangler::new(mangled.as_bytes()).demangle_type()
}

/// Encode a tree back into a mangled symbol.
pub fn mangle(node: &Node) -> Result<String> {
    // symbolic references leave raw bytes in the mangling
    String::from_utf8(mangle_bytes(node)?).map_err(|_| Error::UnsupportedConstruct)
}

pub fn mangle_bytes(node: &Node) -> Result<Vec<u8>> {
    Remangler::new().finish(node)
}

/// Print a tree with [`DemangleOptions::default`].
pub fn print(node: &Node) -> Result<String> {
    print::print(node)
}

pub fn print_with(node: &Node, options: DemangleOptions) -> Result<String> {
    print::print_with(node, options)
}

/// Encode an identifier with the Punycode variant used by the mangling.
///
/// With `map_non_symbol_chars` set, ASCII characters that can't be part of an
/// identifier are moved out of the ASCII range first. `None` if the
/// identifier can't be encoded.
pub fn encode_identifier(ident: &str, map_non_symbol_chars: bool) -> Option<String> {
    punycode::encode(ident, map_non_symbol_chars)
}

pub fn decode_identifier(encoded: &str) -> Option<String> {
    punycode::decode(encoded)
}
