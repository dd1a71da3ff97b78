//! Decodes mangled Swift symbols into a [`Node`] tree.
//!
//! The mangling is postfix: every operator builds its node out of the nodes
//! that precede it, so productions pop their operands from a stack in
//! reverse order. Once the input is exhausted whatever is left on the stack
//! forms the children of the `Global` root.

mod pop;
mod tests;

use crate::error::{Error, Result};
use crate::node::{param_kind, Directness, Kind, Node, ParamFlags, ValueWitnessKind};
use crate::punycode;
use crate::scanner::Scanner;
use crate::subs::{self, SubstitutionTable, MAX_NUM_WORDS, MAX_REPEAT_COUNT};
use crate::STDLIB_NAME;

/// Prefixes of the supported mangling schemes, oldest first.
pub const MANGLING_PREFIXES: [&str; 5] = ["_T0", "$S", "_$S", "$s", "_$s"];

/// Module of imported Objective-C and C declarations.
pub const MANGLING_MODULE_OBJC: &str = "__C";

/// Module of declarations synthesized by the clang importer.
pub const MANGLING_MODULE_CLANG_IMPORTER: &str = "__C_Synthesized";

/// Deepest chain of generic contexts that bound generic arguments are
/// distributed over.
const MAX_DEPTH: u32 = 256;

/// Deepest tree the demangler builds. The printer and remangler recurse at
/// most twice per level and stop at 512, so every tree that demangles can
/// also be printed and mangled.
pub const MAX_NODE_DEPTH: u32 = 192;

/// Largest tree the demangler builds, counting a substituted subtree once
/// for every reference to it.
pub const MAX_NODE_WEIGHT: u32 = 1 << 17;

/// Builtin types can't be larger than this many bits or elements.
const MAX_BUILTIN_SIZE: u64 = 4096;

#[inline]
fn type_node(kind: Kind, children: Vec<Node>) -> Node {
    Node::with_child(Kind::Type, Node::with_children(kind, children))
}

fn stdlib_type(kind: Kind, name: &str) -> Node {
    type_node(
        kind,
        vec![
            Node::with_text(Kind::Module, STDLIB_NAME),
            Node::with_text(Kind::Identifier, name),
        ],
    )
}

#[inline]
fn builtin_type(name: impl Into<String>) -> Node {
    Node::with_child(Kind::Type, Node::with_text(Kind::BuiltinTypeName, name))
}

fn checked(node: Node) -> Result<Node> {
    if node.depth() > MAX_NODE_DEPTH || node.weight() > MAX_NODE_WEIGHT {
        return Err(Error::TooMuchRecursion);
    }

    Ok(node)
}

fn dependent_generic_param(depth: u64, index: u64) -> Node {
    Node::with_children(
        Kind::DependentGenericParamType,
        vec![
            Node::with_index(Kind::Index, depth),
            Node::with_index(Kind::Index, index),
        ],
    )
}

pub struct Demangler<'a> {
    scanner: Scanner<'a>,
    stack: Vec<Node>,
    substitutions: SubstitutionTable,
    words: Vec<String>,
    old_function_types: bool,
    depth: u32,
}

impl<'a> Demangler<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            scanner: Scanner::new(input),
            stack: Vec::with_capacity(16),
            substitutions: SubstitutionTable::new(),
            words: Vec::with_capacity(MAX_NUM_WORDS),
            old_function_types: false,
            depth: 0,
        }
    }

    /// Demangle a complete symbol, including its mangling prefix.
    pub fn demangle_symbol(mut self) -> Result<Node> {
        let input = self.scanner.remaining();

        // old-style class names and function manglings aren't supported
        if input.starts_with(b"_Tt") {
            return Err(Error::UnsupportedConstruct);
        }

        let prefix = match MANGLING_PREFIXES
            .iter()
            .find(|prefix| input.starts_with(prefix.as_bytes()))
        {
            Some(prefix) => prefix,
            None if input.starts_with(b"_T") => return Err(Error::UnsupportedConstruct),
            None => return Err(Error::Structural),
        };

        self.scanner.take(prefix.len())?;
        self.old_function_types = *prefix == "_T0";
        self.parse_and_push_nodes()?;

        // function attributes are on top of the stack, everything popped
        // after a partial apply forwarder becomes part of it
        let mut outer: Vec<Vec<Node>> = Vec::new();
        let mut current = Vec::new();
        while let Some(attr) = self.pop_if(Kind::is_function_attr) {
            let nests = matches!(
                attr.kind(),
                Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
            );

            current.push(attr);
            if nests {
                outer.push(std::mem::take(&mut current));
            }
        }

        for node in self.stack.drain(..) {
            if node.kind() == Kind::Type {
                let child = node.into_children().into_iter().next();
                current.push(child.ok_or(Error::Structural)?);
            } else {
                current.push(node);
            }
        }

        while let Some(mut level) = outer.pop() {
            let forwarder = level.last_mut().ok_or(Error::Structural)?;
            forwarder.extend(std::mem::take(&mut current));
            current = level;
        }

        if current.is_empty() {
            return Err(Error::Structural);
        }

        checked(Node::with_children(Kind::Global, current))
    }

    /// Demangle a bare type mangling, as found in reflection metadata.
    pub fn demangle_type(mut self) -> Result<Node> {
        let input = self.scanner.remaining();
        self.parse_and_push_nodes()?;

        match self.pop() {
            Some(node) => checked(node),
            None => Ok(Node::with_text(
                Kind::Suffix,
                String::from_utf8_lossy(input).into_owned(),
            )),
        }
    }

    fn parse_and_push_nodes(&mut self) -> Result<()> {
        while !self.scanner.is_empty() {
            let node = self.demangle_operator()?;
            self.push_node(node)?;
        }

        Ok(())
    }

    /// Push an operand, rejecting trees too large to be printed.
    #[inline]
    fn push_node(&mut self, node: Node) -> Result<()> {
        self.stack.push(checked(node)?);
        Ok(())
    }

    #[inline]
    fn add_substitution(&mut self, node: &Node) {
        self.substitutions.insert(node.clone());
    }

    fn demangle_operator(&mut self) -> Result<Node> {
        let mut c = self.scanner.consume()?;

        // alignment padding in front of symbolic references
        while c == 0xFF {
            c = self.scanner.consume()?;
        }

        match c {
            0x01..=0x1F => self.demangle_symbolic_reference(c),
            b'A' => self.demangle_multi_substitutions(),
            b'B' => self.demangle_builtin_type(),
            b'C' => self.demangle_any_generic_type(Kind::Class),
            b'D' => self.demangle_type_mangling(),
            b'E' => self.demangle_extension_context(),
            b'F' => self.demangle_plain_function(),
            b'G' => self.demangle_bound_generic_type(),
            b'H' => match self.scanner.consume()? {
                b'A' => self.demangle_dependent_conformance_associated(),
                b'C' => self.demangle_concrete_conformance(),
                b'D' => self.demangle_dependent_conformance_root(),
                b'I' => self.demangle_dependent_conformance_inherited(),
                b'P' => Ok(Node::with_child(
                    Kind::ProtocolConformanceRefInTypeModule,
                    self.pop_protocol()?,
                )),
                b'p' => Ok(Node::with_child(
                    Kind::ProtocolConformanceRefInProtocolModule,
                    self.pop_protocol()?,
                )),
                _ => {
                    self.scanner.backtrack_by(2)?;
                    self.demangle_identifier()
                }
            },
            b'I' => self.demangle_impl_function_type(),
            b'K' => Ok(Node::new(Kind::ThrowsAnnotation)),
            b'L' => self.demangle_local_identifier(),
            b'M' => self.demangle_metatype(),
            b'N' => Ok(Node::with_child(
                Kind::TypeMetadata,
                self.require_kind(Kind::Type)?,
            )),
            b'O' => self.demangle_any_generic_type(Kind::Enum),
            b'P' => self.demangle_any_generic_type(Kind::Protocol),
            b'Q' => self.demangle_archetype(),
            b'R' => self.demangle_generic_requirement(),
            b'S' => self.demangle_standard_substitution(),
            b'T' => self.demangle_thunk_or_specialization(),
            b'V' => self.demangle_any_generic_type(Kind::Structure),
            b'W' => self.demangle_witness(),
            b'X' => self.demangle_special_type(),
            b'Z' => Ok(Node::with_child(
                Kind::Static,
                self.require_if(Kind::is_entity)?,
            )),
            b'a' => self.demangle_any_generic_type(Kind::TypeAlias),
            b'c' => self.pop_function_type(Kind::FunctionType),
            b'd' => Ok(Node::new(Kind::VariadicMarker)),
            b'f' => self.demangle_function_entity(),
            b'g' => self.demangle_retroactive_conformance(),
            b'h' => Ok(type_node(Kind::Shared, vec![self.pop_type_and_get_child()?])),
            b'i' => self.demangle_subscript(),
            b'l' => self.demangle_generic_signature(false),
            b'm' => Ok(type_node(Kind::Metatype, vec![self.require_kind(Kind::Type)?])),
            b'n' => Ok(type_node(Kind::Owned, vec![self.pop_type_and_get_child()?])),
            b'o' => self.demangle_operator_identifier(),
            b'p' => self.demangle_protocol_list_type(),
            b'q' => Ok(Node::with_child(Kind::Type, self.demangle_generic_param_index()?)),
            b'r' => self.demangle_generic_signature(true),
            b's' => Ok(Node::with_text(Kind::Module, STDLIB_NAME)),
            b't' => self.pop_tuple(),
            b'u' => self.demangle_generic_type(),
            b'v' => self.demangle_variable(),
            b'w' => self.demangle_value_witness(),
            b'x' => Ok(Node::with_child(Kind::Type, dependent_generic_param(0, 0))),
            b'y' => Ok(Node::new(Kind::EmptyList)),
            b'z' => Ok(type_node(Kind::InOut, vec![self.pop_type_and_get_child()?])),
            b'_' => Ok(Node::new(Kind::FirstElementMarker)),
            b'.' => {
                // partial apply thunks and outlined copies are disambiguated
                // by an unmangled `.<n>` suffix
                self.scanner.backtrack()?;
                let suffix = self.scanner.take_remaining();
                Ok(Node::with_text(
                    Kind::Suffix,
                    String::from_utf8_lossy(suffix).into_owned(),
                ))
            }
            _ => {
                self.scanner.backtrack()?;
                self.demangle_identifier()
            }
        }
    }

    /// A control byte followed by a 32-bit offset into the binary image.
    ///
    /// The payload can't be resolved without the image, so the node keeps the
    /// control byte in the upper half of its index and the offset in the
    /// lower half.
    fn demangle_symbolic_reference(&mut self, raw_kind: u8) -> Result<Node> {
        let is_context = match raw_kind {
            1 | 2 => true,
            9 => false,
            _ => return Err(Error::UnsupportedConstruct),
        };

        let offset = self.scanner.read_u32_le()?;
        let payload = (u64::from(raw_kind) << 32) | u64::from(offset);

        if !is_context {
            return Ok(Node::with_index(Kind::AccessorFunctionReference, payload));
        }

        let reference = Node::with_child(
            Kind::Type,
            Node::with_index(Kind::TypeSymbolicReference, payload),
        );

        // types register as substitutions even when symbolically referenced
        self.add_substitution(&reference);
        Ok(reference)
    }

    fn demangle_type_mangling(&mut self) -> Result<Node> {
        let ty = self.require_kind(Kind::Type)?;
        let mut mangling = Node::new(Kind::TypeMangling);
        if let Some(labels) = self.pop_function_param_labels(&ty)? {
            mangling.push(labels);
        }

        mangling.push(ty);
        Ok(mangling)
    }

    /// A decimal run, `None` if there are no digits.
    fn demangle_natural(&mut self) -> Result<Option<u64>> {
        let mut num: Option<u64> = None;
        while let Some(c @ b'0'..=b'9') = self.scanner.peek() {
            let digit = u64::from(c - b'0');
            let value = num.unwrap_or(0);
            let value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or(Error::Overflow)?;

            num = Some(value);
            self.scanner.consume()?;
        }

        Ok(num)
    }

    /// A decimal run that must be there.
    fn expect_natural(&mut self) -> Result<u64> {
        match self.demangle_natural()? {
            Some(num) => Ok(num),
            None if self.scanner.is_empty() => Err(Error::TruncatedInput),
            None => Err(Error::Structural),
        }
    }

    /// `_` is zero, `<n>_` is `n + 1`.
    fn demangle_index(&mut self) -> Result<u64> {
        if self.scanner.next_if(b'_') {
            return Ok(0);
        }

        let num = self.expect_natural()?;
        if !self.scanner.next_if(b'_') {
            return Err(Error::Structural);
        }

        num.checked_add(1).ok_or(Error::Overflow)
    }

    #[inline]
    fn demangle_index_as_node(&mut self) -> Result<Node> {
        Ok(Node::with_index(Kind::Number, self.demangle_index()?))
    }

    fn demangle_multi_substitutions(&mut self) -> Result<Node> {
        let mut repeat_count = None;
        loop {
            let c = self.scanner.consume()?;
            match c {
                // more substitutions follow a lowercase letter
                b'a'..=b'z' => {
                    let node = self.push_multi_substitutions(repeat_count, c - b'a')?;
                    self.push_node(node)?;
                    repeat_count = None;
                }
                b'A'..=b'Z' => return self.push_multi_substitutions(repeat_count, c - b'A'),
                // the number was an index beyond the letters, not a count
                b'_' => {
                    let idx = match repeat_count {
                        Some(count) => count.checked_add(27).ok_or(Error::Overflow)?,
                        None => 26,
                    };

                    let idx = usize::try_from(idx).map_err(|_| Error::Overflow)?;
                    return self.substitutions.get(idx).cloned();
                }
                _ => {
                    self.scanner.backtrack()?;
                    repeat_count = Some(self.expect_natural()?);
                }
            }
        }
    }

    fn push_multi_substitutions(&mut self, repeat_count: Option<u64>, idx: u8) -> Result<Node> {
        let count = repeat_count.unwrap_or(1);
        if count > MAX_REPEAT_COUNT {
            return Err(Error::Structural);
        }

        let node = self.substitutions.get(usize::from(idx))?.clone();
        for _ in 1..count {
            self.push_node(node.clone())?;
        }

        Ok(node)
    }

    fn demangle_standard_substitution(&mut self) -> Result<Node> {
        match self.scanner.consume()? {
            b'o' => Ok(Node::with_text(Kind::Module, MANGLING_MODULE_OBJC)),
            b'C' => Ok(Node::with_text(Kind::Module, MANGLING_MODULE_CLANG_IMPORTER)),
            b'g' => {
                let wrapped = self.require_kind(Kind::Type)?;
                let optional = type_node(
                    Kind::BoundGenericEnum,
                    vec![
                        stdlib_type(Kind::Enum, "Optional"),
                        Node::with_child(Kind::TypeList, wrapped),
                    ],
                );

                self.add_substitution(&optional);
                Ok(optional)
            }
            _ => {
                self.scanner.backtrack()?;
                let count = self.demangle_natural()?.unwrap_or(1);
                if count > MAX_REPEAT_COUNT {
                    return Err(Error::Structural);
                }

                let (kind, name) = subs::standard_type(self.scanner.consume()?)?;
                let node = stdlib_type(kind, name);
                for _ in 1..count {
                    self.push_node(node.clone())?;
                }

                Ok(node)
            }
        }
    }

    fn demangle_identifier(&mut self) -> Result<Node> {
        match self.scanner.peek() {
            Some(b'0'..=b'9') => {}
            Some(_) => return Err(Error::Structural),
            None => return Err(Error::TruncatedInput),
        }

        let mut has_word_substs = false;
        let mut is_punycoded = false;
        if self.scanner.next_if(b'0') {
            if self.scanner.next_if(b'0') {
                is_punycoded = true;
            } else {
                has_word_substs = true;
            }
        }

        let mut identifier = String::new();
        loop {
            while has_word_substs && self.scanner.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
                let c = self.scanner.consume()?;

                // an uppercase letter is the last word substitution
                let idx = if c.is_ascii_lowercase() {
                    c - b'a'
                } else {
                    has_word_substs = false;
                    c - b'A'
                };

                let word = self
                    .words
                    .get(usize::from(idx))
                    .ok_or(Error::UnknownBackReference)?;

                identifier.push_str(word);
            }

            if self.scanner.next_if(b'0') {
                break;
            }

            let len = self.expect_natural()?;
            if len == 0 {
                return Err(Error::Structural);
            }

            if is_punycoded {
                self.scanner.next_if(b'_');
            }

            let len = usize::try_from(len).map_err(|_| Error::Overflow)?;
            let slice = self.scanner.take(len)?;
            let slice = std::str::from_utf8(slice).map_err(|_| {
                if is_punycoded {
                    Error::UnknownIdentifierEncoding
                } else {
                    Error::Structural
                }
            })?;

            if is_punycoded {
                let decoded = punycode::decode(slice).ok_or(Error::UnknownIdentifierEncoding)?;
                identifier.push_str(&decoded);
            } else {
                identifier.push_str(slice);
                self.record_words(slice);
            }

            if !has_word_substs {
                break;
            }
        }

        if identifier.is_empty() {
            return Err(Error::Structural);
        }

        let ident = Node::with_text(Kind::Identifier, identifier);
        self.add_substitution(&ident);
        Ok(ident)
    }

    /// Remember the words of an identifier so that later identifiers can
    /// refer to them.
    fn record_words(&mut self, slice: &str) {
        let bytes = slice.as_bytes();
        let mut word_start = None;

        for idx in 0..=bytes.len() {
            let c = bytes.get(idx).copied().unwrap_or(0);

            if let Some(start) = word_start {
                if subs::is_word_end(c, bytes[idx - 1]) {
                    if idx - start >= 2 && self.words.len() < MAX_NUM_WORDS {
                        if let Some(word) = slice.get(start..idx) {
                            self.words.push(word.to_owned());
                        }
                    }

                    word_start = None;
                }
            }

            if word_start.is_none() && subs::is_word_start(c) {
                word_start = Some(idx);
            }
        }
    }

    fn demangle_operator_identifier(&mut self) -> Result<Node> {
        const OPERATOR_CHARS: &[u8; 26] = b"& @/= >    <*!|+?%-~   ^ .";

        let ident = self.require_kind(Kind::Identifier)?;
        let mut operator = String::new();
        for c in ident.require_text()?.chars() {
            if !c.is_ascii() {
                operator.push(c);
                continue;
            }

            if !c.is_ascii_lowercase() {
                return Err(Error::Structural);
            }

            operator.push(OPERATOR_CHARS[c as usize - 'a' as usize] as char);
        }

        let kind = match self.scanner.consume()? {
            b'i' => Kind::InfixOperator,
            b'p' => Kind::PrefixOperator,
            b'P' => Kind::PostfixOperator,
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_text(kind, operator))
    }

    fn demangle_local_identifier(&mut self) -> Result<Node> {
        if self.scanner.next_if(b'L') {
            let discriminator = self.require_kind(Kind::Identifier)?;
            let name = self.require_if(Kind::is_decl_name)?;
            return Ok(Node::with_children(
                Kind::PrivateDeclName,
                vec![discriminator, name],
            ));
        }

        if self.scanner.next_if(b'l') {
            let discriminator = self.require_kind(Kind::Identifier)?;
            return Ok(Node::with_child(Kind::PrivateDeclName, discriminator));
        }

        if let Some(c @ (b'a'..=b'j' | b'A'..=b'J')) = self.scanner.peek() {
            self.scanner.consume()?;
            let kind = Node::with_text(Kind::Identifier, (c as char).to_string());
            let name = self.require()?;
            return Ok(Node::with_children(
                Kind::RelatedEntityDeclName,
                vec![kind, name],
            ));
        }

        let discriminator = self.demangle_index_as_node()?;
        let name = self.require_if(Kind::is_decl_name)?;
        Ok(Node::with_children(
            Kind::LocalDeclName,
            vec![discriminator, name],
        ))
    }

    /// Size of a sized builtin, e.g. the `64` of `Builtin.Int64`.
    fn demangle_builtin_size(&mut self) -> Result<u64> {
        let size = self.demangle_index()?.saturating_sub(1);
        if size == 0 || size >= MAX_BUILTIN_SIZE {
            return Err(Error::Structural);
        }

        Ok(size)
    }

    fn demangle_builtin_type(&mut self) -> Result<Node> {
        let name = match self.scanner.consume()? {
            b'b' => "Builtin.BridgeObject".to_owned(),
            b'B' => "Builtin.UnsafeValueBuffer".to_owned(),
            b'f' => format!("Builtin.FPIEEE{}", self.demangle_builtin_size()?),
            b'i' => format!("Builtin.Int{}", self.demangle_builtin_size()?),
            b'I' => "Builtin.IntLiteral".to_owned(),
            b'v' => {
                let elements = self.demangle_builtin_size()?;
                let element = self.pop_type_and_get_child()?;
                if element.kind() != Kind::BuiltinTypeName {
                    return Err(Error::Structural);
                }

                let element = element
                    .require_text()?
                    .strip_prefix("Builtin.")
                    .ok_or(Error::Structural)?;

                format!("Builtin.Vec{elements}x{element}")
            }
            b'O' => "Builtin.UnknownObject".to_owned(),
            b'o' => "Builtin.NativeObject".to_owned(),
            b'p' => "Builtin.RawPointer".to_owned(),
            b't' => "Builtin.SILToken".to_owned(),
            b'w' => "Builtin.Word".to_owned(),
            _ => return Err(Error::Structural),
        };

        Ok(builtin_type(name))
    }

    fn demangle_any_generic_type(&mut self, kind: Kind) -> Result<Node> {
        let name = self.require_if(Kind::is_decl_name)?;
        let context = self.pop_context()?;
        let ty = type_node(kind, vec![context, name]);
        self.add_substitution(&ty);
        Ok(ty)
    }

    fn demangle_extension_context(&mut self) -> Result<Node> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let module = self.pop_module()?.ok_or(Error::Structural)?;
        let extended = self.pop_type_and_get_any_generic()?;

        let mut extension = Node::with_children(Kind::Extension, vec![module, extended]);
        if let Some(signature) = signature {
            extension.push(signature);
        }

        Ok(extension)
    }

    fn demangle_plain_function(&mut self) -> Result<Node> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let mut ty = self.pop_function_type(Kind::FunctionType)?;
        let labels = self.pop_function_param_labels(&ty)?;

        if let Some(signature) = signature {
            ty = type_node(Kind::DependentGenericType, vec![signature, ty]);
        }

        let name = self.require_if(Kind::is_decl_name)?;
        let context = self.pop_context()?;

        let mut func = Node::with_children(Kind::Function, vec![context, name]);
        if let Some(labels) = labels {
            func.push(labels);
        }

        func.push(ty);
        Ok(func)
    }

    fn demangle_retroactive_conformance_ref(&mut self) -> Result<Node> {
        let module = self.pop_module()?.ok_or(Error::Structural)?;
        let proto = self.pop_protocol()?;
        Ok(Node::with_children(
            Kind::ProtocolConformanceRefInOtherModule,
            vec![proto, module],
        ))
    }

    fn demangle_concrete_conformance(&mut self) -> Result<Node> {
        let conditional = self.pop_any_protocol_conformance_list()?;

        let reference = match self.pop_kind(Kind::ProtocolConformanceRefInTypeModule) {
            Some(reference) => reference,
            None => match self.pop_kind(Kind::ProtocolConformanceRefInProtocolModule) {
                Some(reference) => reference,
                None => self.demangle_retroactive_conformance_ref()?,
            },
        };

        let ty = self.require_kind(Kind::Type)?;
        Ok(Node::with_children(
            Kind::ConcreteProtocolConformance,
            vec![ty, reference, conditional],
        ))
    }

    fn demangle_dependent_conformance_root(&mut self) -> Result<Node> {
        let index = self.demangle_dependent_conformance_index()?;
        let proto = self.pop_protocol()?;
        let dependent = self.require_kind(Kind::Type)?;
        Ok(Node::with_children(
            Kind::DependentProtocolConformanceRoot,
            vec![dependent, proto, index],
        ))
    }

    fn demangle_dependent_conformance_inherited(&mut self) -> Result<Node> {
        let index = self.demangle_dependent_conformance_index()?;
        let proto = self.pop_protocol()?;
        let nested = self.pop_dependent_protocol_conformance()?;
        Ok(Node::with_children(
            Kind::DependentProtocolConformanceInherited,
            vec![nested, proto, index],
        ))
    }

    fn demangle_dependent_conformance_associated(&mut self) -> Result<Node> {
        let index = self.demangle_dependent_conformance_index()?;
        let associated = self.pop_dependent_associated_conformance()?;
        let nested = self.pop_dependent_protocol_conformance()?;
        Ok(Node::with_children(
            Kind::DependentProtocolConformanceAssociated,
            vec![nested, associated, index],
        ))
    }

    /// Index of a dependent conformance, offset by two: zero is ill-formed
    /// and one is an unknown index.
    fn demangle_dependent_conformance_index(&mut self) -> Result<Node> {
        match self.demangle_index()? {
            0 => Err(Error::Structural),
            1 => Ok(Node::new(Kind::UnknownIndex)),
            index => Ok(Node::with_index(Kind::Index, index - 2)),
        }
    }

    fn demangle_retroactive_conformance(&mut self) -> Result<Node> {
        let index = self.demangle_index_as_node()?;
        let conformance = self.pop_any_protocol_conformance()?;
        Ok(Node::with_children(
            Kind::RetroactiveConformance,
            vec![index, conformance],
        ))
    }

    /// Generic argument lists of every level of a bound generic type,
    /// innermost first.
    fn demangle_bound_generics(&mut self) -> Result<(Vec<Node>, Option<Node>)> {
        let mut retroactive = Vec::new();
        while let Some(conformance) = self.pop_kind(Kind::RetroactiveConformance) {
            retroactive.push(conformance);
        }

        let retroactive = if retroactive.is_empty() {
            None
        } else {
            retroactive.reverse();
            Some(Node::with_children(Kind::TypeList, retroactive))
        };

        let mut type_lists = Vec::new();
        loop {
            let mut types = Vec::new();
            while let Some(ty) = self.pop_kind(Kind::Type) {
                types.push(ty);
            }

            types.reverse();
            type_lists.push(Node::with_children(Kind::TypeList, types));

            if self.pop_kind(Kind::EmptyList).is_some() {
                break;
            }

            self.require_kind(Kind::FirstElementMarker)?;
        }

        Ok((type_lists, retroactive))
    }

    fn demangle_bound_generic_type(&mut self) -> Result<Node> {
        let (type_lists, retroactive) = self.demangle_bound_generics()?;
        let nominal = self.pop_type_and_get_any_generic()?;

        let mut bound = self.demangle_bound_generic_args(nominal, &type_lists, 0)?;
        if let Some(retroactive) = retroactive {
            bound.push(retroactive);
        }

        let ty = Node::with_child(Kind::Type, bound);
        self.add_substitution(&ty);
        Ok(ty)
    }

    /// Apply the generic arguments to `nominal` and its parent contexts, the
    /// outermost context's arguments come last.
    fn demangle_bound_generic_args(
        &mut self,
        nominal: Node,
        type_lists: &[Node],
        mut idx: usize,
    ) -> Result<Node> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooMuchRecursion);
        }

        self.depth += 1;
        let result = self.bind_generic_args(nominal, type_lists, &mut idx);
        self.depth -= 1;
        result
    }

    fn bind_generic_args(&mut self, nominal: Node, type_lists: &[Node], idx: &mut usize) -> Result<Node> {
        if *idx >= type_lists.len() {
            return Err(Error::Structural);
        }

        // a symbolic reference takes every remaining argument
        if matches!(
            nominal.kind(),
            Kind::TypeSymbolicReference | Kind::ProtocolSymbolicReference
        ) {
            let remaining = type_lists[*idx..]
                .iter()
                .rev()
                .flat_map(|list| list.children().iter().cloned())
                .collect();

            return Ok(Node::with_children(
                Kind::BoundGenericOtherNominalType,
                vec![
                    Node::with_child(Kind::Type, nominal),
                    Node::with_children(Kind::TypeList, remaining),
                ],
            ));
        }

        let context = nominal.child(0)?.clone();
        let consumes_generic_args = nominal.kind().consumes_generic_args();
        let args = &type_lists[*idx];

        if consumes_generic_args {
            *idx += 1;
        }

        let mut nominal = nominal;
        if *idx < type_lists.len() {
            let parent = if context.kind() == Kind::Extension {
                let extended = context.child(1)?.clone();
                let bound = self.demangle_bound_generic_args(extended, type_lists, *idx)?;

                let mut extension = Node::with_children(
                    Kind::Extension,
                    vec![context.child(0)?.clone(), bound],
                );

                // generic signature of the extension
                if let Some(signature) = context.children().get(2) {
                    extension.push(signature.clone());
                }

                extension
            } else {
                self.demangle_bound_generic_args(context, type_lists, *idx)?
            };

            // rebuild this type with its parent bound
            let kind = nominal.kind();
            let mut children = nominal.into_children();
            children[0] = parent;
            nominal = Node::with_children(kind, children);
        }

        if !consumes_generic_args || args.children().is_empty() {
            return Ok(nominal);
        }

        let kind = match nominal.kind() {
            Kind::Class => Kind::BoundGenericClass,
            Kind::Structure => Kind::BoundGenericStructure,
            Kind::Enum => Kind::BoundGenericEnum,
            Kind::Protocol => Kind::BoundGenericProtocol,
            Kind::OtherNominalType => Kind::BoundGenericOtherNominalType,
            Kind::TypeAlias => Kind::BoundGenericTypeAlias,
            Kind::Function | Kind::Constructor => {
                return Ok(Node::with_children(
                    Kind::BoundGenericFunction,
                    vec![nominal, args.clone()],
                ));
            }
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_children(
            kind,
            vec![Node::with_child(Kind::Type, nominal), args.clone()],
        ))
    }

    fn demangle_impl_param_convention(&mut self) -> Result<Option<Node>> {
        let convention = match self.scanner.consume()? {
            b'i' => "@in",
            b'c' => "@in_constant",
            b'l' => "@inout",
            b'b' => "@inout_aliasable",
            b'n' => "@in_guaranteed",
            b'x' => "@owned",
            b'g' => "@guaranteed",
            b'e' => "@deallocating",
            b'y' => "@unowned",
            _ => {
                self.scanner.backtrack()?;
                return Ok(None);
            }
        };

        Ok(Some(Node::with_child(
            Kind::ImplParameter,
            Node::with_text(Kind::ImplConvention, convention),
        )))
    }

    fn demangle_impl_result_convention(&mut self, kind: Kind) -> Result<Option<Node>> {
        let convention = match self.scanner.consume()? {
            b'r' => "@out",
            b'o' => "@owned",
            b'd' => "@unowned",
            b'u' => "@unowned_inner_pointer",
            b'a' => "@autoreleased",
            _ => {
                self.scanner.backtrack()?;
                return Ok(None);
            }
        };

        Ok(Some(Node::with_child(
            kind,
            Node::with_text(Kind::ImplConvention, convention),
        )))
    }

    fn demangle_impl_function_type(&mut self) -> Result<Node> {
        let mut children = Vec::new();

        let mut signature = self.pop_kind(Kind::DependentGenericSignature);
        if signature.is_some() && self.scanner.next_if(b'P') {
            signature = signature.map(|sig| {
                Node::with_children(Kind::DependentPseudogenericSignature, sig.into_children())
            });
        }

        if self.scanner.next_if(b'e') {
            children.push(Node::new(Kind::ImplEscaping));
        }

        let callee = match self.scanner.consume()? {
            b'y' => "@callee_unowned",
            b'g' => "@callee_guaranteed",
            b'x' => "@callee_owned",
            b't' => "@convention(thin)",
            _ => return Err(Error::Structural),
        };
        children.push(Node::with_text(Kind::ImplConvention, callee));

        let attr = match self.scanner.consume()? {
            b'B' => Some("@convention(block)"),
            b'C' => Some("@convention(c)"),
            b'M' => Some("@convention(method)"),
            b'O' => Some("@convention(objc_method)"),
            b'K' => Some("@convention(closure)"),
            b'W' => Some("@convention(witness_method)"),
            _ => {
                self.scanner.backtrack()?;
                None
            }
        };

        if let Some(attr) = attr {
            children.push(Node::with_text(Kind::ImplFunctionAttribute, attr));
        }

        if let Some(signature) = signature {
            children.push(signature);
        }

        let mut typed = 0;
        while let Some(param) = self.demangle_impl_param_convention()? {
            children.push(param);
            typed += 1;
        }

        while let Some(result) = self.demangle_impl_result_convention(Kind::ImplResult)? {
            children.push(result);
            typed += 1;
        }

        if self.scanner.next_if(b'z') {
            let error = self
                .demangle_impl_result_convention(Kind::ImplErrorResult)?
                .ok_or(Error::Structural)?;

            children.push(error);
            typed += 1;
        }

        if !self.scanner.next_if(b'_') {
            return Err(Error::Structural);
        }

        // the types of parameters and results are on the stack, last first
        if typed > children.len() {
            return Err(Error::Structural);
        }

        let len = children.len();
        for idx in 0..typed {
            let ty = self.require_kind(Kind::Type)?;
            children[len - idx - 1].push(ty);
        }

        Ok(type_node(Kind::ImplFunctionType, children))
    }

    fn demangle_metatype(&mut self) -> Result<Node> {
        let kind = match self.scanner.consume()? {
            b'c' => {
                let conformance = self.pop_protocol_conformance()?;
                return Ok(Node::with_child(Kind::ProtocolConformanceDescriptor, conformance));
            }
            b'g' => return Ok(Node::with_child(Kind::OpaqueTypeDescriptorAccessor, self.require()?)),
            b'h' => return Ok(Node::with_child(Kind::OpaqueTypeDescriptorAccessorImpl, self.require()?)),
            b'j' => return Ok(Node::with_child(Kind::OpaqueTypeDescriptorAccessorKey, self.require()?)),
            b'k' => return Ok(Node::with_child(Kind::OpaqueTypeDescriptorAccessorVar, self.require()?)),
            b'Q' => return Ok(Node::with_child(Kind::OpaqueTypeDescriptor, self.require()?)),
            b'p' => return Ok(Node::with_child(Kind::ProtocolDescriptor, self.pop_protocol()?)),
            b'S' => {
                let proto = self.pop_protocol()?;
                return Ok(Node::with_child(Kind::ProtocolSelfConformanceDescriptor, proto));
            }
            b'A' => {
                let conformance = self.pop_protocol_conformance()?;
                return Ok(Node::with_child(
                    Kind::ReflectionMetadataAssocTypeDescriptor,
                    conformance,
                ));
            }
            b'C' => {
                let ty = self.require_kind(Kind::Type)?;
                let class = ty.into_children().into_iter().next().ok_or(Error::Structural)?;
                if !class.kind().is_any_generic() {
                    return Err(Error::Structural);
                }

                return Ok(Node::with_child(
                    Kind::ReflectionMetadataSuperclassDescriptor,
                    class,
                ));
            }
            b'V' => {
                let entity = self.require_if(Kind::is_entity)?;
                return Ok(Node::with_child(Kind::PropertyDescriptor, entity));
            }
            b'X' => return self.demangle_private_context_descriptor(),
            b'f' => Kind::FullTypeMetadata,
            b'P' => Kind::GenericTypeMetadataPattern,
            b'a' => Kind::TypeMetadataAccessFunction,
            b'I' => Kind::TypeMetadataInstantiationCache,
            b'i' => Kind::TypeMetadataInstantiationFunction,
            b'r' => Kind::TypeMetadataCompletionFunction,
            b'l' => Kind::TypeMetadataSingletonInitializationCache,
            b'L' => Kind::TypeMetadataLazyCache,
            b'm' => Kind::Metaclass,
            b'n' => Kind::NominalTypeDescriptor,
            b'o' => Kind::ClassMetadataBaseOffset,
            b'u' => Kind::MethodLookupFunction,
            b'U' => Kind::ObjCMetadataUpdateFunction,
            b's' => Kind::ObjCResilientClassStub,
            b't' => Kind::FullObjCResilientClassStub,
            b'B' => Kind::ReflectionMetadataBuiltinDescriptor,
            b'F' => Kind::ReflectionMetadataFieldDescriptor,
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_child(kind, self.require_kind(Kind::Type)?))
    }

    fn demangle_private_context_descriptor(&mut self) -> Result<Node> {
        match self.scanner.consume()? {
            b'E' => Ok(Node::with_child(Kind::ExtensionDescriptor, self.pop_context()?)),
            b'M' => {
                let module = self.pop_module()?.ok_or(Error::Structural)?;
                Ok(Node::with_child(Kind::ModuleDescriptor, module))
            }
            b'Y' => {
                let discriminator = self.require()?;
                let context = self.pop_context()?;
                Ok(Node::with_children(
                    Kind::AnonymousDescriptor,
                    vec![discriminator, context],
                ))
            }
            b'X' => Ok(Node::with_child(Kind::AnonymousDescriptor, self.pop_context()?)),
            b'A' => {
                let ty = self.require_kind(Kind::Type)?;
                let path = self.pop_assoc_type_path()?;
                Ok(Node::with_children(
                    Kind::AssociatedTypeGenericParamRef,
                    vec![ty, path],
                ))
            }
            _ => Err(Error::Structural),
        }
    }

    fn demangle_archetype(&mut self) -> Result<Node> {
        let ty = match self.scanner.consume()? {
            b'a' => {
                let ident = self.require_kind(Kind::Identifier)?;
                let archetype = self.pop_type_and_get_child()?;
                type_node(Kind::AssociatedTypeRef, vec![archetype, ident])
            }
            b'O' => {
                let context = self.pop_context()?;
                return Ok(Node::with_child(Kind::OpaqueReturnTypeOf, context));
            }
            b'o' => {
                let index = self.demangle_index()?;
                let (mut type_lists, retroactive) = self.demangle_bound_generics()?;
                let name = self.require()?;

                type_lists.reverse();
                let mut opaque = Node::with_children(
                    Kind::OpaqueType,
                    vec![
                        name,
                        Node::with_index(Kind::Index, index),
                        Node::with_children(Kind::TypeList, type_lists),
                    ],
                );

                if let Some(retroactive) = retroactive {
                    opaque.push(retroactive);
                }

                Node::with_child(Kind::Type, opaque)
            }
            b'r' => return Ok(Node::with_child(Kind::Type, Node::new(Kind::OpaqueReturnType))),
            b'y' => {
                let param = self.demangle_generic_param_index()?;
                self.demangle_associated_type_simple(param)?
            }
            b'z' => self.demangle_associated_type_simple(dependent_generic_param(0, 0))?,
            b'Y' => {
                let param = self.demangle_generic_param_index()?;
                self.demangle_associated_type_compound(param)?
            }
            b'Z' => self.demangle_associated_type_compound(dependent_generic_param(0, 0))?,
            _ => return Err(Error::Structural),
        };

        self.add_substitution(&ty);
        Ok(ty)
    }

    fn demangle_associated_type_simple(&mut self, param: Node) -> Result<Node> {
        let base = Node::with_child(Kind::Type, param);
        let name = self.pop_assoc_type_name()?;
        Ok(type_node(Kind::DependentMemberType, vec![base, name]))
    }

    fn demangle_associated_type_compound(&mut self, param: Node) -> Result<Node> {
        let mut names = Vec::new();
        loop {
            let first = self.pop_kind(Kind::FirstElementMarker).is_some();
            names.push(self.pop_assoc_type_name()?);
            if first {
                break;
            }
        }

        let mut base = param;
        while let Some(name) = names.pop() {
            base = Node::with_children(
                Kind::DependentMemberType,
                vec![Node::with_child(Kind::Type, base), name],
            );
        }

        Ok(Node::with_child(Kind::Type, base))
    }

    fn demangle_generic_param_index(&mut self) -> Result<Node> {
        if self.scanner.next_if(b'd') {
            let depth = self.demangle_index()?.checked_add(1).ok_or(Error::Overflow)?;
            let index = self.demangle_index()?;
            return Ok(dependent_generic_param(depth, index));
        }

        if self.scanner.next_if(b'z') {
            return Ok(dependent_generic_param(0, 0));
        }

        let index = self.demangle_index()?.checked_add(1).ok_or(Error::Overflow)?;
        Ok(dependent_generic_param(0, index))
    }

    fn demangle_thunk_or_specialization(&mut self) -> Result<Node> {
        let c = self.scanner.consume()?;
        match c {
            b'c' => Ok(Node::with_child(Kind::CurryThunk, self.require_if(Kind::is_entity)?)),
            b'j' => Ok(Node::with_child(Kind::DispatchThunk, self.require_if(Kind::is_entity)?)),
            b'q' => Ok(Node::with_child(Kind::MethodDescriptor, self.require_if(Kind::is_entity)?)),
            b'o' => Ok(Node::new(Kind::ObjCAttribute)),
            b'O' => Ok(Node::new(Kind::NonObjCAttribute)),
            b'D' => Ok(Node::new(Kind::DynamicAttribute)),
            b'd' => Ok(Node::new(Kind::DirectMethodReferenceAttribute)),
            b'a' => Ok(Node::new(Kind::PartialApplyObjCForwarder)),
            b'A' => Ok(Node::new(Kind::PartialApplyForwarder)),
            b'm' => Ok(Node::new(Kind::MergedFunction)),
            b'X' => Ok(Node::new(Kind::DynamicallyReplaceableFunctionVar)),
            b'x' => Ok(Node::new(Kind::DynamicallyReplaceableFunctionKey)),
            b'I' => Ok(Node::new(Kind::DynamicallyReplaceableFunctionImpl)),
            b'C' => Ok(Node::with_child(
                Kind::CoroutineContinuationPrototype,
                self.require_kind(Kind::Type)?,
            )),
            b'V' => {
                let base = self.require_if(Kind::is_entity)?;
                let derived = self.require_if(Kind::is_entity)?;
                Ok(Node::with_children(Kind::VTableThunk, vec![derived, base]))
            }
            b'W' => {
                let entity = self.require_if(Kind::is_entity)?;
                let conformance = self.pop_protocol_conformance()?;
                Ok(Node::with_children(
                    Kind::ProtocolWitness,
                    vec![conformance, entity],
                ))
            }
            b'S' => Ok(Node::with_child(
                Kind::ProtocolSelfConformanceWitness,
                self.require_if(Kind::is_entity)?,
            )),
            b'R' | b'r' | b'y' => {
                let kind = match c {
                    b'R' => Kind::ReabstractionThunkHelper,
                    b'y' => Kind::ReabstractionThunkHelperWithSelf,
                    _ => Kind::ReabstractionThunk,
                };

                let mut thunk = Node::new(kind);
                if let Some(signature) = self.pop_kind(Kind::DependentGenericSignature) {
                    thunk.push(signature);
                }

                if kind == Kind::ReabstractionThunkHelperWithSelf {
                    thunk.push(self.require_kind(Kind::Type)?);
                }

                thunk.push(self.require_kind(Kind::Type)?);
                thunk.push(self.require_kind(Kind::Type)?);
                Ok(thunk)
            }
            b'g' => self.demangle_generic_specialization(Kind::GenericSpecialization),
            b'G' => self.demangle_generic_specialization(Kind::GenericSpecializationNotReAbstracted),
            b'i' => self.demangle_generic_specialization(Kind::InlinedGenericFunction),
            b'p' | b'P' => {
                let kind = if c == b'p' {
                    Kind::GenericPartialSpecialization
                } else {
                    Kind::GenericPartialSpecializationNotReAbstracted
                };

                let mut spec = self.demangle_spec_attributes(kind)?;
                let param = Node::with_child(
                    Kind::GenericSpecializationParam,
                    self.require_kind(Kind::Type)?,
                );

                spec.push(param);
                Ok(spec)
            }
            b'f' => self.demangle_function_specialization(),
            b'K' | b'k' => {
                let kind = if c == b'K' {
                    Kind::KeyPathGetterThunkHelper
                } else {
                    Kind::KeyPathSetterThunkHelper
                };

                let is_serialized = self.scanner.next_if(b'q');

                let mut types = Vec::new();
                let mut node = Some(self.require_kind(Kind::Type)?);
                while let Some(ty) = node.take() {
                    if ty.kind() != Kind::Type {
                        node = Some(ty);
                        break;
                    }

                    types.push(ty);
                    node = self.pop();
                }

                let node = node.ok_or(Error::Structural)?;
                let mut result = if node.kind() == Kind::DependentGenericSignature {
                    let decl = self.require()?;
                    Node::with_children(kind, vec![decl, node])
                } else {
                    Node::with_child(kind, node)
                };

                for ty in types.into_iter().rev() {
                    result.push(ty);
                }

                if is_serialized {
                    result.push(Node::new(Kind::IsSerialized));
                }

                Ok(result)
            }
            b'l' => {
                let name = self.pop_assoc_type_name()?;
                Ok(Node::with_child(Kind::AssociatedTypeDescriptor, name))
            }
            b'L' => Ok(Node::with_child(
                Kind::ProtocolRequirementsBaseDescriptor,
                self.pop_protocol()?,
            )),
            b'M' => Ok(Node::with_child(
                Kind::DefaultAssociatedTypeMetadataAccessor,
                self.pop_assoc_type_name()?,
            )),
            b'n' | b'N' => {
                let kind = if c == b'n' {
                    Kind::AssociatedConformanceDescriptor
                } else {
                    Kind::DefaultAssociatedConformanceAccessor
                };

                let requirement = self.pop_protocol()?;
                let path = self.pop_assoc_type_path()?;
                let proto = self.require_kind(Kind::Type)?;
                Ok(Node::with_children(kind, vec![proto, path, requirement]))
            }
            b'b' => {
                let requirement = self.pop_protocol()?;
                let proto = self.require_kind(Kind::Type)?;
                Ok(Node::with_children(
                    Kind::BaseConformanceDescriptor,
                    vec![proto, requirement],
                ))
            }
            b'H' | b'h' => {
                let kind = if c == b'H' {
                    Kind::KeyPathEqualsThunkHelper
                } else {
                    Kind::KeyPathHashThunkHelper
                };

                let is_serialized = self.scanner.next_if(b'q');

                let mut signature = None;
                let mut types = Vec::new();
                let node = self.require()?;
                match node.kind() {
                    Kind::DependentGenericSignature => signature = Some(node),
                    Kind::Type => types.push(node),
                    _ => return Err(Error::Structural),
                }

                while let Some(node) = self.pop() {
                    if node.kind() != Kind::Type {
                        return Err(Error::Structural);
                    }

                    types.push(node);
                }

                let mut result = Node::new(kind);
                for ty in types.into_iter().rev() {
                    result.push(ty);
                }

                if let Some(signature) = signature {
                    result.push(signature);
                }

                if is_serialized {
                    result.push(Node::new(Kind::IsSerialized));
                }

                Ok(result)
            }
            b'v' => Ok(Node::with_index(Kind::OutlinedVariable, self.demangle_index()?)),
            b'e' => {
                let params = self.demangle_bridged_method_params()?;
                Ok(Node::with_text(Kind::OutlinedBridgedMethod, params))
            }
            _ => Err(Error::Structural),
        }
    }

    fn demangle_bridged_method_params(&mut self) -> Result<String> {
        if self.scanner.next_if(b'_') {
            return Ok(String::new());
        }

        let mut params = String::new();
        match self.scanner.consume()? {
            c @ (b'p' | b'a' | b'm') => params.push(c as char),
            _ => return Err(Error::Structural),
        }

        while !self.scanner.next_if(b'_') {
            match self.scanner.consume()? {
                c @ (b'n' | b'b') => params.push(c as char),
                _ => return Err(Error::Structural),
            }
        }

        Ok(params)
    }

    fn demangle_generic_specialization(&mut self, kind: Kind) -> Result<Node> {
        let mut spec = self.demangle_spec_attributes(kind)?;
        let types = self.pop_type_list()?;
        for ty in types.into_children() {
            spec.push(Node::with_child(Kind::GenericSpecializationParam, ty));
        }

        Ok(spec)
    }

    fn demangle_spec_attributes(&mut self, kind: Kind) -> Result<Node> {
        let is_serialized = self.scanner.next_if(b'q');

        let pass_id = match self.scanner.consume()? {
            c @ b'0'..=b'9' => u64::from(c - b'0'),
            _ => return Err(Error::Structural),
        };

        let mut spec = Node::new(kind);
        if is_serialized {
            spec.push(Node::new(Kind::IsSerialized));
        }

        spec.push(Node::with_index(Kind::SpecializationPassID, pass_id));
        Ok(spec)
    }

    fn demangle_function_specialization(&mut self) -> Result<Node> {
        let mut spec = self.demangle_spec_attributes(Kind::FunctionSignatureSpecialization)?;
        while !self.scanner.next_if(b'_') {
            spec.push(self.demangle_func_spec_param(Kind::FunctionSignatureSpecializationParam)?);
        }

        if !self.scanner.next_if(b'n') {
            spec.push(self.demangle_func_spec_param(Kind::FunctionSignatureSpecializationReturn)?);
        }

        // the payloads of constant propagated parameters are on the stack,
        // last parameter first
        for idx in (0..spec.children().len()).rev() {
            let param = &spec.children()[idx];
            if param.kind() != Kind::FunctionSignatureSpecializationParam {
                continue;
            }

            let kind = match param.children().first() {
                Some(kind) if kind.kind() == Kind::FunctionSignatureSpecializationParamKind => {
                    kind.require_index()?
                }
                Some(_) => return Err(Error::Structural),
                None => continue,
            };

            if !matches!(
                kind,
                param_kind::CONSTANT_PROP_FUNCTION
                    | param_kind::CONSTANT_PROP_GLOBAL
                    | param_kind::CONSTANT_PROP_STRING
                    | param_kind::CLOSURE_PROP
            ) {
                continue;
            }

            let fixed = param.children().len();
            let mut payload = Vec::new();
            while let Some(ty) = self.pop_kind(Kind::Type) {
                if kind != param_kind::CLOSURE_PROP {
                    return Err(Error::Structural);
                }

                payload.push(ty);
            }

            let name = self.require_kind(Kind::Identifier)?;
            let mut text = name.require_text()?;

            // a leading '_' escapes a string constant starting with a digit
            // or '_'
            if kind == param_kind::CONSTANT_PROP_STRING {
                text = text.strip_prefix('_').unwrap_or(text);
            }

            payload.push(Node::with_text(
                Kind::FunctionSignatureSpecializationParamPayload,
                text,
            ));

            spec.update_children(|params| {
                if let Some(param) = params.get_mut(idx) {
                    param.update_children(|children| {
                        children.extend(payload);
                        children[fixed..].reverse();
                    });
                }
            });
        }

        Ok(spec)
    }

    fn demangle_func_spec_param(&mut self, kind: Kind) -> Result<Node> {
        let kind_node = |value: u64| Node::with_index(Kind::FunctionSignatureSpecializationParamKind, value);

        let mut param = Node::new(kind);
        match self.scanner.consume()? {
            b'n' => {}
            b'c' => param.push(kind_node(param_kind::CLOSURE_PROP)),
            b'p' => match self.scanner.consume()? {
                b'f' => param.push(kind_node(param_kind::CONSTANT_PROP_FUNCTION)),
                b'g' => param.push(kind_node(param_kind::CONSTANT_PROP_GLOBAL)),
                b'i' => return self.add_func_spec_param_number(param, param_kind::CONSTANT_PROP_INTEGER),
                b'd' => return self.add_func_spec_param_number(param, param_kind::CONSTANT_PROP_FLOAT),
                b's' => {
                    let encoding = match self.scanner.consume()? {
                        b'b' => "u8",
                        b'w' => "u16",
                        b'c' => "objc",
                        _ => return Err(Error::Structural),
                    };

                    param.push(kind_node(param_kind::CONSTANT_PROP_STRING));
                    param.push(Node::with_text(
                        Kind::FunctionSignatureSpecializationParamPayload,
                        encoding,
                    ));
                }
                _ => return Err(Error::Structural),
            },
            b'e' => {
                let flags = self.demangle_param_flags(ParamFlags::EXISTENTIAL_TO_GENERIC, b"DGOX");
                param.push(kind_node(flags.bits()));
            }
            b'd' => {
                let flags = self.demangle_param_flags(ParamFlags::DEAD, b"GOX");
                param.push(kind_node(flags.bits()));
            }
            b'g' => {
                let flags = self.demangle_param_flags(ParamFlags::OWNED_TO_GUARANTEED, b"X");
                param.push(kind_node(flags.bits()));
            }
            b'o' => {
                let flags = self.demangle_param_flags(ParamFlags::GUARANTEED_TO_OWNED, b"X");
                param.push(kind_node(flags.bits()));
            }
            b'x' => param.push(kind_node(ParamFlags::SROA.bits())),
            b'i' => param.push(kind_node(param_kind::BOX_TO_VALUE)),
            b's' => param.push(kind_node(param_kind::BOX_TO_STACK)),
            _ => return Err(Error::Structural),
        }

        Ok(param)
    }

    /// Optional flags following a parameter kind, in the order they are
    /// mangled.
    fn demangle_param_flags(&mut self, mut flags: ParamFlags, allowed: &[u8]) -> ParamFlags {
        for &c in allowed {
            if !self.scanner.next_if(c) {
                continue;
            }

            flags |= match c {
                b'D' => ParamFlags::DEAD,
                b'G' => ParamFlags::OWNED_TO_GUARANTEED,
                b'O' => ParamFlags::GUARANTEED_TO_OWNED,
                _ => ParamFlags::SROA,
            };
        }

        flags
    }

    fn add_func_spec_param_number(&mut self, mut param: Node, kind: u64) -> Result<Node> {
        param.push(Node::with_index(Kind::FunctionSignatureSpecializationParamKind, kind));

        let mut digits = String::new();
        while let Some(c @ b'0'..=b'9') = self.scanner.peek() {
            digits.push(c as char);
            self.scanner.consume()?;
        }

        if digits.is_empty() {
            return Err(Error::Structural);
        }

        param.push(Node::with_text(
            Kind::FunctionSignatureSpecializationParamPayload,
            digits,
        ));

        Ok(param)
    }

    fn demangle_witness(&mut self) -> Result<Node> {
        let kind = match self.scanner.consume()? {
            b'C' => return Ok(Node::with_child(Kind::EnumCase, self.require_if(Kind::is_entity)?)),
            b'V' => {
                return Ok(Node::with_child(
                    Kind::ValueWitnessTable,
                    self.require_kind(Kind::Type)?,
                ))
            }
            b'v' => {
                let directness = match self.scanner.consume()? {
                    b'd' => Directness::Direct,
                    b'i' => Directness::Indirect,
                    _ => return Err(Error::Structural),
                };

                let entity = self.require_if(Kind::is_entity)?;
                return Ok(Node::with_children(
                    Kind::FieldOffset,
                    vec![Node::with_index(Kind::Directness, directness as u64), entity],
                ));
            }
            b'S' => {
                let proto = self.pop_protocol()?;
                return Ok(Node::with_child(Kind::ProtocolSelfConformanceWitnessTable, proto));
            }
            c @ (b'l' | b'L') => {
                let kind = if c == b'l' {
                    Kind::LazyProtocolWitnessTableAccessor
                } else {
                    Kind::LazyProtocolWitnessTableCacheVariable
                };

                let conformance = self.pop_protocol_conformance()?;
                let ty = self.require_kind(Kind::Type)?;
                return Ok(Node::with_children(kind, vec![ty, conformance]));
            }
            b't' => {
                let name = self.require_if(Kind::is_decl_name)?;
                let conformance = self.pop_protocol_conformance()?;
                return Ok(Node::with_children(
                    Kind::AssociatedTypeMetadataAccessor,
                    vec![conformance, name],
                ));
            }
            b'T' => {
                let proto = self.require_kind(Kind::Type)?;
                let path = self.pop_assoc_type_path()?;
                let conformance = self.pop_protocol_conformance()?;
                return Ok(Node::with_children(
                    Kind::AssociatedTypeWitnessTableAccessor,
                    vec![conformance, path, proto],
                ));
            }
            b'b' => {
                let proto = self.require_kind(Kind::Type)?;
                let conformance = self.pop_protocol_conformance()?;
                return Ok(Node::with_children(
                    Kind::BaseWitnessTableAccessor,
                    vec![conformance, proto],
                ));
            }
            b'O' => return self.demangle_outlined_operation(),
            b'P' => Kind::ProtocolWitnessTable,
            b'p' => Kind::ProtocolWitnessTablePattern,
            b'G' => Kind::GenericProtocolWitnessTable,
            b'I' => Kind::GenericProtocolWitnessTableInstantiationFunction,
            b'r' => Kind::ResilientProtocolWitnessTable,
            b'a' => Kind::ProtocolWitnessTableAccessor,
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_child(kind, self.pop_protocol_conformance()?))
    }

    fn demangle_outlined_operation(&mut self) -> Result<Node> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let ty = self.require_kind(Kind::Type)?;

        let mut children = vec![ty];
        if let Some(signature) = signature {
            children.push(signature);
        }

        let kind = match self.scanner.consume()? {
            b'y' => Kind::OutlinedCopy,
            b'e' => Kind::OutlinedConsume,
            b'r' => Kind::OutlinedRetain,
            b's' => Kind::OutlinedRelease,
            b'b' => Kind::OutlinedInitializeWithTake,
            b'c' => Kind::OutlinedInitializeWithCopy,
            b'd' => Kind::OutlinedAssignWithTake,
            b'f' => Kind::OutlinedAssignWithCopy,
            b'h' => Kind::OutlinedDestroy,
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_children(kind, children))
    }

    fn demangle_special_type(&mut self) -> Result<Node> {
        let c = self.scanner.consume()?;
        match c {
            b'E' => self.pop_function_type(Kind::NoEscapeFunctionType),
            b'A' => self.pop_function_type(Kind::EscapingAutoClosureType),
            b'f' => self.pop_function_type(Kind::ThinFunctionType),
            b'K' => self.pop_function_type(Kind::AutoClosureType),
            b'U' => self.pop_function_type(Kind::UncurriedFunctionType),
            b'B' => self.pop_function_type(Kind::ObjCBlock),
            b'C' => self.pop_function_type(Kind::CFunctionPointer),
            b'o' => Ok(type_node(Kind::Unowned, vec![self.require_kind(Kind::Type)?])),
            b'u' => Ok(type_node(Kind::Unmanaged, vec![self.require_kind(Kind::Type)?])),
            b'w' => Ok(type_node(Kind::Weak, vec![self.require_kind(Kind::Type)?])),
            b'b' => Ok(type_node(Kind::SILBoxType, vec![self.require_kind(Kind::Type)?])),
            b'D' => Ok(type_node(Kind::DynamicSelf, vec![self.require_kind(Kind::Type)?])),
            b'M' | b'm' => {
                let kind = if c == b'M' {
                    Kind::Metatype
                } else {
                    Kind::ExistentialMetatype
                };

                let representation = self.demangle_metatype_representation()?;
                let ty = self.require_kind(Kind::Type)?;
                Ok(type_node(kind, vec![representation, ty]))
            }
            b'p' => Ok(type_node(
                Kind::ExistentialMetatype,
                vec![self.require_kind(Kind::Type)?],
            )),
            b'c' => {
                let superclass = self.require_kind(Kind::Type)?;
                let protocols = self.demangle_protocol_list()?;
                Ok(type_node(Kind::ProtocolListWithClass, vec![protocols, superclass]))
            }
            b'l' => {
                let protocols = self.demangle_protocol_list()?;
                Ok(type_node(Kind::ProtocolListWithAnyObject, vec![protocols]))
            }
            b'X' | b'x' => {
                let mut signature_args = None;
                if c == b'X' {
                    let signature = self.require_kind(Kind::DependentGenericSignature)?;
                    let args = self.pop_type_list()?;
                    signature_args = Some((signature, args));
                }

                let fields = self.pop_type_list()?;
                let mut layout = Node::new(Kind::SILBoxLayout);
                for field in fields.into_children() {
                    if field.kind() != Kind::Type {
                        return Err(Error::Structural);
                    }

                    // inout marks a mutable field
                    if field.child(0)?.kind() == Kind::InOut {
                        let inner = field.child(0)?.child(0)?.clone();
                        layout.push(Node::with_child(
                            Kind::SILBoxMutableField,
                            Node::with_child(Kind::Type, inner),
                        ));
                    } else {
                        layout.push(Node::with_child(Kind::SILBoxImmutableField, field));
                    }
                }

                let mut boxed = Node::with_child(Kind::SILBoxTypeWithLayout, layout);
                if let Some((signature, args)) = signature_args {
                    boxed.push(signature);
                    boxed.push(args);
                }

                Ok(Node::with_child(Kind::Type, boxed))
            }
            b'Y' => self.demangle_any_generic_type(Kind::OtherNominalType),
            b'Z' => {
                let types = self.pop_type_list()?;
                let name = self.require_kind(Kind::Identifier)?;
                let parent = self.pop_context()?;
                Ok(Node::with_children(
                    Kind::AnonymousContext,
                    vec![name, parent, types],
                ))
            }
            b'e' => Ok(Node::with_child(Kind::Type, Node::new(Kind::ErrorType))),
            // sugared types for the debugger
            b'S' => match self.scanner.consume()? {
                b'q' => Ok(type_node(Kind::SugaredOptional, vec![self.require_kind(Kind::Type)?])),
                b'a' => Ok(type_node(Kind::SugaredArray, vec![self.require_kind(Kind::Type)?])),
                b'D' => {
                    let value = self.require_kind(Kind::Type)?;
                    let key = self.require_kind(Kind::Type)?;
                    Ok(type_node(Kind::SugaredDictionary, vec![key, value]))
                }
                b'p' => Ok(type_node(Kind::SugaredParen, vec![self.require_kind(Kind::Type)?])),
                _ => Err(Error::Structural),
            },
            _ => Err(Error::Structural),
        }
    }

    fn demangle_metatype_representation(&mut self) -> Result<Node> {
        let representation = match self.scanner.consume()? {
            b't' => "@thin",
            b'T' => "@thick",
            b'o' => "@objc_metatype",
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_text(Kind::MetatypeRepresentation, representation))
    }

    fn demangle_accessor(&mut self, storage: Node) -> Result<Node> {
        let kind = match self.scanner.consume()? {
            b'm' => Kind::MaterializeForSet,
            b's' => Kind::Setter,
            b'g' => Kind::Getter,
            b'G' => Kind::GlobalGetter,
            b'w' => Kind::WillSet,
            b'W' => Kind::DidSet,
            b'r' => Kind::ReadAccessor,
            b'M' => Kind::ModifyAccessor,
            b'a' => match self.scanner.consume()? {
                b'O' => Kind::OwningMutableAddressor,
                b'o' => Kind::NativeOwningMutableAddressor,
                b'P' => Kind::NativePinningMutableAddressor,
                b'u' => Kind::UnsafeMutableAddressor,
                _ => return Err(Error::Structural),
            },
            b'l' => match self.scanner.consume()? {
                b'O' => Kind::OwningAddressor,
                b'o' => Kind::NativeOwningAddressor,
                b'p' => Kind::NativePinningAddressor,
                b'u' => Kind::UnsafeAddressor,
                _ => return Err(Error::Structural),
            },
            // pseudo accessor referring to the storage itself
            b'p' => return Ok(storage),
            _ => return Err(Error::Structural),
        };

        Ok(Node::with_child(kind, storage))
    }

    fn demangle_function_entity(&mut self) -> Result<Node> {
        enum Args {
            None,
            TypeAndMaybePrivateName,
            TypeAndIndex,
            Index,
        }

        let (args, kind) = match self.scanner.consume()? {
            b'D' => (Args::None, Kind::Deallocator),
            b'd' => (Args::None, Kind::Destructor),
            b'E' => (Args::None, Kind::IVarDestroyer),
            b'e' => (Args::None, Kind::IVarInitializer),
            b'i' => (Args::None, Kind::Initializer),
            b'C' => (Args::TypeAndMaybePrivateName, Kind::Allocator),
            b'c' => (Args::TypeAndMaybePrivateName, Kind::Constructor),
            b'U' => (Args::TypeAndIndex, Kind::ExplicitClosure),
            b'u' => (Args::TypeAndIndex, Kind::ImplicitClosure),
            b'A' => (Args::Index, Kind::DefaultArgumentInitializer),
            b'p' => return self.demangle_entity(Kind::GenericTypeParamDecl),
            _ => return Err(Error::Structural),
        };

        let mut children = Vec::new();
        match args {
            Args::None => {}
            Args::TypeAndMaybePrivateName => {
                let private_name = self.pop_kind(Kind::PrivateDeclName);
                let ty = self.require_kind(Kind::Type)?;
                if let Some(labels) = self.pop_function_param_labels(&ty)? {
                    children.push(labels);
                }

                children.push(ty);
                if let Some(private_name) = private_name {
                    children.push(private_name);
                }
            }
            Args::TypeAndIndex => {
                let index = self.demangle_index_as_node()?;
                let ty = self.require_kind(Kind::Type)?;
                children.push(index);
                children.push(ty);
            }
            Args::Index => children.push(self.demangle_index_as_node()?),
        }

        children.insert(0, self.pop_context()?);
        Ok(Node::with_children(kind, children))
    }

    fn demangle_entity(&mut self, kind: Kind) -> Result<Node> {
        let ty = self.require_kind(Kind::Type)?;
        let labels = self.pop_function_param_labels(&ty)?;
        let name = self.require_if(Kind::is_decl_name)?;
        let context = self.pop_context()?;

        let mut entity = Node::with_children(kind, vec![context, name]);
        if let Some(labels) = labels {
            entity.push(labels);
        }

        entity.push(ty);
        Ok(entity)
    }

    fn demangle_variable(&mut self) -> Result<Node> {
        let variable = self.demangle_entity(Kind::Variable)?;
        self.demangle_accessor(variable)
    }

    fn demangle_subscript(&mut self) -> Result<Node> {
        let private_name = self.pop_kind(Kind::PrivateDeclName);
        let ty = self.require_kind(Kind::Type)?;
        let labels = self
            .pop_function_param_labels(&ty)?
            .ok_or(Error::Structural)?;
        let context = self.pop_context()?;

        let mut subscript = Node::with_children(Kind::Subscript, vec![context, labels, ty]);
        if let Some(private_name) = private_name {
            subscript.push(private_name);
        }

        self.demangle_accessor(subscript)
    }

    fn demangle_protocol_list(&mut self) -> Result<Node> {
        let mut protocols = Vec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();
                protocols.push(self.pop_protocol()?);
                if first {
                    break;
                }
            }

            protocols.reverse();
        }

        Ok(Node::with_child(
            Kind::ProtocolList,
            Node::with_children(Kind::TypeList, protocols),
        ))
    }

    fn demangle_protocol_list_type(&mut self) -> Result<Node> {
        Ok(Node::with_child(Kind::Type, self.demangle_protocol_list()?))
    }

    fn demangle_generic_signature(&mut self, has_param_counts: bool) -> Result<Node> {
        let mut signature = Node::new(Kind::DependentGenericSignature);
        if has_param_counts {
            while !self.scanner.next_if(b'l') {
                let count = if self.scanner.next_if(b'z') {
                    0
                } else {
                    self.demangle_index()?.checked_add(1).ok_or(Error::Overflow)?
                };

                signature.push(Node::with_index(Kind::DependentGenericParamCount, count));
            }
        } else {
            signature.push(Node::with_index(Kind::DependentGenericParamCount, 1));
        }

        let mut requirements = Vec::new();
        while let Some(requirement) = self.pop_if(Kind::is_requirement) {
            requirements.push(requirement);
        }

        requirements.reverse();
        signature.extend(requirements);
        Ok(signature)
    }

    fn demangle_generic_requirement(&mut self) -> Result<Node> {
        enum Subject {
            Generic,
            Assoc,
            CompoundAssoc,
            Substitution,
        }

        enum Constraint {
            Protocol,
            BaseClass,
            SameType,
            Layout,
        }

        let (constraint, subject) = match self.scanner.consume()? {
            b'c' => (Constraint::BaseClass, Subject::Assoc),
            b'C' => (Constraint::BaseClass, Subject::CompoundAssoc),
            b'b' => (Constraint::BaseClass, Subject::Generic),
            b'B' => (Constraint::BaseClass, Subject::Substitution),
            b't' => (Constraint::SameType, Subject::Assoc),
            b'T' => (Constraint::SameType, Subject::CompoundAssoc),
            b's' => (Constraint::SameType, Subject::Generic),
            b'S' => (Constraint::SameType, Subject::Substitution),
            b'm' => (Constraint::Layout, Subject::Assoc),
            b'M' => (Constraint::Layout, Subject::CompoundAssoc),
            b'l' => (Constraint::Layout, Subject::Generic),
            b'L' => (Constraint::Layout, Subject::Substitution),
            b'p' => (Constraint::Protocol, Subject::Assoc),
            b'P' => (Constraint::Protocol, Subject::CompoundAssoc),
            b'Q' => (Constraint::Protocol, Subject::Substitution),
            _ => {
                self.scanner.backtrack()?;
                (Constraint::Protocol, Subject::Generic)
            }
        };

        let constrained = match subject {
            Subject::Generic => Node::with_child(Kind::Type, self.demangle_generic_param_index()?),
            Subject::Assoc => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_simple(param)?;
                self.add_substitution(&ty);
                ty
            }
            Subject::CompoundAssoc => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_compound(param)?;
                self.add_substitution(&ty);
                ty
            }
            Subject::Substitution => self.require_kind(Kind::Type)?,
        };

        match constraint {
            Constraint::Protocol => Ok(Node::with_children(
                Kind::DependentGenericConformanceRequirement,
                vec![constrained, self.pop_protocol()?],
            )),
            Constraint::BaseClass => Ok(Node::with_children(
                Kind::DependentGenericConformanceRequirement,
                vec![constrained, self.require_kind(Kind::Type)?],
            )),
            Constraint::SameType => Ok(Node::with_children(
                Kind::DependentGenericSameTypeRequirement,
                vec![constrained, self.require_kind(Kind::Type)?],
            )),
            Constraint::Layout => {
                let c = self.scanner.consume()?;
                let (size, alignment) = match c {
                    b'U' | b'R' | b'N' | b'C' | b'D' | b'T' => (None, None),
                    b'E' | b'M' => {
                        let size = self.demangle_index_as_node()?;
                        let alignment = self.demangle_index_as_node()?;
                        (Some(size), Some(alignment))
                    }
                    b'e' | b'm' => (Some(self.demangle_index_as_node()?), None),
                    _ => return Err(Error::Structural),
                };

                let name = Node::with_text(Kind::Identifier, (c as char).to_string());
                let mut requirement = Node::with_children(
                    Kind::DependentGenericLayoutRequirement,
                    vec![constrained, name],
                );

                requirement.extend(size);
                requirement.extend(alignment);
                Ok(requirement)
            }
        }
    }

    fn demangle_generic_type(&mut self) -> Result<Node> {
        let signature = self.require_kind(Kind::DependentGenericSignature)?;
        let ty = self.require_kind(Kind::Type)?;
        Ok(type_node(Kind::DependentGenericType, vec![signature, ty]))
    }

    fn demangle_value_witness(&mut self) -> Result<Node> {
        let code = [self.scanner.consume()?, self.scanner.consume()?];
        let kind = ValueWitnessKind::from_code(&code).ok_or(Error::Structural)?;
        let ty = self.require_kind(Kind::Type)?;
        Ok(Node::with_children(
            Kind::ValueWitness,
            vec![Node::with_index(Kind::Index, kind as u64), ty],
        ))
    }
}
