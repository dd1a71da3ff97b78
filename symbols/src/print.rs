//! Renders a [`Node`] tree the way `swift-demangle` does.

use std::fmt;

use crate::error::{Error, Result};
use crate::node::{param_kind, Directness, Kind, Node, ParamFlags, ValueWitnessKind};

/// Deepest nesting of nodes the printer descends into.
const MAX_DEPTH: u32 = 512;

/// Modules generated by the debugger for evaluated expressions.
const LLDB_EXPRESSIONS_MODULE_PREFIX: &str = "__lldb_expr_";

/// Upper bound of generic parameters printed per depth of a signature.
const MAX_PRINTED_GENERIC_PARAMS: u64 = 128;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DemangleOptions: u32 {
        /// `[T]` instead of `Swift.Array<T>`, `T?` instead of `Swift.Optional<T>`.
        const SYNTHESIZE_SUGAR_ON_TYPES = 1;
        const DISPLAY_DEBUGGER_GENERATED_MODULE = 1 << 1;
        /// Prefix entities with their context, `M.S.f()` instead of `f()`.
        const QUALIFY_ENTITIES = 1 << 2;
        const DISPLAY_EXTENSION_CONTEXTS = 1 << 3;
        const DISPLAY_UNMANGLED_SUFFIX = 1 << 4;
        const DISPLAY_MODULE_NAMES = 1 << 5;
        const DISPLAY_GENERIC_SPECIALIZATIONS = 1 << 6;
        const DISPLAY_PROTOCOL_CONFORMANCES = 1 << 7;
        const DISPLAY_WHERE_CLAUSES = 1 << 8;
        const DISPLAY_ENTITY_TYPES = 1 << 9;
        const SHORTEN_PARTIAL_APPLY = 1 << 10;
        const SHORTEN_THUNK = 1 << 11;
        const SHORTEN_VALUE_WITNESS = 1 << 12;
        const SHORTEN_ARCHETYPE = 1 << 13;
        const SHOW_PRIVATE_DISCRIMINATORS = 1 << 14;
        const SHOW_FUNCTION_ARGUMENT_TYPES = 1 << 15;
    }
}

impl Default for DemangleOptions {
    fn default() -> Self {
        Self::DISPLAY_DEBUGGER_GENERATED_MODULE
            | Self::QUALIFY_ENTITIES
            | Self::DISPLAY_EXTENSION_CONTEXTS
            | Self::DISPLAY_UNMANGLED_SUFFIX
            | Self::DISPLAY_MODULE_NAMES
            | Self::DISPLAY_GENERIC_SPECIALIZATIONS
            | Self::DISPLAY_PROTOCOL_CONFORMANCES
            | Self::DISPLAY_WHERE_CLAUSES
            | Self::DISPLAY_ENTITY_TYPES
            | Self::SHOW_PRIVATE_DISCRIMINATORS
            | Self::SHOW_FUNCTION_ARGUMENT_TYPES
    }
}

impl DemangleOptions {
    /// Short output without types, conformances or module names.
    pub fn simplified() -> Self {
        Self::SYNTHESIZE_SUGAR_ON_TYPES
            | Self::QUALIFY_ENTITIES
            | Self::SHORTEN_PARTIAL_APPLY
            | Self::SHORTEN_THUNK
            | Self::SHORTEN_VALUE_WITNESS
            | Self::SHORTEN_ARCHETYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sugar {
    None,
    Optional,
    ImplicitlyUnwrappedOptional,
    Array,
    Dictionary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypePrinting {
    NoType,
    WithColon,
    FunctionStyle,
}

/// How an entity's name is printed.
struct EntityName<'a> {
    has_name: bool,
    extra_name: &'a str,
    extra_index: Option<u64>,
    overwrite_name: &'a str,
}

impl<'a> EntityName<'a> {
    fn named() -> Self {
        Self {
            has_name: true,
            extra_name: "",
            extra_index: None,
            overwrite_name: "",
        }
    }

    fn extra(extra_name: &'a str) -> Self {
        Self {
            has_name: false,
            extra_name,
            extra_index: None,
            overwrite_name: "",
        }
    }
}

/// Name of a generic parameter: `A` to `Z` for the index, followed by the
/// depth if it's not the outermost one.
pub fn generic_param_name(depth: u64, index: u64) -> String {
    let mut name = String::new();
    let mut idx = index;
    loop {
        name.push((b'A' + (idx % 26) as u8) as char);
        idx /= 26;
        if idx == 0 {
            break;
        }
    }

    if depth != 0 {
        name += &depth.to_string();
    }

    name
}

/// Whether a type prints without parentheses in postfix positions like
/// `T?` or `T.Type`.
fn is_simple_type(node: &Node) -> bool {
    match node.kind() {
        Kind::AssociatedType
        | Kind::AssociatedTypeRef
        | Kind::BoundGenericClass
        | Kind::BoundGenericEnum
        | Kind::BoundGenericStructure
        | Kind::BoundGenericProtocol
        | Kind::BoundGenericOtherNominalType
        | Kind::BoundGenericTypeAlias
        | Kind::BoundGenericFunction
        | Kind::BuiltinTypeName
        | Kind::Class
        | Kind::DependentGenericType
        | Kind::DependentMemberType
        | Kind::DependentGenericParamType
        | Kind::DynamicSelf
        | Kind::Enum
        | Kind::ErrorType
        | Kind::ExistentialMetatype
        | Kind::Metatype
        | Kind::MetatypeRepresentation
        | Kind::Module
        | Kind::Tuple
        | Kind::Protocol
        | Kind::ProtocolSymbolicReference
        | Kind::ReturnType
        | Kind::SILBoxType
        | Kind::SILBoxTypeWithLayout
        | Kind::Structure
        | Kind::OtherNominalType
        | Kind::TupleElementName
        | Kind::Type
        | Kind::TypeAlias
        | Kind::TypeList
        | Kind::LabelList
        | Kind::TypeSymbolicReference
        | Kind::SugaredOptional
        | Kind::SugaredArray
        | Kind::SugaredDictionary
        | Kind::SugaredParen => true,
        Kind::ProtocolList => node
            .children()
            .first()
            .map_or(true, |list| list.children().len() <= 1),
        Kind::ProtocolListWithAnyObject => node
            .children()
            .first()
            .and_then(|protocols| protocols.children().first())
            .map_or(true, |list| list.children().is_empty()),
        _ => false,
    }
}

fn is_existential_type(node: &Node) -> bool {
    matches!(
        node.kind(),
        Kind::ExistentialMetatype
            | Kind::ProtocolList
            | Kind::ProtocolListWithClass
            | Kind::ProtocolListWithAnyObject
    )
}

fn need_space_before_type(node: &Node) -> bool {
    match node.kind() {
        Kind::Type => node.children().first().map_or(true, need_space_before_type),
        Kind::FunctionType
        | Kind::NoEscapeFunctionType
        | Kind::UncurriedFunctionType
        | Kind::DependentGenericType => false,
        _ => true,
    }
}

fn find_sugar(node: &Node) -> Sugar {
    if node.kind() == Kind::Type && node.children().len() == 1 {
        return find_sugar(&node.children()[0]);
    }

    if node.children().len() != 2 {
        return Sugar::None;
    }

    if !matches!(node.kind(), Kind::BoundGenericEnum | Kind::BoundGenericStructure) {
        return Sugar::None;
    }

    let unbound = match node.children()[0].children().first() {
        Some(unbound) => unbound,
        None => return Sugar::None,
    };

    let (module, name) = match unbound.children() {
        [module, name, ..] => (module, name),
        _ => return Sugar::None,
    };

    if !module.is_swift_module() {
        return Sugar::None;
    }

    let args = node.children()[1].children().len();
    if node.kind() == Kind::BoundGenericEnum {
        if name.is_identifier("Optional") && args == 1 {
            return Sugar::Optional;
        }

        if name.is_identifier("ImplicitlyUnwrappedOptional") && args == 1 {
            return Sugar::ImplicitlyUnwrappedOptional;
        }

        return Sugar::None;
    }

    if name.is_identifier("Array") && args == 1 {
        return Sugar::Array;
    }

    if name.is_identifier("Dictionary") && args == 2 {
        return Sugar::Dictionary;
    }

    Sugar::None
}

/// Writes `text` as a quoted string literal.
fn write_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A mangled name embedded in a specialization, printed demangled if it is
/// one.
fn demangled_or_raw(text: &str) -> String {
    crate::demangle(text)
        .and_then(|node| print(&node))
        .unwrap_or_else(|_| text.to_string())
}

pub struct Printer {
    out: String,
    options: DemangleOptions,
    specialization_prefix_printed: bool,
    depth: u32,
}

impl Printer {
    pub fn new(options: DemangleOptions) -> Self {
        Self {
            out: String::with_capacity(128),
            options,
            specialization_prefix_printed: false,
            depth: 0,
        }
    }

    /// Print `root`, consuming the printer.
    pub fn finish(mut self, root: &Node) -> Result<String> {
        self.print(root)?;
        Ok(self.out)
    }

    #[inline]
    fn has(&self, option: DemangleOptions) -> bool {
        self.options.contains(option)
    }

    #[inline]
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    #[inline]
    fn push_num(&mut self, num: u64) {
        self.out.push_str(&num.to_string());
    }

    fn print(&mut self, node: &Node) -> Result<()> {
        self.print_node(node, false).map(|_| ())
    }

    fn print_child(&mut self, node: &Node, idx: usize) -> Result<()> {
        self.print(node.child(idx)?)
    }

    fn print_children(&mut self, node: &Node, separator: Option<&str>) -> Result<()> {
        let count = node.children().len();
        for (idx, child) in node.children().iter().enumerate() {
            self.print(child)?;
            if let Some(separator) = separator {
                if idx + 1 != count {
                    self.push(separator);
                }
            }
        }

        Ok(())
    }

    fn prefixed(&mut self, prefix: &str, node: &Node) -> Result<Option<&'static Node>> {
        self.push(prefix);
        self.print_child(node, 0)?;
        Ok(None)
    }

    /// Print `node`, returning a context that still has to be printed in
    /// postfix form (`<entity> in <context>`).
    fn print_node<'n>(&mut self, node: &'n Node, as_prefix_context: bool) -> Result<Option<&'n Node>> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooMuchRecursion);
        }

        self.depth += 1;
        let result = self.print_kind(node, as_prefix_context);
        self.depth -= 1;
        result
    }

    fn print_kind<'n>(&mut self, node: &'n Node, as_prefix_context: bool) -> Result<Option<&'n Node>> {
        match node.kind() {
            Kind::Static => return self.prefixed("static ", node),
            Kind::CurryThunk => return self.prefixed("curry thunk of ", node),
            Kind::DispatchThunk => return self.prefixed("dispatch thunk of ", node),
            Kind::MethodDescriptor => return self.prefixed("method descriptor for ", node),
            Kind::MethodLookupFunction => return self.prefixed("method lookup function for ", node),
            Kind::ObjCMetadataUpdateFunction => {
                return self.prefixed("ObjC metadata update function for ", node)
            }
            Kind::ObjCResilientClassStub => {
                return self.prefixed("ObjC resilient class stub for ", node)
            }
            Kind::FullObjCResilientClassStub => {
                return self.prefixed("full ObjC resilient class stub for ", node)
            }
            Kind::OutlinedBridgedMethod => {
                self.push("outlined bridged method (");
                self.push(node.require_text()?);
                self.push(") of ");
            }
            Kind::OutlinedCopy | Kind::OutlinedConsume => {
                self.push(match node.kind() {
                    Kind::OutlinedCopy => "outlined copy of ",
                    _ => "outlined consume of ",
                });
                self.print_child(node, 0)?;
                if let Some(extra) = node.children().get(1) {
                    self.print(extra)?;
                }
            }
            Kind::OutlinedRetain => return self.prefixed("outlined retain of ", node),
            Kind::OutlinedRelease => return self.prefixed("outlined release of ", node),
            Kind::OutlinedInitializeWithTake => {
                return self.prefixed("outlined init with take of ", node)
            }
            Kind::OutlinedInitializeWithCopy => {
                return self.prefixed("outlined init with copy of ", node)
            }
            Kind::OutlinedAssignWithTake => {
                return self.prefixed("outlined assign with take of ", node)
            }
            Kind::OutlinedAssignWithCopy => {
                return self.prefixed("outlined assign with copy of ", node)
            }
            Kind::OutlinedDestroy => return self.prefixed("outlined destroy of ", node),
            Kind::OutlinedVariable => {
                self.push("outlined variable #");
                self.push_num(node.require_index()?);
                self.push(" of ");
            }
            Kind::Directness => {
                let directness =
                    Directness::from_index(node.require_index()?).ok_or(Error::Structural)?;
                self.push(directness.as_str());
                self.push(" ");
            }
            Kind::AnonymousContext => {
                if self.has(DemangleOptions::QUALIFY_ENTITIES)
                    && self.has(DemangleOptions::DISPLAY_EXTENSION_CONTEXTS)
                {
                    self.print_child(node, 1)?;
                    self.push(".(unknown context at ");
                    self.print_child(node, 0)?;
                    self.push(")");
                    if let Some(params) = node.children().get(2) {
                        if !params.children().is_empty() {
                            self.push("<");
                            self.print(params)?;
                            self.push(">");
                        }
                    }
                }
            }
            Kind::Extension => {
                if !matches!(node.children().len(), 2 | 3) {
                    return Err(Error::Structural);
                }

                if self.has(DemangleOptions::QUALIFY_ENTITIES)
                    && self.has(DemangleOptions::DISPLAY_EXTENSION_CONTEXTS)
                {
                    self.push("(extension in ");
                    self.print_node(node.child(0)?, true)?;
                    self.push("):");
                }

                self.print_child(node, 1)?;
                if let Some(signature) = node.children().get(2) {
                    self.print(signature)?;
                }
            }
            Kind::Variable => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::WithColon,
                    EntityName::named(),
                )
            }
            Kind::Function | Kind::BoundGenericFunction => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::FunctionStyle,
                    EntityName::named(),
                )
            }
            Kind::Subscript => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::FunctionStyle,
                    EntityName {
                        has_name: false,
                        extra_name: "",
                        extra_index: None,
                        overwrite_name: "subscript",
                    },
                )
            }
            Kind::GenericTypeParamDecl => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::named(),
                )
            }
            Kind::ExplicitClosure | Kind::ImplicitClosure => {
                let type_printing = if self.has(DemangleOptions::SHOW_FUNCTION_ARGUMENT_TYPES) {
                    TypePrinting::FunctionStyle
                } else {
                    TypePrinting::NoType
                };

                let extra_name = match node.kind() {
                    Kind::ExplicitClosure => "closure #",
                    _ => "implicit closure #",
                };

                let index = node.child(1)?.require_index()?;
                return self.print_entity(
                    node,
                    as_prefix_context,
                    type_printing,
                    EntityName {
                        has_name: false,
                        extra_name,
                        extra_index: Some(index + 1),
                        overwrite_name: "",
                    },
                );
            }
            Kind::Global => self.print_children(node, None)?,
            Kind::Suffix => {
                if self.has(DemangleOptions::DISPLAY_UNMANGLED_SUFFIX) {
                    self.push(" with unmangled suffix ");
                    write_quoted(&mut self.out, node.require_text()?);
                }
            }
            Kind::Initializer => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::extra("variable initialization expression"),
                )
            }
            Kind::DefaultArgumentInitializer => {
                let index = node.child(1)?.require_index()?;
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName {
                        has_name: false,
                        extra_name: "default argument ",
                        extra_index: Some(index),
                        overwrite_name: "",
                    },
                );
            }
            Kind::DeclContext | Kind::Type => self.print_child(node, 0)?,
            Kind::TypeMangling => {
                let first = node.child(0)?;
                if first.kind() == Kind::LabelList {
                    let func = node.child(1)?.child(0)?;
                    self.print_function_type(Some(first), func)?;
                } else {
                    self.print(first)?;
                }
            }
            Kind::Class
            | Kind::Structure
            | Kind::Enum
            | Kind::Protocol
            | Kind::TypeAlias
            | Kind::OtherNominalType => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::named(),
                )
            }
            Kind::LocalDeclName => {
                self.print_child(node, 1)?;
                self.push(" #");
                self.push_num(node.child(0)?.require_index()? + 1);
            }
            Kind::PrivateDeclName => {
                let discriminators = self.has(DemangleOptions::SHOW_PRIVATE_DISCRIMINATORS);
                let discriminator = node.child(0)?.require_text()?;
                if node.children().len() > 1 {
                    if discriminators {
                        self.push("(");
                    }

                    self.print_child(node, 1)?;

                    if discriminators {
                        self.push(" in ");
                        self.push(discriminator);
                        self.push(")");
                    }
                } else if discriminators {
                    self.push("(in ");
                    self.push(discriminator);
                    self.push(")");
                }
            }
            Kind::RelatedEntityDeclName => {
                self.push("related decl '");
                self.push(node.child(0)?.require_text()?);
                self.push("' for ");
                self.print_child(node, 1)?;
            }
            Kind::Module => {
                if self.has(DemangleOptions::DISPLAY_MODULE_NAMES) {
                    self.push(node.require_text()?);
                }
            }
            Kind::Identifier | Kind::BuiltinTypeName | Kind::MetatypeRepresentation => {
                self.push(node.require_text()?);
            }
            Kind::Index | Kind::Number | Kind::SpecializationPassID => {
                self.push_num(node.require_index()?);
            }
            Kind::UnknownIndex => self.push("unknown index"),
            Kind::NoEscapeFunctionType | Kind::FunctionType | Kind::UncurriedFunctionType => {
                self.print_function_type(None, node)?;
            }
            Kind::EscapingAutoClosureType | Kind::AutoClosureType => {
                self.push("@autoclosure ");
                self.print_function_type(None, node)?;
            }
            Kind::ThinFunctionType => {
                self.push("@convention(thin) ");
                self.print_function_type(None, node)?;
            }
            Kind::CFunctionPointer => {
                self.push("@convention(c) ");
                self.print_function_type(None, node)?;
            }
            Kind::ObjCBlock => {
                self.push("@convention(block) ");
                self.print_function_type(None, node)?;
            }
            Kind::ArgumentTuple => {
                let show_types = self.has(DemangleOptions::SHOW_FUNCTION_ARGUMENT_TYPES);
                self.print_function_parameters(None, node, show_types)?;
            }
            Kind::Tuple => {
                self.push("(");
                self.print_children(node, Some(", "))?;
                self.push(")");
            }
            Kind::TupleElement => {
                if let Some(label) = node.child_of_kind(Kind::TupleElementName) {
                    self.push(label.require_text()?);
                    self.push(": ");
                }

                let ty = node.child_of_kind(Kind::Type).ok_or(Error::Structural)?;
                self.print(ty)?;

                if node.child_of_kind(Kind::VariadicMarker).is_some() {
                    self.push("...");
                }
            }
            Kind::TupleElementName => {
                self.push(node.require_text()?);
                self.push(": ");
            }
            Kind::ReturnType => {
                self.push(" -> ");
                if node.children().is_empty() {
                    self.push(node.text().unwrap_or_default());
                } else {
                    self.print_children(node, None)?;
                }
            }
            Kind::RetroactiveConformance => {
                if node.children().len() == 2 {
                    self.push("retroactive @ ");
                    self.print_children(node, None)?;
                }
            }
            Kind::Weak => {
                self.push("weak ");
                self.print_children(node, None)?;
            }
            Kind::Unowned => {
                self.push("unowned ");
                self.print_children(node, None)?;
            }
            Kind::Unmanaged => {
                self.push("unowned(unsafe) ");
                self.print_children(node, None)?;
            }
            Kind::InOut => return self.prefixed("inout ", node),
            Kind::Shared => return self.prefixed("__shared ", node),
            Kind::Owned => return self.prefixed("__owned ", node),
            Kind::NonObjCAttribute => self.push("@nonobjc "),
            Kind::ObjCAttribute => self.push("@objc "),
            Kind::DirectMethodReferenceAttribute => self.push("super "),
            Kind::DynamicAttribute => self.push("dynamic "),
            Kind::VTableAttribute => self.push("override "),
            Kind::FunctionSignatureSpecialization => {
                self.print_specialization_prefix(node, "function signature specialization", "")?;
            }
            Kind::GenericPartialSpecialization => {
                self.print_specialization_prefix(
                    node,
                    "generic partial specialization",
                    "Signature = ",
                )?;
            }
            Kind::GenericPartialSpecializationNotReAbstracted => {
                self.print_specialization_prefix(
                    node,
                    "generic not-reabstracted partial specialization",
                    "Signature = ",
                )?;
            }
            Kind::GenericSpecialization => {
                self.print_specialization_prefix(node, "generic specialization", "")?;
            }
            Kind::GenericSpecializationNotReAbstracted => {
                self.print_specialization_prefix(
                    node,
                    "generic not re-abstracted specialization",
                    "",
                )?;
            }
            Kind::InlinedGenericFunction => {
                self.print_specialization_prefix(node, "inlined generic function", "")?;
            }
            Kind::IsSerialized => self.push("serialized"),
            Kind::GenericSpecializationParam => {
                self.print_child(node, 0)?;
                for (idx, child) in node.children().iter().enumerate().skip(1) {
                    self.push(if idx == 1 { " with " } else { " and " });
                    self.print(child)?;
                }
            }
            Kind::FunctionSignatureSpecializationParam
            | Kind::FunctionSignatureSpecializationReturn => {
                // only valid inside of a specialization prefix
                return Err(Error::Structural);
            }
            Kind::FunctionSignatureSpecializationParamPayload => {
                let payload = demangled_or_raw(node.require_text()?);
                self.push(&payload);
            }
            Kind::FunctionSignatureSpecializationParamKind => {
                self.print_param_kind(node.require_index()?)?;
            }
            Kind::InfixOperator => {
                self.push(node.require_text()?);
                self.push(" infix");
            }
            Kind::PrefixOperator => {
                self.push(node.require_text()?);
                self.push(" prefix");
            }
            Kind::PostfixOperator => {
                self.push(node.require_text()?);
                self.push(" postfix");
            }
            Kind::LazyProtocolWitnessTableAccessor | Kind::LazyProtocolWitnessTableCacheVariable => {
                self.push(match node.kind() {
                    Kind::LazyProtocolWitnessTableAccessor => {
                        "lazy protocol witness table accessor for type "
                    }
                    _ => "lazy protocol witness table cache variable for type ",
                });
                self.print_child(node, 0)?;
                self.push(" and conformance ");
                self.print_child(node, 1)?;
            }
            Kind::ProtocolSelfConformanceWitnessTable => {
                return self.prefixed("protocol self-conformance witness table for ", node)
            }
            Kind::ProtocolWitnessTableAccessor => {
                return self.prefixed("protocol witness table accessor for ", node)
            }
            Kind::ProtocolWitnessTable => return self.prefixed("protocol witness table for ", node),
            Kind::ProtocolWitnessTablePattern => {
                return self.prefixed("protocol witness table pattern for ", node)
            }
            Kind::GenericProtocolWitnessTable => {
                return self.prefixed("generic protocol witness table for ", node)
            }
            Kind::GenericProtocolWitnessTableInstantiationFunction => {
                return self.prefixed(
                    "instantiation function for generic protocol witness table for ",
                    node,
                )
            }
            Kind::ResilientProtocolWitnessTable => {
                return self.prefixed("resilient protocol witness table for ", node)
            }
            Kind::VTableThunk => {
                self.push("vtable thunk for ");
                self.print_child(node, 1)?;
                self.push(" dispatching to ");
                self.print_child(node, 0)?;
            }
            Kind::ProtocolSelfConformanceWitness => {
                return self.prefixed("protocol self-conformance witness for ", node)
            }
            Kind::ProtocolWitness => {
                self.push("protocol witness for ");
                self.print_child(node, 1)?;
                self.push(" in conformance ");
                self.print_child(node, 0)?;
            }
            Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder => {
                if self.has(DemangleOptions::SHORTEN_PARTIAL_APPLY) {
                    self.push("partial apply");
                } else if node.kind() == Kind::PartialApplyForwarder {
                    self.push("partial apply forwarder");
                } else {
                    self.push("partial apply ObjC forwarder");
                }

                if let Some(target) = node.children().first() {
                    self.push(" for ");
                    self.print(target)?;
                }
            }
            Kind::KeyPathGetterThunkHelper | Kind::KeyPathSetterThunkHelper => {
                self.push(match node.kind() {
                    Kind::KeyPathGetterThunkHelper => "key path getter for ",
                    _ => "key path setter for ",
                });

                self.print_child(node, 0)?;
                self.push(" : ");
                for child in node.children().iter().skip(1) {
                    if child.kind() == Kind::IsSerialized {
                        self.push(", ");
                    }
                    self.print(child)?;
                }
            }
            Kind::KeyPathEqualsThunkHelper | Kind::KeyPathHashThunkHelper => {
                self.print_key_path_index_helper(node)?;
            }
            Kind::FieldOffset => {
                self.print_child(node, 0)?;
                self.push("field offset for ");
                self.print_node(node.child(1)?, false)?;
            }
            Kind::EnumCase => {
                self.push("enum case for ");
                self.print_node(node.child(0)?, false)?;
            }
            Kind::ReabstractionThunk | Kind::ReabstractionThunkHelper => {
                if self.has(DemangleOptions::SHORTEN_THUNK) {
                    self.push("thunk for ");
                    let last = node.children().last().ok_or(Error::Structural)?;
                    self.print(last)?;
                    return Ok(None);
                }

                self.push("reabstraction thunk ");
                if node.kind() == Kind::ReabstractionThunkHelper {
                    self.push("helper ");
                }

                let mut idx = 0;
                if node.children().len() == 3 {
                    self.print_child(node, 0)?;
                    self.push(" ");
                    idx = 1;
                }

                self.push("from ");
                self.print_child(node, idx + 1)?;
                self.push(" to ");
                self.print_child(node, idx)?;
            }
            Kind::ReabstractionThunkHelperWithSelf => {
                self.push("reabstraction thunk ");
                let mut idx = 0;
                if node.children().len() == 4 {
                    self.print_child(node, 0)?;
                    self.push(" ");
                    idx = 1;
                }

                self.push("from ");
                self.print_child(node, idx + 2)?;
                self.push(" to ");
                self.print_child(node, idx + 1)?;
                self.push(" self ");
                self.print_child(node, idx)?;
            }
            Kind::MergedFunction => {
                if !self.has(DemangleOptions::SHORTEN_THUNK) {
                    self.push("merged ");
                }
            }
            Kind::TypeSymbolicReference => {
                self.push("type symbolic reference 0x");
                self.push(&format!("{:X}", node.require_index()? as u32));
            }
            Kind::OpaqueTypeDescriptorSymbolicReference => {
                self.push("opaque type symbolic reference 0x");
                self.push(&format!("{:X}", node.require_index()? as u32));
            }
            Kind::ProtocolSymbolicReference => {
                self.push("protocol symbolic reference 0x");
                self.push(&format!("{:X}", node.require_index()? as u32));
            }
            Kind::DynamicallyReplaceableFunctionKey => {
                if !self.has(DemangleOptions::SHORTEN_THUNK) {
                    self.push("dynamically replaceable key for ");
                }
            }
            Kind::DynamicallyReplaceableFunctionImpl => {
                if !self.has(DemangleOptions::SHORTEN_THUNK) {
                    self.push("dynamically replaceable thunk for ");
                }
            }
            Kind::DynamicallyReplaceableFunctionVar => {
                if !self.has(DemangleOptions::SHORTEN_THUNK) {
                    self.push("dynamically replaceable variable for ");
                }
            }
            Kind::GenericTypeMetadataPattern => {
                return self.prefixed("generic type metadata pattern for ", node)
            }
            Kind::Metaclass => return self.prefixed("metaclass for ", node),
            Kind::ProtocolSelfConformanceDescriptor => {
                return self.prefixed("protocol self-conformance descriptor for ", node)
            }
            Kind::ProtocolConformanceDescriptor => {
                return self.prefixed("protocol conformance descriptor for ", node)
            }
            Kind::ProtocolDescriptor => return self.prefixed("protocol descriptor for ", node),
            Kind::ProtocolRequirementsBaseDescriptor => {
                return self.prefixed("protocol requirements base descriptor for ", node)
            }
            Kind::FullTypeMetadata => return self.prefixed("full type metadata for ", node),
            Kind::TypeMetadata => return self.prefixed("type metadata for ", node),
            Kind::TypeMetadataAccessFunction => {
                return self.prefixed("type metadata accessor for ", node)
            }
            Kind::TypeMetadataInstantiationCache => {
                return self.prefixed("type metadata instantiation cache for ", node)
            }
            Kind::TypeMetadataInstantiationFunction => {
                return self.prefixed("type metadata instantiation function for ", node)
            }
            Kind::TypeMetadataSingletonInitializationCache => {
                return self.prefixed("type metadata singleton initialization cache for ", node)
            }
            Kind::TypeMetadataCompletionFunction => {
                return self.prefixed("type metadata completion function for ", node)
            }
            Kind::TypeMetadataLazyCache => {
                return self.prefixed("lazy cache variable for type metadata for ", node)
            }
            Kind::AssociatedConformanceDescriptor | Kind::DefaultAssociatedConformanceAccessor => {
                self.push(match node.kind() {
                    Kind::AssociatedConformanceDescriptor => "associated conformance descriptor for ",
                    _ => "default associated conformance accessor for ",
                });
                self.print_child(node, 0)?;
                self.push(".");
                self.print_child(node, 1)?;
                self.push(": ");
                self.print_child(node, 2)?;
            }
            Kind::AssociatedTypeDescriptor => {
                return self.prefixed("associated type descriptor for ", node)
            }
            Kind::AssociatedTypeMetadataAccessor => {
                self.push("associated type metadata accessor for ");
                self.print_child(node, 1)?;
                self.push(" in ");
                self.print_child(node, 0)?;
            }
            Kind::BaseConformanceDescriptor => {
                self.push("base conformance descriptor for ");
                self.print_child(node, 0)?;
                self.push(": ");
                self.print_child(node, 1)?;
            }
            Kind::DefaultAssociatedTypeMetadataAccessor => {
                return self.prefixed("default associated type metadata accessor for ", node)
            }
            Kind::AssociatedTypeWitnessTableAccessor => {
                self.push("associated type witness table accessor for ");
                self.print_child(node, 1)?;
                self.push(" : ");
                self.print_child(node, 2)?;
                self.push(" in ");
                self.print_child(node, 0)?;
            }
            Kind::BaseWitnessTableAccessor => {
                self.push("base witness table accessor for ");
                self.print_child(node, 1)?;
                self.push(" in ");
                self.print_child(node, 0)?;
            }
            Kind::ClassMetadataBaseOffset => {
                return self.prefixed("class metadata base offset for ", node)
            }
            Kind::PropertyDescriptor => return self.prefixed("property descriptor for ", node),
            Kind::NominalTypeDescriptor => {
                return self.prefixed("nominal type descriptor for ", node)
            }
            Kind::OpaqueTypeDescriptor => return self.prefixed("opaque type descriptor for ", node),
            Kind::OpaqueTypeDescriptorAccessor => {
                return self.prefixed("opaque type descriptor accessor for ", node)
            }
            Kind::OpaqueTypeDescriptorAccessorImpl => {
                return self.prefixed("opaque type descriptor accessor impl for ", node)
            }
            Kind::OpaqueTypeDescriptorAccessorKey => {
                return self.prefixed("opaque type descriptor accessor key for ", node)
            }
            Kind::OpaqueTypeDescriptorAccessorVar => {
                return self.prefixed("opaque type descriptor accessor var for ", node)
            }
            Kind::CoroutineContinuationPrototype => {
                return self.prefixed("coroutine continuation prototype for ", node)
            }
            Kind::ValueWitness => {
                let kind = ValueWitnessKind::from_index(node.child(0)?.require_index()?)
                    .ok_or(Error::Structural)?;
                self.push(kind.name());
                if self.has(DemangleOptions::SHORTEN_VALUE_WITNESS) {
                    self.push(" for ");
                } else {
                    self.push(" value witness for ");
                }
                self.print_child(node, 1)?;
            }
            Kind::ValueWitnessTable => return self.prefixed("value witness table for ", node),
            Kind::BoundGenericClass
            | Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericOtherNominalType
            | Kind::BoundGenericTypeAlias => self.print_bound_generic(node)?,
            Kind::DynamicSelf => self.push("Self"),
            Kind::SILBoxType => return self.prefixed("@box ", node),
            Kind::Metatype => {
                let mut idx = 0;
                if node.children().len() == 2 {
                    self.print_child(node, 0)?;
                    self.push(" ");
                    idx = 1;
                }

                let ty = node.child(idx)?.child(0)?;
                self.print_with_parens(ty)?;
                if is_existential_type(ty) {
                    self.push(".Protocol");
                } else {
                    self.push(".Type");
                }
            }
            Kind::ExistentialMetatype => {
                let mut idx = 0;
                if node.children().len() == 2 {
                    self.print_child(node, 0)?;
                    self.push(" ");
                    idx = 1;
                }

                self.print_child(node, idx)?;
                self.push(".Type");
            }
            Kind::AssociatedTypeRef => {
                self.print_child(node, 0)?;
                self.push(".");
                self.push(node.child(1)?.require_text()?);
            }
            Kind::ProtocolList => {
                if let Some(list) = node.children().first() {
                    if list.children().is_empty() {
                        self.push("Any");
                    } else {
                        self.print_children(list, Some(" & "))?;
                    }
                }
            }
            Kind::ProtocolListWithClass => {
                if node.children().len() >= 2 {
                    self.print_child(node, 1)?;
                    self.push(" & ");
                    if let Some(list) = node.children()[0].children().first() {
                        self.print_children(list, Some(" & "))?;
                    }
                }
            }
            Kind::ProtocolListWithAnyObject => {
                let list = node.children().first().and_then(|protocols| protocols.children().first());
                if let Some(list) = list {
                    if !list.children().is_empty() {
                        self.print_children(list, Some(" & "))?;
                        self.push(" & ");
                    }

                    if self.has(DemangleOptions::QUALIFY_ENTITIES) {
                        self.push("Swift.");
                    }
                    self.push("AnyObject");
                }
            }
            Kind::AssociatedType => {}
            Kind::OwningAddressor => return self.print_abstract_storage(node, as_prefix_context, "owningAddressor"),
            Kind::OwningMutableAddressor => {
                return self.print_abstract_storage(node, as_prefix_context, "owningMutableAddressor")
            }
            Kind::NativeOwningAddressor => {
                return self.print_abstract_storage(node, as_prefix_context, "nativeOwningAddressor")
            }
            Kind::NativeOwningMutableAddressor => {
                return self.print_abstract_storage(
                    node,
                    as_prefix_context,
                    "nativeOwningMutableAddressor",
                )
            }
            Kind::NativePinningAddressor => {
                return self.print_abstract_storage(node, as_prefix_context, "nativePinningAddressor")
            }
            Kind::NativePinningMutableAddressor => {
                return self.print_abstract_storage(
                    node,
                    as_prefix_context,
                    "nativePinningMutableAddressor",
                )
            }
            Kind::UnsafeAddressor => return self.print_abstract_storage(node, as_prefix_context, "unsafeAddressor"),
            Kind::UnsafeMutableAddressor => {
                return self.print_abstract_storage(node, as_prefix_context, "unsafeMutableAddressor")
            }
            Kind::GlobalGetter | Kind::Getter => {
                return self.print_abstract_storage(node, as_prefix_context, "getter")
            }
            Kind::Setter => return self.print_abstract_storage(node, as_prefix_context, "setter"),
            Kind::MaterializeForSet => {
                return self.print_abstract_storage(node, as_prefix_context, "materializeForSet")
            }
            Kind::WillSet => return self.print_abstract_storage(node, as_prefix_context, "willset"),
            Kind::DidSet => return self.print_abstract_storage(node, as_prefix_context, "didset"),
            Kind::ReadAccessor => return self.print_abstract_storage(node, as_prefix_context, "read"),
            Kind::ModifyAccessor => return self.print_abstract_storage(node, as_prefix_context, "modify"),
            Kind::Allocator => {
                let extra_name = if node.child(0)?.is_class() {
                    "__allocating_init"
                } else {
                    "init"
                };

                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::FunctionStyle,
                    EntityName::extra(extra_name),
                );
            }
            Kind::Constructor => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::FunctionStyle,
                    EntityName {
                        has_name: node.children().len() > 2,
                        extra_name: "init",
                        extra_index: None,
                        overwrite_name: "",
                    },
                )
            }
            Kind::Destructor => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::extra("deinit"),
                )
            }
            Kind::Deallocator => {
                let extra_name = if node.child(0)?.is_class() {
                    "__deallocating_deinit"
                } else {
                    "deinit"
                };

                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::extra(extra_name),
                );
            }
            Kind::IVarInitializer => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::extra("__ivar_initializer"),
                )
            }
            Kind::IVarDestroyer => {
                return self.print_entity(
                    node,
                    as_prefix_context,
                    TypePrinting::NoType,
                    EntityName::extra("__ivar_destroyer"),
                )
            }
            Kind::ProtocolConformance => {
                if node.children().len() == 4 {
                    self.push("property behavior storage of ");
                    self.print_child(node, 2)?;
                    self.push(" in ");
                    self.print_child(node, 0)?;
                    self.push(" : ");
                    self.print_child(node, 1)?;
                } else {
                    self.print_child(node, 0)?;
                    if self.has(DemangleOptions::DISPLAY_PROTOCOL_CONFORMANCES) {
                        self.push(" : ");
                        self.print_child(node, 1)?;
                        self.push(" in ");
                        self.print_child(node, 2)?;
                    }
                }
            }
            Kind::TypeList | Kind::AnyProtocolConformanceList => self.print_children(node, None)?,
            Kind::LabelList => {}
            Kind::ImplEscaping => self.push("@escaping"),
            Kind::ImplConvention | Kind::ImplFunctionAttribute => self.push(node.require_text()?),
            Kind::ImplErrorResult => {
                self.push("@error ");
                self.print_children(node, Some(" "))?;
            }
            Kind::ImplParameter | Kind::ImplResult => self.print_children(node, Some(" "))?,
            Kind::ImplFunctionType => self.print_impl_function_type(node)?,
            Kind::ErrorType => self.push("<ERROR TYPE>"),
            Kind::DependentPseudogenericSignature | Kind::DependentGenericSignature => {
                self.print_generic_signature(node)?;
            }
            Kind::DependentGenericParamCount => return Err(Error::Structural),
            Kind::DependentGenericConformanceRequirement => {
                self.print_child(node, 0)?;
                self.push(": ");
                self.print_child(node, 1)?;
            }
            Kind::DependentGenericLayoutRequirement => self.print_layout_requirement(node)?,
            Kind::DependentGenericSameTypeRequirement => {
                self.print_child(node, 0)?;
                self.push(" == ");
                self.print_child(node, 1)?;
            }
            Kind::DependentGenericParamType => {
                let depth = node.child(0)?.require_index()?;
                let index = node.child(1)?.require_index()?;
                self.push(&generic_param_name(depth, index));
            }
            Kind::DependentGenericType => {
                self.print_child(node, 0)?;
                let dependent = node.child(1)?;
                if need_space_before_type(dependent) {
                    self.push(" ");
                }
                self.print(dependent)?;
            }
            Kind::DependentMemberType => {
                self.print_child(node, 0)?;
                self.push(".");
                self.print_child(node, 1)?;
            }
            Kind::DependentAssociatedTypeRef => {
                if let Some(proto) = node.children().get(1) {
                    self.print(proto)?;
                    self.push(".");
                }
                self.push(node.child(0)?.require_text()?);
            }
            Kind::ReflectionMetadataBuiltinDescriptor => {
                return self.prefixed("reflection metadata builtin descriptor ", node)
            }
            Kind::ReflectionMetadataFieldDescriptor => {
                return self.prefixed("reflection metadata field descriptor ", node)
            }
            Kind::ReflectionMetadataAssocTypeDescriptor => {
                return self.prefixed("reflection metadata associated type descriptor ", node)
            }
            Kind::ReflectionMetadataSuperclassDescriptor => {
                return self.prefixed("reflection metadata superclass descriptor ", node)
            }
            Kind::ThrowsAnnotation => self.push(" throws "),
            Kind::EmptyList => self.push(" empty-list "),
            Kind::FirstElementMarker => self.push(" first-element-marker "),
            Kind::VariadicMarker => self.push(" variadic-marker "),
            Kind::SILBoxTypeWithLayout => self.print_sil_box_type_with_layout(node)?,
            Kind::SILBoxLayout => {
                self.push("{");
                for (idx, field) in node.children().iter().enumerate() {
                    if idx > 0 {
                        self.push(",");
                    }
                    self.push(" ");
                    self.print(field)?;
                }
                self.push(" }");
            }
            Kind::SILBoxImmutableField | Kind::SILBoxMutableField => {
                self.push(match node.kind() {
                    Kind::SILBoxImmutableField => "let ",
                    _ => "var ",
                });

                match node.children() {
                    [ty] if ty.kind() == Kind::Type => self.print(ty)?,
                    _ => return Err(Error::Structural),
                }
            }
            Kind::AssocTypePath => self.print_children(node, Some("."))?,
            Kind::ModuleDescriptor => return self.prefixed("module descriptor ", node),
            Kind::AnonymousDescriptor => return self.prefixed("anonymous descriptor ", node),
            Kind::ExtensionDescriptor => return self.prefixed("extension descriptor ", node),
            Kind::AssociatedTypeGenericParamRef => {
                self.push("generic parameter reference for associated type ");
                self.print_children(node, None)?;
            }
            Kind::ConcreteProtocolConformance => {
                self.push("concrete protocol conformance ");
                if let Some(index) = node.index() {
                    self.push("#");
                    self.push_num(index);
                    self.push(" ");
                }
                self.print_children(node, None)?;
            }
            Kind::DependentAssociatedConformance => {
                self.push("dependent associated conformance ");
                self.print_children(node, None)?;
            }
            Kind::DependentProtocolConformanceAssociated
            | Kind::DependentProtocolConformanceInherited
            | Kind::DependentProtocolConformanceRoot => {
                self.push(match node.kind() {
                    Kind::DependentProtocolConformanceAssociated => {
                        "dependent associated protocol conformance "
                    }
                    Kind::DependentProtocolConformanceInherited => {
                        "dependent inherited protocol conformance "
                    }
                    _ => "dependent root protocol conformance ",
                });

                let index = node.child(2)?;
                if let Some(index) = index.index() {
                    self.push("#");
                    self.push_num(index);
                    self.push(" ");
                }

                self.print_child(node, 0)?;
                self.print_child(node, 1)?;
            }
            Kind::ProtocolConformanceRefInTypeModule => {
                self.push("protocol conformance ref (type's module) ");
                self.print_children(node, None)?;
            }
            Kind::ProtocolConformanceRefInProtocolModule => {
                self.push("protocol conformance ref (protocol's module) ");
                self.print_children(node, None)?;
            }
            Kind::ProtocolConformanceRefInOtherModule => {
                self.push("protocol conformance ref (retroactive) ");
                self.print_children(node, None)?;
            }
            Kind::SugaredOptional => {
                self.print_with_parens(node.child(0)?)?;
                self.push("?");
            }
            Kind::SugaredArray => {
                self.push("[");
                self.print_child(node, 0)?;
                self.push("]");
            }
            Kind::SugaredDictionary => {
                self.push("[");
                self.print_child(node, 0)?;
                self.push(" : ");
                self.print_child(node, 1)?;
                self.push("]");
            }
            Kind::SugaredParen => {
                self.push("(");
                self.print_child(node, 0)?;
                self.push(")");
            }
            Kind::OpaqueReturnType => self.push("some"),
            Kind::OpaqueReturnTypeOf => {
                self.push("<<opaque return type of ");
                self.print_children(node, None)?;
                self.push(">>");
            }
            Kind::OpaqueType => {
                self.print_child(node, 0)?;
                self.push(".");
                self.print_child(node, 1)?;
            }
            Kind::AccessorFunctionReference => {
                self.push("accessor function at ");
                self.push_num(node.require_index()? & u64::from(u32::MAX));
            }
        }

        Ok(None)
    }

    fn print_with_parens(&mut self, ty: &Node) -> Result<()> {
        let needs_parens = !is_simple_type(ty);
        if needs_parens {
            self.push("(");
        }

        self.print(ty)?;

        if needs_parens {
            self.push(")");
        }

        Ok(())
    }

    fn print_context(&self, context: &Node) -> bool {
        if !self.has(DemangleOptions::QUALIFY_ENTITIES) {
            return false;
        }

        if context.kind() == Kind::Module {
            let generated = context
                .text()
                .map_or(false, |name| name.starts_with(LLDB_EXPRESSIONS_MODULE_PREFIX));

            if generated {
                return self.has(DemangleOptions::DISPLAY_DEBUGGER_GENERATED_MODULE);
            }
        }

        true
    }

    fn print_bound_generic_no_sugar(&mut self, node: &Node) -> Result<()> {
        if node.children().len() < 2 {
            return Ok(());
        }

        self.print_child(node, 0)?;
        self.push("<");
        self.print_children(&node.children()[1], Some(", "))?;
        self.push(">");
        Ok(())
    }

    fn print_bound_generic(&mut self, node: &Node) -> Result<()> {
        match node.children().len() {
            0 | 1 => return Ok(()),
            2 => {}
            _ => return self.print_bound_generic_no_sugar(node),
        }

        if !self.has(DemangleOptions::SYNTHESIZE_SUGAR_ON_TYPES) || node.kind() == Kind::BoundGenericClass {
            return self.print_bound_generic_no_sugar(node);
        }

        // the conforming type of a bound protocol is printed as the protocol
        if node.kind() == Kind::BoundGenericProtocol {
            self.print_children(node.child(1)?, None)?;
            self.push(" as ");
            return self.print_child(node, 0);
        }

        let args = node.child(1)?;
        match find_sugar(node) {
            Sugar::None => self.print_bound_generic_no_sugar(node)?,
            sugar @ (Sugar::Optional | Sugar::ImplicitlyUnwrappedOptional) => {
                self.print_with_parens(args.child(0)?)?;
                self.push(if sugar == Sugar::Optional { "?" } else { "!" });
            }
            Sugar::Array => {
                self.push("[");
                self.print_child(args, 0)?;
                self.push("]");
            }
            Sugar::Dictionary => {
                self.push("[");
                self.print_child(args, 0)?;
                self.push(" : ");
                self.print_child(args, 1)?;
                self.push("]");
            }
        }

        Ok(())
    }

    fn print_function_parameters(
        &mut self,
        labels: Option<&Node>,
        params: &Node,
        show_types: bool,
    ) -> Result<()> {
        if params.kind() != Kind::ArgumentTuple {
            return Err(Error::Structural);
        }

        let params = params.child(0)?;
        if params.kind() != Kind::Type {
            return Err(Error::Structural);
        }

        let params = params.child(0)?;
        if params.kind() != Kind::Tuple {
            // a single unnamed parameter
            if show_types {
                self.push("(");
                self.print(params)?;
                self.push(")");
            } else {
                self.push("(_:)");
            }

            return Ok(());
        }

        let labels = labels.filter(|labels| !labels.children().is_empty());

        self.push("(");
        for (idx, param) in params.children().iter().enumerate() {
            if param.kind() != Kind::TupleElement {
                return Err(Error::Structural);
            }

            if idx > 0 && show_types {
                self.push(", ");
            }

            if let Some(labels) = labels {
                let label = labels.child(idx)?;
                match label.kind() {
                    Kind::Identifier => self.push(label.require_text()?),
                    Kind::FirstElementMarker => self.push("_"),
                    _ => return Err(Error::Structural),
                }
                self.push(":");

                if show_types {
                    self.push(" ");
                }
            } else if !show_types {
                match param.child_of_kind(Kind::TupleElementName) {
                    Some(name) => {
                        self.push(name.require_text()?);
                        self.push(":");
                    }
                    None => self.push("_:"),
                }
            }

            if show_types {
                self.print(param)?;
            }
        }
        self.push(")");

        Ok(())
    }

    fn print_function_type(&mut self, labels: Option<&Node>, node: &Node) -> Result<()> {
        if !matches!(node.children().len(), 2 | 3) {
            return Err(Error::Structural);
        }

        let throws = node.child(0)?.kind() == Kind::ThrowsAnnotation;
        let start = usize::from(throws);

        let show_types = self.has(DemangleOptions::SHOW_FUNCTION_ARGUMENT_TYPES);
        self.print_function_parameters(labels, node.child(start)?, show_types)?;

        if !show_types {
            return Ok(());
        }

        if throws {
            self.push(" throws");
        }

        self.print_child(node, start + 1)
    }

    fn print_impl_function_type(&mut self, node: &Node) -> Result<()> {
        #[derive(PartialEq, PartialOrd)]
        enum State {
            Attrs,
            Inputs,
            Results,
        }

        let mut state = State::Attrs;
        let transition = |printer: &mut Self, state: &mut State, to: State| {
            if *state == State::Attrs && to > State::Attrs {
                printer.push("(");
                *state = State::Inputs;
            }

            if *state == State::Inputs && to == State::Results {
                printer.push(") -> (");
                *state = State::Results;
            }
        };

        for child in node.children() {
            match child.kind() {
                Kind::ImplParameter => {
                    if state == State::Inputs {
                        self.push(", ");
                    }
                    transition(self, &mut state, State::Inputs);
                    self.print(child)?;
                }
                Kind::ImplResult | Kind::ImplErrorResult => {
                    if state == State::Results {
                        self.push(", ");
                    }
                    transition(self, &mut state, State::Results);
                    self.print(child)?;
                }
                _ => {
                    if state != State::Attrs {
                        return Err(Error::Structural);
                    }
                    self.print(child)?;
                    self.push(" ");
                }
            }
        }

        transition(self, &mut state, State::Results);
        self.push(")");
        Ok(())
    }

    fn print_param_kind(&mut self, raw: u64) -> Result<()> {
        let flags = ParamFlags::from_bits_truncate(raw);
        let mut printed = false;
        for (flag, name) in [
            (ParamFlags::EXISTENTIAL_TO_GENERIC, "Existential To Protocol Constrained Generic"),
            (ParamFlags::DEAD, "Dead"),
            (ParamFlags::OWNED_TO_GUARANTEED, "Owned To Guaranteed"),
            (ParamFlags::GUARANTEED_TO_OWNED, "Guaranteed To Owned"),
            (ParamFlags::SROA, "Exploded"),
        ] {
            if flags.contains(flag) {
                if printed {
                    self.push(" and ");
                }
                self.push(name);
                printed = true;
            }
        }

        if printed {
            return Ok(());
        }

        self.push(match raw {
            param_kind::BOX_TO_VALUE => "Value Promoted from Box",
            param_kind::BOX_TO_STACK => "Stack Promoted from Box",
            param_kind::CONSTANT_PROP_FUNCTION => "Constant Propagated Function",
            param_kind::CONSTANT_PROP_GLOBAL => "Constant Propagated Global",
            param_kind::CONSTANT_PROP_INTEGER => "Constant Propagated Integer",
            param_kind::CONSTANT_PROP_FLOAT => "Constant Propagated Float",
            param_kind::CONSTANT_PROP_STRING => "Constant Propagated String",
            param_kind::CLOSURE_PROP => "Closure Propagated",
            _ => return Err(Error::Structural),
        });

        Ok(())
    }

    fn print_function_signature_specialization_params(&mut self, node: &Node) -> Result<()> {
        let children = node.children();
        let mut idx = 0;
        while idx < children.len() {
            let kind = children[idx].require_index()?;
            match kind {
                param_kind::BOX_TO_VALUE | param_kind::BOX_TO_STACK => {
                    self.print(&children[idx])?;
                    idx += 1;
                }
                param_kind::CONSTANT_PROP_FUNCTION | param_kind::CONSTANT_PROP_GLOBAL => {
                    self.push("[");
                    self.print(&children[idx])?;
                    self.push(" : ");
                    let payload = node.child(idx + 1)?.require_text()?;
                    self.push(&demangled_or_raw(payload));
                    self.push("]");
                    idx += 2;
                }
                param_kind::CONSTANT_PROP_INTEGER | param_kind::CONSTANT_PROP_FLOAT => {
                    self.push("[");
                    self.print(&children[idx])?;
                    self.push(" : ");
                    self.print_child(node, idx + 1)?;
                    self.push("]");
                    idx += 2;
                }
                param_kind::CONSTANT_PROP_STRING => {
                    self.push("[");
                    self.print(&children[idx])?;
                    self.push(" : ");
                    self.print_child(node, idx + 1)?;
                    self.push("'");
                    self.print_child(node, idx + 2)?;
                    self.push("']");
                    idx += 3;
                }
                param_kind::CLOSURE_PROP => {
                    self.push("[");
                    self.print(&children[idx])?;
                    self.push(" : ");
                    self.print_child(node, idx + 1)?;
                    self.push(", Argument Types : [");
                    idx += 2;

                    while let Some(child) = children.get(idx) {
                        // types follow until the next parameter
                        if child.kind() != Kind::Type {
                            break;
                        }

                        self.print(child)?;
                        idx += 1;

                        if children.get(idx).map_or(false, |next| next.text().is_some()) {
                            self.push(", ");
                        }
                    }
                    self.push("]");
                }
                _ => {
                    if ParamFlags::from_bits_truncate(kind).is_empty() {
                        return Err(Error::Structural);
                    }

                    self.print(&children[idx])?;
                    idx += 1;
                }
            }
        }

        Ok(())
    }

    fn print_specialization_prefix(
        &mut self,
        node: &Node,
        description: &str,
        param_prefix: &str,
    ) -> Result<()> {
        if !self.has(DemangleOptions::DISPLAY_GENERIC_SPECIALIZATIONS) {
            if !self.specialization_prefix_printed {
                self.push("specialized ");
                self.specialization_prefix_printed = true;
            }

            return Ok(());
        }

        self.push(description);
        self.push(" <");

        let mut separator = "";
        let mut arg = 0;
        for child in node.children() {
            match child.kind() {
                Kind::SpecializationPassID => {}
                Kind::IsSerialized => {
                    self.push(separator);
                    separator = ", ";
                    self.print(child)?;
                }
                _ => {
                    // empty specializations are skipped
                    if !child.children().is_empty() {
                        self.push(separator);
                        self.push(param_prefix);
                        separator = ", ";

                        match child.kind() {
                            Kind::FunctionSignatureSpecializationParam => {
                                self.push("Arg[");
                                self.push_num(arg);
                                self.push("] = ");
                                self.print_function_signature_specialization_params(child)?;
                            }
                            Kind::FunctionSignatureSpecializationReturn => {
                                self.push("Return = ");
                                self.print_function_signature_specialization_params(child)?;
                            }
                            _ => self.print(child)?,
                        }
                    }

                    arg += 1;
                }
            }
        }

        self.push("> of ");
        Ok(())
    }

    fn print_key_path_index_helper(&mut self, node: &Node) -> Result<()> {
        self.push("key path index ");
        self.push(match node.kind() {
            Kind::KeyPathEqualsThunkHelper => "equality",
            _ => "hash",
        });
        self.push(" operator for ");

        let children = node.children();
        let mut end = children.len();
        let mut last = children.last().ok_or(Error::Structural)?;

        let serialized = last.kind() == Kind::IsSerialized;
        if serialized {
            end -= 1;
            last = node.child(end.checked_sub(1).ok_or(Error::Structural)?)?;
        }

        if last.kind() == Kind::DependentGenericSignature {
            self.print(last)?;
            end -= 1;
        }

        self.push("(");
        for (idx, child) in children[..end].iter().enumerate() {
            if idx != 0 {
                self.push(", ");
            }
            self.print(child)?;
        }
        self.push(")");

        if serialized {
            self.push(", serialized");
        }

        Ok(())
    }

    fn print_generic_signature(&mut self, node: &Node) -> Result<()> {
        self.push("<");

        let children = node.children();
        let mut depth = 0;
        while let Some(count) = children.get(depth) {
            if count.kind() != Kind::DependentGenericParamCount {
                break;
            }

            if depth != 0 {
                self.push("><");
            }

            for index in 0..count.require_index()? {
                if index != 0 {
                    self.push(", ");
                }

                // only malformed symbols get anywhere near this
                if index >= MAX_PRINTED_GENERIC_PARAMS {
                    self.push("...");
                    break;
                }

                self.push(&generic_param_name(depth as u64, index));
            }

            depth += 1;
        }

        if depth != children.len() && self.has(DemangleOptions::DISPLAY_WHERE_CLAUSES) {
            self.push(" where ");
            for (idx, requirement) in children[depth..].iter().enumerate() {
                if idx > 0 {
                    self.push(", ");
                }
                self.print(requirement)?;
            }
        }

        self.push(">");
        Ok(())
    }

    fn print_layout_requirement(&mut self, node: &Node) -> Result<()> {
        self.print_child(node, 0)?;
        self.push(": ");

        let layout = node.child(1)?;
        if layout.kind() != Kind::Identifier {
            return Err(Error::Structural);
        }

        let name = match layout.require_text()? {
            "U" => "_UnknownLayout",
            "R" => "_RefCountedObject",
            "N" => "_NativeRefCountedObject",
            "C" => "AnyObject",
            "D" => "_NativeClass",
            "T" | "E" | "e" => "_Trivial",
            "M" | "m" => "_TrivialAtMost",
            _ => return Err(Error::Structural),
        };
        self.push(name);

        if let Some(size) = node.children().get(2) {
            self.push("(");
            self.print(size)?;
            if let Some(alignment) = node.children().get(3) {
                self.push(", ");
                self.print(alignment)?;
            }
            self.push(")");
        }

        Ok(())
    }

    fn print_sil_box_type_with_layout(&mut self, node: &Node) -> Result<()> {
        let layout = node.child(0)?;
        if layout.kind() != Kind::SILBoxLayout {
            return Err(Error::Structural);
        }

        let args = match node.children() {
            [_] => None,
            [_, signature, args] => {
                if signature.kind() != Kind::DependentGenericSignature || args.kind() != Kind::TypeList {
                    return Err(Error::Structural);
                }

                self.print(signature)?;
                self.push(" ");
                Some(args)
            }
            _ => return Err(Error::Structural),
        };

        self.print(layout)?;

        if let Some(args) = args {
            self.push(" <");
            self.print_children(args, Some(", "))?;
            self.push(">");
        }

        Ok(())
    }

    fn print_abstract_storage<'n>(
        &mut self,
        node: &'n Node,
        as_prefix_context: bool,
        extra_name: &str,
    ) -> Result<Option<&'n Node>> {
        let storage = node.child(0)?;
        match storage.kind() {
            Kind::Variable => self.print_entity(
                storage,
                as_prefix_context,
                TypePrinting::WithColon,
                EntityName {
                    has_name: true,
                    extra_name,
                    extra_index: None,
                    overwrite_name: "",
                },
            ),
            Kind::Subscript => self.print_entity(
                storage,
                as_prefix_context,
                TypePrinting::WithColon,
                EntityName {
                    has_name: false,
                    extra_name,
                    extra_index: None,
                    overwrite_name: "subscript",
                },
            ),
            _ => Err(Error::Structural),
        }
    }

    /// Print an entity with its context either as a prefix, `M.S.f()`, or
    /// as a suffix, `closure #1 in M.f()`.
    ///
    /// Returns the context if it still has to be printed by the caller.
    fn print_entity<'n>(
        &mut self,
        entity: &'n Node,
        as_prefix_context: bool,
        mut type_printing: TypePrinting,
        name: EntityName,
    ) -> Result<Option<&'n Node>> {
        let mut entity = entity;
        let mut generic_args = None;
        if entity.kind() == Kind::BoundGenericFunction {
            generic_args = Some(entity.child(1)?);
            entity = entity.child(0)?;
        }

        let mut extra_name = name.extra_name;

        // local names and multi-word names read better with the context as a
        // suffix
        let mut multi_word_name = extra_name.contains(' ');
        if name.has_name && entity.child(1)?.kind() == Kind::LocalDeclName {
            multi_word_name = true;
        }

        if as_prefix_context && (type_printing != TypePrinting::NoType || multi_word_name) {
            return Ok(Some(entity));
        }

        let mut postfix_context = None;
        let context = entity.child(0)?;
        if self.print_context(context) {
            if multi_word_name {
                postfix_context = Some(context);
            } else {
                let pos = self.out.len();
                postfix_context = self.print_node(context, true)?;
                if self.out.len() != pos {
                    self.push(".");
                }
            }
        }

        if name.has_name || !name.overwrite_name.is_empty() {
            if name.extra_index.is_some() {
                return Err(Error::Structural);
            }

            if !extra_name.is_empty() && multi_word_name {
                self.push(extra_name);
                self.push(" of ");
                extra_name = "";
            }

            let pos = self.out.len();
            if !name.overwrite_name.is_empty() {
                self.push(name.overwrite_name);
            } else {
                let decl_name = entity.child(1)?;
                if decl_name.kind() != Kind::PrivateDeclName {
                    self.print(decl_name)?;
                }

                if let Some(private_name) = entity.child_of_kind(Kind::PrivateDeclName) {
                    self.print(private_name)?;
                }
            }

            if self.out.len() != pos && !extra_name.is_empty() {
                self.push(".");
            }
        }

        if !extra_name.is_empty() {
            self.push(extra_name);
            if let Some(index) = name.extra_index {
                self.push_num(index);
            }
        }

        if type_printing != TypePrinting::NoType {
            let ty = entity
                .child_of_kind(Kind::Type)
                .ok_or(Error::Structural)?
                .child(0)?;

            if type_printing == TypePrinting::FunctionStyle {
                // anything but a function type is printed with a colon
                let mut func = ty;
                while func.kind() == Kind::DependentGenericType {
                    func = func.child(1)?.child(0)?;
                }

                if !matches!(
                    func.kind(),
                    Kind::FunctionType
                        | Kind::NoEscapeFunctionType
                        | Kind::UncurriedFunctionType
                        | Kind::CFunctionPointer
                        | Kind::ThinFunctionType
                ) {
                    type_printing = TypePrinting::WithColon;
                }
            }

            if type_printing == TypePrinting::WithColon {
                if self.has(DemangleOptions::DISPLAY_ENTITY_TYPES) {
                    self.push(" : ");
                    self.print_entity_type(entity, ty, generic_args)?;
                }
            } else {
                if multi_word_name || need_space_before_type(ty) {
                    self.push(" ");
                }
                self.print_entity_type(entity, ty, generic_args)?;
            }
        }

        if !as_prefix_context {
            if let Some(context) = postfix_context.take() {
                if matches!(
                    entity.kind(),
                    Kind::DefaultArgumentInitializer | Kind::Initializer
                ) {
                    self.push(" of ");
                } else {
                    self.push(" in ");
                }
                self.print(context)?;
            }
        }

        Ok(postfix_context)
    }

    fn print_entity_type(&mut self, entity: &Node, ty: &Node, generic_args: Option<&Node>) -> Result<()> {
        let labels = entity.child_of_kind(Kind::LabelList);
        if labels.is_none() && generic_args.is_none() {
            return self.print(ty);
        }

        if let Some(generic_args) = generic_args {
            self.push("<");
            self.print_children(generic_args, Some(", "))?;
            self.push(">");
        }

        let mut ty = ty;
        if ty.kind() == Kind::DependentGenericType {
            if generic_args.is_none() {
                self.print_child(ty, 0)?;
            }

            let dependent = ty.child(1)?;
            if need_space_before_type(dependent) {
                self.push(" ");
            }
            ty = dependent.child(0)?;
        }

        self.print_function_type(labels, ty)
    }
}

/// Print `node` with the default options.
pub fn print(node: &Node) -> Result<String> {
    Printer::new(DemangleOptions::default()).finish(node)
}

pub fn print_with(node: &Node, options: DemangleOptions) -> Result<String> {
    Printer::new(options).finish(node)
}

/// Prints with the default options. A tree that can't be printed is dumped
/// instead, see [`Node::tree_string`].
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match print(self) {
            Ok(printed) => f.write_str(&printed),
            Err(..) => f.write_str(self.tree_string().trim_end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(text: &str) -> Node {
        Node::with_text(Kind::Identifier, text)
    }

    fn module(text: &str) -> Node {
        Node::with_text(Kind::Module, text)
    }

    #[test]
    fn generic_param_names() {
        assert_eq!(generic_param_name(0, 0), "A");
        assert_eq!(generic_param_name(0, 25), "Z");
        assert_eq!(generic_param_name(0, 27), "BB");
        assert_eq!(generic_param_name(2, 1), "B2");
    }

    #[test]
    fn presets() {
        let default = DemangleOptions::default();
        assert!(default.contains(DemangleOptions::DISPLAY_MODULE_NAMES));
        assert!(!default.contains(DemangleOptions::SYNTHESIZE_SUGAR_ON_TYPES));

        let simplified = DemangleOptions::simplified();
        assert!(simplified.contains(DemangleOptions::SHORTEN_THUNK));
        assert!(!simplified.contains(DemangleOptions::DISPLAY_MODULE_NAMES));
    }

    #[test]
    fn qualified_names() {
        let structure = Node::new(Kind::Structure)
            .child_of(module("M"))
            .child_of(ident("S"));

        assert_eq!(print(&structure).unwrap(), "M.S");
        assert_eq!(
            print_with(&structure, DemangleOptions::simplified()).unwrap(),
            "S"
        );
    }

    #[test]
    fn quoted_suffix() {
        let mut out = String::new();
        write_quoted(&mut out, "a\"b\n\u{1}");
        assert_eq!(out, "\"a\\\"b\\n\\x01\"");
    }

    #[test]
    fn malformed_trees() {
        let structure = Node::new(Kind::Structure).child_of(module("M"));
        assert_eq!(print(&structure), Err(Error::Structural));

        let param = Node::new(Kind::FunctionSignatureSpecializationParam);
        assert_eq!(print(&param), Err(Error::Structural));
    }

    #[test]
    fn display_falls_back_to_tree() {
        let structure = Node::new(Kind::Structure).child_of(module("M"));
        assert_eq!(structure.to_string(), "kind=Structure\n  kind=Module, text=\"M\"");

        let structure = structure.child_of(ident("S"));
        assert_eq!(structure.to_string(), "M.S");
    }

    #[test]
    fn deep_trees() {
        let worker = std::thread::Builder::new().stack_size(64 * 1024 * 1024);
        let handle = worker.spawn(|| {
            let mut node = Node::new(Kind::DynamicSelf);
            for _ in 0..MAX_DEPTH {
                node = Node::with_child(Kind::Type, node);
            }

            (print(&node), node.to_string().starts_with("kind=Type\n"))
        });

        let (printed, dumped) = handle.unwrap().join().unwrap();
        assert_eq!(printed, Err(Error::TooMuchRecursion));
        assert!(dumped);
    }
}
