//! Turns a [`Node`] tree back into a mangled symbol.
//!
//! Every demangler production has an inverse here. Substitutions are found by
//! structural equality, so a tree that came out of the demangler produces the
//! exact same string it was demangled from (modulo the mangling prefix).

use crate::error::{Error, Result};
use crate::node::{param_kind, Kind, Node, ParamFlags, ValueWitnessKind};
use crate::punycode;
use crate::subs::{self, EntryTable, SubstitutionEntry, MAX_NUM_WORDS, MAX_REPEAT_COUNT};

/// Deepest nesting of nodes the remangler descends into.
const MAX_DEPTH: u32 = 512;

/// A word of an identifier that was already emitted, as a range of the
/// output buffer.
#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    len: usize,
}

/// State of the last emitted substitution, which the next one can be merged
/// into. `AB` followed by `C` becomes `AbC`, `AB` followed by `B` becomes
/// `A2B`.
#[derive(Debug, Default)]
struct SubstMerging {
    position: usize,
    size: usize,
    count: u64,
    is_standard: bool,
}

impl SubstMerging {
    /// Returns false if the substitution couldn't be merged, in which case the
    /// caller emits it in full.
    fn try_merge(&mut self, buffer: &mut Vec<u8>, subst: u8, is_standard: bool) -> bool {
        if self.count > 0
            && self.count < MAX_REPEAT_COUNT
            && buffer.len() == self.position + self.size
            && self.is_standard == is_standard
        {
            if let Some(&last) = buffer.last() {
                if last != subst && !is_standard {
                    self.position = buffer.len();
                    self.count = 1;
                    self.size = 1;
                    buffer.pop();
                    buffer.push(last.to_ascii_lowercase());
                    buffer.push(subst);
                    return true;
                }

                if last == subst {
                    self.count += 1;
                    buffer.truncate(self.position);
                    buffer.extend_from_slice(self.count.to_string().as_bytes());
                    buffer.push(subst);
                    self.size = buffer.len() - self.position;
                    return true;
                }
            }
        }

        // remember it so the next substitution can be merged into it
        self.position = buffer.len() + 1;
        self.size = 1;
        self.count = 1;
        self.is_standard = is_standard;
        false
    }
}

pub struct Remangler {
    buffer: Vec<u8>,
    words: Vec<Word>,
    substitutions: EntryTable,
    merging: SubstMerging,
    depth: u32,
}

impl Default for Remangler {
    fn default() -> Self {
        Self::new()
    }
}

impl Remangler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(512),
            words: Vec::with_capacity(MAX_NUM_WORDS),
            substitutions: EntryTable::new(),
            merging: SubstMerging::default(),
            depth: 0,
        }
    }

    /// Mangle `node` and return the output, consuming the remangler.
    pub fn finish(mut self, node: &Node) -> Result<Vec<u8>> {
        self.mangle(node)?;
        Ok(self.buffer)
    }

    #[inline]
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    #[inline]
    fn push_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    #[inline]
    fn push_num(&mut self, num: u64) {
        self.buffer.extend_from_slice(num.to_string().as_bytes());
    }

    fn mangle(&mut self, node: &Node) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooMuchRecursion);
        }

        self.depth += 1;
        let result = self.mangle_node(node);
        self.depth -= 1;
        result
    }

    fn mangle_children(&mut self, node: &Node) -> Result<()> {
        for child in node.children() {
            self.mangle(child)?;
        }

        Ok(())
    }

    fn mangle_children_reversed(&mut self, node: &Node) -> Result<()> {
        for child in node.children().iter().rev() {
            self.mangle(child)?;
        }

        Ok(())
    }

    fn mangle_child(&mut self, node: &Node, idx: usize) -> Result<()> {
        self.mangle(node.child(idx)?)
    }

    fn single_child(node: &Node) -> Result<&Node> {
        match node.children() {
            [child] => Ok(child),
            _ => Err(Error::Structural),
        }
    }

    fn mangle_single_child(&mut self, node: &Node) -> Result<()> {
        self.mangle(Self::single_child(node)?)
    }

    /// The child of a `Type` wrapper.
    fn child_of_type(node: &Node) -> Result<&Node> {
        if node.kind() != Kind::Type {
            return Err(Error::Structural);
        }

        Self::single_child(node)
    }

    fn mangle_type(&mut self, node: &Node) -> Result<()> {
        self.mangle_single_child(node)
    }

    fn children_then(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.mangle_children(node)?;
        self.push(op);
        Ok(())
    }

    fn reversed_then(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.mangle_children_reversed(node)?;
        self.push(op);
        Ok(())
    }

    fn single_then(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.mangle_single_child(node)?;
        self.push(op);
        Ok(())
    }

    fn mangle_index(&mut self, value: u64) {
        if value != 0 {
            self.push_num(value - 1);
        }

        self.push_byte(b'_');
    }

    fn mangle_dependent_conformance_index(&mut self, node: &Node) -> Result<()> {
        match node.kind() {
            Kind::Index => {
                let index = node.require_index()?.checked_add(2).ok_or(Error::Overflow)?;
                self.mangle_index(index);
            }
            Kind::UnknownIndex => self.mangle_index(1),
            _ => return Err(Error::Structural),
        }

        Ok(())
    }

    /// Emits `_` after the first item of a list.
    fn list_separator(&mut self, is_first: &mut bool) {
        if *is_first {
            self.push_byte(b'_');
            *is_first = false;
        }
    }

    /// Emits `y` for a list without items.
    fn end_of_list(&mut self, is_first: bool) {
        if is_first {
            self.push_byte(b'y');
        }
    }

    fn unsupported(node: &Node) -> Result<()> {
        log::trace!("[remangle] {:?} has no mangling", node.kind());
        Err(Error::UnsupportedConstruct)
    }

    fn mangle_node(&mut self, node: &Node) -> Result<()> {
        match node.kind() {
            Kind::Global => self.mangle_global(node),
            Kind::Suffix => {
                self.push(node.require_text()?.as_bytes());
                Ok(())
            }

            // names
            Kind::Identifier | Kind::TupleElementName => self.mangle_identifier(node, false),
            Kind::InfixOperator => self.mangle_operator(node, b"oi"),
            Kind::PrefixOperator => self.mangle_operator(node, b"op"),
            Kind::PostfixOperator => self.mangle_operator(node, b"oP"),
            Kind::Module => self.mangle_module(node),
            Kind::LocalDeclName => {
                self.mangle_child(node, 1)?;
                self.push_byte(b'L');
                self.mangle_child(node, 0)
            }
            Kind::PrivateDeclName => {
                self.mangle_children_reversed(node)?;
                self.push(if node.children().len() == 1 { b"Ll" } else { b"LL" });
                Ok(())
            }
            Kind::RelatedEntityDeclName => {
                self.mangle_child(node, 1)?;
                let kind = node.child(0)?.require_text()?;
                if kind.len() != 1 {
                    return Err(Error::UnsupportedConstruct);
                }

                self.push_byte(b'L');
                self.push(kind.as_bytes());
                Ok(())
            }
            Kind::Number => {
                self.mangle_index(node.require_index()?);
                Ok(())
            }

            // nominal types
            Kind::Structure
            | Kind::Enum
            | Kind::Class
            | Kind::OtherNominalType
            | Kind::TypeAlias
            | Kind::BoundGenericStructure
            | Kind::BoundGenericClass
            | Kind::BoundGenericOtherNominalType
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericTypeAlias => self.mangle_any_nominal_type(node),
            Kind::Protocol => self.mangle_any_generic_type(node, b"P"),
            Kind::BoundGenericEnum => self.mangle_bound_generic_enum(node),
            Kind::BoundGenericFunction => self.mangle_bound_generic_function(node),
            Kind::TypeSymbolicReference
            | Kind::ProtocolSymbolicReference
            | Kind::OpaqueTypeDescriptorSymbolicReference => self.mangle_symbolic_reference(node),
            Kind::AssociatedTypeRef => {
                self.with_substitution(node, |r| r.children_then(node, b"Qa"))
            }
            Kind::OpaqueType => self.mangle_opaque_type(node),
            Kind::OpaqueReturnType => {
                self.push(b"Qr");
                Ok(())
            }
            Kind::OpaqueReturnTypeOf => {
                self.mangle_child(node, 0)?;
                self.push(b"QO");
                Ok(())
            }

            // structural types
            Kind::Type => self.mangle_type(node),
            Kind::TypeMangling => self.children_then(node, b"D"),
            Kind::BuiltinTypeName => self.mangle_builtin_type(node),
            Kind::Tuple => {
                self.mangle_type_list(node)?;
                self.push_byte(b't');
                Ok(())
            }
            Kind::TupleElement => self.mangle_children_reversed(node),
            Kind::TypeList => self.mangle_type_list(node),
            Kind::LabelList => {
                if node.children().is_empty() {
                    self.push_byte(b'y');
                    Ok(())
                } else {
                    self.mangle_children(node)
                }
            }
            Kind::FunctionType | Kind::UncurriedFunctionType => self.reversed_then(node, b"c"),
            Kind::ThinFunctionType => self.reversed_then(node, b"Xf"),
            Kind::NoEscapeFunctionType => self.reversed_then(node, b"XE"),
            Kind::AutoClosureType => self.reversed_then(node, b"XK"),
            Kind::EscapingAutoClosureType => self.reversed_then(node, b"XA"),
            Kind::CFunctionPointer => self.reversed_then(node, b"XC"),
            Kind::ObjCBlock => self.reversed_then(node, b"XB"),
            Kind::ArgumentTuple | Kind::ReturnType => self.mangle_argument_tuple(node),
            Kind::ThrowsAnnotation => {
                self.push_byte(b'K');
                Ok(())
            }
            Kind::InOut => self.single_then(node, b"z"),
            Kind::Shared => self.single_then(node, b"h"),
            Kind::Owned => self.single_then(node, b"n"),
            Kind::Weak => self.single_then(node, b"Xw"),
            Kind::Unowned => self.single_then(node, b"Xo"),
            Kind::Unmanaged => self.single_then(node, b"Xu"),
            Kind::SILBoxType => self.single_then(node, b"Xb"),
            Kind::DynamicSelf => self.single_then(node, b"XD"),
            Kind::ErrorType => {
                self.push(b"Xe");
                Ok(())
            }
            Kind::Metatype => self.mangle_metatype(node, b"XM", b"m"),
            Kind::ExistentialMetatype => self.mangle_metatype(node, b"Xm", b"Xp"),
            Kind::MetatypeRepresentation => {
                let repr = match node.require_text()? {
                    "@thin" => b't',
                    "@thick" => b'T',
                    "@objc_metatype" => b'o',
                    _ => return Err(Error::Structural),
                };

                self.push_byte(repr);
                Ok(())
            }
            Kind::ProtocolList => self.mangle_protocol_list(node, None, false),
            Kind::ProtocolListWithClass => {
                self.mangle_protocol_list(node.child(0)?, Some(node.child(1)?), false)
            }
            Kind::ProtocolListWithAnyObject => self.mangle_protocol_list(node.child(0)?, None, true),
            Kind::SugaredOptional => {
                self.mangle_type(node.child(0)?)?;
                self.push(b"XSq");
                Ok(())
            }
            Kind::SugaredArray => {
                self.mangle_type(node.child(0)?)?;
                self.push(b"XSa");
                Ok(())
            }
            Kind::SugaredDictionary => {
                self.mangle_type(node.child(0)?)?;
                self.mangle_type(node.child(1)?)?;
                self.push(b"XSD");
                Ok(())
            }
            Kind::SugaredParen => {
                self.mangle_type(node.child(0)?)?;
                self.push(b"XSp");
                Ok(())
            }
            Kind::ImplFunctionType => self.mangle_impl_function_type(node),
            Kind::ImplEscaping => {
                self.push_byte(b'e');
                Ok(())
            }
            Kind::ImplConvention => {
                let convention = match node.require_text()? {
                    "@callee_unowned" => b'y',
                    "@callee_guaranteed" => b'g',
                    "@callee_owned" => b'x',
                    _ => return Err(Error::Structural),
                };

                self.push_byte(convention);
                Ok(())
            }
            Kind::SILBoxTypeWithLayout => self.mangle_sil_box_type_with_layout(node),

            // generics
            Kind::DependentGenericParamType => {
                let depth = node.child(0)?.require_index()?;
                let index = node.child(1)?.require_index()?;
                if depth == 0 && index == 0 {
                    self.push_byte(b'x');
                    return Ok(());
                }

                self.push_byte(b'q');
                self.mangle_dependent_generic_param_index(node, b"", b'z')
            }
            Kind::DependentMemberType => self.mangle_dependent_member_type(node),
            Kind::DependentAssociatedTypeRef => {
                self.mangle_identifier(node.child(0)?, false)?;
                if let Some(proto) = node.children().get(1) {
                    self.mangle(proto)?;
                }

                Ok(())
            }
            Kind::DependentGenericType => self.reversed_then(node, b"u"),
            Kind::DependentGenericSignature => self.mangle_dependent_generic_signature(node),
            Kind::DependentGenericConformanceRequirement => {
                self.mangle_conformance_requirement(node)
            }
            Kind::DependentGenericSameTypeRequirement => {
                self.mangle_child(node, 1)?;
                self.mangle_requirement_subject(node.child(0)?, [b"RS", b"Rs", b"Rt", b"RT"])
            }
            Kind::DependentGenericLayoutRequirement => self.mangle_layout_requirement(node),
            Kind::AssocTypePath => {
                let mut is_first = true;
                for child in node.children() {
                    self.mangle(child)?;
                    self.list_separator(&mut is_first);
                }

                Ok(())
            }

            // conformances
            Kind::ProtocolConformance => self.mangle_protocol_conformance(node),
            Kind::ProtocolConformanceRefInTypeModule => {
                self.mangle_pure_protocol(node.child(0)?)?;
                self.push(b"HP");
                Ok(())
            }
            Kind::ProtocolConformanceRefInProtocolModule => {
                self.mangle_pure_protocol(node.child(0)?)?;
                self.push(b"Hp");
                Ok(())
            }
            Kind::ProtocolConformanceRefInOtherModule => {
                self.mangle_pure_protocol(node.child(0)?)?;
                self.mangle_child(node, 1)
            }
            Kind::ConcreteProtocolConformance
            | Kind::DependentProtocolConformanceRoot
            | Kind::DependentProtocolConformanceInherited
            | Kind::DependentProtocolConformanceAssociated => {
                self.mangle_any_protocol_conformance(node)
            }
            Kind::DependentAssociatedConformance => {
                self.mangle_type(node.child(0)?)?;
                self.mangle_pure_protocol(node.child(1)?)
            }
            Kind::AnyProtocolConformanceList => self.mangle_any_protocol_conformance_list(node),
            Kind::RetroactiveConformance => {
                self.mangle_any_protocol_conformance(node.child(1)?)?;
                self.push_byte(b'g');
                self.mangle_index(node.child(0)?.require_index()?);
                Ok(())
            }

            // contexts and entities
            Kind::Extension => {
                self.mangle_child(node, 1)?;
                self.mangle_child(node, 0)?;
                if let Some(signature) = node.children().get(2) {
                    self.mangle(signature)?;
                }

                self.push_byte(b'E');
                Ok(())
            }
            Kind::AnonymousContext => {
                self.mangle_child(node, 1)?;
                self.mangle_child(node, 0)?;
                if let Some(params) = node.children().get(2) {
                    self.mangle_type_list(params)?;
                }

                self.push(b"XZ");
                Ok(())
            }
            Kind::DeclContext => self.mangle_single_child(node),
            Kind::Static => self.single_then(node, b"Z"),
            Kind::Function => self.mangle_function(node),
            Kind::Allocator => self.children_then(node, b"fC"),
            Kind::Constructor => self.children_then(node, b"fc"),
            Kind::Deallocator => self.children_then(node, b"fD"),
            Kind::Destructor => self.children_then(node, b"fd"),
            Kind::IVarInitializer => self.single_then(node, b"fe"),
            Kind::IVarDestroyer => self.single_then(node, b"fE"),
            Kind::Initializer => self.children_then(node, b"fi"),
            Kind::GenericTypeParamDecl => self.children_then(node, b"fp"),
            Kind::DefaultArgumentInitializer => {
                self.mangle_child(node, 0)?;
                self.push(b"fA");
                self.mangle_child(node, 1)
            }
            Kind::ExplicitClosure => self.mangle_closure(node, b"fU"),
            Kind::ImplicitClosure => self.mangle_closure(node, b"fu"),
            Kind::Variable | Kind::Subscript => self.mangle_abstract_storage(node, b"p"),
            Kind::Getter => self.mangle_accessor(node, b"g"),
            Kind::Setter => self.mangle_accessor(node, b"s"),
            Kind::MaterializeForSet => self.mangle_accessor(node, b"m"),
            Kind::WillSet => self.mangle_accessor(node, b"w"),
            Kind::DidSet => self.mangle_accessor(node, b"W"),
            Kind::GlobalGetter => self.mangle_accessor(node, b"G"),
            Kind::ReadAccessor => self.mangle_accessor(node, b"r"),
            Kind::ModifyAccessor => self.mangle_accessor(node, b"M"),
            Kind::NativeOwningAddressor => self.mangle_accessor(node, b"lo"),
            Kind::NativeOwningMutableAddressor => self.mangle_accessor(node, b"ao"),
            Kind::NativePinningAddressor => self.mangle_accessor(node, b"lp"),
            Kind::NativePinningMutableAddressor => self.mangle_accessor(node, b"aP"),
            Kind::OwningAddressor => self.mangle_accessor(node, b"lO"),
            Kind::OwningMutableAddressor => self.mangle_accessor(node, b"aO"),
            Kind::UnsafeAddressor => self.mangle_accessor(node, b"lu"),
            Kind::UnsafeMutableAddressor => self.mangle_accessor(node, b"au"),

            // metadata
            Kind::TypeMetadata => self.single_then(node, b"N"),
            Kind::TypeMetadataAccessFunction => self.single_then(node, b"Ma"),
            Kind::TypeMetadataInstantiationCache => self.single_then(node, b"MI"),
            Kind::TypeMetadataInstantiationFunction => self.single_then(node, b"Mi"),
            Kind::TypeMetadataSingletonInitializationCache => self.single_then(node, b"Ml"),
            Kind::TypeMetadataCompletionFunction => self.single_then(node, b"Mr"),
            Kind::TypeMetadataLazyCache => self.children_then(node, b"ML"),
            Kind::FullTypeMetadata => self.single_then(node, b"Mf"),
            Kind::GenericTypeMetadataPattern => self.single_then(node, b"MP"),
            Kind::Metaclass => self.children_then(node, b"Mm"),
            Kind::NominalTypeDescriptor => self.single_then(node, b"Mn"),
            Kind::ClassMetadataBaseOffset => self.single_then(node, b"Mo"),
            Kind::OpaqueTypeDescriptor => self.single_then(node, b"MQ"),
            Kind::OpaqueTypeDescriptorAccessor => self.single_then(node, b"Mg"),
            Kind::OpaqueTypeDescriptorAccessorImpl => self.single_then(node, b"Mh"),
            Kind::OpaqueTypeDescriptorAccessorKey => self.single_then(node, b"Mj"),
            Kind::OpaqueTypeDescriptorAccessorVar => self.single_then(node, b"Mk"),
            Kind::PropertyDescriptor => self.single_then(node, b"MV"),
            Kind::MethodLookupFunction => self.single_then(node, b"Mu"),
            Kind::ObjCMetadataUpdateFunction => self.single_then(node, b"MU"),
            Kind::ObjCResilientClassStub => self.single_then(node, b"Ms"),
            Kind::FullObjCResilientClassStub => self.single_then(node, b"Mt"),
            Kind::ReflectionMetadataBuiltinDescriptor => self.single_then(node, b"MB"),
            Kind::ReflectionMetadataFieldDescriptor => self.single_then(node, b"MF"),
            Kind::ReflectionMetadataAssocTypeDescriptor => self.single_then(node, b"MA"),
            Kind::ReflectionMetadataSuperclassDescriptor => self.single_then(node, b"MC"),
            Kind::ProtocolDescriptor => {
                self.mangle_pure_protocol(Self::single_child(node)?)?;
                self.push(b"Mp");
                Ok(())
            }
            Kind::ProtocolSelfConformanceDescriptor => {
                self.mangle_pure_protocol(node.child(0)?)?;
                self.push(b"MS");
                Ok(())
            }
            Kind::ProtocolConformanceDescriptor => {
                self.mangle_protocol_conformance(node.child(0)?)?;
                self.push(b"Mc");
                Ok(())
            }
            Kind::ModuleDescriptor => {
                self.mangle_child(node, 0)?;
                self.push(b"MXM");
                Ok(())
            }
            Kind::ExtensionDescriptor => {
                self.mangle_child(node, 0)?;
                self.push(b"MXE");
                Ok(())
            }
            Kind::AnonymousDescriptor => {
                self.mangle_child(node, 0)?;
                match node.children().get(1) {
                    Some(ident) => {
                        self.mangle_identifier(ident, false)?;
                        self.push(b"MXY");
                    }
                    None => self.push(b"MXX"),
                }

                Ok(())
            }
            Kind::AssociatedTypeGenericParamRef => {
                self.mangle_type(node.child(0)?)?;
                self.mangle_child(node, 1)?;
                self.push(b"MXA");
                Ok(())
            }

            // witnesses
            Kind::ValueWitnessTable => self.single_then(node, b"WV"),
            Kind::EnumCase => self.single_then(node, b"WC"),
            Kind::FieldOffset => {
                self.mangle_child(node, 1)?;
                self.push(b"Wv");
                self.mangle_child(node, 0)
            }
            Kind::Directness => {
                let directness = match node.require_index()? {
                    0 => b'd',
                    1 => b'i',
                    _ => return Err(Error::Structural),
                };

                self.push_byte(directness);
                Ok(())
            }
            Kind::ProtocolSelfConformanceWitnessTable => {
                self.mangle_pure_protocol(node.child(0)?)?;
                self.push(b"WS");
                Ok(())
            }
            Kind::ProtocolWitnessTable => self.single_then(node, b"WP"),
            Kind::ProtocolWitnessTablePattern => self.single_then(node, b"Wp"),
            Kind::GenericProtocolWitnessTable => self.single_then(node, b"WG"),
            Kind::GenericProtocolWitnessTableInstantiationFunction => {
                self.single_then(node, b"WI")
            }
            Kind::ResilientProtocolWitnessTable => self.single_then(node, b"Wr"),
            Kind::ProtocolWitnessTableAccessor => self.single_then(node, b"Wa"),
            Kind::LazyProtocolWitnessTableAccessor => self.children_then(node, b"Wl"),
            Kind::LazyProtocolWitnessTableCacheVariable => self.children_then(node, b"WL"),
            Kind::AssociatedTypeMetadataAccessor => self.children_then(node, b"Wt"),
            Kind::AssociatedTypeWitnessTableAccessor => self.children_then(node, b"WT"),
            Kind::BaseWitnessTableAccessor => self.children_then(node, b"Wb"),
            Kind::OutlinedCopy => self.children_then(node, b"WOy"),
            Kind::OutlinedConsume => self.children_then(node, b"WOe"),
            Kind::OutlinedRetain => self.children_then(node, b"WOr"),
            Kind::OutlinedRelease => self.children_then(node, b"WOs"),
            Kind::OutlinedInitializeWithTake => self.children_then(node, b"WOb"),
            Kind::OutlinedInitializeWithCopy => self.children_then(node, b"WOc"),
            Kind::OutlinedAssignWithTake => self.children_then(node, b"WOd"),
            Kind::OutlinedAssignWithCopy => self.children_then(node, b"WOf"),
            Kind::OutlinedDestroy => self.children_then(node, b"WOh"),
            Kind::ValueWitness => {
                self.mangle_child(node, 1)?;
                let kind = ValueWitnessKind::from_index(node.child(0)?.require_index()?)
                    .ok_or(Error::Structural)?;

                self.push_byte(b'w');
                self.push(kind.code());
                Ok(())
            }

            // thunks and attributes
            Kind::CurryThunk => self.single_then(node, b"Tc"),
            Kind::DispatchThunk => self.single_then(node, b"Tj"),
            Kind::MethodDescriptor => self.single_then(node, b"Tq"),
            Kind::ObjCAttribute => {
                self.push(b"To");
                Ok(())
            }
            Kind::NonObjCAttribute => {
                self.push(b"TO");
                Ok(())
            }
            Kind::DynamicAttribute => {
                self.push(b"TD");
                Ok(())
            }
            Kind::DirectMethodReferenceAttribute => {
                self.push(b"Td");
                Ok(())
            }
            Kind::PartialApplyForwarder => self.reversed_then(node, b"TA"),
            Kind::PartialApplyObjCForwarder => self.reversed_then(node, b"Ta"),
            Kind::MergedFunction => {
                self.push(b"Tm");
                Ok(())
            }
            Kind::DynamicallyReplaceableFunctionImpl => {
                self.push(b"TI");
                Ok(())
            }
            Kind::DynamicallyReplaceableFunctionKey => {
                self.push(b"Tx");
                Ok(())
            }
            Kind::DynamicallyReplaceableFunctionVar => {
                self.push(b"TX");
                Ok(())
            }
            Kind::CoroutineContinuationPrototype => self.children_then(node, b"TC"),
            Kind::VTableThunk => self.children_then(node, b"TV"),
            Kind::ProtocolWitness => self.children_then(node, b"TW"),
            Kind::ProtocolSelfConformanceWitness => self.single_then(node, b"TS"),
            Kind::ReabstractionThunk => self.reversed_then(node, b"Tr"),
            Kind::ReabstractionThunkHelper => self.reversed_then(node, b"TR"),
            Kind::ReabstractionThunkHelperWithSelf => self.reversed_then(node, b"Ty"),
            Kind::AssociatedTypeDescriptor => self.children_then(node, b"Tl"),
            Kind::ProtocolRequirementsBaseDescriptor => {
                self.mangle_pure_protocol(Self::single_child(node)?)?;
                self.push(b"TL");
                Ok(())
            }
            Kind::DefaultAssociatedTypeMetadataAccessor => self.children_then(node, b"TM"),
            Kind::AssociatedConformanceDescriptor => {
                self.mangle_child(node, 0)?;
                self.mangle_child(node, 1)?;
                self.mangle_pure_protocol(node.child(2)?)?;
                self.push(b"Tn");
                Ok(())
            }
            Kind::DefaultAssociatedConformanceAccessor => {
                self.mangle_child(node, 0)?;
                self.mangle_child(node, 1)?;
                self.mangle_pure_protocol(node.child(2)?)?;
                self.push(b"TN");
                Ok(())
            }
            Kind::BaseConformanceDescriptor => {
                self.mangle_child(node, 0)?;
                self.mangle_pure_protocol(node.child(1)?)?;
                self.push(b"Tb");
                Ok(())
            }
            Kind::KeyPathGetterThunkHelper => self.mangle_key_path_thunk_helper(node, b"TK"),
            Kind::KeyPathSetterThunkHelper => self.mangle_key_path_thunk_helper(node, b"Tk"),
            Kind::KeyPathEqualsThunkHelper => self.mangle_key_path_thunk_helper(node, b"TH"),
            Kind::KeyPathHashThunkHelper => self.mangle_key_path_thunk_helper(node, b"Th"),
            Kind::OutlinedVariable => {
                self.push(b"Tv");
                self.mangle_index(node.require_index()?);
                Ok(())
            }
            Kind::OutlinedBridgedMethod => {
                self.push(b"Te");
                self.push(node.require_text()?.as_bytes());
                self.push_byte(b'_');
                Ok(())
            }
            Kind::SpecializationPassID => {
                self.push_num(node.require_index()?);
                Ok(())
            }
            Kind::IsSerialized => {
                self.push_byte(b'q');
                Ok(())
            }
            Kind::GenericSpecialization
            | Kind::GenericSpecializationNotReAbstracted
            | Kind::InlinedGenericFunction => self.mangle_generic_specialization(node),
            Kind::GenericPartialSpecialization
            | Kind::GenericPartialSpecializationNotReAbstracted => {
                self.mangle_generic_partial_specialization(node)
            }
            Kind::FunctionSignatureSpecialization => {
                self.mangle_function_signature_specialization(node)
            }
            Kind::FunctionSignatureSpecializationParam
            | Kind::FunctionSignatureSpecializationReturn => {
                self.mangle_function_signature_specialization_param(node)
            }

            // list markers
            Kind::EmptyList => {
                self.push_byte(b'y');
                Ok(())
            }
            Kind::FirstElementMarker => {
                self.push_byte(b'_');
                Ok(())
            }
            Kind::VariadicMarker => {
                self.push_byte(b'd');
                Ok(())
            }

            // only valid as part of another node
            Kind::AssociatedType
            | Kind::VTableAttribute
            | Kind::AccessorFunctionReference
            | Kind::DependentGenericParamCount
            | Kind::DependentPseudogenericSignature
            | Kind::FunctionSignatureSpecializationParamKind
            | Kind::FunctionSignatureSpecializationParamPayload
            | Kind::GenericSpecializationParam
            | Kind::ImplFunctionAttribute
            | Kind::ImplParameter
            | Kind::ImplResult
            | Kind::ImplErrorResult
            | Kind::Index
            | Kind::UnknownIndex
            | Kind::SILBoxLayout
            | Kind::SILBoxMutableField
            | Kind::SILBoxImmutableField => Self::unsupported(node),
        }
    }

    fn mangle_global(&mut self, node: &Node) -> Result<()> {
        self.push(b"$s");

        // attributes are mangled after the entity they apply to
        let children = node.children();
        let mut reversed = false;
        for (idx, child) in children.iter().enumerate() {
            if child.kind().is_function_attr()
                && !matches!(
                    child.kind(),
                    Kind::PartialApplyForwarder | Kind::PartialApplyObjCForwarder
                )
            {
                reversed = true;
                continue;
            }

            self.mangle(child)?;
            if reversed {
                for prev in children[..idx].iter().rev() {
                    self.mangle(prev)?;
                }

                reversed = false;
            }
        }

        Ok(())
    }

    /// Emit a substitution for `node` if there is one.
    ///
    /// Otherwise returns the entry to record once `node` is mangled.
    fn lookup_substitution(
        &mut self,
        node: &Node,
        treat_as_identifier: bool,
    ) -> Result<Option<SubstitutionEntry>> {
        if self.mangle_standard_substitution(node)? {
            return Ok(None);
        }

        let entry = SubstitutionEntry::new(node, treat_as_identifier);
        let idx = match self.substitutions.find(&entry) {
            Some(idx) => idx,
            None => return Ok(Some(entry)),
        };

        if idx >= 26 {
            self.push_byte(b'A');
            self.mangle_index(idx as u64 - 26);
            return Ok(None);
        }

        let subst = b'A' + idx as u8;
        if !self.merging.try_merge(&mut self.buffer, subst, false) {
            self.push_byte(b'A');
            self.push_byte(subst);
        }

        Ok(None)
    }

    fn with_substitution(
        &mut self,
        node: &Node,
        mangle: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if let Some(entry) = self.lookup_substitution(node, false)? {
            mangle(self)?;
            self.substitutions.insert(entry);
        }

        Ok(())
    }

    fn mangle_standard_substitution(&mut self, node: &Node) -> Result<bool> {
        if !matches!(node.kind(), Kind::Structure | Kind::Enum | Kind::Protocol) {
            return Ok(false);
        }

        if !node.child(0)?.is_swift_module() {
            return Ok(false);
        }

        // private stdlib names
        let name = node.child(1)?;
        if name.kind() != Kind::Identifier {
            return Ok(false);
        }

        let subst = match subs::standard_letter(name.require_text()?) {
            Some(subst) => subst,
            None => return Ok(false),
        };

        if !self.merging.try_merge(&mut self.buffer, subst, true) {
            self.push_byte(b'S');
            self.push_byte(subst);
        }

        Ok(true)
    }

    fn mangle_identifier(&mut self, node: &Node, is_operator: bool) -> Result<()> {
        let entry = match self.lookup_substitution(node, true)? {
            Some(entry) => entry,
            None => return Ok(()),
        };

        let text = node.require_text()?;
        if is_operator {
            let translated: String = text.chars().map(subs::translate_operator_char).collect();
            self.mangle_identifier_text(&translated)?;
        } else {
            self.mangle_identifier_text(text)?;
        }

        self.substitutions.insert(entry);
        Ok(())
    }

    fn mangle_operator(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.mangle_identifier(node, true)?;
        self.push(op);
        Ok(())
    }

    /// Emit an identifier, replacing words that were seen before with their
    /// index in the word list.
    fn mangle_identifier_text(&mut self, ident: &str) -> Result<()> {
        if punycode::needs_encoding(ident) {
            let encoded = punycode::encode(ident, true).ok_or(Error::Overflow)?;
            self.push(b"00");
            self.push_num(encoded.len() as u64);
            if encoded.starts_with(|c: char| c.is_ascii_digit() || c == '_') {
                self.push_byte(b'_');
            }

            self.push(encoded.as_bytes());
            return Ok(());
        }

        let ident = ident.as_bytes();
        let mut words_in_buffer = self.words.len();

        // (position in the identifier, index of the replacing word)
        let mut replacements: Vec<(usize, Option<usize>)> = Vec::new();
        let mut word_start = None;
        for pos in 0..=ident.len() {
            let c = ident.get(pos).copied().unwrap_or(0);
            if let Some(start) = word_start {
                if subs::is_word_end(c, ident[pos - 1]) {
                    let word = &ident[start..pos];
                    let found = self
                        .find_word(word, &self.buffer, 0..words_in_buffer)
                        .or_else(|| self.find_word(word, ident, words_in_buffer..self.words.len()));

                    match found {
                        Some(idx) => replacements.push((start, Some(idx))),
                        None if word.len() >= 2 && self.words.len() < MAX_NUM_WORDS => {
                            // relative to the identifier until it's emitted
                            self.words.push(Word {
                                start,
                                len: word.len(),
                            });
                        }
                        None => {}
                    }

                    word_start = None;
                }
            }

            if word_start.is_none() && subs::is_word_start(c) {
                word_start = Some(pos);
            }
        }

        if !replacements.is_empty() {
            self.push_byte(b'0');
        }

        replacements.push((ident.len(), None));

        let mut pos = 0;
        let count = replacements.len();
        for (idx, &(string_pos, word)) in replacements.iter().enumerate() {
            if pos < string_pos {
                if ident[pos].is_ascii_digit() {
                    return Err(Error::Structural);
                }

                self.push_num((string_pos - pos) as u64);
                while pos < string_pos {
                    if words_in_buffer < self.words.len() && self.words[words_in_buffer].start == pos {
                        self.words[words_in_buffer].start = self.buffer.len();
                        words_in_buffer += 1;
                    }

                    self.push_byte(ident[pos]);
                    pos += 1;
                }
            }

            if let Some(word) = word {
                pos += self.words[word].len;
                if idx + 2 < count {
                    self.push_byte(b'a' + word as u8);
                } else {
                    // the last replacement is upper case
                    self.push_byte(b'A' + word as u8);
                    if pos == ident.len() {
                        self.push_byte(b'0');
                    }
                }
            }
        }

        Ok(())
    }

    fn find_word(&self, word: &[u8], source: &[u8], range: std::ops::Range<usize>) -> Option<usize> {
        range.into_iter().find(|&idx| {
            let Word { start, len } = self.words[idx];
            source.get(start..start + len) == Some(word)
        })
    }

    fn mangle_module(&mut self, node: &Node) -> Result<()> {
        match node.require_text()? {
            crate::STDLIB_NAME => self.push_byte(b's'),
            crate::MANGLING_MODULE_OBJC => self.push(b"So"),
            crate::MANGLING_MODULE_CLANG_IMPORTER => self.push(b"SC"),
            _ => return self.mangle_identifier(node, false),
        }

        Ok(())
    }

    fn mangle_pure_protocol(&mut self, proto: &Node) -> Result<()> {
        let proto = proto.skip_type();
        if self.mangle_standard_substitution(proto)? {
            return Ok(());
        }

        self.mangle_children(proto)
    }

    fn mangle_any_generic_type(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.with_substitution(node, |r| r.children_then(node, op))
    }

    fn mangle_any_nominal_type(&mut self, node: &Node) -> Result<()> {
        if !node.is_specialized() {
            let op: &[u8] = match node.kind() {
                Kind::Structure => b"V",
                Kind::Enum => b"O",
                Kind::Class => b"C",
                Kind::OtherNominalType => b"XY",
                Kind::TypeAlias => b"a",
                Kind::Protocol => b"P",
                _ => return Err(Error::Structural),
            };

            return self.mangle_any_generic_type(node, op);
        }

        // a symbolically referenced type has no parent contexts, all of the
        // arguments are in a single list
        let unbound = Self::child_of_type(node.child(0)?)?;
        if matches!(
            unbound.kind(),
            Kind::TypeSymbolicReference | Kind::ProtocolSymbolicReference
        ) {
            return self.with_substitution(node, |r| {
                r.mangle(unbound)?;
                r.push_byte(b'y');
                r.mangle_children(node.child(1)?)?;

                if let Some(retroactive) = node.children().get(2) {
                    r.mangle_children(retroactive)?;
                }

                r.push_byte(b'G');
                Ok(())
            });
        }

        self.with_substitution(node, |r| {
            r.mangle_any_nominal_type(&node.unspecialized()?)?;

            let mut separator = b'y';
            r.mangle_generic_args(node, &mut separator, false)?;

            if let Some(retroactive) = node.children().get(2) {
                r.mangle_children(retroactive)?;
            }

            r.push_byte(b'G');
            Ok(())
        })
    }

    /// Generic arguments of `node` and its parent contexts, outermost first.
    fn mangle_generic_args(&mut self, node: &Node, separator: &mut u8, full: bool) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooMuchRecursion);
        }

        self.depth += 1;
        let result = self.mangle_generic_args_inner(node, separator, full);
        self.depth -= 1;
        result
    }

    fn mangle_generic_args_inner(&mut self, node: &Node, separator: &mut u8, full: bool) -> Result<()> {
        match node.kind() {
            Kind::Structure | Kind::Enum | Kind::Class | Kind::TypeAlias => {
                let full = full || node.kind() == Kind::TypeAlias;
                self.mangle_generic_args(node.child(0)?, separator, full)?;
                self.push_byte(*separator);
                *separator = b'_';
            }
            Kind::Function
            | Kind::Getter
            | Kind::Setter
            | Kind::WillSet
            | Kind::DidSet
            | Kind::ReadAccessor
            | Kind::ModifyAccessor
            | Kind::UnsafeAddressor
            | Kind::UnsafeMutableAddressor
            | Kind::Allocator
            | Kind::Constructor
            | Kind::Destructor
            | Kind::Variable
            | Kind::Subscript
            | Kind::ExplicitClosure
            | Kind::ImplicitClosure
            | Kind::DefaultArgumentInitializer
            | Kind::Initializer => {
                if !full {
                    return Ok(());
                }

                self.mangle_generic_args(node.child(0)?, separator, full)?;
                if node.kind().consumes_generic_args() {
                    self.push_byte(*separator);
                    *separator = b'_';
                }
            }
            Kind::BoundGenericOtherNominalType
            | Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericClass
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericTypeAlias => {
                let full = full || node.kind() == Kind::BoundGenericTypeAlias;
                let nominal = Self::child_of_type(node.child(0)?)?;
                self.mangle_generic_args(nominal.child(0)?, separator, full)?;
                self.push_byte(*separator);
                *separator = b'_';
                self.mangle_children(node.child(1)?)?;
            }
            Kind::BoundGenericFunction => {
                let function = node.child(0)?;
                if !matches!(function.kind(), Kind::Function | Kind::Constructor) {
                    return Err(Error::Structural);
                }

                self.mangle_generic_args(function.child(0)?, separator, true)?;
                self.push_byte(*separator);
                *separator = b'_';
                self.mangle_children(node.child(1)?)?;
            }
            Kind::Extension => self.mangle_generic_args(node.child(1)?, separator, full)?,
            _ => {}
        }

        Ok(())
    }

    fn mangle_bound_generic_enum(&mut self, node: &Node) -> Result<()> {
        let enumeration = Self::child_of_type(node.child(0)?)?;
        if enumeration.kind() != Kind::Enum {
            return Err(Error::Structural);
        }

        let is_optional = enumeration.child(0)?.is_swift_module()
            && enumeration.child(1)?.is_identifier("Optional");

        if !is_optional {
            return self.mangle_any_nominal_type(node);
        }

        self.with_substitution(node, |r| {
            r.mangle_single_child(node.child(1)?)?;
            r.push(b"Sg");
            Ok(())
        })
    }

    fn mangle_bound_generic_function(&mut self, node: &Node) -> Result<()> {
        self.with_substitution(node, |r| {
            r.mangle_function(&node.unspecialized()?)?;

            let mut separator = b'y';
            r.mangle_generic_args(node, &mut separator, false)?;
            r.push_byte(b'G');
            Ok(())
        })
    }

    /// The control byte is kept in the upper half of the index payload, a
    /// payload without one is taken as a direct reference.
    fn mangle_symbolic_reference(&mut self, node: &Node) -> Result<()> {
        let index = node.require_index()?;
        let raw_kind = match (index >> 32) as u8 {
            0 => 1,
            raw_kind @ 0x01..=0x17 => raw_kind,
            _ => return Err(Error::UnsupportedConstruct),
        };

        self.with_substitution(node, |r| {
            r.push_byte(raw_kind);
            r.push(&(index as u32).to_le_bytes());
            Ok(())
        })
    }

    fn mangle_opaque_type(&mut self, node: &Node) -> Result<()> {
        self.with_substitution(node, |r| {
            r.mangle_child(node, 0)?;

            let bound_generics = node.child(2)?;
            for (idx, types) in bound_generics.children().iter().enumerate() {
                r.push_byte(if idx == 0 { b'y' } else { b'_' });
                r.mangle_children(types)?;
            }

            if let Some(retroactive) = node.children().get(3) {
                r.mangle_children(retroactive)?;
            }

            r.push(b"Qo");
            r.mangle_index(node.child(1)?.require_index()?);
            Ok(())
        })
    }

    fn mangle_builtin_type(&mut self, node: &Node) -> Result<()> {
        let text = node.require_text()?;
        let name = text.strip_prefix("Builtin.").ok_or(Error::Structural)?;

        self.push_byte(b'B');
        match name {
            "BridgeObject" => self.push_byte(b'b'),
            "UnsafeValueBuffer" => self.push_byte(b'B'),
            "UnknownObject" => self.push_byte(b'O'),
            "NativeObject" => self.push_byte(b'o'),
            "RawPointer" => self.push_byte(b'p'),
            "SILToken" => self.push_byte(b't'),
            "IntLiteral" => self.push_byte(b'I'),
            "Word" => self.push_byte(b'w'),
            _ => {
                if let Some(bits) = name.strip_prefix("Int") {
                    self.push_byte(b'i');
                    self.push(bits.as_bytes());
                    self.push_byte(b'_');
                } else if let Some(bits) = name.strip_prefix("FPIEEE") {
                    self.push_byte(b'f');
                    self.push(bits.as_bytes());
                    self.push_byte(b'_');
                } else if let Some(vector) = name.strip_prefix("Vec") {
                    let (count, element) = vector.split_once('x').ok_or(Error::Structural)?;
                    if element == "RawPointer" {
                        self.push_byte(b'p');
                    } else if let Some(bits) = element.strip_prefix("FPIEEE") {
                        self.push_byte(b'f');
                        self.push(bits.as_bytes());
                        self.push_byte(b'_');
                    } else if let Some(bits) = element.strip_prefix("Int") {
                        self.push_byte(b'i');
                        self.push(bits.as_bytes());
                        self.push_byte(b'_');
                    } else {
                        return Err(Error::Structural);
                    }

                    self.push(b"Bv");
                    self.push(count.as_bytes());
                    self.push_byte(b'_');
                } else {
                    return Err(Error::Structural);
                }
            }
        }

        Ok(())
    }

    fn mangle_type_list(&mut self, node: &Node) -> Result<()> {
        let mut is_first = true;
        for child in node.children() {
            self.mangle(child)?;
            self.list_separator(&mut is_first);
        }

        self.end_of_list(is_first);
        Ok(())
    }

    fn mangle_argument_tuple(&mut self, node: &Node) -> Result<()> {
        let child = Self::single_child(node)?.skip_type();
        if child.kind() == Kind::Tuple && child.children().is_empty() {
            self.push_byte(b'y');
            return Ok(());
        }

        self.mangle(child)
    }

    fn mangle_metatype(&mut self, node: &Node, repr_op: &[u8], op: &[u8]) -> Result<()> {
        if node.child(0)?.kind() == Kind::MetatypeRepresentation {
            self.mangle_child(node, 1)?;
            self.push(repr_op);
            return self.mangle_child(node, 0);
        }

        self.single_then(node, op)
    }

    fn mangle_protocol_list(
        &mut self,
        node: &Node,
        superclass: Option<&Node>,
        any_object: bool,
    ) -> Result<()> {
        let protocols = Self::single_child(node)?;
        if protocols.kind() != Kind::TypeList {
            return Err(Error::Structural);
        }

        let mut is_first = true;
        for proto in protocols.children() {
            self.mangle_pure_protocol(proto)?;
            self.list_separator(&mut is_first);
        }

        self.end_of_list(is_first);

        if let Some(superclass) = superclass {
            self.mangle_type(superclass)?;
            self.push(b"Xc");
        } else if any_object {
            self.push(b"Xl");
        } else {
            self.push_byte(b'p');
        }

        Ok(())
    }

    fn mangle_impl_function_type(&mut self, node: &Node) -> Result<()> {
        let mut pseudo_generic = false;
        let mut signature = None;
        for child in node.children() {
            match child.kind() {
                Kind::ImplParameter | Kind::ImplResult | Kind::ImplErrorResult => {
                    self.mangle_child(child, 1)?;
                }
                Kind::DependentPseudogenericSignature => {
                    pseudo_generic = true;
                    signature = Some(child);
                }
                Kind::DependentGenericSignature => signature = Some(child),
                _ => {}
            }
        }

        if let Some(signature) = signature {
            self.mangle_dependent_generic_signature(signature)?;
        }

        self.push_byte(b'I');
        if pseudo_generic {
            self.push_byte(b'P');
        }

        for child in node.children() {
            match child.kind() {
                Kind::ImplEscaping => self.push_byte(b'e'),
                Kind::ImplConvention => {
                    let convention = match child.require_text()? {
                        "@callee_unowned" => b'y',
                        "@callee_guaranteed" => b'g',
                        "@callee_owned" => b'x',
                        "@convention(thin)" => b't',
                        _ => return Err(Error::Structural),
                    };

                    self.push_byte(convention);
                }
                Kind::ImplFunctionAttribute => {
                    let attr = match child.require_text()? {
                        "@convention(block)" => b'B',
                        "@convention(c)" => b'C',
                        "@convention(method)" => b'M',
                        "@convention(objc_method)" => b'O',
                        "@convention(closure)" => b'K',
                        "@convention(witness_method)" => b'W',
                        _ => return Err(Error::Structural),
                    };

                    self.push_byte(attr);
                }
                Kind::ImplParameter => {
                    let convention = match child.child(0)?.require_text()? {
                        "@in" => b'i',
                        "@inout" => b'l',
                        "@inout_aliasable" => b'b',
                        "@in_guaranteed" => b'n',
                        "@in_constant" => b'c',
                        "@owned" => b'x',
                        "@guaranteed" => b'g',
                        "@deallocating" => b'e',
                        "@unowned" => b'y',
                        _ => return Err(Error::Structural),
                    };

                    self.push_byte(convention);
                }
                Kind::ImplResult | Kind::ImplErrorResult => {
                    if child.kind() == Kind::ImplErrorResult {
                        self.push_byte(b'z');
                    }

                    let convention = match child.child(0)?.require_text()? {
                        "@out" => b'r',
                        "@owned" => b'o',
                        "@unowned" => b'd',
                        "@unowned_inner_pointer" => b'u',
                        "@autoreleased" => b'a',
                        _ => return Err(Error::Structural),
                    };

                    self.push_byte(convention);
                }
                _ => {}
            }
        }

        self.push_byte(b'_');
        Ok(())
    }

    fn mangle_sil_box_type_with_layout(&mut self, node: &Node) -> Result<()> {
        let layout = node.child(0)?;
        if layout.kind() != Kind::SILBoxLayout {
            return Err(Error::Structural);
        }

        // mutable fields are mangled as inout types
        let mut fields = Node::new(Kind::TypeList);
        for field in layout.children() {
            let ty = Self::single_child(field)?;
            if ty.kind() != Kind::Type {
                return Err(Error::Structural);
            }

            match field.kind() {
                Kind::SILBoxImmutableField => fields.push(ty.clone()),
                Kind::SILBoxMutableField => {
                    let inner = Self::single_child(ty)?.clone();
                    fields.push(Node::with_child(
                        Kind::Type,
                        Node::with_child(Kind::InOut, inner),
                    ));
                }
                _ => return Err(Error::Structural),
            }
        }

        self.mangle_type_list(&fields)?;

        match node.children() {
            [_] => self.push(b"Xx"),
            [_, signature, args] => {
                if signature.kind() != Kind::DependentGenericSignature || args.kind() != Kind::TypeList {
                    return Err(Error::Structural);
                }

                self.mangle_type_list(args)?;
                self.mangle_dependent_generic_signature(signature)?;
                self.push(b"XX");
            }
            _ => return Err(Error::Structural),
        }

        Ok(())
    }

    fn mangle_dependent_generic_param_index(
        &mut self,
        node: &Node,
        non_zero_prefix: &[u8],
        zero_op: u8,
    ) -> Result<()> {
        let depth = node.child(0)?.require_index()?;
        let index = node.child(1)?.require_index()?;

        if depth != 0 {
            self.push(non_zero_prefix);
            self.push_byte(b'd');
            self.mangle_index(depth - 1);
            self.mangle_index(index);
        } else if index != 0 {
            self.push(non_zero_prefix);
            self.mangle_index(index - 1);
        } else {
            self.push_byte(zero_op);
        }

        Ok(())
    }

    /// Mangle the subject of a requirement or a member type.
    ///
    /// Returns the length of the member chain and the generic parameter it
    /// is rooted in, or `None` if the whole type was substituted.
    fn mangle_constrained_type<'n>(&mut self, node: &'n Node) -> Result<Option<(usize, &'n Node)>> {
        let mut node = node.skip_type();
        let entry = match self.lookup_substitution(node, false)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let mut chain = Vec::new();
        while node.kind() == Kind::DependentMemberType {
            chain.push(node.child(1)?);
            node = Self::child_of_type(node.child(0)?)?;
        }

        if node.kind() != Kind::DependentGenericParamType {
            return Err(Error::Structural);
        }

        let mut separator: &[u8] = if chain.len() > 1 { b"_" } else { b"" };
        for assoc in chain.iter().rev() {
            self.mangle(assoc)?;
            self.push(separator);
            separator = b"";
        }

        if !chain.is_empty() {
            self.substitutions.insert(entry);
        }

        Ok(Some((chain.len(), node)))
    }

    /// Emits `ops[0]` if the subject was substituted, otherwise the operator
    /// for a chain of zero, one or more members followed by the parameter.
    fn mangle_requirement_subject(&mut self, subject: &Node, ops: [&[u8]; 4]) -> Result<()> {
        let (members, param) = match self.mangle_constrained_type(subject)? {
            Some(constrained) => constrained,
            None => {
                self.push(ops[0]);
                return Ok(());
            }
        };

        self.push(ops[members.min(2) + 1]);
        self.mangle_dependent_generic_param_index(param, b"", b'z')
    }

    fn mangle_conformance_requirement(&mut self, node: &Node) -> Result<()> {
        let proto_or_class = node.child(1)?;
        if proto_or_class.child(0)?.kind() == Kind::Protocol {
            self.mangle_pure_protocol(proto_or_class)?;
            return self.mangle_requirement_subject(node.child(0)?, [b"RQ", b"R", b"Rp", b"RP"]);
        }

        self.mangle(proto_or_class)?;
        self.mangle_requirement_subject(node.child(0)?, [b"RB", b"Rb", b"Rc", b"RC"])
    }

    fn mangle_layout_requirement(&mut self, node: &Node) -> Result<()> {
        match self.mangle_constrained_type(node.child(0)?)? {
            None => self.push(b"RL"),
            Some((members, param)) => {
                self.push(match members {
                    0 => b"Rl",
                    1 => b"Rm",
                    _ => b"RM",
                });
                self.mangle_dependent_generic_param_index(param, b"", b'z')?;
            }
        }

        let name = node.child(1)?;
        match name.text() {
            Some(text) if name.kind() == Kind::Identifier && text.len() == 1 => {
                self.push(text.as_bytes());
            }
            _ => return Err(Error::Structural),
        }

        // size and alignment
        for child in node.children().iter().skip(2).take(2) {
            self.mangle(child)?;
        }

        Ok(())
    }

    fn mangle_dependent_generic_signature(&mut self, node: &Node) -> Result<()> {
        let mut param_count_end = 0;
        for (idx, child) in node.children().iter().enumerate() {
            if child.kind() == Kind::DependentGenericParamCount {
                param_count_end = idx + 1;
            } else {
                self.mangle(child)?;
            }
        }

        // a single generic parameter is implied
        if param_count_end == 1 && node.child(0)?.index() == Some(1) {
            self.push_byte(b'l');
            return Ok(());
        }

        self.push_byte(b'r');
        for count in &node.children()[..param_count_end] {
            match count.require_index()? {
                0 => self.push_byte(b'z'),
                count => self.mangle_index(count - 1),
            }
        }

        self.push_byte(b'l');
        Ok(())
    }

    fn mangle_dependent_member_type(&mut self, node: &Node) -> Result<()> {
        match self.mangle_constrained_type(node)? {
            None => Ok(()),
            Some((0, _)) => Err(Error::Structural),
            Some((1, param)) => {
                self.push_byte(b'Q');
                self.mangle_dependent_generic_param_index(param, b"y", b'z')
            }
            Some((_, param)) => {
                self.push_byte(b'Q');
                self.mangle_dependent_generic_param_index(param, b"Y", b'Z')
            }
        }
    }

    fn mangle_protocol_conformance(&mut self, node: &Node) -> Result<()> {
        let mut ty = Self::child_of_type(node.child(0)?)?;
        let mut signature = None;
        if ty.kind() == Kind::DependentGenericType {
            signature = Some(ty.child(0)?);
            ty = ty.child(1)?;
        }

        self.mangle(ty)?;
        if let Some(ident) = node.children().get(3) {
            self.mangle(ident)?;
        }

        self.mangle_pure_protocol(node.child(1)?)?;
        self.mangle_child(node, 2)?;
        if let Some(signature) = signature {
            self.mangle(signature)?;
        }

        Ok(())
    }

    fn mangle_any_protocol_conformance(&mut self, node: &Node) -> Result<()> {
        match node.kind() {
            Kind::ConcreteProtocolConformance => {
                self.mangle_type(node.child(0)?)?;
                self.mangle_child(node, 1)?;
                match node.children().get(2) {
                    Some(list) => self.mangle_any_protocol_conformance_list(list)?,
                    None => self.push_byte(b'y'),
                }

                self.push(b"HC");
            }
            Kind::DependentProtocolConformanceRoot => {
                self.mangle_type(node.child(0)?)?;
                self.mangle_pure_protocol(node.child(1)?)?;
                self.push(b"HD");
                self.mangle_dependent_conformance_index(node.child(2)?)?;
            }
            Kind::DependentProtocolConformanceInherited => {
                self.mangle_any_protocol_conformance(node.child(0)?)?;
                self.mangle_pure_protocol(node.child(1)?)?;
                self.push(b"HI");
                self.mangle_dependent_conformance_index(node.child(2)?)?;
            }
            Kind::DependentProtocolConformanceAssociated => {
                self.mangle_any_protocol_conformance(node.child(0)?)?;
                self.mangle_child(node, 1)?;
                self.push(b"HA");
                self.mangle_dependent_conformance_index(node.child(2)?)?;
            }
            _ => return Err(Error::Structural),
        }

        Ok(())
    }

    fn mangle_any_protocol_conformance_list(&mut self, node: &Node) -> Result<()> {
        let mut is_first = true;
        for child in node.children() {
            self.mangle_any_protocol_conformance(child)?;
            self.list_separator(&mut is_first);
        }

        self.end_of_list(is_first);
        Ok(())
    }

    fn mangle_function(&mut self, node: &Node) -> Result<()> {
        self.mangle_child(node, 0)?;
        self.mangle_child(node, 1)?;

        let has_labels = node.child(2)?.kind() == Kind::LabelList;
        let func_type = Self::single_child(node.child(if has_labels { 3 } else { 2 })?)?;

        if has_labels {
            self.mangle_child(node, 2)?;
        }

        if func_type.kind() == Kind::DependentGenericType {
            let inner = Self::single_child(func_type.child(1)?)?;
            self.mangle_children_reversed(inner)?;
            self.mangle_child(func_type, 0)?;
        } else {
            self.mangle_children_reversed(func_type)?;
        }

        self.push_byte(b'F');
        Ok(())
    }

    fn mangle_closure(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        self.mangle_child(node, 0)?;
        self.mangle_child(node, 2)?;
        self.push(op);
        self.mangle_child(node, 1)
    }

    fn mangle_abstract_storage(&mut self, node: &Node, accessor: &[u8]) -> Result<()> {
        self.mangle_children(node)?;
        match node.kind() {
            Kind::Subscript => self.push_byte(b'i'),
            Kind::Variable => self.push_byte(b'v'),
            _ => return Err(Error::Structural),
        }

        self.push(accessor);
        Ok(())
    }

    fn mangle_accessor(&mut self, node: &Node, accessor: &[u8]) -> Result<()> {
        self.mangle_abstract_storage(node.child(0)?, accessor)
    }

    fn mangle_key_path_thunk_helper(&mut self, node: &Node, op: &[u8]) -> Result<()> {
        for child in node.children() {
            if child.kind() != Kind::IsSerialized {
                self.mangle(child)?;
            }
        }

        self.push(op);
        for child in node.children() {
            if child.kind() == Kind::IsSerialized {
                self.mangle(child)?;
            }
        }

        Ok(())
    }

    fn mangle_generic_specialization(&mut self, node: &Node) -> Result<()> {
        let mut is_first = true;
        for child in node.children() {
            if child.kind() == Kind::GenericSpecializationParam {
                self.mangle_child(child, 0)?;
                self.list_separator(&mut is_first);
            }
        }

        // a specialization without substitutions
        if is_first {
            return Err(Error::Structural);
        }

        self.push(match node.kind() {
            Kind::GenericSpecialization => b"Tg",
            Kind::GenericSpecializationNotReAbstracted => b"TG",
            _ => b"Ti",
        });

        for child in node.children() {
            if child.kind() != Kind::GenericSpecializationParam {
                self.mangle(child)?;
            }
        }

        Ok(())
    }

    fn mangle_generic_partial_specialization(&mut self, node: &Node) -> Result<()> {
        if let Some(param) = node.child_of_kind(Kind::GenericSpecializationParam) {
            self.mangle_child(param, 0)?;
        }

        self.push(match node.kind() {
            Kind::GenericPartialSpecializationNotReAbstracted => b"TP",
            _ => b"Tp",
        });

        for child in node.children() {
            if child.kind() != Kind::GenericSpecializationParam {
                self.mangle(child)?;
            }
        }

        Ok(())
    }

    fn mangle_function_signature_specialization(&mut self, node: &Node) -> Result<()> {
        // payloads of constant propagated parameters come first
        for param in node.children() {
            if param.kind() != Kind::FunctionSignatureSpecializationParam {
                continue;
            }

            let kind = match param.children().first() {
                Some(kind) => kind.require_index()?,
                None => continue,
            };

            match kind {
                param_kind::CONSTANT_PROP_FUNCTION | param_kind::CONSTANT_PROP_GLOBAL => {
                    self.mangle_identifier(param.child(1)?, false)?;
                }
                param_kind::CONSTANT_PROP_STRING => {
                    let text = param.child(2)?.require_text()?;

                    // escape a leading digit or '_'
                    if text.starts_with(|c: char| c.is_ascii_digit() || c == '_') {
                        let escaped = Node::with_text(Kind::Identifier, format!("_{text}"));
                        self.mangle_identifier(&escaped, false)?;
                    } else {
                        self.mangle_identifier(param.child(2)?, false)?;
                    }
                }
                param_kind::CLOSURE_PROP => {
                    self.mangle_identifier(param.child(1)?, false)?;
                    for ty in param.children().iter().skip(2) {
                        self.mangle_type(ty)?;
                    }
                }
                _ => {}
            }
        }

        self.push(b"Tf");

        let mut has_return = false;
        for child in node.children() {
            if child.kind() == Kind::FunctionSignatureSpecializationReturn {
                self.push_byte(b'_');
                has_return = true;
            }

            self.mangle(child)?;
        }

        if !has_return {
            self.push(b"_n");
        }

        Ok(())
    }

    fn mangle_function_signature_specialization_param(&mut self, node: &Node) -> Result<()> {
        let kind = match node.children().first() {
            Some(kind) => kind.require_index()?,
            None => {
                self.push_byte(b'n');
                return Ok(());
            }
        };

        match kind {
            param_kind::CONSTANT_PROP_FUNCTION => self.push(b"pf"),
            param_kind::CONSTANT_PROP_GLOBAL => self.push(b"pg"),
            param_kind::CONSTANT_PROP_INTEGER => {
                self.push(b"pi");
                self.push(node.child(1)?.require_text()?.as_bytes());
            }
            param_kind::CONSTANT_PROP_FLOAT => {
                self.push(b"pd");
                self.push(node.child(1)?.require_text()?.as_bytes());
            }
            param_kind::CONSTANT_PROP_STRING => {
                let encoding = match node.child(1)?.require_text()? {
                    "u8" => b'b',
                    "u16" => b'w',
                    "objc" => b'c',
                    _ => return Err(Error::Structural),
                };

                self.push(b"ps");
                self.push_byte(encoding);
            }
            param_kind::CLOSURE_PROP => self.push_byte(b'c'),
            param_kind::BOX_TO_VALUE => self.push_byte(b'i'),
            param_kind::BOX_TO_STACK => self.push_byte(b's'),
            _ if kind == ParamFlags::SROA.bits() => self.push_byte(b'x'),
            _ => {
                let flags = ParamFlags::from_bits(kind).ok_or(Error::Structural)?;
                let ownership = |r: &mut Self| {
                    if flags.contains(ParamFlags::OWNED_TO_GUARANTEED) {
                        r.push_byte(b'G');
                    }

                    if flags.contains(ParamFlags::GUARANTEED_TO_OWNED) {
                        r.push_byte(b'O');
                    }
                };

                if flags.contains(ParamFlags::EXISTENTIAL_TO_GENERIC) {
                    self.push_byte(b'e');
                    if flags.contains(ParamFlags::DEAD) {
                        self.push_byte(b'D');
                    }

                    ownership(self);
                } else if flags.contains(ParamFlags::DEAD) {
                    self.push_byte(b'd');
                    ownership(self);
                } else if flags.contains(ParamFlags::OWNED_TO_GUARANTEED) {
                    self.push_byte(b'g');
                } else if flags.contains(ParamFlags::GUARANTEED_TO_OWNED) {
                    self.push_byte(b'o');
                }

                if flags.contains(ParamFlags::SROA) {
                    self.push_byte(b'X');
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(text: &str) -> Node {
        Node::with_text(Kind::Identifier, text)
    }

    fn mangled(node: &Node) -> String {
        String::from_utf8(Remangler::new().finish(node).unwrap()).unwrap()
    }

    #[test]
    fn identifiers() {
        assert_eq!(mangled(&ident("main")), "4main");
        assert_eq!(mangled(&ident("ü")), "003tda");
    }

    #[test]
    fn word_substitutions() {
        let mut remangler = Remangler::new();
        remangler.mangle(&ident("FooBar")).unwrap();
        remangler.mangle(&ident("BarFoo")).unwrap();
        assert_eq!(remangler.buffer, b"6FooBar0bA0");
    }

    #[test]
    fn merged_substitutions() {
        let mut buffer = b"AB".to_vec();
        let mut merging = SubstMerging {
            position: 1,
            size: 1,
            count: 1,
            is_standard: false,
        };

        assert!(merging.try_merge(&mut buffer, b'C', false));
        assert_eq!(buffer, b"AbC");
        assert!(merging.try_merge(&mut buffer, b'C', false));
        assert_eq!(buffer, b"Ab2C");
        assert!(!merging.try_merge(&mut buffer, b'i', true));
    }

    #[test]
    fn standard_substitutions() {
        let int = Node::new(Kind::Structure)
            .child_of(Node::with_text(Kind::Module, "Swift"))
            .child_of(ident("Int"));
        let tuple = Node::new(Kind::TypeList)
            .child_of(Node::with_child(Kind::Type, int.clone()))
            .child_of(Node::with_child(Kind::Type, int));

        assert_eq!(mangled(&tuple), "Si_Si");
    }

    #[test]
    fn unsupported_kinds() {
        let node = Node::new(Kind::VTableAttribute);
        assert_eq!(Remangler::new().finish(&node), Err(Error::UnsupportedConstruct));
    }
}
