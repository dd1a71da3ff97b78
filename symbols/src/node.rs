//! The tree a mangled symbol demangles into.
//!
//! A [`Node`] has a [`Kind`], at most one scalar [`Payload`] and an ordered
//! list of children. The shape of the children is dictated by the kind, e.g.
//! a `FunctionType` always has an `ArgumentTuple` followed by a `ReturnType`,
//! optionally preceded by a `ThrowsAnnotation`.

use std::fmt::{self, Write};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Every production of the mangling grammar.
///
/// The discriminant order is part of how remangler substitutions are hashed,
/// new kinds must be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Kind {
    Allocator,
    AnonymousContext,
    AnyProtocolConformanceList,
    ArgumentTuple,
    AssociatedType,
    AssociatedTypeRef,
    AssociatedTypeMetadataAccessor,
    DefaultAssociatedTypeMetadataAccessor,
    AssociatedTypeWitnessTableAccessor,
    BaseWitnessTableAccessor,
    AutoClosureType,
    BoundGenericClass,
    BoundGenericEnum,
    BoundGenericStructure,
    BoundGenericProtocol,
    BoundGenericOtherNominalType,
    BoundGenericTypeAlias,
    BoundGenericFunction,
    BuiltinTypeName,
    CFunctionPointer,
    Class,
    ClassMetadataBaseOffset,
    ConcreteProtocolConformance,
    Constructor,
    CoroutineContinuationPrototype,
    Deallocator,
    DeclContext,
    DefaultArgumentInitializer,
    DependentAssociatedConformance,
    DependentAssociatedTypeRef,
    DependentGenericConformanceRequirement,
    DependentGenericParamCount,
    DependentGenericParamType,
    DependentGenericSameTypeRequirement,
    DependentGenericLayoutRequirement,
    DependentGenericSignature,
    DependentGenericType,
    DependentMemberType,
    DependentPseudogenericSignature,
    DependentProtocolConformanceRoot,
    DependentProtocolConformanceInherited,
    DependentProtocolConformanceAssociated,
    Destructor,
    DidSet,
    Directness,
    DynamicAttribute,
    DirectMethodReferenceAttribute,
    DynamicSelf,
    DynamicallyReplaceableFunctionImpl,
    DynamicallyReplaceableFunctionKey,
    DynamicallyReplaceableFunctionVar,
    Enum,
    EnumCase,
    ErrorType,
    EscapingAutoClosureType,
    NoEscapeFunctionType,
    ExistentialMetatype,
    ExplicitClosure,
    Extension,
    FieldOffset,
    FullTypeMetadata,
    Function,
    FunctionSignatureSpecialization,
    FunctionSignatureSpecializationParam,
    FunctionSignatureSpecializationReturn,
    FunctionSignatureSpecializationParamKind,
    FunctionSignatureSpecializationParamPayload,
    FunctionType,
    GenericPartialSpecialization,
    GenericPartialSpecializationNotReAbstracted,
    GenericProtocolWitnessTable,
    GenericProtocolWitnessTableInstantiationFunction,
    ResilientProtocolWitnessTable,
    GenericSpecialization,
    GenericSpecializationNotReAbstracted,
    GenericSpecializationParam,
    InlinedGenericFunction,
    GenericTypeMetadataPattern,
    Getter,
    Global,
    GlobalGetter,
    Identifier,
    Index,
    IVarInitializer,
    IVarDestroyer,
    ImplEscaping,
    ImplConvention,
    ImplFunctionAttribute,
    ImplFunctionType,
    ImplicitClosure,
    ImplParameter,
    ImplResult,
    ImplErrorResult,
    InOut,
    InfixOperator,
    Initializer,
    KeyPathGetterThunkHelper,
    KeyPathSetterThunkHelper,
    KeyPathEqualsThunkHelper,
    KeyPathHashThunkHelper,
    LazyProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableCacheVariable,
    LocalDeclName,
    MaterializeForSet,
    MergedFunction,
    Metatype,
    MetatypeRepresentation,
    Metaclass,
    MethodLookupFunction,
    ObjCMetadataUpdateFunction,
    ObjCResilientClassStub,
    FullObjCResilientClassStub,
    ModifyAccessor,
    Module,
    NativeOwningAddressor,
    NativeOwningMutableAddressor,
    NativePinningAddressor,
    NativePinningMutableAddressor,
    NominalTypeDescriptor,
    NonObjCAttribute,
    Number,
    ObjCAttribute,
    ObjCBlock,
    OtherNominalType,
    OwningAddressor,
    OwningMutableAddressor,
    PartialApplyForwarder,
    PartialApplyObjCForwarder,
    PostfixOperator,
    PrefixOperator,
    PrivateDeclName,
    PropertyDescriptor,
    Protocol,
    ProtocolSymbolicReference,
    ProtocolConformance,
    ProtocolConformanceRefInTypeModule,
    ProtocolConformanceRefInProtocolModule,
    ProtocolConformanceRefInOtherModule,
    ProtocolDescriptor,
    ProtocolConformanceDescriptor,
    ProtocolList,
    ProtocolListWithClass,
    ProtocolListWithAnyObject,
    ProtocolSelfConformanceDescriptor,
    ProtocolSelfConformanceWitness,
    ProtocolSelfConformanceWitnessTable,
    ProtocolWitness,
    ProtocolWitnessTable,
    ProtocolWitnessTableAccessor,
    ProtocolWitnessTablePattern,
    ReabstractionThunk,
    ReabstractionThunkHelper,
    ReabstractionThunkHelperWithSelf,
    ReadAccessor,
    RelatedEntityDeclName,
    RetroactiveConformance,
    ReturnType,
    Shared,
    Owned,
    SILBoxType,
    SILBoxTypeWithLayout,
    SILBoxLayout,
    SILBoxMutableField,
    SILBoxImmutableField,
    Setter,
    SpecializationPassID,
    IsSerialized,
    Static,
    Structure,
    Subscript,
    Suffix,
    ThinFunctionType,
    Tuple,
    TupleElement,
    TupleElementName,
    Type,
    TypeSymbolicReference,
    TypeAlias,
    TypeList,
    TypeMangling,
    TypeMetadata,
    TypeMetadataAccessFunction,
    TypeMetadataCompletionFunction,
    TypeMetadataInstantiationCache,
    TypeMetadataInstantiationFunction,
    TypeMetadataSingletonInitializationCache,
    TypeMetadataLazyCache,
    UncurriedFunctionType,
    UnknownIndex,
    Weak,
    Unowned,
    Unmanaged,
    UnsafeAddressor,
    UnsafeMutableAddressor,
    ValueWitness,
    ValueWitnessTable,
    Variable,
    VTableThunk,
    VTableAttribute,
    WillSet,
    ReflectionMetadataBuiltinDescriptor,
    ReflectionMetadataFieldDescriptor,
    ReflectionMetadataAssocTypeDescriptor,
    ReflectionMetadataSuperclassDescriptor,
    GenericTypeParamDecl,
    CurryThunk,
    DispatchThunk,
    MethodDescriptor,
    ProtocolRequirementsBaseDescriptor,
    AssociatedConformanceDescriptor,
    DefaultAssociatedConformanceAccessor,
    BaseConformanceDescriptor,
    AssociatedTypeDescriptor,
    ThrowsAnnotation,
    EmptyList,
    FirstElementMarker,
    VariadicMarker,
    OutlinedBridgedMethod,
    OutlinedCopy,
    OutlinedConsume,
    OutlinedRetain,
    OutlinedRelease,
    OutlinedInitializeWithTake,
    OutlinedInitializeWithCopy,
    OutlinedAssignWithTake,
    OutlinedAssignWithCopy,
    OutlinedDestroy,
    OutlinedVariable,
    AssocTypePath,
    LabelList,
    ModuleDescriptor,
    ExtensionDescriptor,
    AnonymousDescriptor,
    AssociatedTypeGenericParamRef,
    SugaredOptional,
    SugaredArray,
    SugaredDictionary,
    SugaredParen,
    AccessorFunctionReference,
    OpaqueType,
    OpaqueTypeDescriptorSymbolicReference,
    OpaqueTypeDescriptor,
    OpaqueTypeDescriptorAccessor,
    OpaqueTypeDescriptorAccessorImpl,
    OpaqueTypeDescriptorAccessorKey,
    OpaqueTypeDescriptorAccessorVar,
    OpaqueReturnType,
    OpaqueReturnTypeOf,
}

impl Kind {
    /// Names, identifiers and symbolic references that name a declaration.
    pub fn is_decl_name(self) -> bool {
        matches!(
            self,
            Kind::Identifier
                | Kind::LocalDeclName
                | Kind::PrivateDeclName
                | Kind::RelatedEntityDeclName
                | Kind::PrefixOperator
                | Kind::PostfixOperator
                | Kind::InfixOperator
                | Kind::TypeSymbolicReference
                | Kind::ProtocolSymbolicReference
        )
    }

    pub fn is_any_generic(self) -> bool {
        matches!(
            self,
            Kind::Structure
                | Kind::Class
                | Kind::Enum
                | Kind::Protocol
                | Kind::ProtocolSymbolicReference
                | Kind::OtherNominalType
                | Kind::TypeAlias
                | Kind::TypeSymbolicReference
        )
    }

    /// Also accepts some kinds which are not entities.
    pub fn is_entity(self) -> bool {
        self == Kind::Type || self.is_context()
    }

    pub fn is_requirement(self) -> bool {
        matches!(
            self,
            Kind::DependentGenericSameTypeRequirement
                | Kind::DependentGenericLayoutRequirement
                | Kind::DependentGenericConformanceRequirement
        )
    }

    /// Kinds that can contain other declarations, e.g. a nominal type or a
    /// function.
    pub fn is_context(self) -> bool {
        matches!(
            self,
            Kind::Allocator
                | Kind::AnonymousContext
                | Kind::Class
                | Kind::Constructor
                | Kind::Deallocator
                | Kind::DefaultArgumentInitializer
                | Kind::Destructor
                | Kind::DidSet
                | Kind::Enum
                | Kind::ExplicitClosure
                | Kind::Extension
                | Kind::Function
                | Kind::Getter
                | Kind::GlobalGetter
                | Kind::IVarInitializer
                | Kind::IVarDestroyer
                | Kind::ImplicitClosure
                | Kind::Initializer
                | Kind::MaterializeForSet
                | Kind::ModifyAccessor
                | Kind::Module
                | Kind::NativeOwningAddressor
                | Kind::NativeOwningMutableAddressor
                | Kind::NativePinningAddressor
                | Kind::NativePinningMutableAddressor
                | Kind::OtherNominalType
                | Kind::OwningAddressor
                | Kind::OwningMutableAddressor
                | Kind::Protocol
                | Kind::ProtocolSymbolicReference
                | Kind::ReadAccessor
                | Kind::Setter
                | Kind::Static
                | Kind::Structure
                | Kind::Subscript
                | Kind::TypeSymbolicReference
                | Kind::TypeAlias
                | Kind::UnsafeAddressor
                | Kind::UnsafeMutableAddressor
                | Kind::Variable
                | Kind::WillSet
                | Kind::OpaqueReturnTypeOf
        )
    }

    /// Kinds that are placed before a function node in a `Global`, e.g. a
    /// specialization attribute.
    pub fn is_function_attr(self) -> bool {
        matches!(
            self,
            Kind::FunctionSignatureSpecialization
                | Kind::GenericSpecialization
                | Kind::InlinedGenericFunction
                | Kind::GenericSpecializationNotReAbstracted
                | Kind::GenericPartialSpecialization
                | Kind::GenericPartialSpecializationNotReAbstracted
                | Kind::ObjCAttribute
                | Kind::NonObjCAttribute
                | Kind::DynamicAttribute
                | Kind::DirectMethodReferenceAttribute
                | Kind::VTableAttribute
                | Kind::PartialApplyForwarder
                | Kind::PartialApplyObjCForwarder
                | Kind::OutlinedVariable
                | Kind::OutlinedBridgedMethod
                | Kind::MergedFunction
                | Kind::DynamicallyReplaceableFunctionImpl
                | Kind::DynamicallyReplaceableFunctionKey
                | Kind::DynamicallyReplaceableFunctionVar
        )
    }

    /// Whether generic arguments applied to this context belong to it, as
    /// opposed to its parent.
    pub fn consumes_generic_args(self) -> bool {
        !matches!(
            self,
            Kind::Variable
                | Kind::Subscript
                | Kind::ImplicitClosure
                | Kind::ExplicitClosure
                | Kind::DefaultArgumentInitializer
                | Kind::Initializer
        )
    }
}

/// The scalar carried by a node. A node never carries more than one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    None,
    Text(String),
    Index(u64),
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct NodeData {
    kind: Kind,
    payload: Payload,
    children: Vec<Node>,
    /// Levels of nesting, a leaf is at depth 1.
    depth: u32,
    /// Nodes in the tree once every shared subtree is expanded.
    weight: u32,
}

impl Drop for NodeData {
    fn drop(&mut self) {
        // unlink uniquely owned subtrees one at a time so a deep tree can't
        // exhaust the stack
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Some(mut data) = Arc::into_inner(child.0) {
                pending.append(&mut data.children);
            }
        }
    }
}

impl NodeData {
    fn measure(&mut self) {
        self.depth = 1;
        self.weight = 1;
        for child in self.children.iter() {
            self.depth = self.depth.max(child.depth().saturating_add(1));
            self.weight = self.weight.saturating_add(child.weight());
        }
    }

    #[inline]
    fn add_measure(&mut self, child: &Node) {
        self.depth = self.depth.max(child.depth().saturating_add(1));
        self.weight = self.weight.saturating_add(child.weight());
    }
}

/// A node of the tree.
///
/// Cloning a node is cheap, the subtree is shared and only copied once one
/// of the copies is modified. This is what keeps substitutions linear: every
/// back-reference refers to the same subtree as the node it resolves to.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Node(Arc<NodeData>);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut node = f.debug_struct("Node");
        node.field("kind", &self.0.kind);
        match self.0.payload {
            Payload::Text(ref text) => node.field("text", text),
            Payload::Index(index) => node.field("index", &index),
            Payload::None => &mut node,
        };

        if !self.0.children.is_empty() {
            node.field("children", &self.0.children);
        }

        node.finish()
    }
}

impl Node {
    #[inline]
    fn build(kind: Kind, payload: Payload, children: Vec<Node>) -> Self {
        let mut data = NodeData {
            kind,
            payload,
            children,
            depth: 1,
            weight: 1,
        };

        data.measure();
        Self(Arc::new(data))
    }

    #[inline]
    pub fn new(kind: Kind) -> Self {
        Self::build(kind, Payload::None, Vec::new())
    }

    #[inline]
    pub fn with_text(kind: Kind, text: impl Into<String>) -> Self {
        Self::build(kind, Payload::Text(text.into()), Vec::new())
    }

    #[inline]
    pub fn with_index(kind: Kind, index: u64) -> Self {
        Self::build(kind, Payload::Index(index), Vec::new())
    }

    #[inline]
    pub fn with_child(kind: Kind, child: Node) -> Self {
        Self::build(kind, Payload::None, vec![child])
    }

    #[inline]
    pub fn with_children(kind: Kind, children: Vec<Node>) -> Self {
        Self::build(kind, Payload::None, children)
    }

    /// Append a child, used while building a tree.
    #[inline]
    pub fn push(&mut self, child: Node) {
        let data = Arc::make_mut(&mut self.0);
        data.add_measure(&child);
        data.children.push(child);
    }

    /// Builder style variant of [`Node::push`].
    #[inline]
    pub fn child_of(mut self, child: Node) -> Self {
        self.push(child);
        self
    }

    /// Append every node in `children`.
    pub fn extend(&mut self, children: impl IntoIterator<Item = Node>) {
        let data = Arc::make_mut(&mut self.0);
        for child in children {
            data.add_measure(&child);
            data.children.push(child);
        }
    }

    /// Rearrange the children in place.
    pub(crate) fn update_children<R>(&mut self, f: impl FnOnce(&mut Vec<Node>) -> R) -> R {
        let data = Arc::make_mut(&mut self.0);
        let result = f(&mut data.children);
        data.measure();
        result
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.0.payload
    }

    #[inline]
    pub fn text(&self) -> Option<&str> {
        match self.0.payload {
            Payload::Text(ref text) => Some(text),
            _ => None,
        }
    }

    #[inline]
    pub fn index(&self) -> Option<u64> {
        match self.0.payload {
            Payload::Index(index) => Some(index),
            _ => None,
        }
    }

    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.0.children
    }

    /// Levels of nesting below and including this node.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    /// Number of nodes in the tree, counting shared subtrees every time they
    /// occur. Saturates at `u32::MAX`.
    #[inline]
    pub fn weight(&self) -> u32 {
        self.0.weight
    }

    pub(crate) fn into_children(self) -> Vec<Node> {
        match Arc::try_unwrap(self.0) {
            Ok(mut data) => std::mem::take(&mut data.children),
            Err(shared) => shared.children.clone(),
        }
    }

    /// Child at `idx`, treating a missing child as a malformed tree.
    #[inline]
    pub fn child(&self, idx: usize) -> Result<&Node> {
        self.0.children.get(idx).ok_or(Error::Structural)
    }

    /// Text payload, treating a missing one as a malformed tree.
    #[inline]
    pub fn require_text(&self) -> Result<&str> {
        self.text().ok_or(Error::Structural)
    }

    /// Index payload, treating a missing one as a malformed tree.
    #[inline]
    pub fn require_index(&self) -> Result<u64> {
        self.index().ok_or(Error::Structural)
    }

    /// First child with the given kind.
    pub fn child_of_kind(&self, kind: Kind) -> Option<&Node> {
        self.0.children.iter().find(|child| child.kind() == kind)
    }

    #[inline]
    pub fn is_identifier(&self, text: &str) -> bool {
        self.0.kind == Kind::Identifier && self.text() == Some(text)
    }

    #[inline]
    pub fn is_swift_module(&self) -> bool {
        self.0.kind == Kind::Module && self.text() == Some(crate::STDLIB_NAME)
    }

    /// Strip a `Type` wrapper, if there is one.
    pub fn skip_type(&self) -> &Node {
        match (self.0.kind, self.0.children.first()) {
            (Kind::Type, Some(child)) => child,
            _ => self,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.skip_type().kind(), Kind::Class | Kind::BoundGenericClass)
    }

    pub fn is_alias(&self) -> bool {
        self.skip_type().kind() == Kind::TypeAlias
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.skip_type().kind(), Kind::Enum | Kind::BoundGenericEnum)
    }

    pub fn is_protocol(&self) -> bool {
        matches!(
            self.skip_type().kind(),
            Kind::Protocol | Kind::ProtocolSymbolicReference
        )
    }

    pub fn is_struct(&self) -> bool {
        matches!(
            self.skip_type().kind(),
            Kind::Structure | Kind::BoundGenericStructure
        )
    }

    /// Whether generic arguments were applied to this node or one of its
    /// parent contexts.
    pub fn is_specialized(&self) -> bool {
        match self.0.kind {
            Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericClass
            | Kind::BoundGenericOtherNominalType
            | Kind::BoundGenericTypeAlias
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericFunction => true,
            Kind::Structure
            | Kind::Enum
            | Kind::Class
            | Kind::TypeAlias
            | Kind::OtherNominalType
            | Kind::Protocol
            | Kind::Function
            | Kind::Allocator
            | Kind::Constructor
            | Kind::Destructor
            | Kind::Variable
            | Kind::Subscript
            | Kind::ExplicitClosure
            | Kind::ImplicitClosure
            | Kind::Initializer
            | Kind::DefaultArgumentInitializer
            | Kind::Getter
            | Kind::Setter
            | Kind::WillSet
            | Kind::DidSet
            | Kind::ReadAccessor
            | Kind::ModifyAccessor
            | Kind::UnsafeAddressor
            | Kind::UnsafeMutableAddressor => {
                self.0.children.first().map_or(false, Node::is_specialized)
            }
            Kind::Extension => self.0.children.get(1).map_or(false, Node::is_specialized),
            _ => false,
        }
    }

    /// The same entity with every generic argument stripped.
    pub fn unspecialized(&self) -> Result<Node> {
        let copied = match self.0.kind {
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
            | Kind::Initializer
            | Kind::DefaultArgumentInitializer => self.0.children.len(),
            Kind::Structure | Kind::Enum | Kind::Class | Kind::TypeAlias | Kind::OtherNominalType => 2,
            Kind::BoundGenericStructure
            | Kind::BoundGenericEnum
            | Kind::BoundGenericClass
            | Kind::BoundGenericProtocol
            | Kind::BoundGenericOtherNominalType
            | Kind::BoundGenericTypeAlias => {
                let unbound = self.child(0)?;
                if unbound.kind() != Kind::Type {
                    return Err(Error::Structural);
                }

                let nominal = unbound.child(0)?;
                return if nominal.is_specialized() {
                    nominal.unspecialized()
                } else {
                    Ok(nominal.clone())
                };
            }
            Kind::BoundGenericFunction => {
                let function = self.child(0)?;
                if !matches!(function.kind(), Kind::Function | Kind::Constructor) {
                    return Err(Error::Structural);
                }

                return if function.is_specialized() {
                    function.unspecialized()
                } else {
                    Ok(function.clone())
                };
            }
            Kind::Extension => {
                let parent = self.child(1)?;
                if !parent.is_specialized() {
                    return Ok(self.clone());
                }

                let mut result = Node::new(Kind::Extension)
                    .child_of(self.child(0)?.clone())
                    .child_of(parent.unspecialized()?);

                // generic signature of the extension
                if let Some(signature) = self.0.children.get(2) {
                    result.push(signature.clone());
                }

                return Ok(result);
            }
            _ => return Err(Error::Structural),
        };

        let parent = self.child(0)?;
        let parent = if parent.is_specialized() {
            parent.unspecialized()?
        } else {
            parent.clone()
        };

        let mut result = Node::with_child(self.0.kind, parent);
        for idx in 1..copied {
            result.push(self.child(idx)?.clone());
        }

        Ok(result)
    }

    /// Dump the tree in the indented `kind=..., text="..."` format used by
    /// `swift-demangle -tree-only`.
    pub fn tree_string(&self) -> String {
        let mut out = String::new();
        let mut pending = vec![(self, 0usize)];

        while let Some((node, depth)) = pending.pop() {
            for _ in 0..depth {
                out.push_str("  ");
            }

            let _ = write!(out, "kind={:?}", node.kind());
            match node.0.payload {
                Payload::Text(ref text) => {
                    let _ = write!(out, ", text=\"{text}\"");
                }
                Payload::Index(index) => {
                    let _ = write!(out, ", index={index}");
                }
                Payload::None => {}
            }
            out.push('\n');

            pending.extend(node.children().iter().rev().map(|child| (child, depth + 1)));
        }

        out
    }
}

/// Directness of a field offset or symbolic reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directness {
    Direct = 0,
    Indirect = 1,
}

impl Directness {
    pub fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(Directness::Direct),
            1 => Some(Directness::Indirect),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Directness::Direct => "direct",
            Directness::Indirect => "indirect",
        }
    }
}

/// Kinds of value witnesses, stored as the index payload of `ValueWitness`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueWitnessKind {
    AllocateBuffer = 0,
    AssignWithCopy = 1,
    AssignWithTake = 2,
    DeallocateBuffer = 3,
    Destroy = 4,
    DestroyArray = 5,
    DestroyBuffer = 6,
    InitializeBufferWithCopyOfBuffer = 7,
    InitializeBufferWithCopy = 8,
    InitializeWithCopy = 9,
    InitializeBufferWithTake = 10,
    InitializeWithTake = 11,
    ProjectBuffer = 12,
    InitializeBufferWithTakeOfBuffer = 13,
    InitializeArrayWithCopy = 14,
    InitializeArrayWithTakeFrontToBack = 15,
    InitializeArrayWithTakeBackToFront = 16,
    StoreExtraInhabitant = 17,
    GetExtraInhabitantIndex = 18,
    GetEnumTag = 19,
    DestructiveProjectEnumData = 20,
    DestructiveInjectEnumTag = 21,
    GetEnumTagSinglePayload = 22,
    StoreEnumTagSinglePayload = 23,
}

const VALUE_WITNESSES: [(ValueWitnessKind, &[u8; 2], &str); 24] = [
    (ValueWitnessKind::AllocateBuffer, b"al", "allocateBuffer"),
    (ValueWitnessKind::AssignWithCopy, b"ca", "assignWithCopy"),
    (ValueWitnessKind::AssignWithTake, b"ta", "assignWithTake"),
    (ValueWitnessKind::DeallocateBuffer, b"de", "deallocateBuffer"),
    (ValueWitnessKind::Destroy, b"xx", "destroy"),
    (ValueWitnessKind::DestroyArray, b"Xx", "destroyArray"),
    (ValueWitnessKind::DestroyBuffer, b"XX", "destroyBuffer"),
    (ValueWitnessKind::InitializeBufferWithCopyOfBuffer, b"CP", "initializeBufferWithCopyOfBuffer"),
    (ValueWitnessKind::InitializeBufferWithCopy, b"Cp", "initializeBufferWithCopy"),
    (ValueWitnessKind::InitializeWithCopy, b"cp", "initializeWithCopy"),
    (ValueWitnessKind::InitializeBufferWithTake, b"Tk", "initializeBufferWithTake"),
    (ValueWitnessKind::InitializeWithTake, b"tk", "initializeWithTake"),
    (ValueWitnessKind::ProjectBuffer, b"pr", "projectBuffer"),
    (ValueWitnessKind::InitializeBufferWithTakeOfBuffer, b"TK", "initializeBufferWithTakeOfBuffer"),
    (ValueWitnessKind::InitializeArrayWithCopy, b"Cc", "initializeArrayWithCopy"),
    (ValueWitnessKind::InitializeArrayWithTakeFrontToBack, b"Tt", "initializeArrayWithTakeFrontToBack"),
    (ValueWitnessKind::InitializeArrayWithTakeBackToFront, b"tT", "initializeArrayWithTakeBackToFront"),
    (ValueWitnessKind::StoreExtraInhabitant, b"xs", "storeExtraInhabitant"),
    (ValueWitnessKind::GetExtraInhabitantIndex, b"xg", "getExtraInhabitantIndex"),
    (ValueWitnessKind::GetEnumTag, b"ug", "getEnumTag"),
    (ValueWitnessKind::DestructiveProjectEnumData, b"up", "destructiveProjectEnumData"),
    (ValueWitnessKind::DestructiveInjectEnumTag, b"ui", "destructiveInjectEnumTag"),
    (ValueWitnessKind::GetEnumTagSinglePayload, b"et", "getEnumTagSinglePayload"),
    (ValueWitnessKind::StoreEnumTagSinglePayload, b"st", "storeEnumTagSinglePayload"),
];

impl ValueWitnessKind {
    pub fn from_code(code: &[u8]) -> Option<Self> {
        VALUE_WITNESSES
            .iter()
            .find(|(_, c, _)| &c[..] == code)
            .map(|&(kind, _, _)| kind)
    }

    pub fn from_index(index: u64) -> Option<Self> {
        VALUE_WITNESSES
            .iter()
            .find(|(kind, _, _)| *kind as u64 == index)
            .map(|&(kind, _, _)| kind)
    }

    pub fn code(self) -> &'static [u8; 2] {
        VALUE_WITNESSES[self.position()].1
    }

    pub fn name(self) -> &'static str {
        VALUE_WITNESSES[self.position()].2
    }

    fn position(self) -> usize {
        VALUE_WITNESSES
            .iter()
            .position(|(kind, _, _)| *kind == self)
            .unwrap_or(0)
    }
}

/// Parameter kinds of a function signature specialization. The low 6 bits
/// hold one of the plain kinds, the higher bits are option flags.
pub mod param_kind {
    pub const CONSTANT_PROP_FUNCTION: u64 = 0;
    pub const CONSTANT_PROP_GLOBAL: u64 = 1;
    pub const CONSTANT_PROP_INTEGER: u64 = 2;
    pub const CONSTANT_PROP_FLOAT: u64 = 3;
    pub const CONSTANT_PROP_STRING: u64 = 4;
    pub const CLOSURE_PROP: u64 = 5;
    pub const BOX_TO_VALUE: u64 = 6;
    pub const BOX_TO_STACK: u64 = 7;
}

bitflags::bitflags! {
    /// Option flags of a function signature specialization parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u64 {
        const DEAD = 64;
        const OWNED_TO_GUARANTEED = 128;
        const SROA = 256;
        const GUARANTEED_TO_OWNED = 512;
        const EXISTENTIAL_TO_GENERIC = 1024;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_payload() {
        let node = Node::with_text(Kind::Identifier, "foo");
        assert_eq!(node.text(), Some("foo"));
        assert_eq!(node.index(), None);

        let node = Node::with_index(Kind::Index, 3);
        assert_eq!(node.text(), None);
        assert_eq!(node.index(), Some(3));
    }

    #[test]
    fn kind_order() {
        assert_eq!(Kind::Allocator as u16, 0);
        assert_eq!(Kind::AnonymousContext as u16, 1);
        assert_eq!(Kind::OpaqueReturnTypeOf as u16, 247);
    }

    #[test]
    fn value_witness_codes() {
        assert_eq!(ValueWitnessKind::from_code(b"Xx"), Some(ValueWitnessKind::DestroyArray));
        assert_eq!(ValueWitnessKind::from_code(b"XX"), Some(ValueWitnessKind::DestroyBuffer));
        assert_eq!(ValueWitnessKind::DestroyBuffer.code(), b"XX");
        assert_eq!(ValueWitnessKind::from_index(6), Some(ValueWitnessKind::DestroyBuffer));
        assert_eq!(ValueWitnessKind::from_code(b"zz"), None);
    }

    #[test]
    fn unspecialize() {
        let module = Node::with_text(Kind::Module, "M");
        let structure = Node::new(Kind::Structure)
            .child_of(module.clone())
            .child_of(Node::with_text(Kind::Identifier, "S"));
        let bound = Node::new(Kind::BoundGenericStructure)
            .child_of(Node::with_child(Kind::Type, structure.clone()))
            .child_of(Node::new(Kind::TypeList));

        assert!(bound.is_specialized());
        assert!(!structure.is_specialized());
        assert_eq!(bound.unspecialized(), Ok(structure));
        assert_eq!(module.unspecialized(), Err(Error::Structural));
    }

    #[test]
    fn measures() {
        let leaf = Node::with_text(Kind::Identifier, "a");
        assert_eq!((leaf.depth(), leaf.weight()), (1, 1));

        let pair = Node::with_children(Kind::TypeList, vec![leaf.clone(), leaf.clone()]);
        assert_eq!((pair.depth(), pair.weight()), (2, 3));

        let mut nested = Node::with_child(Kind::Type, pair.clone());
        nested.extend([pair.clone(), leaf]);
        assert_eq!((nested.depth(), nested.weight()), (3, 8));

        nested.update_children(|children| children.truncate(1));
        assert_eq!((nested.depth(), nested.weight()), (3, 4));
    }

    #[test]
    fn copy_on_write() {
        let original = Node::new(Kind::TypeList).child_of(Node::new(Kind::EmptyList));
        let mut copy = original.clone();
        copy.push(Node::new(Kind::FirstElementMarker));

        assert_eq!(original.children().len(), 1);
        assert_eq!(copy.children().len(), 2);
        assert_ne!(original, copy);
    }

    #[test]
    fn deep_drop() {
        let mut node = Node::new(Kind::DynamicSelf);
        for _ in 0..200_000 {
            node = Node::with_child(Kind::Type, node);
        }

        assert_eq!(node.depth(), 200_001);
        drop(node);
    }

    #[test]
    fn tree_dump() {
        let node = Node::new(Kind::Type).child_of(Node::with_text(Kind::Module, "M"));
        assert_eq!(node.tree_string(), "kind=Type\n  kind=Module, text=\"M\"\n");
    }
}
