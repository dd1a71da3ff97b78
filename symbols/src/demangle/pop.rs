//! Operand handling of the demangler's node stack.

use super::{type_node, Demangler};
use crate::error::{Error, Result};
use crate::node::{Kind, Node};

impl Demangler<'_> {
    #[inline]
    pub(super) fn pop(&mut self) -> Option<Node> {
        self.stack.pop()
    }

    /// Pop the top of the stack if it has the given kind.
    #[inline]
    pub(super) fn pop_kind(&mut self, kind: Kind) -> Option<Node> {
        match self.stack.last() {
            Some(node) if node.kind() == kind => self.stack.pop(),
            _ => None,
        }
    }

    /// Pop the top of the stack if its kind matches `cond`.
    #[inline]
    pub(super) fn pop_if(&mut self, cond: fn(Kind) -> bool) -> Option<Node> {
        match self.stack.last() {
            Some(node) if cond(node.kind()) => self.stack.pop(),
            _ => None,
        }
    }

    #[inline]
    pub(super) fn require(&mut self) -> Result<Node> {
        self.pop().ok_or(Error::Structural)
    }

    #[inline]
    pub(super) fn require_kind(&mut self, kind: Kind) -> Result<Node> {
        self.pop_kind(kind).ok_or(Error::Structural)
    }

    #[inline]
    pub(super) fn require_if(&mut self, cond: fn(Kind) -> bool) -> Result<Node> {
        self.pop_if(cond).ok_or(Error::Structural)
    }

    pub(super) fn pop_function_type(&mut self, kind: Kind) -> Result<Node> {
        let mut func = Node::new(kind);
        if let Some(throws) = self.pop_kind(Kind::ThrowsAnnotation) {
            func.push(throws);
        }

        func.push(self.pop_function_params(Kind::ArgumentTuple)?);
        func.push(self.pop_function_params(Kind::ReturnType)?);
        Ok(Node::with_child(Kind::Type, func))
    }

    fn pop_function_params(&mut self, kind: Kind) -> Result<Node> {
        if self.pop_kind(Kind::EmptyList).is_some() {
            let empty = Node::with_child(Kind::Type, Node::new(Kind::Tuple));
            return Ok(Node::with_child(kind, empty));
        }

        let params = self.require_kind(Kind::Type)?;
        if kind != Kind::ArgumentTuple {
            return Ok(Node::with_child(kind, params));
        }

        let inner = params.child(0)?;
        let count = match inner.kind() {
            Kind::Tuple => inner.children().len() as u64,
            _ => 1,
        };

        Ok(Node::with_index(kind, count).child_of(params))
    }

    /// Argument labels of a function type, popped from the stack in reverse
    /// order. `None` if `ty` isn't a function type with labelled arguments.
    pub(super) fn pop_function_param_labels(&mut self, ty: &Node) -> Result<Option<Node>> {
        if !self.old_function_types && self.pop_kind(Kind::EmptyList).is_some() {
            return Ok(Some(Node::new(Kind::LabelList)));
        }

        if ty.kind() != Kind::Type {
            return Ok(None);
        }

        let mut func = ty.child(0)?;
        if func.kind() == Kind::DependentGenericType {
            func = func.child(1)?.child(0)?;
        }

        if !matches!(func.kind(), Kind::FunctionType | Kind::NoEscapeFunctionType) {
            return Ok(None);
        }

        let mut params = func.child(0)?;
        if params.kind() == Kind::ThrowsAnnotation {
            params = func.child(1)?;
        }

        if params.kind() != Kind::ArgumentTuple {
            return Err(Error::Structural);
        }

        let count = match params.index() {
            Some(count) => count,
            None => return Ok(None),
        };

        let is_tuple = params
            .children()
            .first()
            .and_then(|ty| ty.children().first())
            .map_or(false, |tuple| tuple.kind() == Kind::Tuple);

        if self.old_function_types || !is_tuple {
            return Ok(Some(Node::new(Kind::LabelList)));
        }

        let mut has_labels = false;
        let mut labels = Vec::new();
        for _ in 0..count {
            let label = self.require()?;
            match label.kind() {
                Kind::Identifier => has_labels = true,
                Kind::FirstElementMarker => {}
                _ => return Err(Error::Structural),
            }

            labels.push(label);
        }

        if !has_labels {
            return Ok(Some(Node::new(Kind::LabelList)));
        }

        labels.reverse();
        Ok(Some(Node::with_children(Kind::LabelList, labels)))
    }

    pub(super) fn pop_tuple(&mut self) -> Result<Node> {
        let mut elements = Vec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();

                let mut element = Node::new(Kind::TupleElement);
                if let Some(variadic) = self.pop_kind(Kind::VariadicMarker) {
                    element.push(variadic);
                }

                if let Some(ident) = self.pop_kind(Kind::Identifier) {
                    element.push(Node::with_text(Kind::TupleElementName, ident.require_text()?));
                }

                element.push(self.require_kind(Kind::Type)?);
                elements.push(element);

                if first {
                    break;
                }
            }

            elements.reverse();
        }

        Ok(type_node(Kind::Tuple, elements))
    }

    pub(super) fn pop_type_list(&mut self) -> Result<Node> {
        let mut types = Vec::new();
        if self.pop_kind(Kind::EmptyList).is_none() {
            loop {
                let first = self.pop_kind(Kind::FirstElementMarker).is_some();
                types.push(self.require_kind(Kind::Type)?);
                if first {
                    break;
                }
            }

            types.reverse();
        }

        Ok(Node::with_children(Kind::TypeList, types))
    }

    pub(super) fn pop_protocol(&mut self) -> Result<Node> {
        if let Some(ty) = self.pop_kind(Kind::Type) {
            return match ty.child(0)?.kind() {
                Kind::Protocol | Kind::ProtocolSymbolicReference => Ok(ty),
                _ => Err(Error::Structural),
            };
        }

        let name = self.require_if(Kind::is_decl_name)?;
        let context = self.pop_context()?;
        Ok(type_node(Kind::Protocol, vec![context, name]))
    }

    /// A module, which is mangled either as an identifier or as one of the
    /// builtin module shorthands.
    pub(super) fn pop_module(&mut self) -> Result<Option<Node>> {
        if let Some(ident) = self.pop_kind(Kind::Identifier) {
            return Ok(Some(Node::with_text(Kind::Module, ident.require_text()?)));
        }

        Ok(self.pop_kind(Kind::Module))
    }

    pub(super) fn pop_context(&mut self) -> Result<Node> {
        if let Some(module) = self.pop_module()? {
            return Ok(module);
        }

        if let Some(ty) = self.pop_kind(Kind::Type) {
            let child = ty.into_children().into_iter().next().ok_or(Error::Structural)?;
            if !child.kind().is_context() {
                return Err(Error::Structural);
            }

            return Ok(child);
        }

        self.require_if(Kind::is_context)
    }

    pub(super) fn pop_type_and_get_child(&mut self) -> Result<Node> {
        let ty = self.require_kind(Kind::Type)?;
        ty.into_children().into_iter().next().ok_or(Error::Structural)
    }

    pub(super) fn pop_type_and_get_any_generic(&mut self) -> Result<Node> {
        let child = self.pop_type_and_get_child()?;
        if !child.kind().is_any_generic() {
            return Err(Error::Structural);
        }

        Ok(child)
    }

    pub(super) fn pop_protocol_conformance(&mut self) -> Result<Node> {
        let signature = self.pop_kind(Kind::DependentGenericSignature);
        let module = self.pop_module()?.ok_or(Error::Structural)?;
        let proto = self.pop_protocol()?;

        let mut ty = self.pop_kind(Kind::Type);
        let mut ident = None;
        if ty.is_none() {
            ident = self.pop_kind(Kind::Identifier);
            ty = self.pop_kind(Kind::Type);
        }

        let mut ty = ty.ok_or(Error::Structural)?;
        if let Some(signature) = signature {
            ty = type_node(Kind::DependentGenericType, vec![signature, ty]);
        }

        let mut conformance = Node::with_children(Kind::ProtocolConformance, vec![ty, proto, module]);
        if let Some(ident) = ident {
            conformance.push(ident);
        }

        Ok(conformance)
    }

    pub(super) fn pop_any_protocol_conformance_list(&mut self) -> Result<Node> {
        let mut list = Node::new(Kind::AnyProtocolConformanceList);
        if self.pop_kind(Kind::EmptyList).is_some() {
            return Ok(list);
        }

        let mut conformances = Vec::new();
        loop {
            let first = self.pop_kind(Kind::FirstElementMarker).is_some();
            conformances.push(self.pop_any_protocol_conformance()?);
            if first {
                break;
            }
        }

        conformances.reverse();
        list.extend(conformances);
        Ok(list)
    }

    pub(super) fn pop_any_protocol_conformance(&mut self) -> Result<Node> {
        self.require_if(|kind| {
            matches!(
                kind,
                Kind::ConcreteProtocolConformance
                    | Kind::DependentProtocolConformanceRoot
                    | Kind::DependentProtocolConformanceInherited
                    | Kind::DependentProtocolConformanceAssociated
            )
        })
    }

    pub(super) fn pop_dependent_protocol_conformance(&mut self) -> Result<Node> {
        self.require_if(|kind| {
            matches!(
                kind,
                Kind::DependentProtocolConformanceRoot
                    | Kind::DependentProtocolConformanceInherited
                    | Kind::DependentProtocolConformanceAssociated
            )
        })
    }

    pub(super) fn pop_dependent_associated_conformance(&mut self) -> Result<Node> {
        let proto = self.pop_protocol()?;
        let dependent = self.require_kind(Kind::Type)?;
        Ok(Node::with_children(
            Kind::DependentAssociatedConformance,
            vec![dependent, proto],
        ))
    }

    /// An associated type name, optionally qualified with its protocol.
    pub(super) fn pop_assoc_type_name(&mut self) -> Result<Node> {
        let mut proto = self.pop_kind(Kind::Type);
        match proto {
            Some(ref ty) if !ty.is_protocol() => return Err(Error::Structural),
            Some(_) => {}
            None => proto = self.pop_kind(Kind::ProtocolSymbolicReference),
        }

        let ident = self.require_kind(Kind::Identifier)?;
        let mut assoc = Node::with_child(Kind::DependentAssociatedTypeRef, ident);
        if let Some(proto) = proto {
            assoc.push(proto);
        }

        Ok(assoc)
    }

    pub(super) fn pop_assoc_type_path(&mut self) -> Result<Node> {
        let mut path = Vec::new();
        loop {
            let first = self.pop_kind(Kind::FirstElementMarker).is_some();
            path.push(self.pop_assoc_type_name()?);
            if first {
                break;
            }
        }

        path.reverse();
        Ok(Node::with_children(Kind::AssocTypePath, path))
    }
}
