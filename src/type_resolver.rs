use crate::model::{IntegerKind, QualifiedName, ScalarType, TypeExpression};
use crate::parser::ParsedFile;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use syn::visit::Visit;

/// Index of the items declared by one module, used to resolve names the way the compiler would
/// see them from the generated entry points.
///
/// Every item is tagged with the namespace it lives in. Items declared inside function bodies
/// are not addressable from outside and are not indexed.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    pub structs: Vec<IndexedStruct>,
    pub aliases: Vec<IndexedAlias>,
    pub functions: Vec<IndexedFn>,
    pub impls: Vec<IndexedImpl>,
    /// (namespace, local name) -> full path of the imported item
    imports: HashMap<(String, String), String>,
}

#[derive(Debug, Clone)]
pub struct IndexedStruct {
    pub namespace: String,
    pub item: syn::ItemStruct,
}

impl IndexedStruct {
    pub fn name(&self) -> String {
        self.item.ident.to_string()
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.namespace.clone(), self.name())
    }
}

#[derive(Debug, Clone)]
pub struct IndexedAlias {
    pub namespace: String,
    pub name: String,
    pub target: syn::Type,
}

#[derive(Debug, Clone)]
pub struct IndexedFn {
    pub namespace: String,
    pub item: syn::ItemFn,
}

/// An inherent `impl` block.
#[derive(Debug, Clone)]
pub struct IndexedImpl {
    pub namespace: String,
    /// Name of the implementing type
    pub self_type: String,
    pub methods: Vec<syn::ImplItemFn>,
}

impl ModuleIndex {
    /// Indexes all parsed files of a module
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        debug!("Indexing module of {} files", parsed_files.len());

        let mut index = ModuleIndex::default();
        for parsed_file in parsed_files {
            let mut collector = ItemCollector {
                index: &mut index,
                namespace: vec![parsed_file.namespace.clone()],
            };
            collector.visit_file(&parsed_file.syntax_tree);
        }

        debug!(
            "Indexed {} structs, {} aliases, {} functions, {} impl blocks",
            index.structs.len(),
            index.aliases.len(),
            index.functions.len(),
            index.impls.len()
        );
        index
    }

    /// Inherent impl blocks for the named type
    pub fn impls_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a IndexedImpl> + 'a {
        self.impls.iter().filter(move |i| i.self_type == type_name)
    }

    /// Finds a struct by a type expression written in `namespace`.
    ///
    /// Lookup order: a struct declared in the same namespace, then one reached through a `use`
    /// import, then any struct of that name in the module.
    pub fn find_struct(&self, namespace: &str, expr: &TypeExpression) -> Option<&IndexedStruct> {
        let name = expr.name();

        let exact = match expr {
            TypeExpression::Identifier(name) => match self.imports.get(&(namespace.to_string(), name.clone())) {
                Some(path) => path.clone(),
                None => format!("{}::{}", namespace, name),
            },
            TypeExpression::QualifiedReference { namespace: ns, name } => {
                format!("{}::{}", self.absolute_namespace(namespace, ns), name)
            }
        };

        if let Some(found) = self.structs.iter().find(|s| s.qualified_name().path() == exact) {
            return Some(found);
        }

        let fallback = self.structs.iter().find(|s| s.item.ident == name);
        if fallback.is_some() {
            debug!("Resolved struct {} by name only", name);
        }
        fallback
    }

    /// Resolves a type expression to the full name generated code must use to reach it.
    ///
    /// A bare name must be a struct of the module or brought in by a `use` import. Prelude
    /// names such as `String` are neither and resolve to `None`. A written path is taken as
    /// given once `crate`, `self` and `super` are expanded.
    pub fn resolve_type_name(&self, namespace: &str, expr: &TypeExpression) -> Option<QualifiedName> {
        if let Some(found) = self.find_struct(namespace, expr) {
            return Some(found.qualified_name());
        }

        match expr {
            TypeExpression::Identifier(name) => self
                .imports
                .get(&(namespace.to_string(), name.clone()))
                .map(|path| split_path(path.as_str())),
            TypeExpression::QualifiedReference { namespace: ns, name } => Some(QualifiedName::new(
                self.absolute_namespace(namespace, ns),
                name.clone(),
            )),
        }
    }

    /// Resolves the type of a path or query variable to one of the supported scalars.
    ///
    /// Local type aliases are followed; an alias cycle resolves to `None`.
    pub fn resolve_scalar(&self, namespace: &str, ty: &syn::Type) -> Option<ScalarType> {
        let mut resolving_stack = HashSet::new();
        self.resolve_scalar_inner(namespace, ty, &mut resolving_stack)
    }

    fn resolve_scalar_inner(
        &self,
        namespace: &str,
        ty: &syn::Type,
        resolving_stack: &mut HashSet<String>,
    ) -> Option<ScalarType> {
        let expr = TypeExpression::from_type(ty)?;

        match &expr {
            TypeExpression::Identifier(name) => {
                if let Some(scalar) = parse_scalar_name(name) {
                    return Some(scalar);
                }
            }
            TypeExpression::QualifiedReference { namespace: ns, name } => {
                let is_std_string = matches!(
                    ns.trim_start_matches("::"),
                    "std::string" | "alloc::string"
                );
                if is_std_string && name == "String" {
                    return Some(ScalarType::String);
                }
                if matches!(ns.trim_start_matches("::"), "std::primitive" | "core::primitive") {
                    return parse_scalar_name(name);
                }
            }
        }

        let alias = self.find_alias(namespace, &expr)?;
        let key = format!("{}::{}", alias.namespace, alias.name);

        if !resolving_stack.insert(key.clone()) {
            warn!("Circular type alias detected: {}", key);
            return None;
        }

        let resolved = self.resolve_scalar_inner(&alias.namespace, &alias.target, resolving_stack);
        resolving_stack.remove(&key);
        resolved
    }

    fn find_alias(&self, namespace: &str, expr: &TypeExpression) -> Option<&IndexedAlias> {
        let target_ns = match expr {
            TypeExpression::Identifier(name) => {
                match self.imports.get(&(namespace.to_string(), name.clone())) {
                    Some(path) => split_path(path).namespace,
                    None => namespace.to_string(),
                }
            }
            TypeExpression::QualifiedReference { namespace: ns, .. } => self.absolute_namespace(namespace, ns),
        };

        self.aliases
            .iter()
            .find(|a| a.namespace == target_ns && a.name == expr.name())
    }

    /// Expands `crate::`, `self::` and `super::` prefixes, and paths relative to a child module,
    /// into an absolute namespace.
    pub fn absolute_namespace(&self, current: &str, written: &str) -> String {
        let written = written.trim_start_matches("::");
        let mut segments: Vec<&str> = written.split("::").filter(|s| !s.is_empty()).collect();
        let current_segments: Vec<&str> = current.split("::").collect();

        match segments.first().copied() {
            Some("crate") => {
                segments[0] = current_segments[0];
                segments.join("::")
            }
            Some("self") | Some("super") => {
                let mut base = current_segments.clone();
                let mut rest = segments.as_slice();
                while let Some((first, tail)) = rest.split_first() {
                    match *first {
                        "self" => {}
                        "super" => {
                            base.pop();
                        }
                        _ => break,
                    }
                    rest = tail;
                }
                base.extend_from_slice(rest);
                base.join("::")
            }
            _ => {
                let relative = format!("{}::{}", current, written);
                let known = self.structs.iter().any(|s| s.namespace == relative)
                    || self.aliases.iter().any(|a| a.namespace == relative);
                if known {
                    relative
                } else {
                    written.to_string()
                }
            }
        }
    }
}

fn parse_scalar_name(name: &str) -> Option<ScalarType> {
    match name {
        "String" => Some(ScalarType::String),
        "bool" => Some(ScalarType::Boolean),
        other => IntegerKind::from_name(other).map(ScalarType::Integer),
    }
}

fn split_path(path: &str) -> QualifiedName {
    match path.rsplit_once("::") {
        Some((namespace, name)) => QualifiedName::new(namespace, name),
        None => QualifiedName::new("", path),
    }
}

/// Visitor that records items with the namespace they are declared in
struct ItemCollector<'a> {
    index: &'a mut ModuleIndex,
    namespace: Vec<String>,
}

impl ItemCollector<'_> {
    fn current_namespace(&self) -> String {
        self.namespace.join("::")
    }

    fn record_use_tree(&mut self, prefix: &[String], tree: &syn::UseTree) {
        match tree {
            syn::UseTree::Path(path) => {
                let mut prefix = prefix.to_vec();
                prefix.push(path.ident.to_string());
                self.record_use_tree(&prefix, &path.tree);
            }
            syn::UseTree::Name(name) => {
                let ident = name.ident.to_string();
                if ident == "self" {
                    if let Some(last) = prefix.last() {
                        self.record_import(last.clone(), prefix.join("::"));
                    }
                } else {
                    let mut full = prefix.to_vec();
                    full.push(ident.clone());
                    self.record_import(ident, full.join("::"));
                }
            }
            syn::UseTree::Rename(rename) => {
                let mut full = prefix.to_vec();
                full.push(rename.ident.to_string());
                self.record_import(rename.rename.to_string(), full.join("::"));
            }
            syn::UseTree::Group(group) => {
                for tree in &group.items {
                    self.record_use_tree(prefix, tree);
                }
            }
            syn::UseTree::Glob(_) => {}
        }
    }

    fn record_import(&mut self, local: String, written: String) {
        let current = self.current_namespace();
        let (ns, name) = match written.rsplit_once("::") {
            Some((ns, name)) => (self.index.absolute_namespace(&current, ns), name.to_string()),
            None => (String::new(), written.clone()),
        };
        let full = if ns.is_empty() { name } else { format!("{}::{}", ns, name) };
        self.index.imports.insert((current, local), full);
    }
}

impl<'ast> Visit<'ast> for ItemCollector<'_> {
    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        self.index.structs.push(IndexedStruct {
            namespace: self.current_namespace(),
            item: node.clone(),
        });
    }

    fn visit_item_type(&mut self, node: &'ast syn::ItemType) {
        self.index.aliases.push(IndexedAlias {
            namespace: self.current_namespace(),
            name: node.ident.to_string(),
            target: (*node.ty).clone(),
        });
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        // Items in function bodies are not reachable, so don't descend
        self.index.functions.push(IndexedFn {
            namespace: self.current_namespace(),
            item: node.clone(),
        });
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        if node.trait_.is_some() {
            return;
        }

        let syn::Type::Path(type_path) = node.self_ty.as_ref() else {
            return;
        };
        let Some(segment) = type_path.path.segments.last() else {
            return;
        };

        let methods = node
            .items
            .iter()
            .filter_map(|item| match item {
                syn::ImplItem::Fn(method) => Some(method.clone()),
                _ => None,
            })
            .collect();

        self.index.impls.push(IndexedImpl {
            namespace: self.current_namespace(),
            self_type: segment.ident.to_string(),
            methods,
        });
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.record_use_tree(&[], &node.tree);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        // Out-of-line modules are indexed from their own file
        if node.content.is_none() {
            return;
        }

        self.namespace.push(node.ident.to_string());
        syn::visit::visit_item_mod(self, node);
        self.namespace.pop();
    }
}
