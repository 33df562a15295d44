//! # Value Store
//!
//! `ContextValueDictionary` records context values along their type-paths
//! in a tree keyed by instance identity, with a flat index from kind to every
//! node of that kind.
//!
//! ## Structure
//!
//! Nodes live in an arena keyed by [`NodeId`]; the tree is an adjacency map
//! from parent to children. Node 0 is the sentinel root (nil instance, not in
//! the flat index). A node reached from a second record is *shared*: it keeps
//! the owner it was created under, and the extra parent is recorded as a
//! referrer. Path reconstruction follows owners.
//!
//! ## Locking
//!
//! One `RwLock` guards the whole tree. `add_or_update` holds the write guard
//! for the entire walk; every query holds the read guard.

use crate::primitives::{MAX_PATH_DEPTH, MAX_SEARCH_VALUES};
use crate::{
    ContextValue, Field, InstanceId, KindId, KindRegistry, MeaningError, NodeId, TypeInstance,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

// =============================================================================
// NODES
// =============================================================================

/// A node of the value tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: NodeId,
    pub instance: InstanceId,
    pub kind: KindId,
    /// The parent the node was created under. `None` only for the root.
    pub owner: Option<NodeId>,
    /// Set on leaf nodes.
    pub value: Option<ContextValue>,
}

impl ContextNode {
    fn root() -> Self {
        Self {
            id: NodeId::ROOT,
            instance: InstanceId::NIL,
            kind: KindId::NULL_ENTITY,
            owner: None,
            value: None,
        }
    }

    fn record_number(&self) -> Option<usize> {
        self.value.as_ref().map(ContextValue::record_number)
    }
}

/// The owner chain of a node, from its root-level record down to the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNodePath {
    /// Kind of the root-level record.
    pub kind: KindId,
    pub path: Vec<TypeInstance>,
}

// =============================================================================
// TREE
// =============================================================================

/// Lock-free state behind the store's lock.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    pub(crate) nodes: BTreeMap<NodeId, ContextNode>,
    pub(crate) children: BTreeMap<NodeId, Vec<NodeId>>,
    /// Non-owning parents of shared nodes.
    pub(crate) referrers: BTreeMap<NodeId, Vec<NodeId>>,
    pub(crate) flat: BTreeMap<KindId, Vec<NodeId>>,
    pub(crate) next_node_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodeId::ROOT, ContextNode::root());
        Self {
            nodes,
            children: BTreeMap::new(),
            referrers: BTreeMap::new(),
            flat: BTreeMap::new(),
            next_node_id: 1,
        }
    }
}

impl Tree {
    fn node(&self, id: NodeId) -> Result<&ContextNode, MeaningError> {
        self.nodes.get(&id).ok_or(MeaningError::NodeNotFound(id))
    }

    fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn child_nodes(&self, id: NodeId) -> impl Iterator<Item = &ContextNode> + '_ {
        self.child_ids(id).iter().filter_map(|c| self.nodes.get(c))
    }

    fn create_node(&mut self, parent: NodeId, instance: InstanceId, kind: KindId) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        self.nodes.insert(
            id,
            ContextNode {
                id,
                instance,
                kind,
                owner: Some(parent),
                value: None,
            },
        );
        self.children.entry(parent).or_default().push(id);
        self.flat.entry(kind).or_default().push(id);

        trace!(node = %id, kind = %kind, parent = %parent, "node created");
        id
    }

    fn link_shared(&mut self, parent: NodeId, child: NodeId) {
        self.children.entry(parent).or_default().push(child);
        self.referrers.entry(child).or_default().push(parent);
        debug!(node = %child, parent = %parent, "shared node linked");
    }

    /// Every root-to-leaf instance path below `id`, each starting with `id`'s instance.
    fn child_instance_paths(&self, id: NodeId) -> Result<Vec<Vec<InstanceId>>, MeaningError> {
        let node = self.node(id)?;
        let mut all = Vec::new();
        let mut path = vec![node.instance];
        self.walk(id, &mut path, &mut all);
        Ok(all)
    }

    fn walk(&self, id: NodeId, path: &mut Vec<InstanceId>, all: &mut Vec<Vec<InstanceId>>) {
        let children = self.child_ids(id);
        if children.is_empty() || path.len() > MAX_PATH_DEPTH {
            all.push(path.clone());
            return;
        }

        for child in children {
            if let Some(node) = self.nodes.get(child) {
                path.push(node.instance);
                self.walk(*child, path, all);
                path.pop();
            }
        }
    }

    /// Owner chain from the root-level ancestor down to `id`, sentinel excluded.
    fn owner_chain(&self, id: NodeId) -> Result<Vec<NodeId>, MeaningError> {
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            if node_id == NodeId::ROOT || chain.len() > self.nodes.len() {
                break;
            }
            chain.push(node_id);
            current = self.node(node_id)?.owner;
        }

        chain.reverse();
        Ok(chain)
    }

    fn root_of(&self, id: NodeId) -> Result<NodeId, MeaningError> {
        Ok(self.owner_chain(id)?.first().copied().unwrap_or(NodeId::ROOT))
    }

    fn add_or_update(&mut self, value: ContextValue) -> Result<NodeId, MeaningError> {
        let instances = value.instance_path();
        let kinds = value.type_path();
        if instances.len() != kinds.len() || instances.is_empty() {
            return Err(MeaningError::InvalidValuePath(format!(
                "instance path has {} entries, type path has {}",
                instances.len(),
                kinds.len()
            )));
        }

        let last = kinds.len() - 1;
        let mut current = NodeId::ROOT;
        let mut chain = vec![NodeId::ROOT];

        for (i, (&instance, &kind)) in instances.iter().zip(kinds).enumerate() {
            let existing = self
                .child_nodes(current)
                .find(|c| c.instance == instance)
                .map(|c| c.id);

            current = match existing {
                Some(child) => child,
                None => match self.find_shared(kind, &instances[i..], &chain)? {
                    Some(shared) => {
                        self.link_shared(current, shared);
                        shared
                    }
                    None => {
                        if i == last {
                            self.check_value_slot(current, kind, value.record_number())?;
                        }
                        self.create_node(current, instance, kind)
                    }
                },
            };
            chain.push(current);
        }

        let node = self
            .nodes
            .get_mut(&current)
            .ok_or(MeaningError::NodeNotFound(current))?;
        node.value = Some(value);
        Ok(current)
    }

    /// A node of `kind` already holding exactly `remaining` as one of its
    /// child instance paths, not already on the current chain.
    fn find_shared(
        &self,
        kind: KindId,
        remaining: &[InstanceId],
        chain: &[NodeId],
    ) -> Result<Option<NodeId>, MeaningError> {
        let Some(candidates) = self.flat.get(&kind) else {
            return Ok(None);
        };

        for candidate in candidates {
            if chain.contains(candidate) {
                continue;
            }
            if self
                .child_instance_paths(*candidate)?
                .iter()
                .any(|p| p.as_slice() == remaining)
            {
                return Ok(Some(*candidate));
            }
        }

        Ok(None)
    }

    fn check_value_slot(
        &self,
        parent: NodeId,
        kind: KindId,
        record_number: usize,
    ) -> Result<(), MeaningError> {
        let taken = self
            .child_nodes(parent)
            .any(|c| c.kind == kind && c.record_number() == Some(record_number));

        if taken {
            return Err(MeaningError::DuplicateValueSlot(format!(
                "{} already has a {} value for record {}",
                parent, kind, record_number
            )));
        }
        Ok(())
    }

    fn search(&self, values: &[ContextValue]) -> Result<Vec<NodeId>, MeaningError> {
        let Some(first) = values.first() else {
            return Err(MeaningError::InvalidQuery(
                "at least one value is required".to_string(),
            ));
        };
        if values.len() > MAX_SEARCH_VALUES {
            return Err(MeaningError::InvalidQuery(format!(
                "{} values exceed the limit of {}",
                values.len(),
                MAX_SEARCH_VALUES
            )));
        }

        let length = first.type_path().len();
        if values.iter().any(|v| v.type_path().len() != length) {
            return Err(MeaningError::InvalidQuery(
                "all values must have the same path length".to_string(),
            ));
        }

        let parent_kinds: BTreeSet<KindId> = values
            .iter()
            .filter_map(|v| v.parent().map(|p| p.kind))
            .collect();
        let parent_kind = match (parent_kinds.len(), parent_kinds.first()) {
            (1, Some(kind)) if length >= 2 => *kind,
            _ => {
                return Err(MeaningError::InvalidQuery(
                    "all values must share one parent kind".to_string(),
                ));
            }
        };

        let mut matches = Vec::new();
        for &parent in self.flat.get(&parent_kind).map(Vec::as_slice).unwrap_or(&[]) {
            let children: Vec<&ContextNode> = self.child_nodes(parent).collect();
            let records: BTreeSet<usize> =
                children.iter().filter_map(|c| c.record_number()).collect();

            let matched = records.iter().any(|&record| {
                values.iter().all(|query| {
                    children
                        .iter()
                        .find(|c| c.kind == query.kind() && c.record_number() == Some(record))
                        .and_then(|c| c.value.as_ref())
                        .is_some_and(|stored| stored.value() == query.value())
                })
            });

            if matched {
                matches.push(parent);
            }
        }

        self.propagate(&mut matches)?;
        debug!(matches = matches.len(), "search complete");
        Ok(matches)
    }

    /// Add root-level records that reference a matched node.
    fn propagate(&self, matches: &mut Vec<NodeId>) -> Result<(), MeaningError> {
        let mut roots = matches
            .iter()
            .map(|m| self.root_of(*m))
            .collect::<Result<Vec<_>, _>>()?;

        for matched in matches.clone() {
            let instance = self.node(matched)?.instance;

            for &record in self.child_ids(NodeId::ROOT) {
                if roots.contains(&record) {
                    continue;
                }

                let references = self
                    .child_instance_paths(record)?
                    .iter()
                    .any(|p| p.contains(&instance));
                if references {
                    trace!(record = %record, via = %matched, "match propagated");
                    matches.push(record);
                    roots.push(record);
                }
            }
        }

        Ok(())
    }

    fn collect_values(&self, id: NodeId, depth: usize, out: &mut Vec<ContextValue>) {
        if depth > MAX_PATH_DEPTH {
            return;
        }
        for child in self.child_nodes(id) {
            self.collect_values(child.id, depth + 1, out);
            if let Some(value) = &child.value {
                out.push(value.clone());
            }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Thread-safe value store.
#[derive(Debug, Default)]
pub struct ContextValueDictionary {
    tree: RwLock<Tree>,
}

impl ContextValueDictionary {
    /// Create an empty store holding only the sentinel root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tree(tree: Tree) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Tree>, MeaningError> {
        self.tree.read().map_err(|_| MeaningError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tree>, MeaningError> {
        self.tree.write().map_err(|_| MeaningError::LockPoisoned)
    }

    /// Record a value along its path, creating, reusing or sharing nodes.
    ///
    /// Returns the node holding the value. A value whose instance path is
    /// already stored updates that node in place.
    pub fn add_or_update(&self, value: ContextValue) -> Result<NodeId, MeaningError> {
        let mut tree = self.write()?;
        tree.add_or_update(value)
    }

    /// Nodes whose child values match every query value for one record,
    /// plus the root-level records referencing a matched node.
    ///
    /// All query values must have the same path length and parent kind.
    pub fn search(&self, values: &[ContextValue]) -> Result<Vec<ContextNode>, MeaningError> {
        let tree = self.read()?;
        tree.search(values)?
            .into_iter()
            .map(|id| tree.node(id).cloned())
            .collect()
    }

    /// The owner chain of a node, root-level record first.
    pub fn get_path(&self, node: NodeId) -> Result<ContextNodePath, MeaningError> {
        let tree = self.read()?;
        let path = tree
            .owner_chain(node)?
            .into_iter()
            .map(|id| {
                tree.node(id).map(|n| TypeInstance {
                    kind: n.kind,
                    instance: n.instance,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kind = path.first().map(|p| p.kind).unwrap_or(KindId::NULL_ENTITY);
        Ok(ContextNodePath { kind, path })
    }

    /// The node holding `field`'s value in record `root_instance`, and the
    /// instance path leading to it. `None` when nothing is stored there.
    ///
    /// Fails with `InvalidQuery` when a level of the path holds more than one
    /// child of the field's kind.
    pub fn try_get_context_node(
        &self,
        field: &Field,
        root_instance: InstanceId,
        record_number: usize,
    ) -> Result<Option<(ContextNode, Vec<InstanceId>)>, MeaningError> {
        let kinds = field.kinds();
        let Some((&value_kind, parents)) = kinds.split_last() else {
            return Ok(None);
        };
        let Some((&root_kind, intermediate)) = parents.split_first() else {
            return Ok(None);
        };

        let tree = self.read()?;
        let Some(mut current) = tree
            .child_nodes(NodeId::ROOT)
            .find(|c| c.instance == root_instance && c.kind == root_kind)
        else {
            return Ok(None);
        };

        let mut instances = vec![current.instance];
        for &kind in intermediate {
            let matches: Vec<&ContextNode> =
                tree.child_nodes(current.id).filter(|c| c.kind == kind).collect();
            let next = match matches.as_slice() {
                [] => return Ok(None),
                [next] => *next,
                _ => {
                    return Err(MeaningError::InvalidQuery(format!(
                        "{} children of kind {:?} under node {:?}; the field path does not pick one",
                        matches.len(),
                        kind,
                        current.id
                    )));
                }
            };
            instances.push(next.instance);
            current = next;
        }

        let leaf = tree
            .child_nodes(current.id)
            .find(|c| c.kind == value_kind && c.record_number() == Some(record_number));

        Ok(leaf.map(|leaf| {
            instances.push(leaf.instance);
            (leaf.clone(), instances)
        }))
    }

    /// Every node of `kind`, in creation order.
    pub fn get_context_nodes(&self, kind: KindId) -> Result<Vec<ContextNode>, MeaningError> {
        let tree = self.read()?;
        Ok(tree
            .flat
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| tree.nodes.get(id).cloned())
            .collect())
    }

    /// The values below a node, deepest first.
    pub fn get_context_values(&self, node: NodeId) -> Result<Vec<ContextValue>, MeaningError> {
        let tree = self.read()?;
        tree.node(node)?;
        let mut values = Vec::new();
        tree.collect_values(node, 0, &mut values);
        Ok(values)
    }

    /// Kind of the root-level record with instance `root_instance`.
    pub fn root_kind(&self, root_instance: InstanceId) -> Result<Option<KindId>, MeaningError> {
        let tree = self.read()?;
        Ok(tree
            .child_nodes(NodeId::ROOT)
            .find(|c| c.instance == root_instance)
            .map(|c| c.kind))
    }

    /// Root-level records, in creation order.
    pub fn roots(&self) -> Result<Vec<ContextNode>, MeaningError> {
        self.children(NodeId::ROOT)
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<ContextNode>, MeaningError> {
        let tree = self.read()?;
        tree.node(node)?;
        Ok(tree.child_nodes(node).cloned().collect())
    }

    /// The owner of a node followed by every parent that references it.
    pub fn parents(&self, node: NodeId) -> Result<Vec<ContextNode>, MeaningError> {
        let tree = self.read()?;
        let target = tree.node(node)?;
        target
            .owner
            .into_iter()
            .chain(tree.referrers.get(&node).into_iter().flatten().copied())
            .map(|id| tree.node(id).cloned())
            .collect()
    }

    pub fn node(&self, node: NodeId) -> Result<ContextNode, MeaningError> {
        self.read()?.node(node).cloned()
    }

    /// Number of nodes, the sentinel root excluded.
    pub fn node_count(&self) -> Result<usize, MeaningError> {
        Ok(self.read()?.nodes.len().saturating_sub(1))
    }

    /// Number of distinct kinds in the flat index.
    pub fn kind_count(&self) -> Result<usize, MeaningError> {
        Ok(self.read()?.flat.len())
    }

    /// Every leaf instance path below a node, starting with the node's own instance.
    pub fn child_instance_paths(&self, node: NodeId) -> Result<Vec<Vec<InstanceId>>, MeaningError> {
        self.read()?.child_instance_paths(node)
    }

    /// Instances along the owner chain, root-level record first.
    pub fn parent_instance_path(&self, node: NodeId) -> Result<Vec<InstanceId>, MeaningError> {
        let tree = self.read()?;
        tree.owner_chain(node)?
            .into_iter()
            .map(|id| tree.node(id).map(|n| n.instance))
            .collect()
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// A kind handle with the name it was registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindName {
    pub id: KindId,
    pub name: String,
}

/// Snapshot of a store, self-describing with respect to kind handles.
///
/// Kind handles depend on registration order, so the snapshot carries the
/// name of every kind it uses and `into_store` remaps them against the
/// loading registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableStore {
    pub kinds: Vec<KindName>,
    pub nodes: Vec<ContextNode>,
    pub children: Vec<(NodeId, Vec<NodeId>)>,
    pub flat: Vec<(KindId, Vec<NodeId>)>,
    pub next_node_id: u64,
}

impl SerializableStore {
    /// Snapshot `store`, naming its kinds from `registry`.
    pub fn from_store(
        store: &ContextValueDictionary,
        registry: &KindRegistry,
    ) -> Result<Self, MeaningError> {
        let tree = store.read()?;

        let mut used = BTreeSet::new();
        for node in tree.nodes.values() {
            used.insert(node.kind);
            if let Some(value) = &node.value {
                used.extend(value.type_path().iter().copied());
            }
        }

        let kinds = used
            .into_iter()
            .map(|id| {
                registry.info(id).map(|info| KindName {
                    id,
                    name: info.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kinds,
            nodes: tree.nodes.values().cloned().collect(),
            children: tree
                .children
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            flat: tree.flat.iter().map(|(k, v)| (*k, v.clone())).collect(),
            next_node_id: tree.next_node_id,
        })
    }

    /// Rebuild a store, mapping saved kind handles to `registry`'s handles.
    pub fn into_store(self, registry: &KindRegistry) -> Result<ContextValueDictionary, MeaningError> {
        let mut remap = BTreeMap::new();
        for saved in &self.kinds {
            let current = registry.require(&saved.name)?;
            remap.insert(saved.id, current);
        }
        let map = |kind: KindId| {
            remap.get(&kind).copied().ok_or_else(|| {
                MeaningError::DeserializationError(format!("{} has no saved name", kind))
            })
        };

        let mut tree = Tree {
            nodes: BTreeMap::new(),
            children: BTreeMap::new(),
            referrers: BTreeMap::new(),
            flat: BTreeMap::new(),
            next_node_id: self.next_node_id,
        };

        for node in self.nodes {
            if node.id.0 >= self.next_node_id && node.id != NodeId::ROOT {
                return Err(MeaningError::DeserializationError(format!(
                    "{} is beyond the node counter",
                    node.id
                )));
            }
            let value = node.value.map(|v| v.map_kinds(map)).transpose()?;
            let kind = map(node.kind)?;
            tree.nodes.insert(node.id, ContextNode { kind, value, ..node });
        }

        match tree.nodes.get(&NodeId::ROOT) {
            Some(root) if root.owner.is_none() => {}
            _ => {
                return Err(MeaningError::DeserializationError(
                    "store has no root node".to_string(),
                ));
            }
        }

        for (parent, children) in self.children {
            for &child in children.iter().chain(std::iter::once(&parent)) {
                if !tree.nodes.contains_key(&child) {
                    return Err(MeaningError::DeserializationError(format!(
                        "{} is referenced but not stored",
                        child
                    )));
                }
            }
            for &child in &children {
                let owned = tree.nodes.get(&child).and_then(|c| c.owner) == Some(parent);
                if !owned {
                    tree.referrers.entry(child).or_default().push(parent);
                }
            }
            tree.children.insert(parent, children);
        }

        for (kind, ids) in self.flat {
            if let Some(missing) = ids.iter().find(|id| !tree.nodes.contains_key(id)) {
                return Err(MeaningError::DeserializationError(format!(
                    "{} is indexed but not stored",
                    missing
                )));
            }
            tree.flat.insert(map(kind)?, ids);
        }

        debug!(nodes = tree.nodes.len(), "store rebuilt");
        Ok(ContextValueDictionary::from_tree(tree))
    }
}

// =============================================================================
// TESTS
// =============================================================================
