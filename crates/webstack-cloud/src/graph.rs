//! Declarative resource graph
//!
//! A [`ResourceGraph`] is an explicit DAG of resource descriptors. Edges come in
//! two flavours:
//!
//! - **data** edges, derived from attribute references ([`Value::Ref`]) inside a
//!   resource's properties
//! - **ordering** edges, declared through [`Resource::depends_on`] when a
//!   resource must wait for another one it never references
//!
//! Ownership (the logical parent of every resource) is kept in a separate map.
//! It is used for grouping and cleanup only and never influences execution
//! order.

use crate::action::{Action, ActionType, Plan};
use crate::error::{CloudError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Logical resource name, unique within a graph (e.g., "demo-lb")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference to one of this resource's attributes
    pub fn attr(&self, attribute: impl Into<String>) -> AttrRef {
        AttrRef {
            resource: self.clone(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kinds of resources a deployment is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Read-only lookup of the default network; never created or deleted
    NetworkLookup,
    SecurityGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
    Role,
    RolePolicyAttachment,
    Cluster,
    TaskDefinition,
    Service,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::NetworkLookup,
        ResourceKind::SecurityGroup,
        ResourceKind::LoadBalancer,
        ResourceKind::TargetGroup,
        ResourceKind::Listener,
        ResourceKind::Role,
        ResourceKind::RolePolicyAttachment,
        ResourceKind::Cluster,
        ResourceKind::TaskDefinition,
        ResourceKind::Service,
    ];

    /// Provider type token understood by the engine
    pub fn type_token(self) -> &'static str {
        match self {
            ResourceKind::NetworkLookup => "aws:ec2:getVpc",
            ResourceKind::SecurityGroup => "aws:ec2:SecurityGroup",
            ResourceKind::LoadBalancer => "aws:lb:LoadBalancer",
            ResourceKind::TargetGroup => "aws:lb:TargetGroup",
            ResourceKind::Listener => "aws:lb:Listener",
            ResourceKind::Role => "aws:iam:Role",
            ResourceKind::RolePolicyAttachment => "aws:iam:RolePolicyAttachment",
            ResourceKind::Cluster => "aws:ecs:Cluster",
            ResourceKind::TaskDefinition => "aws:ecs:TaskDefinition",
            ResourceKind::Service => "aws:ecs:Service",
        }
    }

    /// Whether the engine creates and deletes resources of this kind
    pub fn is_managed(self) -> bool {
        !matches!(self, ResourceKind::NetworkLookup)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

/// Reference to an attribute of another resource, resolved by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrRef {
    pub resource: ResourceId,
    pub attribute: String,
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// Property value of a resource descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Ref(AttrRef),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_ref_attr(&self) -> Option<&AttrRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a AttrRef>) {
        match self {
            Value::Ref(r) => out.push(r),
            Value::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Value::Map(map) => map.values().for_each(|v| v.collect_refs(out)),
            Value::Bool(_) | Value::Int(_) | Value::String(_) => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<AttrRef> for Value {
    fn from(r: AttrRef) -> Self {
        Value::Ref(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Declarative description of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, Value>,

    /// Ordering-only dependencies (no attribute is read from them)
    pub depends_on: Vec<ResourceId>,

    /// Values already known at composition time (lookup results)
    pub outputs: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: ResourceId::new(id),
            kind,
            properties: BTreeMap::new(),
            depends_on: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, id: &ResourceId) -> Self {
        if !self.depends_on.contains(id) {
            self.depends_on.push(id.clone());
        }
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// All attribute references found in the properties
    pub fn references(&self) -> Vec<&AttrRef> {
        let mut refs = Vec::new();
        for value in self.properties.values() {
            value.collect_refs(&mut refs);
        }
        refs
    }

    /// Resources this one reads attributes from, without duplicates
    pub fn data_dependencies(&self) -> Vec<&ResourceId> {
        let mut seen = HashSet::new();
        self.references()
            .into_iter()
            .map(|r| &r.resource)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Kind of dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The dependent reads an attribute of the dependency
    Data,
    /// Pure sequencing constraint
    Ordering,
}

/// Dependency edge: `to` must be realized after `from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: ResourceId,
    pub to: ResourceId,
    pub kind: EdgeKind,
}

/// Logical owner of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The deployment component itself
    Deployment,
    Resource(ResourceId),
}

/// Validated, immutable resource graph of one deployment
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    name: String,
    component_type: String,
    resources: Vec<Resource>,
    index: HashMap<ResourceId, usize>,
    owners: HashMap<ResourceId, Owner>,
    outputs: BTreeMap<String, AttrRef>,
}

/// Incremental, validating constructor for [`ResourceGraph`]
#[derive(Debug)]
pub struct GraphBuilder {
    graph: ResourceGraph,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            graph: ResourceGraph {
                name: name.into(),
                component_type: component_type.into(),
                resources: Vec::new(),
                index: HashMap::new(),
                owners: HashMap::new(),
                outputs: BTreeMap::new(),
            },
        }
    }

    /// Add a resource under `owner`
    ///
    /// Every referenced resource, ordering dependency and owner must already be
    /// part of the graph, which keeps the graph acyclic by construction.
    pub fn add(&mut self, resource: Resource, owner: Owner) -> Result<ResourceId> {
        let graph = &mut self.graph;
        let prefix = format!("{}-", graph.name);
        if !resource.id.as_str().starts_with(&prefix) {
            return Err(CloudError::MissingPrefix {
                id: resource.id.to_string(),
                prefix: graph.name.clone(),
            });
        }
        if graph.index.contains_key(&resource.id) {
            return Err(CloudError::DuplicateResource(resource.id.to_string()));
        }
        if let Owner::Resource(parent) = &owner {
            if !graph.index.contains_key(parent) {
                return Err(CloudError::UnknownResource(parent.to_string()));
            }
        }
        for dep in resource
            .data_dependencies()
            .into_iter()
            .chain(resource.depends_on.iter())
        {
            if !graph.index.contains_key(dep) {
                return Err(CloudError::UnknownResource(format!(
                    "{} (referenced by {})",
                    dep, resource.id
                )));
            }
        }

        let id = resource.id.clone();
        tracing::debug!("Adding {} {} to graph {}", resource.kind, id, graph.name);
        graph.index.insert(id.clone(), graph.resources.len());
        graph.owners.insert(id.clone(), owner);
        graph.resources.push(resource);
        Ok(id)
    }

    /// Publish an attribute as a named output of the deployment
    pub fn export(&mut self, name: impl Into<String>, attr: AttrRef) -> Result<()> {
        if !self.graph.index.contains_key(&attr.resource) {
            return Err(CloudError::UnknownResource(attr.resource.to_string()));
        }
        self.graph.outputs.insert(name.into(), attr);
        Ok(())
    }

    pub fn build(self) -> Result<ResourceGraph> {
        self.graph.topological_order()?;
        Ok(self.graph)
    }
}

impl ResourceGraph {
    /// Deployment name shared as prefix by every resource id
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in insertion order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.index
            .get(&ResourceId::new(id))
            .map(|&i| &self.resources[i])
    }

    pub fn of_kind(&self, kind: ResourceKind) -> Vec<&Resource> {
        self.resources.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources.iter().filter(|r| r.kind == kind).count()
    }

    pub fn owner_of(&self, id: &str) -> Option<&Owner> {
        self.owners.get(&ResourceId::new(id))
    }

    /// Resources directly owned by `owner`, in insertion order
    pub fn children_of(&self, owner: &Owner) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| self.owners.get(&r.id) == Some(owner))
            .collect()
    }

    pub fn outputs(&self) -> &BTreeMap<String, AttrRef> {
        &self.outputs
    }

    /// All edges, data edges first for each dependent
    pub fn edges(&self) -> Vec<Edge> {
        self.resources
            .iter()
            .flat_map(|r| self.edges_into(r))
            .collect()
    }

    /// Edges pointing at `id` (its dependencies)
    pub fn dependencies_of(&self, id: &str) -> Vec<Edge> {
        self.get(id).map(|r| self.edges_into(r)).unwrap_or_default()
    }

    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        self.dependencies_of(to)
            .iter()
            .any(|e| e.from.as_str() == from && e.kind == kind)
    }

    fn edges_into(&self, resource: &Resource) -> Vec<Edge> {
        let data = resource.data_dependencies().into_iter().map(|dep| Edge {
            from: dep.clone(),
            to: resource.id.clone(),
            kind: EdgeKind::Data,
        });
        let ordering = resource.depends_on.iter().map(|dep| Edge {
            from: dep.clone(),
            to: resource.id.clone(),
            kind: EdgeKind::Ordering,
        });
        data.chain(ordering).collect()
    }

    fn dependency_indices(&self, resource: &Resource) -> Result<BTreeSet<usize>> {
        resource
            .data_dependencies()
            .into_iter()
            .chain(resource.depends_on.iter())
            .map(|dep| {
                self.index
                    .get(dep)
                    .copied()
                    .ok_or_else(|| CloudError::UnknownResource(dep.to_string()))
            })
            .collect()
    }

    /// Resources in creation order (Kahn's algorithm)
    ///
    /// Ties are broken by insertion order so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<&Resource>> {
        let mut in_degree = vec![0usize; self.resources.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];

        for (i, resource) in self.resources.iter().enumerate() {
            let deps = self.dependency_indices(resource)?;
            in_degree[i] = deps.len();
            for dep in deps {
                dependents[dep].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.resources.len());

        while let Some(i) = ready.pop_first() {
            order.push(&self.resources[i]);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() != self.resources.len() {
            let cycle = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(i, _)| self.resources[i].id.to_string())
                .collect();
            return Err(CloudError::CyclicDependency(cycle));
        }

        Ok(order)
    }

    /// Managed resources in deletion order (reverse creation order)
    pub fn destroy_order(&self) -> Result<Vec<&Resource>> {
        let mut order = self.topological_order()?;
        order.retain(|r| r.kind.is_managed());
        order.reverse();
        Ok(order)
    }

    /// Rebuild the graph with every resource passed through `f`
    ///
    /// The result is validated exactly like a freshly built graph.
    pub fn map_resources<F>(&self, mut f: F) -> Result<ResourceGraph>
    where
        F: FnMut(Resource) -> Resource,
    {
        let mut builder = GraphBuilder::new(self.name.clone(), self.component_type.clone());
        for resource in &self.resources {
            let owner = self
                .owners
                .get(&resource.id)
                .cloned()
                .unwrap_or(Owner::Deployment);
            builder.add(f(resource.clone()), owner)?;
        }
        for (name, attr) in &self.outputs {
            builder.export(name.clone(), attr.clone())?;
        }
        builder.build()
    }

    /// Compare this (previously applied) graph with `next`
    ///
    /// Lookup nodes never produce actions of their own, but a change in their
    /// resolved values propagates to every resource reading them.
    pub fn diff(&self, next: &ResourceGraph) -> Result<Plan> {
        let mut actions = Vec::new();
        let mut changed: HashSet<&ResourceId> = HashSet::new();

        for resource in next.topological_order()? {
            let previous = self.get(resource.id.as_str());

            if !resource.kind.is_managed() {
                if previous.is_none_or(|p| p.outputs != resource.outputs) {
                    changed.insert(&resource.id);
                }
                continue;
            }

            let token = resource.kind.type_token();
            let action = match previous {
                None => {
                    changed.insert(&resource.id);
                    Action::new(
                        ActionType::Create,
                        token,
                        resource.id.as_str(),
                        format!("create {} {}", token, resource.id),
                    )
                }
                Some(previous) => {
                    let fields = changed_fields(
                        previous,
                        resource,
                        self.owners.get(&previous.id),
                        next.owners.get(&resource.id),
                    );
                    let upstream = resource
                        .data_dependencies()
                        .into_iter()
                        .find(|dep| changed.contains(dep));

                    if !fields.is_empty() {
                        changed.insert(&resource.id);
                        Action::new(
                            ActionType::Update,
                            token,
                            resource.id.as_str(),
                            format!("update {} ({})", resource.id, fields.join(", ")),
                        )
                        .with_detail("changed", serde_json::json!(fields))
                    } else if let Some(upstream) = upstream {
                        changed.insert(&resource.id);
                        Action::new(
                            ActionType::Update,
                            token,
                            resource.id.as_str(),
                            format!("update {} (follows {})", resource.id, upstream),
                        )
                        .with_detail("propagated_from", serde_json::json!(upstream.as_str()))
                    } else {
                        Action::new(
                            ActionType::NoOp,
                            token,
                            resource.id.as_str(),
                            format!("{} unchanged", resource.id),
                        )
                    }
                }
            };
            actions.push(action);
        }

        for resource in self.destroy_order()? {
            if next.get(resource.id.as_str()).is_none() {
                let token = resource.kind.type_token();
                actions.push(Action::new(
                    ActionType::Delete,
                    token,
                    resource.id.as_str(),
                    format!("delete {} {}", token, resource.id),
                ));
            }
        }

        Ok(Plan::new(actions))
    }
}

fn changed_fields(
    previous: &Resource,
    next: &Resource,
    previous_owner: Option<&Owner>,
    next_owner: Option<&Owner>,
) -> Vec<String> {
    let mut fields = Vec::new();
    if previous.kind != next.kind {
        fields.push("kind".to_string());
    }
    let keys: BTreeSet<&String> = previous
        .properties
        .keys()
        .chain(next.properties.keys())
        .collect();
    for key in keys {
        if previous.properties.get(key) != next.properties.get(key) {
            fields.push(key.clone());
        }
    }
    if previous.depends_on != next.depends_on {
        fields.push("dependsOn".to_string());
    }
    if previous_owner != next_owner {
        fields.push("parent".to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(image: &str) -> ResourceGraph {
        let mut b = GraphBuilder::new("app", "test:index:App");
        let net = b
            .add(
                Resource::new("app-net", ResourceKind::NetworkLookup)
                    .with_output("vpcId", "vpc-1"),
                Owner::Deployment,
            )
            .unwrap();
        let lb = b
            .add(
                Resource::new("app-lb", ResourceKind::LoadBalancer)
                    .with_property("vpc", net.attr("vpcId")),
                Owner::Deployment,
            )
            .unwrap();
        let listener = b
            .add(
                Resource::new("app-listener", ResourceKind::Listener)
                    .with_property("loadBalancerArn", lb.attr("arn")),
                Owner::Resource(lb.clone()),
            )
            .unwrap();
        let cluster = b
            .add(Resource::new("app-cluster", ResourceKind::Cluster), Owner::Deployment)
            .unwrap();
        let td = b
            .add(
                Resource::new("app-td", ResourceKind::TaskDefinition).with_property("image", image),
                Owner::Resource(cluster.clone()),
            )
            .unwrap();
        b.add(
            Resource::new("app-svc", ResourceKind::Service)
                .with_property("cluster", cluster.attr("arn"))
                .with_property("taskDefinition", td.attr("arn"))
                .depends_on(&listener),
            Owner::Resource(td),
        )
        .unwrap();
        b.export("url", lb.attr("dnsName")).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_edges_are_typed() {
        let graph = sample("nginx");
        assert!(graph.has_edge("app-listener", "app-svc", EdgeKind::Ordering));
        assert!(graph.has_edge("app-td", "app-svc", EdgeKind::Data));
        assert!(!graph.has_edge("app-listener", "app-svc", EdgeKind::Data));
        assert_eq!(graph.dependencies_of("app-svc").len(), 3);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let graph = sample("nginx");
        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        let pos = |id: &str| order.iter().position(|o| *o == id).unwrap();

        for edge in graph.edges() {
            assert!(pos(edge.from.as_str()) < pos(edge.to.as_str()), "{:?}", edge);
        }
    }

    #[test]
    fn test_destroy_order_skips_lookups() {
        let graph = sample("nginx");
        let order: Vec<&str> = graph
            .destroy_order()
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(order.first(), Some(&"app-svc"));
        assert!(!order.contains(&"app-net"));
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_ownership_map() {
        let graph = sample("nginx");
        assert_eq!(graph.owner_of("app-lb"), Some(&Owner::Deployment));
        assert_eq!(
            graph.owner_of("app-svc"),
            Some(&Owner::Resource(ResourceId::new("app-td")))
        );
        let children: Vec<&str> = graph
            .children_of(&Owner::Resource(ResourceId::new("app-lb")))
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(children, vec!["app-listener"]);
    }

    #[test]
    fn test_builder_rejects_invalid_resources() {
        let mut b = GraphBuilder::new("app", "test:index:App");
        let err = b
            .add(Resource::new("other-lb", ResourceKind::LoadBalancer), Owner::Deployment)
            .unwrap_err();
        assert!(matches!(err, CloudError::MissingPrefix { .. }));

        b.add(Resource::new("app-lb", ResourceKind::LoadBalancer), Owner::Deployment)
            .unwrap();
        let err = b
            .add(Resource::new("app-lb", ResourceKind::LoadBalancer), Owner::Deployment)
            .unwrap_err();
        assert!(matches!(err, CloudError::DuplicateResource(_)));

        let err = b
            .add(
                Resource::new("app-tg", ResourceKind::TargetGroup)
                    .with_property("vpcId", ResourceId::new("app-net").attr("vpcId")),
                Owner::Deployment,
            )
            .unwrap_err();
        assert!(matches!(err, CloudError::UnknownResource(_)));

        let err = b
            .add(
                Resource::new("app-listener", ResourceKind::Listener),
                Owner::Resource(ResourceId::new("app-missing")),
            )
            .unwrap_err();
        assert!(matches!(err, CloudError::UnknownResource(_)));

        assert!(
            b.export("url", ResourceId::new("app-nope").attr("dnsName"))
                .is_err()
        );
    }

    #[test]
    fn test_diff_identical_graphs_is_noop() {
        let plan = sample("nginx").diff(&sample("nginx")).unwrap();
        assert!(!plan.has_changes);
        assert_eq!(plan.summary().no_change, 5);
    }

    #[test]
    fn test_diff_propagates_along_data_edges() {
        let plan = sample("nginx").diff(&sample("httpd")).unwrap();
        assert_eq!(plan.touched(), vec!["app-td", "app-svc"]);
        let svc = plan.action_for("app-svc").unwrap();
        assert_eq!(
            svc.details.get("propagated_from"),
            Some(&serde_json::json!("app-td"))
        );
    }

    #[test]
    fn test_diff_from_empty_creates_managed_resources() {
        let empty = GraphBuilder::new("app", "test:index:App").build().unwrap();
        let plan = empty.diff(&sample("nginx")).unwrap();
        assert_eq!(plan.summary().create, 5);
        assert!(plan.action_for("app-net").is_none());

        let teardown = sample("nginx").diff(&empty).unwrap();
        assert_eq!(teardown.summary().delete, 5);
        assert_eq!(teardown.actions[0].resource_id, "app-svc");
    }

    #[test]
    fn test_map_resources_revalidates() {
        let graph = sample("nginx");
        let without_listener_dep = graph
            .map_resources(|mut r| {
                r.depends_on.clear();
                r
            })
            .unwrap();
        assert!(!without_listener_dep.has_edge("app-listener", "app-svc", EdgeKind::Ordering));

        let err = graph
            .map_resources(|r| {
                if r.kind == ResourceKind::Cluster {
                    r.depends_on(&ResourceId::new("app-svc"))
                } else {
                    r
                }
            })
            .unwrap_err();
        assert!(matches!(err, CloudError::UnknownResource(_)));
    }

    #[test]
    fn test_value_accessors() {
        let value = Value::map([
            ("port", Value::from(80u16)),
            ("tags", Value::list(["a", "b"])),
        ]);
        assert_eq!(value.get("port").and_then(Value::as_i64), Some(80));
        assert_eq!(
            value.get("tags").and_then(|t| t.at(1)).and_then(Value::as_str),
            Some("b")
        );
        assert!(value.get("missing").is_none());
    }
}
