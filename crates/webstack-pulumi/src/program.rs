//! Pulumi YAML program rendering
//!
//! Each managed resource becomes an entry under `resources:`; attribute
//! references turn into `${id.attr}` interpolations, except references to
//! lookup nodes, whose values are already known and are inlined.

use crate::error::{PulumiError, Result};
use serde_yaml::{Mapping, Value as Yaml};
use webstack_cloud::{AttrRef, Owner, ResourceGraph, Value};

pub const PROGRAM_FILE: &str = "Pulumi.yaml";

/// Minimal program that only declares the project
pub fn render_stub(project: &str) -> Result<String> {
    let mut root = Mapping::new();
    root.insert("name".into(), project.into());
    root.insert("runtime".into(), "yaml".into());
    Ok(serde_yaml::to_string(&root)?)
}

/// Full program declaring every managed resource of `graph`
pub fn render(project: &str, graph: &ResourceGraph) -> Result<String> {
    let mut root = Mapping::new();
    root.insert("name".into(), project.into());
    root.insert("runtime".into(), "yaml".into());
    root.insert(
        "description".into(),
        format!("{} {}", graph.component_type(), graph.name()).into(),
    );

    let mut resources = Mapping::new();
    for resource in graph.topological_order()? {
        if !resource.kind.is_managed() {
            continue;
        }

        let mut entry = Mapping::new();
        entry.insert("type".into(), resource.kind.type_token().into());

        if !resource.properties.is_empty() {
            let mut properties = Mapping::new();
            for (key, value) in &resource.properties {
                properties.insert(key.as_str().into(), to_yaml(value, graph)?);
            }
            entry.insert("properties".into(), Yaml::Mapping(properties));
        }

        let mut options = Mapping::new();
        if let Some(Owner::Resource(parent)) = graph.owner_of(resource.id.as_str()) {
            options.insert("parent".into(), format!("${{{}}}", parent).into());
        }
        if !resource.depends_on.is_empty() {
            let deps = resource
                .depends_on
                .iter()
                .map(|d| Yaml::String(format!("${{{}}}", d)))
                .collect();
            options.insert("dependsOn".into(), Yaml::Sequence(deps));
        }
        if !options.is_empty() {
            entry.insert("options".into(), Yaml::Mapping(options));
        }

        resources.insert(resource.id.as_str().into(), Yaml::Mapping(entry));
    }
    root.insert("resources".into(), Yaml::Mapping(resources));

    if !graph.outputs().is_empty() {
        let mut outputs = Mapping::new();
        for (name, attr) in graph.outputs() {
            outputs.insert(name.as_str().into(), reference(attr, graph)?);
        }
        root.insert("outputs".into(), Yaml::Mapping(outputs));
    }

    Ok(serde_yaml::to_string(&root)?)
}

fn to_yaml(value: &Value, graph: &ResourceGraph) -> Result<Yaml> {
    Ok(match value {
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Int(i) => Yaml::Number((*i).into()),
        Value::String(s) => Yaml::String(s.clone()),
        Value::List(items) => Yaml::Sequence(
            items
                .iter()
                .map(|v| to_yaml(v, graph))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => {
            let mut mapping = Mapping::new();
            for (k, v) in map {
                mapping.insert(k.as_str().into(), to_yaml(v, graph)?);
            }
            Yaml::Mapping(mapping)
        }
        Value::Ref(attr) => reference(attr, graph)?,
    })
}

fn reference(attr: &AttrRef, graph: &ResourceGraph) -> Result<Yaml> {
    let target = graph
        .get(attr.resource.as_str())
        .ok_or_else(|| PulumiError::Render(format!("unknown resource {}", attr.resource)))?;

    if target.kind.is_managed() {
        return Ok(Yaml::String(format!("${{{}}}", attr)));
    }

    let known = target.outputs.get(&attr.attribute).ok_or_else(|| {
        PulumiError::Render(format!("lookup {} has no value for {}", attr.resource, attr.attribute))
    })?;
    to_yaml(known, graph)
}
