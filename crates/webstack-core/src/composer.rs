//! Deployment composer
//!
//! Turns a [`DeploymentSpec`] into the resource graph of a load-balanced
//! container service:
//!
//! ```text
//! default-vpc ─┬─> securitygroup ─┬─> lb ─┬─> tg ───────┐
//!              │                  │       └─> listener ·│·····┐
//!              └──────────────────┴─────────────────────┴─> svc
//! role ─> rpa        cluster ─> task-definition ───────────────┘
//! ```
//!
//! The dotted edge from the listener to the service is an ordering constraint:
//! the service never reads a listener attribute, yet the target group is only
//! attachable once a listener forwards to it.

use crate::deployment::{Deployment, DeploymentHandle, DeploymentSpec};
use serde::Serialize;
use webstack_cloud::{
    CloudError, EdgeKind, GraphBuilder, NetworkContext, NetworkResolver, Owner, Resource,
    ResourceGraph, ResourceId, ResourceKind, Result, Value,
};

/// Type token of the component that owns every resource
pub const COMPONENT_TYPE: &str = "webapp:index:Deployment";

/// Name of the published load-balancer address output
pub const URL_OUTPUT: &str = "url";

/// Port exposed by the container, bound by the service and served by the target group
pub const CONTAINER_PORT: u16 = 80;

pub const DESIRED_COUNT: u32 = 3;
pub const TASK_CPU: &str = "256";
pub const TASK_MEMORY: &str = "512";
pub const LAUNCH_TYPE: &str = "FARGATE";
pub const NETWORK_MODE: &str = "awsvpc";

pub const TASK_EXECUTION_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
pub const TASK_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

const ANYWHERE: &str = "0.0.0.0/0";

/// Resolve the default network and compose the deployment graph
pub async fn compose(spec: &DeploymentSpec, network: &dyn NetworkResolver) -> Result<Deployment> {
    let context = network.resolve_default().await?;
    tracing::debug!(
        "Resolved default network {} with {} subnets",
        context.vpc_id,
        context.subnet_ids.len()
    );

    let graph = compose_graph(spec, &context)?;
    let url = graph
        .outputs()
        .get(URL_OUTPUT)
        .cloned()
        .ok_or_else(|| CloudError::UnknownResource(URL_OUTPUT.to_string()))?;

    Ok(Deployment {
        spec: spec.clone(),
        graph,
        handle: DeploymentHandle { url },
    })
}

/// Pure composition: the same inputs always yield the same graph
pub fn compose_graph(spec: &DeploymentSpec, network: &NetworkContext) -> Result<ResourceGraph> {
    let name = spec.name();
    let mut b = GraphBuilder::new(name, COMPONENT_TYPE);

    let vpc = b.add(
        Resource::new(format!("{name}-default-vpc"), ResourceKind::NetworkLookup)
            .with_output("vpcId", network.vpc_id.as_str())
            .with_output("subnetIds", Value::list(network.subnet_ids.iter().cloned())),
        Owner::Deployment,
    )?;

    let cluster = b.add(
        Resource::new(format!("{name}-cluster"), ResourceKind::Cluster),
        Owner::Deployment,
    )?;

    let security_group = b.add(
        Resource::new(format!("{name}-securitygroup"), ResourceKind::SecurityGroup)
            .with_property("vpcId", vpc.attr("vpcId"))
            .with_property("description", "Enable HTTP access")
            .with_property(
                "ingress",
                vec![firewall_rule("tcp", CONTAINER_PORT, CONTAINER_PORT)],
            )
            .with_property("egress", vec![firewall_rule("-1", 0, 0)]),
        Owner::Deployment,
    )?;

    let lb = b.add(
        Resource::new(format!("{name}-lb"), ResourceKind::LoadBalancer)
            .with_property("securityGroups", Value::list([security_group.attr("id")]))
            .with_property("subnets", vpc.attr("subnetIds")),
        Owner::Deployment,
    )?;

    let target_group = b.add(
        Resource::new(format!("{name}-tg"), ResourceKind::TargetGroup)
            .with_property("port", CONTAINER_PORT)
            .with_property("protocol", "HTTP")
            .with_property("targetType", "ip")
            .with_property("vpcId", vpc.attr("vpcId")),
        Owner::Resource(lb.clone()),
    )?;

    let listener = b.add(
        Resource::new(format!("{name}-listener"), ResourceKind::Listener)
            .with_property("loadBalancerArn", lb.attr("arn"))
            .with_property("port", CONTAINER_PORT)
            .with_property(
                "defaultActions",
                vec![Value::map([
                    ("type", Value::from("forward")),
                    ("targetGroupArn", target_group.attr("arn").into()),
                ])],
            ),
        Owner::Resource(lb.clone()),
    )?;

    let role = b.add(
        Resource::new(format!("{name}-role"), ResourceKind::Role)
            .with_property("assumeRolePolicy", assume_role_policy()?),
        Owner::Deployment,
    )?;

    b.add(
        Resource::new(format!("{name}-rpa"), ResourceKind::RolePolicyAttachment)
            .with_property("role", role.attr("name"))
            .with_property("policyArn", TASK_EXECUTION_POLICY_ARN),
        Owner::Resource(role.clone()),
    )?;

    let task_definition = b.add(
        Resource::new(format!("{name}-task-definition"), ResourceKind::TaskDefinition)
            .with_property("family", name)
            .with_property("cpu", TASK_CPU)
            .with_property("memory", TASK_MEMORY)
            .with_property("networkMode", NETWORK_MODE)
            .with_property("requiresCompatibilities", Value::list([LAUNCH_TYPE]))
            .with_property("executionRoleArn", role.attr("arn"))
            .with_property("containerDefinitions", container_definitions(spec)?),
        Owner::Resource(cluster.clone()),
    )?;

    b.add(
        Resource::new(format!("{name}-svc"), ResourceKind::Service)
            .with_property("cluster", cluster.attr("arn"))
            .with_property("desiredCount", DESIRED_COUNT)
            .with_property("launchType", LAUNCH_TYPE)
            .with_property("taskDefinition", task_definition.attr("arn"))
            .with_property(
                "networkConfiguration",
                Value::map([
                    ("assignPublicIp", Value::from(true)),
                    ("subnets", vpc.attr("subnetIds").into()),
                    ("securityGroups", Value::list([security_group.attr("id")])),
                ]),
            )
            .with_property(
                "loadBalancers",
                vec![Value::map([
                    ("targetGroupArn", Value::from(target_group.attr("arn"))),
                    ("containerName", Value::from(name)),
                    ("containerPort", Value::from(CONTAINER_PORT)),
                ])],
            )
            .depends_on(&listener),
        Owner::Resource(task_definition),
    )?;

    b.export(URL_OUTPUT, lb.attr("dnsName"))?;

    let graph = b.build()?;
    verify(&graph)?;
    Ok(graph)
}

fn firewall_rule(protocol: &str, from_port: u16, to_port: u16) -> Value {
    Value::map([
        ("protocol", Value::from(protocol)),
        ("fromPort", Value::from(from_port)),
        ("toPort", Value::from(to_port)),
        ("cidrBlocks", Value::list([ANYWHERE])),
    ])
}

#[derive(Serialize)]
struct PolicyDocument {
    #[serde(rename = "Version")]
    version: &'static str,
    #[serde(rename = "Statement")]
    statement: Vec<PolicyStatement>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyStatement {
    sid: &'static str,
    effect: &'static str,
    principal: Principal,
    action: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Principal {
    service: &'static str,
}

fn assume_role_policy() -> Result<String> {
    let document = PolicyDocument {
        version: "2008-10-17",
        statement: vec![PolicyStatement {
            sid: "",
            effect: "Allow",
            principal: Principal {
                service: TASK_EXECUTION_PRINCIPAL,
            },
            action: "sts:AssumeRole",
        }],
    };
    Ok(serde_json::to_string(&document)?)
}

/// Container entry of an ECS task definition
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition<'a> {
    pub name: &'a str,
    pub image: &'a str,
    pub port_mappings: Vec<PortMapping>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: &'static str,
}

fn container_definitions(spec: &DeploymentSpec) -> Result<String> {
    let containers = [ContainerDefinition {
        name: spec.name(),
        image: spec.image(),
        port_mappings: vec![PortMapping {
            container_port: CONTAINER_PORT,
            host_port: CONTAINER_PORT,
            protocol: "tcp",
        }],
    }];
    Ok(serde_json::to_string(&containers)?)
}

/// Structural checks every deployment graph must pass
///
/// - exactly one resource of each kind
/// - the service waits for the listener through an ordering edge
/// - container port, service-bound port and target group port agree
pub fn verify(graph: &ResourceGraph) -> Result<()> {
    for kind in ResourceKind::ALL {
        let count = graph.count(kind);
        if count != 1 {
            return Err(CloudError::invalid_input(
                "graph",
                format!("expected exactly one {}, found {}", kind, count),
            ));
        }
    }

    let single = |kind: ResourceKind| graph.of_kind(kind)[0];
    let service = single(ResourceKind::Service);
    let listener = single(ResourceKind::Listener);

    if !graph.has_edge(listener.id.as_str(), service.id.as_str(), EdgeKind::Ordering) {
        return Err(CloudError::invalid_input(
            "graph",
            format!("{} must depend on {}", service.id, listener.id),
        ));
    }

    let ports = [
        ("target group port", target_group_port(single(ResourceKind::TargetGroup))),
        ("service container port", service_container_port(service)),
        (
            "task definition container port",
            task_container_port(single(ResourceKind::TaskDefinition)),
        ),
    ];
    for (what, port) in ports {
        if port != Some(i64::from(CONTAINER_PORT)) {
            return Err(CloudError::invalid_input(
                "graph",
                format!("{} is {:?}, expected {}", what, port, CONTAINER_PORT),
            ));
        }
    }

    Ok(())
}

fn target_group_port(tg: &Resource) -> Option<i64> {
    tg.property("port").and_then(Value::as_i64)
}

fn service_container_port(service: &Resource) -> Option<i64> {
    service
        .property("loadBalancers")
        .and_then(|lbs| lbs.at(0))
        .and_then(|lb| lb.get("containerPort"))
        .and_then(Value::as_i64)
}

fn task_container_port(td: &Resource) -> Option<i64> {
    let raw = td.property("containerDefinitions").and_then(Value::as_str)?;
    let containers: serde_json::Value = serde_json::from_str(raw).ok()?;
    containers
        .get(0)?
        .get("portMappings")?
        .get(0)?
        .get("containerPort")?
        .as_i64()
}

/// Logical id of the resource of `kind` in a deployment named `name`
pub fn resource_id(name: &str, kind: ResourceKind) -> ResourceId {
    let suffix = match kind {
        ResourceKind::NetworkLookup => "default-vpc",
        ResourceKind::SecurityGroup => "securitygroup",
        ResourceKind::LoadBalancer => "lb",
        ResourceKind::TargetGroup => "tg",
        ResourceKind::Listener => "listener",
        ResourceKind::Role => "role",
        ResourceKind::RolePolicyAttachment => "rpa",
        ResourceKind::Cluster => "cluster",
        ResourceKind::TaskDefinition => "task-definition",
        ResourceKind::Service => "svc",
    };
    ResourceId::new(format!("{name}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use webstack_cloud::{ActionType, StaticNetwork};

    fn network() -> NetworkContext {
        NetworkContext::new(
            "vpc-0abc",
            vec!["subnet-a".to_string(), "subnet-b".to_string()],
        )
        .unwrap()
    }

    fn graph(name: &str, image: &str) -> ResourceGraph {
        compose_graph(&DeploymentSpec::new(name, image).unwrap(), &network()).unwrap()
    }

    #[test]
    fn test_one_resource_of_each_kind() {
        let graph = graph("demo", "nginx");
        assert_eq!(graph.len(), 10);
        for kind in ResourceKind::ALL {
            assert_eq!(graph.count(kind), 1, "{kind}");
            assert!(graph.get(resource_id("demo", kind).as_str()).is_some());
        }
    }

    #[test]
    fn test_resource_names_share_prefix() {
        let graph = graph("demo", "nginx");
        assert!(graph.resources().all(|r| r.id.as_str().starts_with("demo-")));
    }

    #[test]
    fn test_service_waits_for_listener() {
        let graph = graph("demo", "nginx");
        assert!(graph.has_edge("demo-listener", "demo-svc", EdgeKind::Ordering));
        assert!(verify(&graph).is_ok());

        let broken = graph
            .map_resources(|mut r| {
                if r.kind == ResourceKind::Service {
                    r.depends_on.clear();
                }
                r
            })
            .unwrap();
        let err = verify(&broken).unwrap_err();
        assert!(err.to_string().contains("must depend on demo-listener"));
    }

    #[test]
    fn test_ports_agree() {
        let graph = graph("demo", "nginx");
        let single = |kind| graph.of_kind(kind)[0];
        assert_eq!(target_group_port(single(ResourceKind::TargetGroup)), Some(80));
        assert_eq!(service_container_port(single(ResourceKind::Service)), Some(80));
        assert_eq!(task_container_port(single(ResourceKind::TaskDefinition)), Some(80));

        let drifted = graph
            .map_resources(|r| {
                if r.kind == ResourceKind::TargetGroup {
                    r.with_property("port", 8080u16)
                } else {
                    r
                }
            })
            .unwrap();
        assert!(verify(&drifted).is_err());
    }

    #[test]
    fn test_ownership() {
        let graph = graph("demo", "nginx");
        let owner = |id: &str| graph.owner_of(id).cloned().unwrap();
        let parent = |id: &str| Owner::Resource(ResourceId::new(id));

        assert_eq!(owner("demo-cluster"), Owner::Deployment);
        assert_eq!(owner("demo-securitygroup"), Owner::Deployment);
        assert_eq!(owner("demo-lb"), Owner::Deployment);
        assert_eq!(owner("demo-tg"), parent("demo-lb"));
        assert_eq!(owner("demo-listener"), parent("demo-lb"));
        assert_eq!(owner("demo-role"), Owner::Deployment);
        assert_eq!(owner("demo-rpa"), parent("demo-role"));
        assert_eq!(owner("demo-task-definition"), parent("demo-cluster"));
        assert_eq!(owner("demo-svc"), parent("demo-task-definition"));
    }

    #[test]
    fn test_task_definition_contents() {
        let graph = graph("demo", "nginx:1.27");
        let td = graph.get("demo-task-definition").unwrap();
        assert_eq!(td.property("family").and_then(Value::as_str), Some("demo"));
        assert_eq!(td.property("cpu").and_then(Value::as_str), Some("256"));
        assert_eq!(td.property("memory").and_then(Value::as_str), Some("512"));
        assert_eq!(td.property("networkMode").and_then(Value::as_str), Some("awsvpc"));

        let raw = td.property("containerDefinitions").and_then(Value::as_str).unwrap();
        let containers: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(
            containers,
            serde_json::json!([{
                "name": "demo",
                "image": "nginx:1.27",
                "portMappings": [{"containerPort": 80, "hostPort": 80, "protocol": "tcp"}]
            }])
        );
    }

    #[test]
    fn test_role_trusts_only_ecs_tasks() {
        let graph = graph("demo", "nginx");
        let raw = graph
            .get("demo-role")
            .and_then(|r| r.property("assumeRolePolicy"))
            .and_then(Value::as_str)
            .unwrap();
        let policy: serde_json::Value = serde_json::from_str(raw).unwrap();
        let statements = policy["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0]["Principal"]["Service"], "ecs-tasks.amazonaws.com");
        assert_eq!(statements[0]["Action"], "sts:AssumeRole");

        let rpa = graph.get("demo-rpa").unwrap();
        assert_eq!(
            rpa.property("policyArn").and_then(Value::as_str),
            Some(TASK_EXECUTION_POLICY_ARN)
        );
    }

    #[test]
    fn test_security_group_rules() {
        let graph = graph("demo", "nginx");
        let sg = graph.get("demo-securitygroup").unwrap();
        let ingress = sg.property("ingress").and_then(|v| v.at(0)).unwrap();
        assert_eq!(ingress.get("protocol").and_then(Value::as_str), Some("tcp"));
        assert_eq!(ingress.get("fromPort").and_then(Value::as_i64), Some(80));
        let egress = sg.property("egress").and_then(|v| v.at(0)).unwrap();
        assert_eq!(egress.get("protocol").and_then(Value::as_str), Some("-1"));
        assert_eq!(
            egress.get("cidrBlocks").and_then(|c| c.at(0)).and_then(Value::as_str),
            Some("0.0.0.0/0")
        );
    }

    #[test]
    fn test_recompose_is_stable() {
        let plan = graph("demo", "nginx").diff(&graph("demo", "nginx")).unwrap();
        assert!(!plan.has_changes);
    }

    #[test]
    fn test_image_change_touches_task_definition_and_service() {
        let plan = graph("demo", "nginx").diff(&graph("demo", "httpd")).unwrap();
        assert_eq!(plan.touched(), vec!["demo-task-definition", "demo-svc"]);
        assert_eq!(
            plan.action_for("demo-lb").map(|a| a.action_type),
            Some(ActionType::NoOp)
        );
        assert_eq!(
            plan.action_for("demo-role").map(|a| a.action_type),
            Some(ActionType::NoOp)
        );
    }

    #[tokio::test]
    async fn test_compose_exposes_lb_address() {
        let spec = DeploymentSpec::new("demo", "nginx").unwrap();
        let deployment = compose(&spec, &StaticNetwork::new(network())).await.unwrap();

        assert_eq!(deployment.handle.url.to_string(), "demo-lb.dnsName");
        assert_eq!(deployment.graph.outputs().len(), 1);
    }

    #[tokio::test]
    async fn test_compose_without_default_network() {
        let spec = DeploymentSpec::new("demo", "nginx").unwrap();
        let err = compose(&spec, &StaticNetwork::missing()).await.unwrap_err();
        assert!(matches!(err, CloudError::NetworkResolution(_)));
    }
}
