//! Planned actions and apply results

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A planned change to a single resource of a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Engine type token (e.g., "aws:lb:LoadBalancer")
    pub resource_type: String,

    /// Logical resource id (e.g., "demo-lb")
    pub resource_id: String,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: HashMap<String, serde_json::Value>,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let resource_id = resource_id.into();
        Self {
            id: format!("{}-{}", action_type, resource_id),
            action_type,
            resource_type: resource_type.into(),
            resource_id,
            description: description.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of an apply or destroy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Actions the engine completed
    pub succeeded: Vec<ActionResult>,

    /// Stack outputs reported by the engine after the run
    pub outputs: BTreeMap<String, serde_json::Value>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            outputs: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            message,
        });
    }

    /// String value of a named output, if present
    pub fn output_str(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).and_then(|v| v.as_str())
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Engine message for the step
    pub message: String,
}

/// Ordered list of actions between two desired graphs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions in execution order
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Action planned for a resource
    pub fn action_for(&self, resource_id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.resource_id == resource_id)
    }

    /// Ids of resources the plan would touch, in plan order
    pub fn touched(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter(|a| a.action_type != ActionType::NoOp)
            .map(|a| a.resource_id.as_str())
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary_counts() {
        let plan = Plan::new(vec![
            Action::new(ActionType::Create, "aws:ecs:Cluster", "demo-cluster", ""),
            Action::new(ActionType::NoOp, "aws:iam:Role", "demo-role", ""),
            Action::new(ActionType::Update, "aws:ecs:Service", "demo-svc", ""),
        ]);

        assert!(plan.has_changes);
        assert_eq!(plan.touched(), vec!["demo-cluster", "demo-svc"]);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 1 to update, 0 to delete, 1 unchanged"
        );
    }

    #[test]
    fn test_empty_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new(ActionType::NoOp, "aws:iam:Role", "demo-role", "")]);
        assert!(!plan.has_changes);
        assert!(plan.touched().is_empty());
    }

    #[test]
    fn test_apply_result_output_str() {
        let mut result = ApplyResult::new();
        result
            .outputs
            .insert("url".to_string(), serde_json::json!("demo.example.com"));
        result.add_success("create-demo-lb".to_string(), "created".to_string());

        assert_eq!(result.succeeded[0].action_id, "create-demo-lb");
        assert_eq!(result.output_str("url"), Some("demo.example.com"));
        assert_eq!(result.output_str("missing"), None);
    }
}
