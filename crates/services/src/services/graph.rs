use std::collections::HashMap;

use db::models::user::User;
use serde_json::Value;

use super::ai_service::Graph;

/// Replaces AI-service ids in node labels with readable names: the
/// workspace node gets the project name and member nodes get the member's
/// full name. `properties.name` follows the label.
pub fn relabel_graph(graph: &mut Graph, workspace_id: &str, project_name: &str, members: &[User]) {
    let names: HashMap<&str, String> = members
        .iter()
        .map(|member| (member.ai_service_id.as_str(), member.full_name()))
        .collect();

    for node in &mut graph.nodes {
        let Some(label) = node.label.as_deref() else {
            continue;
        };
        let replacement = if label == workspace_id {
            project_name.to_string()
        } else if let Some(name) = names.get(label) {
            name.clone()
        } else {
            continue;
        };
        node.properties
            .insert("name".to_string(), Value::String(replacement.clone()));
        node.label = Some(replacement);
    }
}
