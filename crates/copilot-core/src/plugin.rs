//! Plugin descriptors served by the Framework backend.

use serde::{Deserialize, Serialize};

/// One selectable plugin.
///
/// Fetched once per session and only used to populate a selection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    #[serde(rename = "plugin_name")]
    pub name: String,
    #[serde(rename = "plugin_description", default)]
    pub description: String,
    /// Authentication requirements, passed through untouched.
    #[serde(rename = "plugin_auth", default)]
    pub auth: Option<serde_json::Value>,
}

impl PluginDescriptor {
    /// Label used in selection lists.
    pub fn label(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.description)
        }
    }
}
