//! Shared types written to and read back from derived manifests.

use serde::{Deserialize, Serialize};

/// Navigation tree item, as stored in `.autogen/_menu.yml`.
///
/// `path` is the link target relative to the docs root: `<stem>.html` for
/// file nodes, `<slug>.html` for auto-index groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub title: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}
