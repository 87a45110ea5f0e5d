//! Wire representations of the JSON and YAML encodings.
//!
//! Rendering goes through these typed structs rather than string templating,
//! so both encodings stay structurally valid and parse back losslessly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-host connection variables, shared by the JSON and YAML forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HostVars {
    pub ansible_host: String,
    pub ansible_user: String,
    pub ansible_ssh_private_key_file: String,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
}

/// Dynamic-inventory JSON document: `_meta.hostvars` plus named groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JsonInventory {
    #[serde(rename = "_meta")]
    pub meta: JsonMeta,
    #[serde(flatten)]
    pub groups: BTreeMap<String, JsonGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct JsonMeta {
    pub hostvars: BTreeMap<String, HostVars>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct JsonGroup {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

/// Hierarchical YAML document: `all` → `children` → per-environment groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct YamlInventory {
    pub all: YamlAll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct YamlAll {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub children: BTreeMap<String, YamlGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct YamlGroup {
    #[serde(default)]
    pub hosts: BTreeMap<String, HostVars>,
}
