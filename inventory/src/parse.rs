use crate::schema::{HostVars, JsonInventory, YamlInventory};
use crate::{host_name, Format, HostRecord, Inventory, InventoryError, InventoryResult};
use std::collections::BTreeMap;

/// Parse an inventory back from any of the supported encodings.
pub fn parse(content: &str, format: Format) -> InventoryResult<Inventory> {
    match format {
        Format::Ini => from_ini(content),
        Format::Json => from_json(content),
        Format::Yaml => from_yaml(content),
    }
}

fn record_from_vars(name: &str, vars: &HostVars) -> HostRecord {
    HostRecord {
        name: name.to_string(),
        environment: vars.environment.clone(),
        address: vars.ansible_host.clone(),
        instance_id: vars.instance_id.clone().unwrap_or_default(),
        user: vars.ansible_user.clone(),
        key_file: vars.ansible_ssh_private_key_file.clone(),
        private_ip: vars.private_ip.clone(),
    }
}

fn from_json(content: &str) -> InventoryResult<Inventory> {
    let document: JsonInventory = serde_json::from_str(content)?;

    let mut inventory = Inventory::new();
    inventory.vars = document
        .groups
        .get("all")
        .map(|group| group.vars.clone())
        .unwrap_or_default();

    for (name, vars) in &document.meta.hostvars {
        inventory.push(record_from_vars(name, vars));
    }

    Ok(inventory)
}

fn from_yaml(content: &str) -> InventoryResult<Inventory> {
    let document: YamlInventory = serde_yaml::from_str(content)?;

    let mut inventory = Inventory::new();
    inventory.vars = document.all.vars.clone();

    for group in document.all.children.values() {
        for (name, vars) in &group.hosts {
            inventory.push(record_from_vars(name, vars));
        }
    }

    Ok(inventory)
}

/// Environment encoded in a `[<env>-web]` section name
fn section_environment(section: &str) -> Option<&str> {
    section.strip_suffix("-web")
}

fn from_ini(content: &str) -> InventoryResult<Inventory> {
    let mut inventory = Inventory::new();
    let mut section = String::new();

    for (number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            section = header
                .strip_suffix(']')
                .ok_or_else(|| InventoryError::Malformed {
                    format: Format::Ini,
                    reason: format!("unterminated section header on line {}", number + 1),
                })?
                .to_string();
            continue;
        }

        if section == "all:vars" {
            if let Some((key, value)) = line.split_once('=') {
                inventory.vars.insert(key.to_string(), value.to_string());
            }
            continue;
        }

        // Group-level vars only repeat what host lines already carry
        if section.ends_with(":vars") {
            continue;
        }

        let Some(environment) = section_environment(&section) else {
            continue;
        };

        let mut tokens = line.split_whitespace();
        let address = tokens
            .next()
            .ok_or_else(|| InventoryError::Malformed {
                format: Format::Ini,
                reason: format!("empty host line on line {}", number + 1),
            })?
            .to_string();

        let mut vars: BTreeMap<&str, &str> = BTreeMap::new();
        for token in tokens {
            if let Some((key, value)) = token.split_once('=') {
                vars.insert(key, value);
            }
        }

        inventory.push(HostRecord {
            name: host_name(environment),
            environment: environment.to_string(),
            address,
            instance_id: vars.get("instance_id").copied().unwrap_or_default().to_string(),
            user: vars.get("ansible_user").copied().unwrap_or_default().to_string(),
            key_file: vars
                .get("ansible_ssh_private_key_file")
                .copied()
                .unwrap_or_default()
                .to_string(),
            private_ip: vars.get("private_ip").map(|v| (*v).to_string()),
        });
    }

    Ok(inventory)
}
