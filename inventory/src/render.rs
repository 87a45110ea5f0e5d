use crate::schema::{HostVars, JsonGroup, JsonInventory, JsonMeta, YamlAll, YamlGroup, YamlInventory};
use crate::{group_name, Format, HostRecord, Inventory, InventoryResult};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Render an inventory to the requested encoding.
///
/// Validation runs first: an inventory with a host missing required fields
/// never produces output.
pub fn render(inventory: &Inventory, format: Format) -> InventoryResult<String> {
    inventory.validate()?;

    match format {
        Format::Ini => Ok(to_ini(inventory)),
        Format::Json => Ok(serde_json::to_string_pretty(&to_json(inventory))? + "\n"),
        Format::Yaml => Ok(serde_yaml::to_string(&to_yaml(inventory))?),
    }
}

/// Render and write in one step; nothing is written when rendering fails
pub fn write_file(inventory: &Inventory, format: Format, path: &Path) -> InventoryResult<()> {
    let content = render(inventory, format)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Shared `all` variables; single-environment inventories also carry `env`
fn effective_all_vars(inventory: &Inventory) -> BTreeMap<String, String> {
    let mut vars = inventory.vars.clone();
    if let [only] = inventory.environments().as_slice() {
        vars.insert("env".to_string(), (*only).to_string());
    }
    vars
}

fn host_vars(host: &HostRecord) -> HostVars {
    HostVars {
        ansible_host: host.address.clone(),
        ansible_user: host.user.clone(),
        ansible_ssh_private_key_file: host.key_file.clone(),
        environment: host.environment.clone(),
        instance_id: Some(host.instance_id.clone()),
        private_ip: host.private_ip.clone(),
    }
}

fn to_ini(inventory: &Inventory) -> String {
    let mut out = String::new();

    for env in inventory.environments() {
        let group = group_name(env);

        let _ = writeln!(out, "[{}]", group);
        for host in inventory.hosts.iter().filter(|h| h.environment == env) {
            let _ = write!(
                out,
                "{} ansible_user={} ansible_ssh_private_key_file={} instance_id={}",
                host.address, host.user, host.key_file, host.instance_id
            );
            if let Some(private_ip) = &host.private_ip {
                let _ = write!(out, " private_ip={}", private_ip);
            }
            out.push('\n');
        }
        out.push('\n');

        let _ = writeln!(out, "[{}:vars]", group);
        let _ = writeln!(out, "env={}", env);
        out.push('\n');
    }

    let _ = writeln!(out, "[all:vars]");
    for (key, value) in effective_all_vars(inventory) {
        let _ = writeln!(out, "{}={}", key, value);
    }

    out
}

fn to_json(inventory: &Inventory) -> JsonInventory {
    let mut meta = JsonMeta::default();
    let mut groups: BTreeMap<String, JsonGroup> = BTreeMap::new();

    for host in &inventory.hosts {
        meta.hostvars.insert(host.name.clone(), host_vars(host));

        groups
            .entry("web_servers".to_string())
            .or_default()
            .hosts
            .push(host.name.clone());

        let group = groups.entry(group_name(&host.environment)).or_default();
        group.hosts.push(host.name.clone());
        group
            .vars
            .insert("env".to_string(), host.environment.clone());
    }

    groups.insert(
        "all".to_string(),
        JsonGroup {
            hosts: Vec::new(),
            vars: effective_all_vars(inventory),
        },
    );

    JsonInventory { meta, groups }
}

fn to_yaml(inventory: &Inventory) -> YamlInventory {
    let mut children: BTreeMap<String, YamlGroup> = BTreeMap::new();

    for host in &inventory.hosts {
        children
            .entry(group_name(&host.environment))
            .or_default()
            .hosts
            .insert(host.name.clone(), host_vars(host));
    }

    YamlInventory {
        all: YamlAll {
            vars: effective_all_vars(inventory),
            children,
        },
    }
}
