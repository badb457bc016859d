/**
 * INVENTORY - Hosts, credentials and command tables for one run
 *
 * ROLE : Loads the three YAML tables once at startup, answers the
 * orchestrator's lookups (address, device type, credential, context tags)
 * and resolves tag selectors to hosts and commands.
 *
 * The hosts table may also be a dynamic inventory: an executable whose
 * standard output is the same table in JSON.
 */

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::devices::DeviceTarget;
use crate::errors::ConfigError;
use crate::selector::TagSelector;

/// Tags written either as `"lab1 dc1"` or as a list. A key left without
/// a value means no tags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawTags")]
pub struct TagList(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    Words(String),
    List(Vec<String>),
    Empty,
}

impl From<RawTags> for TagList {
    fn from(raw: RawTags) -> Self {
        match raw {
            RawTags::Words(s) => TagList(s.split_whitespace().map(str::to_string).collect()),
            RawTags::List(l) => TagList(l),
            RawTags::Empty => TagList::default(),
        }
    }
}

impl TagList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Static tags merged into every point of a host. Accepts a list of
/// single-key maps (first occurrence of a key wins) or a plain map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawContext")]
pub struct ContextTags(pub BTreeMap<String, String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContext {
    List(Vec<BTreeMap<String, Value>>),
    Map(BTreeMap<String, Value>),
    Empty,
}

impl From<RawContext> for ContextTags {
    fn from(raw: RawContext) -> Self {
        let items = match raw {
            RawContext::List(list) => list,
            RawContext::Map(map) => vec![map],
            RawContext::Empty => Vec::new(),
        };
        let mut tags = BTreeMap::new();
        for item in items {
            for (key, value) in item {
                if let Some(value) = scalar_to_string(&value) {
                    tags.entry(key).or_insert(value);
                }
            }
        }
        ContextTags(tags)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    pub address: String,
    pub device_type: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub context: ContextTags,
}

#[derive(Clone, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tags: TagList,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandGroup {
    pub commands: CommandLines,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub device_type: Option<String>,
}

/// Commands as a newline-separated block or a list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawLines")]
pub struct CommandLines(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLines {
    Block(String),
    List(Vec<String>),
}

impl From<RawLines> for CommandLines {
    fn from(raw: RawLines) -> Self {
        let lines = match raw {
            RawLines::Block(block) => block.lines().map(str::to_string).collect(),
            RawLines::List(list) => list,
        };
        CommandLines(
            lines
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        )
    }
}

/// Paths of the three input tables.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFiles {
    pub hosts: PathBuf,
    pub commands: PathBuf,
    pub credentials: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    hosts: BTreeMap<String, HostEntry>,
    credentials: BTreeMap<String, Credential>,
    command_groups: Vec<(String, CommandGroup)>,
}

impl Inventory {
    pub fn new(
        hosts: BTreeMap<String, HostEntry>,
        credentials: BTreeMap<String, Credential>,
        command_groups: Vec<(String, CommandGroup)>,
    ) -> Self {
        Self { hosts, credentials, command_groups }
    }

    pub async fn load(files: &InputFiles) -> Result<Self, ConfigError> {
        info!("Importing credentials file: {}", files.credentials.display());
        let credentials = load_credentials(&files.credentials).await?;
        info!("Importing host file: {}", files.hosts.display());
        let hosts = load_hosts(&files.hosts).await?;
        info!("Importing commands file: {}", files.commands.display());
        let command_groups = load_commands(&files.commands).await?;

        Ok(Self::new(hosts, credentials, command_groups))
    }

    pub fn host_ids(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn host(&self, host_id: &str) -> Option<&HostEntry> {
        self.hosts.get(host_id)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Drops every host not listed in `keep`.
    pub fn retain_hosts(&mut self, keep: &[String]) {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        self.hosts.retain(|id, _| keep.contains(id.as_str()));
    }

    /// Hosts whose tags match the selector, sorted by identifier.
    pub fn select_hosts(&self, selector: &TagSelector) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|(_, host)| selector.matches(host.tags.iter()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Commands for one host in table order, without duplicates.
    pub fn select_commands(&self, host_id: &str, selector: &TagSelector) -> Vec<String> {
        let Some(host) = self.hosts.get(host_id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for (name, group) in &self.command_groups {
            if let Some(device_type) = &group.device_type {
                if device_type != &host.device_type {
                    continue;
                }
            }
            if !selector.matches(group.tags.iter()) {
                continue;
            }
            debug!("[{}] command group '{}' selected", host_id, name);
            for command in &group.commands.0 {
                if seen.insert(command.as_str()) {
                    selected.push(command.clone());
                }
            }
        }
        selected
    }

    /// Explicitly named credential first, otherwise the first one (by name)
    /// sharing a tag with the host.
    pub fn credential_for(&self, host_id: &str) -> Option<&Credential> {
        let host = self.hosts.get(host_id)?;
        if let Some(name) = &host.credential {
            return self.credentials.get(name);
        }
        self.credentials
            .values()
            .find(|cred| cred.tags.iter().any(|t| host.tags.iter().any(|h| h == t)))
    }

    pub fn context(&self, host_id: &str) -> Option<&BTreeMap<String, String>> {
        self.hosts.get(host_id).map(|h| &h.context.0)
    }

    pub fn device_target(&self, host_id: &str) -> Option<DeviceTarget> {
        let host = self.hosts.get(host_id)?;
        Some(DeviceTarget {
            host_id: host_id.to_string(),
            address: host.address.clone(),
            device_type: host.device_type.clone(),
            credential: self.credential_for(host_id).cloned(),
        })
    }
}

/// Uses `name` when it exists as given, otherwise looks it up under `base`.
pub fn resolve_input(base: &Path, name: &Path) -> PathBuf {
    if name.is_file() || name.is_absolute() {
        name.to_path_buf()
    } else {
        base.join(name)
    }
}

async fn read_table(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::Parse { path: path.to_path_buf(), reason: reason.to_string() }
}

async fn load_credentials(path: &Path) -> Result<BTreeMap<String, Credential>, ConfigError> {
    let txt = read_table(path).await?;
    let table: Option<BTreeMap<String, Credential>> =
        serde_yaml::from_str(&txt).map_err(|e| parse_error(path, e))?;
    Ok(table.unwrap_or_default())
}

async fn load_hosts(path: &Path) -> Result<BTreeMap<String, HostEntry>, ConfigError> {
    let txt = read_table(path).await?;
    let yaml_err = match serde_yaml::from_str::<Option<BTreeMap<String, HostEntry>>>(&txt) {
        Ok(table) => return Ok(table.unwrap_or_default()),
        Err(e) => e,
    };
    debug!("hosts file {} is not YAML ({}), trying it as dynamic inventory", path.display(), yaml_err);

    let output = Command::new(path).output().await.map_err(|e| {
        parse_error(path, format!("not YAML ({yaml_err}) and not executable ({e})"))
    })?;
    if !output.status.success() {
        return Err(parse_error(path, format!("dynamic inventory exited with {}", output.status)));
    }
    serde_json::from_slice(&output.stdout)
        .map_err(|e| parse_error(path, format!("dynamic inventory output: {e}")))
}

async fn load_commands(path: &Path) -> Result<Vec<(String, CommandGroup)>, ConfigError> {
    let txt = read_table(path).await?;
    // Only the first document is the active command table.
    let Some(document) = serde_yaml::Deserializer::from_str(&txt).next() else {
        return Err(ConfigError::EmptyCommands(path.to_path_buf()));
    };
    let table = Value::deserialize(document).map_err(|e| parse_error(path, e))?;
    let mapping = match table {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Err(ConfigError::EmptyCommands(path.to_path_buf())),
        other => return Err(parse_error(path, format!("expected a mapping, got {other:?}"))),
    };

    let mut groups = Vec::with_capacity(mapping.len());
    for (name, group) in mapping {
        let name = scalar_to_string(&name)
            .ok_or_else(|| parse_error(path, "command group names must be scalars"))?;
        let group: CommandGroup = serde_yaml::from_value(group)
            .map_err(|e| parse_error(path, format!("group '{name}': {e}")))?;
        groups.push((name, group));
    }
    Ok(groups)
}
