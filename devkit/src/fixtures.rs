/*!
Inventory fixtures written to a temporary input directory.

The three tables are produced in the same YAML shape operators write by
hand, so tests go through the real loaders.
*/

use anyhow::Result;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tempfile::TempDir;

pub struct InventoryFixture {
    dir: TempDir,
    hosts: Mapping,
    commands: Mapping,
    credentials: Mapping,
}

fn list(items: &[&str]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::from(*s)).collect())
}

impl InventoryFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            hosts: Mapping::new(),
            commands: Mapping::new(),
            credentials: Mapping::new(),
        })
    }

    pub fn host(self, id: &str, device_type: &str, tags: &[&str]) -> Self {
        self.host_with_context(id, device_type, tags, &[])
    }

    pub fn host_with_context(
        mut self,
        id: &str,
        device_type: &str,
        tags: &[&str],
        context: &[(&str, &str)],
    ) -> Self {
        let mut entry = Mapping::new();
        entry.insert("address".into(), format!("{id}.lab.example").into());
        entry.insert("device_type".into(), device_type.into());
        entry.insert("tags".into(), list(tags));
        let context: Vec<Value> = context
            .iter()
            .map(|(k, v)| {
                let mut pair = Mapping::new();
                pair.insert((*k).into(), (*v).into());
                Value::Mapping(pair)
            })
            .collect();
        entry.insert("context".into(), Value::Sequence(context));
        self.hosts.insert(id.into(), Value::Mapping(entry));
        self
    }

    /// Groups keep insertion order, as in a hand-written commands file.
    pub fn commands(mut self, group: &str, tags: &[&str], commands: &[&str]) -> Self {
        let mut entry = Mapping::new();
        entry.insert("tags".into(), list(tags));
        entry.insert("commands".into(), commands.join("\n").into());
        self.commands.insert(group.into(), Value::Mapping(entry));
        self
    }

    pub fn credential(mut self, name: &str, username: &str, password: &str, tags: &[&str]) -> Self {
        let mut entry = Mapping::new();
        entry.insert("username".into(), username.into());
        entry.insert("password".into(), password.into());
        entry.insert("tags".into(), list(tags));
        self.credentials.insert(name.into(), Value::Mapping(entry));
        self
    }

    /// Writes `hosts.yaml`, `commands.yaml` and `credentials.yaml`.
    pub fn write(&self) -> Result<&Path> {
        let dir = self.dir.path();
        std::fs::write(dir.join("hosts.yaml"), serde_yaml::to_string(&self.hosts)?)?;
        std::fs::write(dir.join("commands.yaml"), serde_yaml::to_string(&self.commands)?)?;
        std::fs::write(dir.join("credentials.yaml"), serde_yaml::to_string(&self.credentials)?)?;
        Ok(dir)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
