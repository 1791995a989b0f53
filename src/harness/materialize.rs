use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MergeRule {
    pub key: String,
    pub attr: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Peer {
    pub address: String,
    pub peer_port: u16,
    pub client_port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Broadcast,
    Poll,
}

/// Every server setting except the swept one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerTemplate {
    pub client_listener_port: u16,
    pub max_client_connections: u32,
    pub max_server_connections: u32,
    pub max_peers: u32,
    pub merge_attributes: Vec<MergeRule>,
    pub peer_retention: f64,
    pub peers: Vec<Peer>,
    pub server_listener_port: u16,
    pub sync_mode: SyncMode,
}

impl Default for ServerTemplate {
    fn default() -> Self {
        Self {
            client_listener_port: 4096,
            max_client_connections: 128,
            max_server_connections: 20,
            max_peers: 10,
            merge_attributes: vec![MergeRule {
                key: "ul".to_string(),
                attr: "arr_union".to_string(),
            }],
            peer_retention: 0.5,
            peers: vec![Peer {
                address: "127.0.0.1".to_string(),
                peer_port: 5095,
                client_port: 5096,
            }],
            server_listener_port: 4095,
            sync_mode: SyncMode::Broadcast,
        }
    }
}

/// The payload the server reads at startup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerConfiguration {
    pub client_listener_port: u16,
    pub max_client_connections: u32,
    pub max_concurrency: u32,
    pub max_server_connections: u32,
    pub max_peers: u32,
    pub merge_attributes: Vec<MergeRule>,
    pub peer_retention: f64,
    pub peers: Vec<Peer>,
    pub server_listener_port: u16,
    pub sync_mode: SyncMode,
}

impl ServerTemplate {
    pub fn with_concurrency(&self, max_concurrency: u32) -> ServerConfiguration {
        ServerConfiguration {
            client_listener_port: self.client_listener_port,
            max_client_connections: self.max_client_connections,
            max_concurrency,
            max_server_connections: self.max_server_connections,
            max_peers: self.max_peers,
            merge_attributes: self.merge_attributes.clone(),
            peer_retention: self.peer_retention,
            peers: self.peers.clone(),
            server_listener_port: self.server_listener_port,
            sync_mode: self.sync_mode,
        }
    }
}

/// A configuration that has been written to disk.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    pub parameter: u32,
    pub path: PathBuf,
    pub config: ServerConfiguration,
}

pub struct ConfigMaterializer {
    template: ServerTemplate,
    dir: PathBuf,
    prefix: String,
}

impl ConfigMaterializer {
    pub fn new(
        template: ServerTemplate,
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            template,
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn template(&self) -> &ServerTemplate {
        &self.template
    }

    pub fn path_for(&self, parameter: u32) -> PathBuf {
        self.dir.join(format!("{}-{}.json", self.prefix, parameter))
    }

    pub fn render(&self, parameter: u32) -> Result<String> {
        encode(&self.template.with_concurrency(parameter))
    }

    pub async fn materialize(&self, parameter: u32) -> Result<ConfigHandle> {
        let config = self.template.with_concurrency(parameter);
        let path = self.path_for(parameter);
        let payload = encode(&config)?;

        write_durably(&path, payload.as_bytes())
            .await
            .map_err(|source| HarnessError::ConfigWrite {
                path: path.clone(),
                source,
            })?;

        debug!(parameter, path = %path.display(), "server configuration written");

        Ok(ConfigHandle {
            parameter,
            path,
            config,
        })
    }
}

fn encode(config: &ServerConfiguration) -> Result<String> {
    serde_json::to_string_pretty(config).map_err(|e| HarnessError::Io(e.into()))
}

async fn write_durably(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_materialize_sets_max_concurrency() {
        let dir = TempDir::new().unwrap();
        let materializer = ConfigMaterializer::new(ServerTemplate::default(), dir.path(), "test");

        let handle = materializer.materialize(20).await.unwrap();
        assert_eq!(handle.config.max_concurrency, 20);

        let content = std::fs::read_to_string(&handle.path).unwrap();
        let written: ServerConfiguration = serde_json::from_str(&content).unwrap();
        assert_eq!(written.max_concurrency, 20);
        assert_eq!(written, handle.config);
    }

    #[tokio::test]
    async fn test_handles_are_distinct_per_parameter() {
        let dir = TempDir::new().unwrap();
        let materializer = ConfigMaterializer::new(ServerTemplate::default(), dir.path(), "test");

        let one = materializer.materialize(1).await.unwrap();
        let twenty = materializer.materialize(20).await.unwrap();

        assert_ne!(one.path, twenty.path);
        assert!(one.path.exists());
        assert!(twenty.path.exists());
        assert_eq!(one.path.file_name().unwrap(), "test-1.json");
    }

    #[test]
    fn test_payload_contains_full_schema() {
        let materializer = ConfigMaterializer::new(ServerTemplate::default(), "/tmp", "test");
        let value: serde_json::Value =
            serde_json::from_str(&materializer.render(10).unwrap()).unwrap();

        assert_eq!(value["client_listener_port"], 4096);
        assert_eq!(value["server_listener_port"], 4095);
        assert_eq!(value["max_client_connections"], 128);
        assert_eq!(value["max_server_connections"], 20);
        assert_eq!(value["max_peers"], 10);
        assert_eq!(value["max_concurrency"], 10);
        assert_eq!(value["peer_retention"], 0.5);
        assert_eq!(value["sync_mode"], "broadcast");
        assert_eq!(value["merge_attributes"][0]["key"], "ul");
        assert_eq!(value["merge_attributes"][0]["attr"], "arr_union");
        assert_eq!(value["peers"][0]["address"], "127.0.0.1");
        assert_eq!(value["peers"][0]["peer_port"], 5095);
        assert_eq!(value["peers"][0]["client_port"], 5096);
    }

    #[tokio::test]
    async fn test_unwritable_location_is_config_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let materializer = ConfigMaterializer::new(ServerTemplate::default(), &blocker, "test");
        let err = materializer.materialize(1).await.unwrap_err();
        assert!(matches!(err, HarnessError::ConfigWrite { .. }));
    }

    #[test]
    fn test_template_partial_yaml_uses_defaults() {
        let yaml = "client_listener_port: 9000\nsync_mode: poll\n";
        let template: ServerTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.client_listener_port, 9000);
        assert_eq!(template.sync_mode, SyncMode::Poll);
        assert_eq!(template.max_client_connections, 128);
    }
}
