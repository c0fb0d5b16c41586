//! Node configuration: defaults, TOML file, and CLI overrides.
//!
//! Resolution order is CLI overrides file overrides built-in defaults,
//! assembled through [`NodeConfigBuilder`] rather than read from ambient
//! module-level state.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::consensus::{ConsensusTiming, SigningKey, ValidatorSet};
use crate::types::ValidatorId;

/// Failure building a [`NodeConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Hex(hex::FromHexError),
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Toml(e) => write!(f, "malformed config file: {e}"),
            ConfigError::Hex(e) => write!(f, "malformed signing key hex: {e}"),
            ConfigError::Validation(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e)
    }
}

/// CLI surface named in the external-interfaces section: a config file
/// path, a port override, a comma-separated peer list, a node-id
/// override, a log level, a disable-interactive flag, and an optional
/// HTTP API port. None of these are part of the consensus core's
/// contract; they are inputs to construction.
#[derive(Parser, Debug, Default)]
#[command(name = "chain-node", about = "Replicated proof-of-authority consensus node")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides the TCP port this node listens on.
    #[arg(long)]
    pub port: Option<u16>,
    /// Comma-separated `host:port` peers to dial at startup.
    #[arg(long, value_delimiter = ',')]
    pub peers: Option<Vec<String>>,
    /// Overrides this node's validator identifier.
    #[arg(long)]
    pub node_id: Option<String>,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `chain=debug`.
    #[arg(long)]
    pub log_level: Option<String>,
    /// Disables the interactive shell (unused by the core; carried for the
    /// orchestrator binary).
    #[arg(long)]
    pub disable_interactive: bool,
    /// Starts the read-only admin HTTP surface on this port, if set.
    #[arg(long)]
    pub http_api_port: Option<u16>,
}

/// On-disk TOML shape. Every field is optional so a file may override only
/// what it needs to; anything absent falls through to the builder's
/// running defaults.
#[derive(Deserialize, Default, Debug)]
struct FileConfig {
    node_id: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    validators: Option<Vec<String>>,
    peers: Option<Vec<String>>,
    log_level: Option<String>,
    http_api_port: Option<u16>,
    /// Hex-encoded pre-shared HMAC key. Key derivation is out of scope;
    /// this is opaque key material loaded as-is.
    signing_key_hex: Option<String>,
    timing: Option<FileTiming>,
}

#[derive(Deserialize, Default, Debug)]
struct FileTiming {
    block_interval_secs: Option<u64>,
    proposal_timeout_secs: Option<u64>,
    heartbeat_interval_secs: Option<u64>,
    heartbeat_timeout_secs: Option<u64>,
    reconnect_interval_secs: Option<u64>,
    recovery_grace_period_secs: Option<u64>,
    view_change_cooldown_secs: Option<u64>,
    max_block_size: Option<usize>,
    max_frame_bytes: Option<u32>,
    signatures_enabled: Option<bool>,
}

/// Fully resolved configuration for one node.
pub struct NodeConfig {
    pub node_id: ValidatorId,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub validators: Arc<ValidatorSet>,
    pub peers: Vec<String>,
    pub log_level: String,
    pub interactive: bool,
    pub http_api_port: Option<u16>,
    pub signing_key: Option<SigningKey>,
    pub timing: ConsensusTiming,
}

impl NodeConfig {
    pub fn chain_file_path(&self) -> PathBuf {
        self.data_dir.join("chain.json")
    }
}

/// Builds a [`NodeConfig`] from defaults, an optional TOML file, and CLI
/// overrides, in that precedence order (CLI wins).
pub struct NodeConfigBuilder {
    node_id: Option<String>,
    port: u16,
    data_dir: PathBuf,
    validators: Vec<String>,
    peers: Vec<String>,
    log_level: String,
    interactive: bool,
    http_api_port: Option<u16>,
    signing_key_hex: Option<String>,
    timing: ConsensusTiming,
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self {
            node_id: None,
            port: 7070,
            data_dir: PathBuf::from("./data"),
            validators: Vec::new(),
            peers: Vec::new(),
            log_level: "info".to_string(),
            interactive: true,
            http_api_port: None,
            signing_key_hex: None,
            timing: ConsensusTiming::default(),
        }
    }
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a TOML config file, if present. A missing file is a no-op
    /// rather than an error, so a bare CLI invocation with no `--config`
    /// still resolves to a valid (if minimal) configuration.
    pub fn with_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&text)?;

        if let Some(v) = file.node_id {
            self.node_id = Some(v);
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.validators {
            self.validators = v;
        }
        if let Some(v) = file.peers {
            self.peers = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.http_api_port {
            self.http_api_port = Some(v);
        }
        if let Some(v) = file.signing_key_hex {
            self.signing_key_hex = Some(v);
        }
        if let Some(t) = file.timing {
            self.apply_file_timing(t);
        }
        Ok(self)
    }

    fn apply_file_timing(&mut self, t: FileTiming) {
        if let Some(v) = t.block_interval_secs {
            self.timing.block_interval = Duration::from_secs(v);
        }
        if let Some(v) = t.proposal_timeout_secs {
            self.timing.proposal_timeout = Duration::from_secs(v);
        }
        if let Some(v) = t.heartbeat_interval_secs {
            self.timing.heartbeat_interval = Duration::from_secs(v);
        }
        if let Some(v) = t.heartbeat_timeout_secs {
            self.timing.heartbeat_timeout = Duration::from_secs(v);
        }
        if let Some(v) = t.reconnect_interval_secs {
            self.timing.reconnect_interval = Duration::from_secs(v);
        }
        if let Some(v) = t.recovery_grace_period_secs {
            self.timing.recovery_grace_period = Duration::from_secs(v);
        }
        if let Some(v) = t.view_change_cooldown_secs {
            self.timing.view_change_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = t.max_block_size {
            self.timing.max_block_size = v;
        }
        if let Some(v) = t.max_frame_bytes {
            self.timing.max_frame_bytes = v;
        }
        if let Some(v) = t.signatures_enabled {
            self.timing.signatures_enabled = v;
        }
    }

    /// Applies CLI overrides, which take precedence over both the file and
    /// the builder's running defaults.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(v) = &cli.node_id {
            self.node_id = Some(v.clone());
        }
        if let Some(v) = cli.port {
            self.port = v;
        }
        if let Some(v) = &cli.peers {
            self.peers = v.clone();
        }
        if let Some(v) = &cli.log_level {
            self.log_level = v.clone();
        }
        if cli.disable_interactive {
            self.interactive = false;
        }
        if let Some(v) = cli.http_api_port {
            self.http_api_port = Some(v);
        }
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn build(self) -> Result<NodeConfig, ConfigError> {
        let node_id = self
            .node_id
            .ok_or_else(|| ConfigError::Validation("node_id is required".into()))?;

        let mut validators = self.validators;
        if !validators.iter().any(|v| v == &node_id) {
            validators.push(node_id.clone());
        }
        if validators.is_empty() {
            return Err(ConfigError::Validation("validator set must not be empty".into()));
        }
        let validator_set = Arc::new(ValidatorSet::new(validators));

        let bind_addr = (node_id.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::Validation(format!("cannot resolve {node_id}:{}: {e}", self.port)))?
            .next()
            .ok_or_else(|| ConfigError::Validation(format!("{node_id} resolved to no addresses")))?;

        let signing_key = match self.signing_key_hex {
            Some(hex_str) => {
                let bytes = hex::decode(hex_str).map_err(ConfigError::Hex)?;
                Some(SigningKey(bytes))
            }
            None => None,
        };

        Ok(NodeConfig {
            node_id: validator_set.normalize(&node_id),
            bind_addr,
            data_dir: self.data_dir,
            validators: validator_set,
            peers: self.peers,
            log_level: self.log_level,
            interactive: self.interactive,
            http_api_port: self.http_api_port,
            signing_key,
            timing: self.timing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_node_id() {
        let err = NodeConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn cli_overrides_win_over_builder_defaults() {
        let cli = Cli {
            config: None,
            port: Some(9090),
            peers: Some(vec!["b:7070".into()]),
            node_id: Some("127.0.0.1".into()),
            log_level: Some("debug".into()),
            disable_interactive: true,
            http_api_port: Some(8080),
        };
        let cfg = NodeConfigBuilder::new().with_cli(&cli).build().unwrap();
        assert_eq!(cfg.bind_addr.port(), 9090);
        assert_eq!(cfg.peers, vec!["b:7070".to_string()]);
        assert_eq!(cfg.log_level, "debug");
        assert!(!cfg.interactive);
        assert_eq!(cfg.http_api_port, Some(8080));
    }

    #[test]
    fn validator_set_always_includes_self() {
        let cli = Cli {
            node_id: Some("127.0.0.1".into()),
            ..Default::default()
        };
        let cfg = NodeConfigBuilder::new().with_cli(&cli).build().unwrap();
        assert!(cfg.validators.contains(&ValidatorId::from("127.0.0.1")));
    }
}
