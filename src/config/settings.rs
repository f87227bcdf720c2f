/*
* Cluster Manager Configuration
* -----------------------------
* @project: lxc-cluster-manager
*
* Everything the orchestrator needs to know about the world it runs in:
* which physical machines host the containers, who we log in as, where the
* LXC and Hadoop bits live, and how patient we are with a freshly started
* container whose sshd is not up yet.
*
* Configuration Hierarchy (from lowest to highest priority):
* -----------------------------------------------------
* 1. Built-in defaults (the lab setup the tool was born in)
* 2. config/default.toml
* 3. config/local.toml (machine-specific, not committed)
* 4. Environment variables, LXC_CLUSTER_ prefix, `__` between sections
*    (LXC_CLUSTER_SSH__PORT=2222, LXC_CLUSTER_RETRY__MAX_ATTEMPTS=20)
*
* `--config some/file.toml` on the command line replaces steps 2 and 3.
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::{ContainerLayout, Credential, Credentials, HostRouter, PhysicalHost};
use crate::errors::RetryPolicy;

const ENV_PREFIX: &str = "LXC_CLUSTER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub hosts: HostSettings,
    pub credentials: Credentials,
    pub ssh: SshSettings,
    pub lxc: LxcSettings,
    pub hadoop: HadoopSettings,
    pub topology: TopologySettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// The two LXC hosts; even final digits go to `even`, odd to `odd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub even: PhysicalHost,
    pub odd: PhysicalHost,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            even: PhysicalHost::new("157.82.3.140"),
            odd: PhysicalHost::new("157.82.3.141"),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            infrastructure: Credential {
                user: "root".to_string(),
                key_file: PathBuf::from("/home/id_rsa"),
            },
            cluster: Credential {
                user: "hadoop".to_string(),
                key_file: PathBuf::from("/home/id_rsa"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub binary: String,
    pub scp_binary: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Extra `-o` options passed to both ssh and scp.
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            scp_binary: "scp".to_string(),
            port: 22,
            connect_timeout_secs: 10,
            options: vec!["StrictHostKeyChecking=no".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LxcSettings {
    pub root: String,
    pub template: String,
}

impl Default for LxcSettings {
    fn default() -> Self {
        Self {
            root: "/var/lib/lxc".to_string(),
            template: "template".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HadoopSettings {
    pub home: String,
    /// Slaves file inside the master container. Relative paths live under `home`.
    pub worker_list: String,
    /// Relative paths live under `home`.
    pub examples_jar: String,
    /// Where uploaded workload jars are parked on the master.
    pub staging_dir: String,
}

impl Default for HadoopSettings {
    fn default() -> Self {
        Self {
            home: "/home/hadoop/hadoop-2.6.0".to_string(),
            worker_list: "etc/hadoop/slaves".to_string(),
            examples_jar: "share/hadoop/mapreduce/hadoop-mapreduce-examples-2.6.0.jar".to_string(),
            staging_dir: "/tmp".to_string(),
        }
    }
}

impl HadoopSettings {
    pub fn worker_list_path(&self) -> String {
        self.under_home(&self.worker_list)
    }

    pub fn examples_jar_path(&self) -> String {
        self.under_home(&self.examples_jar)
    }

    fn under_home(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.home.trim_end_matches('/'), path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Prefix of the master's external alias in every hosts file.
    pub alias_prefix: String,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            alias_prefix: "g4s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        info!("Loading configuration from path: {}", config_path);

        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false))
            .add_source(Self::environment())
            .build()?;

        Self::finish(config)
    }

    pub fn new_from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from file: {}", path.display());

        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Self::environment())
            .build()?;

        Self::finish(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("ssh.options")
            .try_parsing(true)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(ConfigError::Message("retry.multiplier must be a finite number >= 1.0".into()));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::Message("retry.max_delay_ms must not be below retry.initial_delay_ms".into()));
        }
        if self.hosts.even == self.hosts.odd {
            return Err(ConfigError::Message("hosts.even and hosts.odd must differ".into()));
        }
        Ok(())
    }

    pub fn host_router(&self) -> HostRouter {
        HostRouter::new(self.hosts.even.clone(), self.hosts.odd.clone())
    }

    pub fn container_layout(&self) -> ContainerLayout {
        ContainerLayout::new(&self.lxc, self.hadoop.worker_list_path())
    }

    pub fn format_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.multiplier,
        }
    }
}

pub fn generate_default_config() -> Settings {
    Settings::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContainerIdentity, NodeAddress, Role};
    use std::io::Write;

    #[test]
    fn defaults_describe_the_lab_setup() {
        let settings = generate_default_config();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.credentials.infrastructure.user, "root");
        assert_eq!(settings.credentials.cluster.user, "hadoop");
        assert_eq!(settings.host_router().route("10").unwrap().as_str(), "157.82.3.140");
        assert_eq!(settings.format_retry(), RetryPolicy::default());
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[retry]\nmax_attempts = 3\ninitial_delay_ms = 500\n\n[hosts]\neven = \"10.1.0.2\"\nodd = \"10.1.0.3\""
        )
        .unwrap();

        let settings = Settings::new_from_file(file.path()).unwrap();
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.initial_delay_ms, 500);
        assert_eq!(settings.retry.max_delay_ms, RetrySettings::default().max_delay_ms);
        assert_eq!(settings.hosts.odd.as_str(), "10.1.0.3");
        assert_eq!(settings.lxc, LxcSettings::default());
    }

    #[test]
    fn rejects_unbounded_retry() {
        let mut settings = generate_default_config();
        settings.retry.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn hadoop_paths_follow_home() {
        let mut settings = generate_default_config();
        settings.hadoop.home = "/opt/hadoop/".to_string();

        let master = ContainerIdentity::resolve(&NodeAddress::parse("198.51.100.10").unwrap(), Role::Master);
        assert_eq!(
            settings.container_layout().worker_list_file(&master),
            "/var/lib/lxc/master-10/rootfs/opt/hadoop/etc/hadoop/slaves"
        );
        assert_eq!(
            settings.hadoop.examples_jar_path(),
            "/opt/hadoop/share/hadoop/mapreduce/hadoop-mapreduce-examples-2.6.0.jar"
        );

        settings.hadoop.worker_list = "/etc/hadoop/slaves".to_string();
        assert_eq!(settings.hadoop.worker_list_path(), "/etc/hadoop/slaves");
    }

    #[test]
    fn default_config_survives_a_toml_round_trip() {
        let rendered = toml::to_string_pretty(&generate_default_config()).unwrap();
        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, generate_default_config());
    }
}
