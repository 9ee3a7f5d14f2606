use std::fs::read_to_string;

use clap::Parser;
use serde::Deserialize;

/// Log level, mirrored from the configuration file into a `log::Level`.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,

    /// Path to the log file. `None` logs to stderr only.
    #[serde(default)]
    pub path: Option<String>,
}

/// The configuration surface of §6.3: where the control channel lives, how
/// to log, and where to find the node's install tree and plugins.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Local port used for the kernel control channel. `None` means "let
    /// the OS choose" — the IPC Manager's own mode, per §6.3.
    #[serde(default)]
    pub control_channel_port: Option<u16>,

    #[serde(default)]
    pub log: Log,

    #[serde(default = "Config::install_path")]
    pub install_path: String,

    #[serde(default)]
    pub plugin_path: Option<String>,

    /// Neighbor keepalive interval, milliseconds (§4.5: "configurable,
    /// default order 5s"). A neighbor is declared dead after 3 missed
    /// intervals.
    #[serde(default = "Config::keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// `numberOfEnrollmentAttempts` (§4.5): re-enrollment attempts with
    /// exponential backoff before a dead neighbor is given up on.
    #[serde(default = "Config::max_enrollment_attempts")]
    pub max_enrollment_attempts: u32,
}

impl Config {
    fn install_path() -> String {
        "/usr/local/irati".to_string()
    }

    fn keepalive_interval_ms() -> u64 {
        5_000
    }

    fn max_enrollment_attempts() -> u32 {
        3
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_channel_port: None,
            log: Log::default(),
            install_path: Self::install_path(),
            plugin_path: None,
            keepalive_interval_ms: Self::keepalive_interval_ms(),
            max_enrollment_attempts: Self::max_enrollment_attempts(),
        }
    }
}

/// Arguments a per-IPCP daemon is spawned with (§6.3): the IPCP's own
/// naming attributes plus the control-channel port it should connect to.
/// The IPC Manager process (no `ipcp_id`) runs the same binary with these
/// left unset.
#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to a JSON5 configuration file. Defaults are used for anything
    /// the file omits or when no path is given.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub process_name: Option<String>,

    #[arg(long)]
    pub process_instance: Option<String>,

    #[arg(long)]
    pub ipcp_id: Option<u16>,

    #[arg(long)]
    pub control_channel_port: Option<u16>,
}

impl Cli {
    /// Whether this invocation names a specific IPCP to spawn rather than
    /// running as the bare IPC Manager.
    pub fn is_ipcp_spawn(&self) -> bool {
        self.process_name.is_some() && self.ipcp_id.is_some()
    }
}

impl Config {
    /// Load the configuration file named on the command line, falling back
    /// to defaults for a missing path or any field the file omits. CLI
    /// arguments that name an explicit control-channel port win over the
    /// file's.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config: Self = match &cli.config {
            Some(path) => serde_json5::from_str(&read_to_string(path)?)?,
            None => Self::default(),
        };

        if let Some(port) = cli.control_channel_port {
            config.control_channel_port = Some(port);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            process_name: None,
            process_instance: None,
            ipcp_id: None,
            control_channel_port: None,
        }
    }

    #[test]
    fn is_ipcp_spawn_requires_both_process_name_and_ipcp_id() {
        let mut cli = bare_cli();
        assert!(!cli.is_ipcp_spawn());

        cli.process_name = Some("app".to_string());
        assert!(!cli.is_ipcp_spawn());

        cli.ipcp_id = Some(1);
        assert!(cli.is_ipcp_spawn());
    }

    #[test]
    fn load_without_a_config_file_uses_defaults() {
        let cli = bare_cli();
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.control_channel_port, None);
        assert_eq!(config.install_path, Config::install_path());
    }

    #[test]
    fn cli_control_channel_port_overrides_the_default() {
        let mut cli = bare_cli();
        cli.control_channel_port = Some(7788);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.control_channel_port, Some(7788));
    }

    #[test]
    fn load_from_a_json5_file_is_overridden_by_an_explicit_cli_port() {
        let mut file = tempfile_with_json5();
        let mut cli = bare_cli();
        cli.config = Some(file.path_string());
        cli.control_channel_port = Some(9);

        let config = Config::load(&cli).unwrap();
        assert_eq!(config.control_channel_port, Some(9));
        assert_eq!(config.install_path, "/opt/irati");
        file.cleanup();
    }

    struct TempJson5 {
        path: std::path::PathBuf,
    }

    impl TempJson5 {
        fn path_string(&self) -> String {
            self.path.to_string_lossy().into_owned()
        }

        fn cleanup(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_with_json5() -> TempJson5 {
        let path = std::env::temp_dir().join(format!("ipcpd-config-test-{:?}.json5", std::thread::current().id()));
        std::fs::write(&path, "{ \"control-channel-port\": 1234, \"install-path\": \"/opt/irati\" }").unwrap();
        TempJson5 { path }
    }
}
