//! Orchestrator configuration – resolved once at startup and passed down.
//!
//! Precedence: explicit CLI override (applied by the caller after `load`)
//! > `DESKPACK_*` environment variables > `deskpack.yaml` in the project
//! root > computed default.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default overall readiness deadline for the dev server, in seconds.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;

/// An external command: binary name plus fixed leading arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub bin: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Human-readable form for logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.bin.clone()
        } else {
            format!("{} {}", self.bin, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Override for the dev-server endpoint; when set it is the only
    /// readiness candidate.
    pub dev_url: Option<String>,
    /// Override for the desktop-shell entry-point path.
    pub shell_entry: Option<String>,
    /// Disable the shell's security-header injection (passed through as env).
    #[serde(default)]
    pub disable_csp: bool,
    /// Override for the security-header policy string (passed through as env).
    pub csp_policy: Option<String>,
    /// Development-mode flag (passed through to the shell as env).
    #[serde(default)]
    pub dev_mode: bool,

    /// Command that starts the web dev server.
    pub dev_server: CommandSpec,
    /// Command that exports the web app to a static site. The engine probes
    /// its `--help` output for the export capability before invoking it.
    pub exporter: CommandSpec,
    /// Command that launches the desktop shell; the scaffold entry path is
    /// appended as the final argument.
    pub shell: CommandSpec,
    /// Command that packages the workspace and produces distributables.
    pub packager: CommandSpec,

    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_ready_timeout() -> u64 {
    DEFAULT_READY_TIMEOUT_SECS
}

impl OrchestratorConfig {
    /// Readiness candidates, in racing order. An explicit `dev_url` narrows
    /// the race to a single candidate.
    pub fn ready_candidates(&self) -> Vec<String> {
        match &self.dev_url {
            Some(url) => vec![url.clone()],
            None => vec![
                "http://localhost:8081".to_string(),
                "http://localhost:19006".to_string(),
            ],
        }
    }
}

/// Load configuration for a project rooted at `project_root`.
pub fn load(project_root: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let builder = Config::builder()
        .set_default("dev_server.bin", "npx")?
        .set_default("dev_server.args", vec!["expo", "start", "--web"])?
        .set_default("exporter.bin", "npx")?
        .set_default("exporter.args", vec!["expo"])?
        .set_default("shell.bin", "npx")?
        .set_default("shell.args", vec!["electron"])?
        .set_default("packager.bin", "npx")?
        .set_default("packager.args", vec!["electron-forge"])?
        .set_default("disable_csp", false)?
        .set_default("dev_mode", false)?
        .set_default("ready_timeout_secs", DEFAULT_READY_TIMEOUT_SECS as i64)?
        // Project-level config file
        .add_source(File::from(project_root.join("deskpack.yaml")).required(false))
        // Environment overrides: DESKPACK_DEV_URL, DESKPACK_SHELL_ENTRY,
        // DESKPACK_DISABLE_CSP, DESKPACK_CSP_POLICY, DESKPACK_DEV_MODE
        .add_source(Environment::with_prefix("DESKPACK").try_parsing(true));

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let cfg = load(Path::new("/nonexistent")).expect("defaults should load");
        assert_eq!(cfg.dev_server.bin, "npx");
        assert_eq!(cfg.exporter.args, vec!["expo"]);
        assert_eq!(cfg.ready_timeout_secs, DEFAULT_READY_TIMEOUT_SECS);
        assert!(cfg.dev_url.is_none());
        assert!(!cfg.disable_csp);
        assert_eq!(cfg.ready_candidates().len(), 2);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("DESKPACK_DEV_URL", "http://localhost:4000");
        std::env::set_var("DESKPACK_DISABLE_CSP", "true");
        let cfg = load(Path::new("/nonexistent")).expect("config should load");
        std::env::remove_var("DESKPACK_DEV_URL");
        std::env::remove_var("DESKPACK_DISABLE_CSP");

        assert_eq!(cfg.dev_url.as_deref(), Some("http://localhost:4000"));
        assert!(cfg.disable_csp);
        // An explicit URL narrows the race to one candidate.
        assert_eq!(cfg.ready_candidates(), vec!["http://localhost:4000"]);
    }

    #[test]
    #[serial]
    fn test_malformed_config_file_is_an_error() {
        // Only an absent file is tolerated; a broken one must surface so
        // callers can decide whether their subcommand needs config at all.
        let root = std::env::temp_dir().join(format!("deskpack_cfg_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("deskpack.yaml"), ": not [ yaml").unwrap();

        assert!(load(&root).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_command_display() {
        let spec = CommandSpec {
            bin: "npx".into(),
            args: vec!["expo".into(), "start".into()],
        };
        assert_eq!(spec.display(), "npx expo start");
    }
}
