//! Network repair steps: resolver, runtime daemon config, daemon restart.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{backup_file, RepairError, RepairStep};
use crate::background::Sleeper;
use crate::config::{expand_home, RuntimeConfig};
use crate::health::ProbeSet;
use crate::process::{run_first_success, CommandCatalog, Operation, ProcessError, ProcessRunner};

/// `nameserver` entries of a resolver config, in file order.
pub fn parse_nameservers(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("nameserver"), Some(addr)) => Some(addr.to_string()),
                _ => None,
            }
        })
        .collect()
}

// ============================================================================
// DNS
// ============================================================================

/// Flush the OS resolver, then add any missing fallback nameservers.
pub struct DnsRepair {
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    timeout: Duration,
    resolver_config: PathBuf,
    nameservers: Vec<String>,
}

impl DnsRepair {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        timeout: Duration,
        resolver_config: PathBuf,
        nameservers: Vec<String>,
    ) -> Self {
        Self {
            runner,
            catalog,
            timeout,
            resolver_config,
            nameservers,
        }
    }

    async fn flush(&self) -> String {
        let chain = self.catalog.commands(&Operation::FlushResolver);
        if chain.is_empty() {
            return "no resolver flush available on this host".to_string();
        }
        match run_first_success(self.runner.as_ref(), &chain, self.timeout).await {
            Ok((index, _)) => format!("resolver flushed via `{}`", chain[index]),
            Err(e) => {
                warn!(error = %e, "Every resolver flush command failed");
                format!("resolver flush failed ({e})")
            }
        }
    }
}

#[async_trait]
impl RepairStep for DnsRepair {
    fn name(&self) -> &'static str {
        "dns"
    }

    async fn run(&self) -> Result<String, RepairError> {
        let flushed = self.flush().await;

        let path = &self.resolver_config;
        let existing = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(RepairError::io("reading", path, e)),
        };

        let present = parse_nameservers(&existing);
        let mut missing: Vec<&str> = Vec::new();
        for ns in &self.nameservers {
            if !present.contains(ns) && !missing.contains(&ns.as_str()) {
                missing.push(ns);
            }
        }
        if missing.is_empty() {
            return Ok(format!("{flushed}; fallback nameservers already present"));
        }

        backup_file(path)?;
        let mut text = existing;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        for ns in &missing {
            text.push_str("nameserver ");
            text.push_str(ns);
            text.push('\n');
        }
        std::fs::write(path, text).map_err(|e| RepairError::io("writing", path, e))?;

        Ok(format!("{flushed}; added nameservers {}", missing.join(", ")))
    }
}

// ============================================================================
// Runtime Daemon Config
// ============================================================================

/// Write reachable mirrors, DNS servers and concurrency limits into the
/// runtime daemon config, keeping unrelated keys.
pub struct DaemonConfigRepair {
    probes: Arc<ProbeSet>,
    system_path: PathBuf,
    user_path: PathBuf,
    limits: Map<String, Value>,
}

impl DaemonConfigRepair {
    pub fn new(probes: Arc<ProbeSet>, runtime: &RuntimeConfig) -> Self {
        let mut limits = Map::new();
        limits.insert(
            "max-concurrent-downloads".to_string(),
            json!(runtime.max_concurrent_downloads),
        );
        limits.insert(
            "max-concurrent-uploads".to_string(),
            json!(runtime.max_concurrent_uploads),
        );
        limits.insert(
            "max-download-attempts".to_string(),
            json!(runtime.max_download_attempts),
        );
        Self {
            probes,
            system_path: expand_home(&runtime.daemon_config_path),
            user_path: expand_home(&runtime.daemon_config_user_path),
            limits,
        }
    }

    fn settings(&self, mirrors: &[String]) -> Map<String, Value> {
        let mut settings = self.limits.clone();
        settings.insert("dns".to_string(), json!(self.probes.config().fallback_nameservers));
        settings.insert("registry-mirrors".to_string(), json!(mirrors));
        settings
    }
}

/// Merge `settings` into the JSON object at `path` and write it back.
fn write_daemon_config(path: &Path, settings: &Map<String, Value>) -> Result<(), RepairError> {
    let mut document = match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "Existing daemon config is not a JSON object, replacing it");
                Map::new()
            }
        },
        Ok(_) => Map::new(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(RepairError::io("reading", path, e)),
    };
    for (key, value) in settings {
        document.insert(key.clone(), value.clone());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RepairError::io("creating directory for", path, e))?;
        }
    }
    backup_file(path)?;
    let mut text = serde_json::to_string_pretty(&Value::Object(document))
        .map_err(|e| RepairError::Verification(format!("daemon config did not serialize: {e}")))?;
    text.push('\n');
    std::fs::write(path, text).map_err(|e| RepairError::io("writing", path, e))
}

#[async_trait]
impl RepairStep for DaemonConfigRepair {
    fn name(&self) -> &'static str {
        "daemon-config"
    }

    async fn run(&self) -> Result<String, RepairError> {
        let mirrors: Vec<String> = self
            .probes
            .reachable_mirrors()
            .await
            .into_iter()
            .map(|m| m.url)
            .collect();
        let settings = self.settings(&mirrors);

        let written = match write_daemon_config(&self.system_path, &settings) {
            Ok(()) => &self.system_path,
            Err(e) => {
                warn!(error = %e, "System daemon config not writable, using user path");
                write_daemon_config(&self.user_path, &settings)?;
                &self.user_path
            }
        };
        Ok(format!(
            "wrote {} reachable mirrors to {}",
            mirrors.len(),
            written.display()
        ))
    }
}

// ============================================================================
// Daemon Restart
// ============================================================================

/// Restart the runtime, wait for it to settle, then check it answers.
pub struct DaemonRestart {
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    sleeper: Arc<dyn Sleeper>,
    settle: Duration,
    timeout: Duration,
}

impl DaemonRestart {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        sleeper: Arc<dyn Sleeper>,
        settle: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            catalog,
            sleeper,
            settle,
            timeout,
        }
    }
}

#[async_trait]
impl RepairStep for DaemonRestart {
    fn name(&self) -> &'static str {
        "daemon-restart"
    }

    async fn run(&self) -> Result<String, RepairError> {
        let restart = self.catalog.commands(&Operation::RestartRuntime);
        if restart.is_empty() {
            return Err(ProcessError::Unsupported(Operation::RestartRuntime.name().to_string()).into());
        }
        let (index, _) = run_first_success(self.runner.as_ref(), &restart, self.timeout).await?;

        self.sleeper.sleep(self.settle).await;

        let info = self.catalog.commands(&Operation::RuntimeInfo);
        run_first_success(self.runner.as_ref(), &info, self.timeout)
            .await
            .map_err(|e| RepairError::Verification(format!("runtime not responding after restart: {e}")))?;

        Ok(format!("restarted via `{}`, runtime responding", restart[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::health::ProcessEnv;
    use crate::process::{CommandOutput, HostOs};
    use crate::testing::{RecordingSleeper, ScriptedRunner};

    fn catalog() -> CommandCatalog {
        CommandCatalog::new(HostOs::Linux, "docker", "linux/amd64", true)
    }

    fn dns_repair(runner: Arc<ScriptedRunner>, path: PathBuf) -> DnsRepair {
        DnsRepair::new(
            runner,
            catalog(),
            Duration::from_secs(10),
            path,
            vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
        )
    }

    #[test]
    fn test_parse_nameservers() {
        let text = "# generated\nnameserver 127.0.0.53\noptions edns0\nnameserver  8.8.8.8\n";
        assert_eq!(parse_nameservers(text), vec!["127.0.0.53", "8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_dns_repair_appends_missing_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 8.8.8.8").unwrap();
        let runner = Arc::new(ScriptedRunner::succeed_all());

        let detail = dns_repair(runner.clone(), path.clone()).run().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "nameserver 8.8.8.8\nnameserver 1.1.1.1\n"
        );
        assert!(detail.contains("1.1.1.1"));
        assert_eq!(runner.calls()[0].to_string(), "systemctl restart systemd-resolved");
        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("resolv.conf.backup.")
            })
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn test_dns_repair_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 127.0.0.53\n").unwrap();
        let repair = dns_repair(Arc::new(ScriptedRunner::succeed_all()), path.clone());

        repair.run().await.unwrap();
        let once = std::fs::read_to_string(&path).unwrap();
        let detail = repair.run().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), once);
        assert!(detail.contains("already present"));
    }

    #[tokio::test]
    async fn test_dns_repair_survives_flush_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(CommandOutput::failed(1, "denied"))));

        let detail = dns_repair(runner.clone(), path.clone()).run().await.unwrap();

        assert!(detail.contains("resolver flush failed"));
        assert_eq!(runner.calls().len(), 4);
        assert!(std::fs::read_to_string(&path).unwrap().contains("nameserver 8.8.8.8"));
    }

    fn daemon_repair(runner: ScriptedRunner, system: &Path, user: &Path) -> DaemonConfigRepair {
        let probes = Arc::new(ProbeSet::new(
            Arc::new(runner),
            catalog(),
            Arc::new(ProcessEnv),
            NetworkConfig::default(),
        ));
        let runtime = RuntimeConfig {
            daemon_config_path: system.display().to_string(),
            daemon_config_user_path: user.display().to_string(),
            ..RuntimeConfig::default()
        };
        DaemonConfigRepair::new(probes, &runtime)
    }

    #[tokio::test]
    async fn test_daemon_config_merges_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("daemon.json");
        std::fs::write(&system, r#"{"log-driver": "json-file", "dns": ["9.9.9.9"]}"#).unwrap();
        let runner = ScriptedRunner::new(|spec| {
            if spec.args.last().is_some_and(|u| u.contains("gcr")) {
                Ok(CommandOutput::ok("401"))
            } else {
                Ok(CommandOutput::failed(7, ""))
            }
        });

        daemon_repair(runner, &system, &dir.path().join("user.json"))
            .run()
            .await
            .unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&system).unwrap()).unwrap();
        assert_eq!(written["log-driver"], "json-file");
        assert_eq!(written["dns"], json!(["8.8.8.8", "8.8.4.4", "1.1.1.1"]));
        assert_eq!(written["registry-mirrors"], json!(["https://mirror.gcr.io"]));
        assert_eq!(written["max-concurrent-downloads"], 3);
    }

    #[tokio::test]
    async fn test_daemon_config_unreachable_mirrors_writes_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("daemon.json");
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::failed(7, "")));

        let detail = daemon_repair(runner, &system, &dir.path().join("user.json"))
            .run()
            .await
            .unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&system).unwrap()).unwrap();
        assert_eq!(written["registry-mirrors"], json!([]));
        assert!(detail.starts_with("wrote 0 reachable mirrors"));
    }

    #[tokio::test]
    async fn test_daemon_config_falls_back_to_user_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let system = blocker.join("daemon.json");
        let user = dir.path().join("home").join(".docker").join("daemon.json");

        let detail = daemon_repair(ScriptedRunner::succeed_all(), &system, &user)
            .run()
            .await
            .unwrap();

        assert!(user.exists());
        assert!(detail.ends_with(&user.display().to_string()));
    }

    #[tokio::test]
    async fn test_daemon_restart_settles_then_verifies() {
        let runner = Arc::new(ScriptedRunner::new(|spec| {
            if spec.program == "systemctl" {
                Ok(CommandOutput::failed(1, "no systemd"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        }));
        let sleeper = Arc::new(RecordingSleeper::new());
        let step = DaemonRestart::new(
            runner.clone(),
            catalog(),
            sleeper.clone(),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );

        let detail = step.run().await.unwrap();

        assert!(detail.contains("service docker restart"));
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(10)]);
        assert_eq!(runner.calls().last().unwrap().to_string(), "docker info");
    }

    #[tokio::test]
    async fn test_daemon_restart_verification_failure() {
        let runner = Arc::new(ScriptedRunner::new(|spec| {
            if spec.program == "docker" {
                Ok(CommandOutput::failed(1, "Cannot connect to the Docker daemon"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        }));
        let step = DaemonRestart::new(
            runner,
            catalog(),
            Arc::new(RecordingSleeper::new()),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        assert!(matches!(step.run().await, Err(RepairError::Verification(_))));
    }
}
