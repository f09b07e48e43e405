//! Named operations and their OS-specific command chains.
//!
//! Remediation code asks for an [`Operation`]; the catalog answers with an
//! ordered fallback chain of concrete commands for the current host. The
//! caller decides whether a chain is "first success wins" or must run fully.

use std::path::Path;

use super::CommandSpec;

/// Host operating system family, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Other,
}

impl HostOs {
    pub const ALL: [Self; 3] = [Self::Linux, Self::MacOs, Self::Other];

    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

/// Pull strategies rotated through within one retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullVariant {
    Plain,
    ContentTrustDisabled,
    ExplicitPlatform,
}

impl PullVariant {
    pub const ALL: [Self; 3] = [Self::Plain, Self::ContentTrustDisabled, Self::ExplicitPlatform];

    pub fn label(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::ContentTrustDisabled => "content-trust-disabled",
            Self::ExplicitPlatform => "explicit-platform",
        }
    }
}

/// A named external operation.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// Short-timeout HTTP request; any HTTP response counts as reachable
    HttpProbe { url: &'a str, timeout_secs: u64 },
    ResolveHost { host: &'a str },
    FlushResolver,
    /// Runtime self-check
    RuntimeInfo,
    /// Proxy configured inside the runtime daemon
    RuntimeProxy,
    /// Server version and configured mirrors, `|`-separated
    RuntimeSummary,
    RestartRuntime,
    PullVariant { image: &'a str, variant: PullVariant },
    /// Lists the container by exact name when it is running
    ContainerRunning { name: &'a str },
    ComposeUp {
        service: &'a str,
        compose_file: Option<&'a Path>,
    },
    Exec { container: &'a str, argv: &'a [String] },
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HttpProbe { .. } => "HttpProbe",
            Self::ResolveHost { .. } => "ResolveHost",
            Self::FlushResolver => "FlushResolver",
            Self::RuntimeInfo => "RuntimeInfo",
            Self::RuntimeProxy => "RuntimeProxy",
            Self::RuntimeSummary => "RuntimeSummary",
            Self::RestartRuntime => "RestartRuntime",
            Self::PullVariant { .. } => "PullVariant",
            Self::ContainerRunning { .. } => "ContainerRunning",
            Self::ComposeUp { .. } => "ComposeUp",
            Self::Exec { .. } => "Exec",
        }
    }
}

/// Maps operations to command chains for one host.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    os: HostOs,
    runtime: String,
    platform: String,
    is_root: bool,
}

impl CommandCatalog {
    pub fn new(os: HostOs, runtime: impl Into<String>, platform: impl Into<String>, is_root: bool) -> Self {
        Self {
            os,
            runtime: runtime.into(),
            platform: platform.into(),
            is_root,
        }
    }

    /// Catalog for the current process: detected OS, effective uid.
    pub fn for_host(runtime: impl Into<String>, platform: impl Into<String>) -> Self {
        Self::new(HostOs::detect(), runtime, platform, effective_root())
    }

    pub fn os(&self) -> HostOs {
        self.os
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Longest chain `op` expands to on any host without root. Bounds how many
    /// sequential timeouts one operation can cost.
    pub fn longest_chain(op: &Operation<'_>) -> usize {
        HostOs::ALL
            .iter()
            .map(|&os| Self::new(os, "runtime", "", false).commands(op).len())
            .max()
            .unwrap_or(0)
    }

    /// Ordered fallback chain for `op`. Empty when the host has no way to
    /// perform it.
    pub fn commands(&self, op: &Operation<'_>) -> Vec<CommandSpec> {
        match *op {
            Operation::HttpProbe { url, timeout_secs } => vec![CommandSpec::new("curl").args([
                "-sS".to_string(),
                "-o".to_string(),
                "/dev/null".to_string(),
                "-w".to_string(),
                "%{http_code}".to_string(),
                "--max-time".to_string(),
                timeout_secs.to_string(),
                url.to_string(),
            ])],
            Operation::ResolveHost { host } => match self.os {
                HostOs::Linux => vec![
                    CommandSpec::new("getent").args(["hosts", host]),
                    CommandSpec::new("nslookup").arg(host),
                ],
                HostOs::MacOs => vec![
                    CommandSpec::new("host").arg(host),
                    CommandSpec::new("nslookup").arg(host),
                ],
                HostOs::Other => vec![CommandSpec::new("nslookup").arg(host)],
            },
            Operation::FlushResolver => {
                let chain = match self.os {
                    HostOs::Linux => vec![
                        CommandSpec::new("systemctl").args(["restart", "systemd-resolved"]),
                        CommandSpec::new("resolvectl").arg("flush-caches"),
                        CommandSpec::new("systemd-resolve").arg("--flush-caches"),
                        CommandSpec::new("service").args(["nscd", "restart"]),
                    ],
                    HostOs::MacOs => vec![
                        CommandSpec::new("dscacheutil").arg("-flushcache"),
                        CommandSpec::new("killall").args(["-HUP", "mDNSResponder"]),
                    ],
                    HostOs::Other => Vec::new(),
                };
                self.with_privileged_fallbacks(chain)
            }
            Operation::RuntimeInfo => vec![CommandSpec::new(&self.runtime).arg("info")],
            Operation::RuntimeProxy => vec![CommandSpec::new(&self.runtime)
                .args(["info", "--format", "{{.HTTPProxy}}|{{.HTTPSProxy}}"])],
            Operation::RuntimeSummary => vec![CommandSpec::new(&self.runtime).args([
                "info",
                "--format",
                "{{.ServerVersion}}|{{json .RegistryConfig.Mirrors}}",
            ])],
            Operation::RestartRuntime => {
                let chain = match self.os {
                    HostOs::Linux => vec![
                        CommandSpec::new("systemctl").args(["restart", self.runtime.as_str()]),
                        CommandSpec::new("service").args([self.runtime.as_str(), "restart"]),
                    ],
                    HostOs::MacOs => vec![CommandSpec::new("sh").args([
                        "-c",
                        "osascript -e 'quit app \"Docker\"' && sleep 2 && open -a Docker",
                    ])],
                    HostOs::Other => Vec::new(),
                };
                self.with_privileged_fallbacks(chain)
            }
            Operation::PullVariant { image, variant } => {
                let base = CommandSpec::new(&self.runtime).arg("pull");
                vec![match variant {
                    PullVariant::Plain => base.arg(image),
                    PullVariant::ContentTrustDisabled => base
                        .args(["--disable-content-trust", image])
                        .env("DOCKER_CONTENT_TRUST", "0"),
                    PullVariant::ExplicitPlatform => {
                        base.args(["--platform", self.platform.as_str(), image])
                    }
                }]
            }
            Operation::ContainerRunning { name } => vec![CommandSpec::new(&self.runtime).args([
                "ps".to_string(),
                "--filter".to_string(),
                format!("name=^{name}$"),
                "--filter".to_string(),
                "status=running".to_string(),
                "--format".to_string(),
                "{{.Names}}".to_string(),
            ])],
            Operation::ComposeUp {
                service,
                compose_file,
            } => {
                let mut spec = CommandSpec::new(&self.runtime).arg("compose");
                if let Some(file) = compose_file {
                    spec = spec.args(["-f".to_string(), file.display().to_string()]);
                }
                let spec = spec.args(["up", "-d", service]);
                self.with_privileged_fallbacks(vec![spec])
            }
            Operation::Exec { container, argv } => vec![CommandSpec::new(&self.runtime)
                .args(["exec", container])
                .args(argv.iter().cloned())],
        }
    }

    /// Append `sudo -n` retries of every command when not running as root.
    fn with_privileged_fallbacks(&self, chain: Vec<CommandSpec>) -> Vec<CommandSpec> {
        if self.is_root || self.os == HostOs::MacOs {
            return chain;
        }
        let privileged: Vec<CommandSpec> = chain.iter().cloned().map(CommandSpec::privileged).collect();
        chain.into_iter().chain(privileged).collect()
    }
}

#[cfg(unix)]
fn effective_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    #[allow(unsafe_code)]
    let uid = unsafe { libc::geteuid() };
    uid == 0
}

#[cfg(not(unix))]
fn effective_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux(is_root: bool) -> CommandCatalog {
        CommandCatalog::new(HostOs::Linux, "docker", "linux/amd64", is_root)
    }

    #[test]
    fn test_flush_resolver_linux_chain_order() {
        let chain = linux(true).commands(&Operation::FlushResolver);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0].to_string(), "systemctl restart systemd-resolved");
        assert_eq!(chain[3].to_string(), "service nscd restart");
    }

    #[test]
    fn test_non_root_gets_sudo_fallbacks_after_plain() {
        let chain = linux(false).commands(&Operation::RestartRuntime);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0].program, "systemctl");
        assert_eq!(chain[2].to_string(), "sudo -n systemctl restart docker");
    }

    #[test]
    fn test_other_os_has_no_resolver_flush() {
        let catalog = CommandCatalog::new(HostOs::Other, "docker", "linux/amd64", true);
        assert!(catalog.commands(&Operation::FlushResolver).is_empty());
    }

    #[test]
    fn test_pull_variants() {
        let catalog = linux(true);
        let plain = catalog.commands(&Operation::PullVariant {
            image: "nginx:latest",
            variant: PullVariant::Plain,
        });
        assert_eq!(plain[0].to_string(), "docker pull nginx:latest");

        let trust = catalog.commands(&Operation::PullVariant {
            image: "nginx:latest",
            variant: PullVariant::ContentTrustDisabled,
        });
        assert_eq!(
            trust[0].to_string(),
            "DOCKER_CONTENT_TRUST=0 docker pull --disable-content-trust nginx:latest"
        );

        let platform = catalog.commands(&Operation::PullVariant {
            image: "nginx:latest",
            variant: PullVariant::ExplicitPlatform,
        });
        assert_eq!(platform[0].to_string(), "docker pull --platform linux/amd64 nginx:latest");
    }

    #[test]
    fn test_compose_up_with_file() {
        let path = std::path::PathBuf::from("/srv/app/compose.yml");
        let chain = linux(true).commands(&Operation::ComposeUp {
            service: "postgres",
            compose_file: Some(&path),
        });
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].to_string(), "docker compose -f /srv/app/compose.yml up -d postgres");
    }

    #[test]
    fn test_exec_appends_argv() {
        let argv = vec!["python".to_string(), "manage.py".to_string(), "check".to_string()];
        let chain = linux(true).commands(&Operation::Exec {
            container: "app",
            argv: &argv,
        });
        assert_eq!(chain[0].to_string(), "docker exec app python manage.py check");
    }

    #[test]
    fn test_http_probe_uses_timeout() {
        let chain = linux(true).commands(&Operation::HttpProbe {
            url: "https://example.com",
            timeout_secs: 5,
        });
        assert!(chain[0].args.windows(2).any(|w| w[0] == "--max-time" && w[1] == "5"));
        assert_eq!(chain[0].args.last().map(String::as_str), Some("https://example.com"));
    }
}
