//! Network and registry probes
//!
//! Each probe is an independent call into the [`ProcessRunner`] with the
//! configured short timeout. Redundant endpoints are tried in order and the
//! first one that answers wins; mirrors are the exception and are probed
//! concurrently with every success collected.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{NetworkConfig, RegistryMirror};
use crate::process::{
    run_checked, run_first_success, CommandCatalog, CommandSpec, Operation, ProcessError,
    ProcessRunner,
};

/// Environment variable source for proxy detection.
pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment. Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Server version and configured mirrors as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeSummary {
    pub server_version: String,
    pub mirrors: Vec<String>,
}

impl RuntimeSummary {
    /// Parse `<version>|<json mirror list>`.
    pub fn parse(output: &str) -> Option<Self> {
        let (version, mirrors) = output.trim().split_once('|')?;
        let mirrors = serde_json::from_str::<Option<Vec<String>>>(mirrors.trim())
            .ok()
            .flatten()
            .unwrap_or_default();
        Some(Self {
            server_version: version.trim().to_string(),
            mirrors,
        })
    }
}

pub struct ProbeSet {
    runner: Arc<dyn ProcessRunner>,
    catalog: CommandCatalog,
    env: Arc<dyn EnvLookup>,
    config: NetworkConfig,
}

impl ProbeSet {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        catalog: CommandCatalog,
        env: Arc<dyn EnvLookup>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            runner,
            catalog,
            env,
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// First well-known endpoint that answers.
    pub async fn connectivity(&self) -> Result<String, ProcessError> {
        let candidates = self
            .config
            .connectivity_endpoints
            .iter()
            .flat_map(|url| self.labelled(url, &self.http_probe(url)))
            .collect();
        self.first_answer(candidates).await
    }

    /// First registry hostname that resolves.
    pub async fn dns_resolution(&self) -> Result<String, ProcessError> {
        let candidates = self
            .config
            .dns_hosts
            .iter()
            .flat_map(|host| {
                self.labelled(
                    host,
                    &Operation::ResolveHost {
                        host: host.as_str(),
                    },
                )
            })
            .collect();
        self.first_answer(candidates).await
    }

    /// Where a proxy is configured: env var names, plus `runtime` when the
    /// daemon itself reports one. Empty means no proxy.
    pub async fn detect_proxy(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .config
            .proxy_env_vars
            .iter()
            .filter(|key| self.env.var(key).is_some())
            .cloned()
            .collect();

        for spec in self.catalog.commands(&Operation::RuntimeProxy) {
            match run_checked(self.runner.as_ref(), &spec, self.config.probe_timeout()).await {
                Ok(output) => {
                    let configured = output
                        .stdout
                        .split('|')
                        .map(str::trim)
                        .any(|p| !p.is_empty() && p != "<no value>");
                    if configured {
                        sources.push("runtime".to_string());
                    }
                    break;
                }
                Err(e) => debug!(error = %e, "Runtime proxy query failed"),
            }
        }
        sources
    }

    /// First registry endpoint (or the runtime self-check) that answers.
    pub async fn registry(&self) -> Result<String, ProcessError> {
        let mut candidates: Vec<(String, CommandSpec)> = self
            .config
            .registry_endpoints
            .iter()
            .flat_map(|url| self.labelled(url, &self.http_probe(url)))
            .collect();
        candidates.extend(self.labelled("runtime info", &Operation::RuntimeInfo));
        self.first_answer(candidates).await
    }

    /// Every configured mirror that answers, in priority order.
    pub async fn reachable_mirrors(&self) -> Vec<RegistryMirror> {
        let mut mirrors = self.config.mirrors.clone();
        mirrors.sort_by_key(|m| m.priority);

        let probes = mirrors.iter().map(|mirror| async move {
            let url = format!("{}/v2/", mirror.url.trim_end_matches('/'));
            let chain = self.catalog.commands(&self.http_probe(&url));
            let reachable =
                run_first_success(self.runner.as_ref(), &chain, self.config.probe_timeout())
                    .await
                    .is_ok();
            debug!(mirror = %mirror.name, reachable, "Mirror probe");
            reachable
        });
        let results = join_all(probes).await;

        mirrors
            .into_iter()
            .zip(results)
            .filter_map(|(mirror, ok)| ok.then_some(mirror))
            .collect()
    }

    /// Proxy variables that are set, with their values.
    pub fn proxy_env(&self) -> BTreeMap<String, String> {
        self.config
            .proxy_env_vars
            .iter()
            .filter_map(|key| self.env.var(key).map(|v| (key.clone(), v)))
            .collect()
    }

    pub async fn runtime_summary(&self) -> Option<RuntimeSummary> {
        let chain = self.catalog.commands(&Operation::RuntimeSummary);
        match run_first_success(self.runner.as_ref(), &chain, self.config.probe_timeout()).await {
            Ok((_, output)) => RuntimeSummary::parse(&output.stdout),
            Err(e) => {
                debug!(error = %e, "Runtime summary unavailable");
                None
            }
        }
    }

    fn http_probe<'a>(&self, url: &'a str) -> Operation<'a> {
        Operation::HttpProbe {
            url,
            timeout_secs: self.config.probe_timeout_secs,
        }
    }

    fn labelled(&self, label: &str, op: &Operation<'_>) -> Vec<(String, CommandSpec)> {
        self.catalog
            .commands(op)
            .into_iter()
            .map(|spec| (label.to_string(), spec))
            .collect()
    }

    async fn first_answer(
        &self,
        candidates: Vec<(String, CommandSpec)>,
    ) -> Result<String, ProcessError> {
        let (labels, chain): (Vec<String>, Vec<CommandSpec>) = candidates.into_iter().unzip();
        let (index, _) =
            run_first_success(self.runner.as_ref(), &chain, self.config.probe_timeout()).await?;
        Ok(labels.get(index).cloned().unwrap_or_default())
    }
}
