use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use ftm::auth::Credentials;
use ftm::hosts::{self, HostsUpdate};
use ftm::http::HttpSettings;
use ftm::{Dispatcher, Environment, EnvironmentRegistry, Operation, ResultEvent};

/// Per-environment tally of an operation's events.
#[derive(Debug, Default)]
struct Summary {
    counts: BTreeMap<Environment, (usize, usize)>,
}

impl Summary {
    fn new(environments: &[Environment]) -> Self {
        Self {
            counts: environments.iter().map(|env| (*env, (0, 0))).collect(),
        }
    }

    fn record(&mut self, event: &ResultEvent) {
        let entry = self.counts.entry(event.environment).or_default();
        if event.is_error {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    fn failed(&self) -> usize {
        self.counts.values().map(|(_, failed)| failed).sum()
    }

    fn total(&self) -> usize {
        self.counts.values().map(|(ok, failed)| ok + failed).sum()
    }

    fn print(&self) {
        println!("{}", "-".repeat(60));
        for (env, (ok, failed)) in &self.counts {
            println!("{:<8} {} succeeded, {} failed", env, ok, failed);
        }
    }
}

fn print_event(event: &ResultEvent) {
    if event.is_error {
        eprintln!("Error: {}", event);
    } else {
        println!("{}", event);
    }
}

/// Dispatch `operation` and print results as they arrive.
///
/// Fails (non-zero exit) when any environment or item reported an error.
pub(crate) async fn run_operation(
    dispatcher: &Dispatcher,
    operation: Operation,
    environments: Vec<Environment>,
    credentials: Credentials,
) -> Result<(), Box<dyn std::error::Error>> {
    let names: Vec<&str> = environments.iter().map(|env| env.as_str()).collect();
    println!(
        "Running {} on {} as {}...",
        operation.kind(),
        names.join(", "),
        credentials.username
    );

    let mut dispatch = dispatcher.dispatch(operation, &environments, credentials);
    let mut summary = Summary::new(dispatch.environments());

    while let Some(event) = dispatch.next_event().await {
        print_event(&event);
        summary.record(&event);
    }

    summary.print();
    let failed = summary.failed();
    if failed > 0 {
        return Err(format!("{} of {} results failed", failed, summary.total()).into());
    }
    Ok(())
}

pub(crate) fn print_environments(registry: &EnvironmentRegistry, http: &HttpSettings) {
    for cfg in registry.iter() {
        println!("{}", cfg.key);
        println!("  token:   {}", cfg.token_url);
        println!("  feature: {}", cfg.feature_url);
    }
    println!();
    println!(
        "TLS verification: {}",
        if http.insecure_skip_verify {
            "disabled"
        } else {
            "enabled"
        }
    );
    println!("Request timeout:  {}s", http.timeout.as_secs());
}

pub(crate) fn run_hosts(
    path: &Path,
    entry: &str,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if dry_run {
        if hosts::has_entry(path, entry)? {
            println!("'{}' is present in {}", entry, path.display());
        } else {
            println!("'{}' is missing from {}", entry, path.display());
        }
        return Ok(());
    }

    match hosts::ensure_hosts_entry(path, entry) {
        Ok(HostsUpdate::AlreadyPresent) => {
            println!("'{}' is already present in {}", entry, path.display());
            Ok(())
        }
        Ok(HostsUpdate::Added) => {
            println!("Added '{}' to {}", entry, path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(format!(
            "Cannot write {}: {}. Re-run with administrator rights.",
            path.display(),
            e
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}
