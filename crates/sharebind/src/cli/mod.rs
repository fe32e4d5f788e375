//! CLI command definitions and handlers.
//!
//! All interactive prompting lives here; the library only ever receives
//! fully formed requests.

mod prompt;

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use sharebind_common::paths::{SHAREBIND_CONFIG, share_name};
use sharebind_common::{AccessMode, Credentials, Mechanism, ShareConfig, SharePaths};

use crate::reconcile::{
    Activation, BindSpec, CredentialSource, HostMountSpec, HostOutcome, MountReconciler,
    ReconcileReport, ReconcileRequest,
};
use crate::system::HostSystem;
use crate::transfer::{self, END_IMPORT, ImportReport, ImportStatus};
use prompt::Prompter;

/// Sharebind - CIFS shares for LXC containers
#[derive(Parser)]
#[command(name = "sharebind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Rebase every managed file under this directory
    #[arg(long, global = true, env = "SHAREBIND_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (default: /etc/sharebind/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Sharebind commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Mount a share on the host and optionally bind it into a container
    Add {
        /// Share address, e.g. //10.0.0.5/main
        #[arg(long)]
        source: Option<String>,

        /// Host mount target (default: /mnt/lxc_shares/<share name>)
        #[arg(long)]
        target: Option<String>,

        /// Share username
        #[arg(long)]
        username: Option<String>,

        /// Share password
        #[arg(long, env = "SHAREBIND_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Mount mechanism (fstab, autofs)
        #[arg(long)]
        mechanism: Option<Mechanism>,

        /// Mount the share read-only on the host
        #[arg(long)]
        read_only: bool,

        /// Do not create a host mount; --target is already mounted
        #[arg(long)]
        skip_host: bool,

        /// Container ID to bind the share into
        #[arg(long)]
        container: Option<String>,

        /// Directory below the host target to bind (default: the target itself)
        #[arg(long)]
        sub_path: Option<String>,

        /// Mount point inside the container
        #[arg(long)]
        container_path: Option<String>,

        /// Bind read-only inside the container
        #[arg(long)]
        container_read_only: bool,

        /// Never prompt; fail on missing input
        #[arg(short, long)]
        yes: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print all host share mounts with their credentials as a portable bundle
    Export {
        /// Write the bundle to a file (mode 0600) instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recreate host share mounts from an export bundle
    Import {
        /// Read the bundle from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Never prompt; blocks without credentials fail
        #[arg(short, long)]
        yes: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List host share mounts
    List {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub fn execute(self) -> Result<()> {
        let paths = self
            .root
            .as_ref()
            .map_or_else(SharePaths::new, SharePaths::with_root);
        let config_path = self.config.unwrap_or_else(|| SHAREBIND_CONFIG.clone());
        let config = ShareConfig::load(&config_path)?;
        let reconciler = MountReconciler::new(paths.clone(), config, HostSystem);

        match self.command {
            Commands::Add {
                source,
                target,
                username,
                password,
                mechanism,
                read_only,
                skip_host,
                container,
                sub_path,
                container_path,
                container_read_only,
                yes,
                format,
            } => {
                let prompter = Prompter::new(!yes);

                let (target, host) = if skip_host {
                    (prompter.text("Existing host mount path", target, None)?, None)
                } else {
                    let source = prompter.text("Share address (//host/share)", source, None)?;
                    let default_target = share_name(&source)
                        .map(|name| paths.default_target(&name).display().to_string());
                    let target = prompter.text("Host mount target", target, default_target)?;
                    let username = prompter.text("Share username", username, None)?;
                    let password = prompter.password("Share password", password)?;
                    let mechanism = match mechanism {
                        Some(m) => m,
                        None => prompter.mechanism()?,
                    };
                    let host = HostMountSpec {
                        source,
                        name: None,
                        credentials: CredentialSource::Provided(Credentials::new(
                            username, password,
                        )),
                        mechanism,
                        mode: access_mode(read_only),
                    };
                    (target, Some(host))
                };

                let bind = match container {
                    Some(id) => Some(id),
                    None if prompter.confirm("Bind the share into a container?", false)? => {
                        Some(prompter.text("Container ID", None, None)?)
                    }
                    None => None,
                };
                let bind = bind
                    .map(|container| -> Result<BindSpec> {
                        let sub_path = prompter.text(
                            "Sub-path below the host target",
                            sub_path,
                            Some(".".to_string()),
                        )?;
                        let default_path = share_name(&target).map(|name| format!("/mnt/{name}"));
                        let container_path = prompter.text(
                            "Mount point inside the container",
                            container_path,
                            default_path,
                        )?;
                        let read_only = container_read_only
                            || prompter.confirm("Read-only inside the container?", false)?;
                        Ok(BindSpec {
                            container,
                            sub_path,
                            container_path,
                            mode: access_mode(read_only),
                        })
                    })
                    .transpose()?;

                let report = reconciler.reconcile(&ReconcileRequest { target, host, bind })?;
                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_report(&report);
                }
                Ok(())
            }

            Commands::Export { output } => {
                let bundle = transfer::export(&reconciler).to_string();
                match output {
                    Some(path) => {
                        let mut file = OpenOptions::new()
                            .write(true)
                            .create(true)
                            .truncate(true)
                            .mode(0o600)
                            .open(&path)?;
                        file.write_all(bundle.as_bytes())?;
                        eprintln!("Export written to {}", path.display());
                    }
                    None => print!("{bundle}"),
                }
                Ok(())
            }

            Commands::Import { input, yes, format } => {
                let text = match input {
                    Some(path) => fs::read_to_string(path)?,
                    None => read_until_end_import()?,
                };

                let prompter = Prompter::new(!yes);
                let report = transfer::import(&reconciler, &text, |block| {
                    eprintln!("Credentials for {} ({})", block.source, block.target);
                    let username = prompter.text("Share username", None, None)?;
                    let password = prompter.password("Share password", None)?;
                    Ok(Credentials::new(username, password))
                });

                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_import(&report);
                }

                let failed = report.mounts.iter().filter(|m| m.failed()).count();
                if failed > 0 {
                    return Err(eyre!(
                        "{failed} of {} mounts failed to import",
                        report.mounts.len()
                    ));
                }
                Ok(())
            }

            Commands::List { format } => {
                let mut entries = reconciler.fstab().list_entries();
                entries.extend(reconciler.autofs().list_entries());

                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    println!("MECHANISM\tMODE\tSOURCE\tTARGET\tCREDENTIALS");
                    for entry in entries {
                        println!(
                            "{}\t{}\t{}\t{}\t{}",
                            entry.mechanism,
                            entry.mode,
                            entry.source,
                            entry.target,
                            entry.credentials.display()
                        );
                    }
                }
                Ok(())
            }
        }
    }
}

const fn access_mode(read_only: bool) -> AccessMode {
    if read_only {
        AccessMode::ReadOnly
    } else {
        AccessMode::ReadWrite
    }
}

fn read_until_end_import() -> Result<String> {
    eprintln!("Paste the export bundle, then a line containing only {END_IMPORT}:");
    let mut text = String::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim_end() == END_IMPORT {
            break;
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

fn activation_suffix(activation: &Activation) -> String {
    match activation {
        Activation::Mounted => String::new(),
        Activation::Failed { reason } => format!(" (configured, not mounted: {reason})"),
    }
}

fn print_import(report: &ImportReport) {
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for mount in &report.mounts {
        match &mount.status {
            ImportStatus::Restored(host) => println!(
                "{}: restored via {}{}",
                mount.target,
                host.mechanism,
                activation_suffix(&host.activation)
            ),
            ImportStatus::Existing => println!("{}: already configured", mount.target),
            ImportStatus::Failed { reason } => println!("{}: FAILED: {reason}", mount.target),
        }
    }
}

fn print_report(report: &ReconcileReport) {
    match &report.host {
        HostOutcome::Created(host) => {
            let fallback = if host.fell_back { " (autofs unavailable)" } else { "" };
            println!(
                "Host mount {} configured via {}{fallback}{}",
                report.target,
                host.mechanism,
                activation_suffix(&host.activation)
            );
        }
        HostOutcome::Existing => println!("Host mount {} already configured", report.target),
        HostOutcome::Unverified => println!("Using host path {} as given", report.target),
    }

    if let Some(bind) = &report.bind {
        let state = if bind.appended { "added" } else { "already present" };
        println!("Container bind {state}: {}", bind.entry.line());
    }

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
}
