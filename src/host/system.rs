// src/host/system.rs
//! Host bindings for running on a desktop system from the CLI

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::error::HostError;
use crate::host::{AppDirectory, Notifier, ProcessControl};

/// Process control through `sysinfo`.
///
/// An application id is matched against process names exactly. There is
/// no home surface on a desktop, so `go_home` only records the request.
#[derive(Debug, Default)]
pub struct SystemProcessControl;

impl SystemProcessControl {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for SystemProcessControl {
    fn go_home(&self) -> Result<(), HostError> {
        info!("🏠 Home surface requested");
        Ok(())
    }

    fn terminate(&self, application_id: &str) -> Result<(), HostError> {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let own_pid = sysinfo::get_current_pid().ok();

        let killed = kill_matching(
            application_id,
            sys.processes_by_exact_name(OsStr::new(application_id)),
            |process| Some(process.pid()) == own_pid,
            |process| {
                let accepted = process.kill();
                if !accepted {
                    debug!(pid = %process.pid(), "kill request refused");
                }
                accepted
            },
        )?;
        info!(application_id, killed, "💀 Terminated blocked application");
        Ok(())
    }
}

/// Kill every candidate except our own process; returns how many died.
fn kill_matching<P>(
    application_id: &str,
    candidates: impl IntoIterator<Item = P>,
    is_own: impl Fn(&P) -> bool,
    mut kill: impl FnMut(&P) -> bool,
) -> Result<usize, HostError> {
    let mut matched = 0usize;
    let mut killed = 0usize;
    for process in candidates {
        matched += 1;
        if is_own(&process) {
            warn!(application_id, "refusing to terminate ourselves");
            continue;
        }
        if kill(&process) {
            killed += 1;
        }
    }

    match (matched, killed) {
        (0, _) => Err(HostError::NotRunning(application_id.to_string())),
        (_, 0) => Err(HostError::Protected(application_id.to_string())),
        _ => Ok(killed),
    }
}

/// Prints notifications to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for ConsoleNotifier {
    fn display(&self, message: &str, duration: Duration) -> Result<(), HostError> {
        let border = "━".repeat(message.chars().count() + 4);
        eprintln!("┏{}┓", border);
        eprintln!("┃  {}  ┃", message);
        eprintln!("┗{}┛", border);
        debug!(duration_ms = duration.as_millis() as u64, "notice shown");
        Ok(())
    }

    fn dismiss(&self) {
        debug!("notice dismissed");
    }
}

/// Display names from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAppDirectory {
    names: BTreeMap<String, String>,
}

impl StaticAppDirectory {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }
}

impl AppDirectory for StaticAppDirectory {
    fn display_name(&self, application_id: &str) -> Option<String> {
        let name = self.names.get(application_id).cloned();
        if name.is_none() {
            warn!(application_id, "no display name known");
        }
        name
    }
}
