//! Local management host.
//!
//! Pools are declared in the config file; each declaration carries a regex
//! matched against live process names. A pool is `Started` when at least one
//! process matches and `Stopped` otherwise. There is no request pipeline to
//! query locally, so active request counts are always 0.

use super::{HostHandle, ManagementHost, PoolInfo, WorkerProcess};
use crate::config::PoolDecl;
use crate::error::{PoolwatchError, Result};
use crate::model::PoolStatus;
use regex::Regex;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use sysinfo::System;

struct CompiledPool {
    decl: PoolDecl,
    pattern: Regex,
}

pub struct LocalHost {
    pools: Vec<CompiledPool>,
}

impl LocalHost {
    /// Compiles the declared process patterns. Declaration order is the
    /// enumeration order.
    pub fn new(decls: &[PoolDecl]) -> Result<Self> {
        let mut pools = Vec::with_capacity(decls.len());
        for decl in decls {
            let pattern = Regex::new(&decl.pattern).map_err(|e| {
                PoolwatchError::Config(format!(
                    "invalid process pattern for pool '{}': {e}",
                    decl.name
                ))
            })?;
            pools.push(CompiledPool {
                decl: decl.clone(),
                pattern,
            });
        }
        Ok(Self { pools })
    }
}

impl ManagementHost for LocalHost {
    fn connect(&self) -> Result<Box<dyn HostHandle + '_>> {
        // one full process-table snapshot is the session state
        let system = System::new_all();
        Ok(Box::new(LocalHandle {
            system,
            pools: &self.pools,
        }))
    }
}

struct LocalHandle<'a> {
    system: System,
    pools: &'a [CompiledPool],
}

impl LocalHandle<'_> {
    fn find(&self, name: &str) -> Option<&CompiledPool> {
        self.pools.iter().find(|p| p.decl.name == name)
    }

    fn resolve(&self, pool: &CompiledPool) -> PoolInfo {
        let mut pids: Vec<i64> = self
            .system
            .processes()
            .values()
            .filter(|p| pool.pattern.is_match(&p.name().to_string_lossy()))
            .map(|p| p.pid().as_u32() as i64)
            .collect();
        // processes() iterates in hash order; the owning worker must be stable
        pids.sort_unstable();

        let workers: Vec<WorkerProcess> = pids
            .into_iter()
            .map(|pid| WorkerProcess {
                pid,
                active_requests: 0,
            })
            .collect();
        let status = if workers.is_empty() {
            PoolStatus::Stopped
        } else {
            PoolStatus::Started
        };

        PoolInfo {
            name: pool.decl.name.clone(),
            status,
            workers,
            pipeline_mode: pool.decl.pipeline_mode,
            auto_start: pool.decl.auto_start,
            identity_type: pool.decl.identity_type.clone(),
            idle_timeout: Duration::from_secs(pool.decl.idle_timeout_secs),
            max_processes: pool.decl.max_processes,
        }
    }
}

impl HostHandle for LocalHandle<'_> {
    fn pool_names(&mut self) -> Result<Vec<String>> {
        Ok(self.pools.iter().map(|p| p.decl.name.clone()).collect())
    }

    fn describe(&mut self, name: &str) -> Result<Option<PoolInfo>> {
        Ok(self.find(name).map(|p| self.resolve(p)))
    }

    fn start_pool(&mut self, name: &str) -> Result<()> {
        let pool = self
            .find(name)
            .ok_or_else(|| PoolwatchError::PoolNotFound(name.to_string()))?;
        let command = pool.decl.start_command.clone().ok_or_else(|| {
            PoolwatchError::Host(format!("pool '{name}' has no start_command configured"))
        })?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PoolwatchError::Host(format!(
                    "failed to spawn start command for pool '{name}': {e}"
                ))
            })?;
        // the command may be a long-lived worker; reap on a detached thread
        // rather than block the tick
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, pattern: &str) -> PoolDecl {
        let mut d = PoolDecl::new(name, pattern);
        d.start_command = None;
        d
    }

    fn current_process_name() -> String {
        let system = System::new_all();
        let pid = sysinfo::get_current_pid().unwrap();
        system
            .process(pid)
            .unwrap()
            .name()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = LocalHost::new(&[decl("bad", "(unclosed")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_names_follow_declaration_order() {
        let host = LocalHost::new(&[
            decl("api", "^a$"),
            decl("jobs", "^b$"),
            decl("admin", "^c$"),
        ])
        .unwrap();
        let mut handle = host.connect().unwrap();
        assert_eq!(handle.pool_names().unwrap(), vec!["api", "jobs", "admin"]);
    }

    #[test]
    fn test_describe_unknown_name_is_none() {
        let host = LocalHost::new(&[decl("api", "^a$")]).unwrap();
        let mut handle = host.connect().unwrap();
        assert!(handle.describe("nope").unwrap().is_none());
    }

    #[test]
    fn test_unmatched_pool_is_stopped_without_workers() {
        let host = LocalHost::new(&[decl("ghost", "^no-such-process-name-xyz$")]).unwrap();
        let mut handle = host.connect().unwrap();

        let info = handle.describe("ghost").unwrap().unwrap();
        assert_eq!(info.status, PoolStatus::Stopped);
        assert!(info.workers.is_empty());
        assert_eq!(info.primary_pid(), 0);
    }

    #[test]
    fn test_matching_pool_reports_started_with_worker() {
        let name = current_process_name();
        let pattern = format!("^{}$", regex::escape(&name));
        let host = LocalHost::new(&[decl("self", &pattern)]).unwrap();
        let mut handle = host.connect().unwrap();

        let info = handle.describe("self").unwrap().unwrap();
        assert_eq!(info.status, PoolStatus::Started);
        let own_pid = std::process::id() as i64;
        assert!(info.workers.iter().any(|w| w.pid == own_pid));
        assert!(info.primary_pid() > 0);
    }

    #[test]
    fn test_start_pool_without_command_errs() {
        let host = LocalHost::new(&[decl("api", "^a$")]).unwrap();
        let mut handle = host.connect().unwrap();
        assert!(handle.start_pool("api").is_err());
        assert!(handle.start_pool("unknown").is_err());
    }

    #[test]
    fn test_start_pool_spawns_configured_command() {
        let mut d = decl("api", "^a$");
        d.start_command = Some("true".to_string());
        let host = LocalHost::new(&[d]).unwrap();
        let mut handle = host.connect().unwrap();
        assert!(handle.start_pool("api").is_ok());
    }

    /// Counts exited-but-unreaped children of this process via `/proc`.
    fn zombie_children() -> usize {
        let own_pid = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };
        entries
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .bytes()
                    .all(|b| b.is_ascii_digit())
            })
            .filter_map(|e| std::fs::read_to_string(e.path().join("stat")).ok())
            .filter(|stat| {
                // state and ppid are the first two fields after the comm
                let Some(paren) = stat.rfind(')') else {
                    return false;
                };
                let mut fields = stat[paren + 1..].split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(own_pid.as_str())
            })
            .count()
    }

    #[test]
    fn test_start_pool_reaps_the_spawned_child() {
        let mut d = decl("api", "^a$");
        d.start_command = Some("true".to_string());
        let host = LocalHost::new(&[d]).unwrap();
        let mut handle = host.connect().unwrap();
        handle.start_pool("api").unwrap();

        // let `true` exit first, then poll until the reaper has collected it
        thread::sleep(Duration::from_millis(200));
        let mut zombies = zombie_children();
        for _ in 0..40 {
            if zombies == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(50));
            zombies = zombie_children();
        }
        assert_eq!(zombies, 0, "start command left an unreaped child");
    }

    #[test]
    fn test_declaration_attributes_flow_through() {
        let mut d = decl("api", "^no-such-process-name-xyz$");
        d.idle_timeout_secs = 300;
        d.max_processes = 4;
        d.identity_type = "SpecificUser".to_string();
        let host = LocalHost::new(&[d]).unwrap();
        let mut handle = host.connect().unwrap();

        let info = handle.describe("api").unwrap().unwrap();
        assert_eq!(info.idle_timeout, Duration::from_secs(300));
        assert_eq!(info.max_processes, 4);
        assert_eq!(info.identity_type, "SpecificUser");
    }
}
