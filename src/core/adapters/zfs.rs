// src/core/adapters/zfs.rs

//! ZFS CLI adapter: wraps `zfs`/`zpool` invocations and parses
//! their textual output into typed results. Every primitive here is
//! idempotent at the shell level (e.g. destroying an absent snapshot is
//! tolerated) so C4/C3 can retry freely.

use crate::core::adapters::process;
use crate::core::errors::{FleetError, FleetResult, UpstreamKind};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub guid: String,
    pub kind: DatasetKind,
    pub used: u64,
    pub available: u64,
    pub mountpoint: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Filesystem,
    Volume,
    Snapshot,
}

impl DatasetKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "filesystem" => Some(Self::Filesystem),
            "volume" => Some(Self::Volume),
            "snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub guid: String,
    pub createtxg: u64,
}

pub struct ZfsAdapter {
    binary: String,
    timeout: Duration,
}

impl ZfsAdapter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    async fn run(&self, args: &[&str]) -> FleetResult<String> {
        let out = process::run(UpstreamKind::Zfs, &self.binary, args, self.timeout, DEFAULT_RETRIES).await?;
        Ok(out.stdout)
    }

    /// `zfs list -H -p -o name,guid,type,used,avail,mountpoint,origin <target>`
    pub async fn dataset_info(&self, target: &str) -> FleetResult<DatasetInfo> {
        let stdout = self
            .run(&[
                "list", "-H", "-p", "-o",
                "name,guid,type,used,avail,mountpoint,origin",
                target,
            ])
            .await?;
        parse_dataset_line(stdout.lines().next().unwrap_or_default())
            .ok_or_else(|| FleetError::NotFound(format!("dataset {target}")))
    }

    /// Lists `root` and every descendant filesystem/volume beneath it, in
    /// parent-before-child order (as `zfs list -r` returns them).
    pub async fn list_descendants(&self, root: &str) -> FleetResult<Vec<String>> {
        let stdout = self
            .run(&["list", "-H", "-o", "name", "-t", "filesystem,volume", "-r", root])
            .await?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    /// Lists snapshots of `dataset` ordered oldest-first by `createtxg`.
    pub async fn list_snapshots(&self, dataset: &str) -> FleetResult<Vec<SnapshotInfo>> {
        let stdout = self
            .run(&[
                "list", "-H", "-p", "-t", "snapshot", "-o", "name,guid,createtxg",
                "-s", "createtxg", "-r", dataset,
            ])
            .await?;
        Ok(stdout.lines().filter_map(parse_snapshot_line).collect())
    }

    pub async fn create_snapshot(&self, dataset: &str, snap_name: &str, recursive: bool) -> FleetResult<()> {
        let full = format!("{dataset}@{snap_name}");
        let mut args = vec!["snapshot"];
        if recursive {
            args.push("-r");
        }
        args.push(&full);
        self.run(&args).await?;
        Ok(())
    }

    pub async fn destroy(&self, target: &str, recursive: bool) -> FleetResult<()> {
        let mut args = vec!["destroy"];
        if recursive {
            args.push("-r");
        }
        args.push(target);
        self.run(&args).await?;
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> FleetResult<()> {
        self.run(&["rename", from, to]).await?;
        Ok(())
    }

    pub async fn clone(&self, snapshot: &str, target: &str) -> FleetResult<()> {
        self.run(&["clone", "-p", snapshot, target]).await?;
        Ok(())
    }

    pub async fn rollback(&self, snapshot: &str, destroy_newer: bool) -> FleetResult<()> {
        let mut args = vec!["rollback"];
        if destroy_newer {
            args.push("-r");
        }
        args.push(snapshot);
        self.run(&args).await?;
        Ok(())
    }

    /// Reads a dataset's `receive_resume_token` property, empty string if unset.
    pub async fn receive_resume_token(&self, dataset: &str) -> FleetResult<Option<String>> {
        let stdout = self
            .run(&["get", "-H", "-p", "-o", "value", "receive_resume_token", dataset])
            .await?;
        let token = stdout.trim();
        if token.is_empty() || token == "-" {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    /// Streams `zfs send <incremental base..snapshot>` into an async reader;
    /// the caller (C4's sync path) pipes it through an SSH transport and
    /// into `zfs recv` on the destination, throttling bandwidth in between.
    pub async fn send_incremental(
        &self,
        base_snapshot: &str,
        new_snapshot: &str,
    ) -> FleetResult<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["send", "-I", base_snapshot, new_snapshot])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        cmd.spawn().map_err(|e| FleetError::UpstreamFailed {
            kind: UpstreamKind::Zfs,
            message: "zfs send failed to start".into(),
            detail: Some(e.to_string()),
        })
    }

    /// Streams a full (non-incremental) `zfs send <snapshot>`.
    pub async fn send_full(&self, snapshot: &str) -> FleetResult<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["send", snapshot])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        cmd.spawn().map_err(|e| FleetError::UpstreamFailed {
            kind: UpstreamKind::Zfs,
            message: "zfs send failed to start".into(),
            detail: Some(e.to_string()),
        })
    }

    pub async fn receive(&self, target: &str, force: bool, resume_token: Option<&str>) -> FleetResult<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        let mut args = vec!["receive".to_string()];
        if force {
            args.push("-F".to_string());
        }
        if let Some(token) = resume_token {
            args.push("-t".to_string());
            args.push(token.to_string());
        } else {
            args.push(target.to_string());
        }
        cmd.args(&args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        cmd.spawn().map_err(|e| FleetError::UpstreamFailed {
            kind: UpstreamKind::Zfs,
            message: "zfs receive failed to start".into(),
            detail: Some(e.to_string()),
        })
    }
}

impl Default for ZfsAdapter {
    fn default() -> Self {
        Self::new("zfs", DEFAULT_TIMEOUT)
    }
}

fn parse_dataset_line(line: &str) -> Option<DatasetInfo> {
    let mut f = line.split('\t');
    let name = f.next()?.to_string();
    let guid = f.next()?.to_string();
    let kind = DatasetKind::parse(f.next()?)?;
    let used: u64 = f.next()?.parse().ok()?;
    let available: u64 = f.next()?.parse().ok()?;
    let mountpoint = f.next().filter(|s| *s != "-" && !s.is_empty()).map(str::to_string);
    let origin = f.next().filter(|s| *s != "-" && !s.is_empty()).map(str::to_string);
    Some(DatasetInfo { name, guid, kind, used, available, mountpoint, origin })
}

fn parse_snapshot_line(line: &str) -> Option<SnapshotInfo> {
    let mut f = line.split('\t');
    let name = f.next()?.to_string();
    let guid = f.next()?.to_string();
    let createtxg: u64 = f.next()?.parse().ok()?;
    Some(SnapshotInfo { name, guid, createtxg })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_dataset_line() {
        let line = "tank/db\t12345\tfilesystem\t1024\t2048\t/tank/db\t-";
        let d = parse_dataset_line(line).unwrap();
        assert_eq!(d.guid, "12345");
        assert_eq!(d.kind, DatasetKind::Filesystem);
        assert_eq!(d.mountpoint.as_deref(), Some("/tank/db"));
        assert!(d.origin.is_none());
    }

    #[test]
    fn parses_snapshot_lines_in_createtxg_order() {
        let stdout = "tank/db@zelta_a\t111\t10\ntank/db@zelta_b\t222\t20\n";
        let snaps: Vec<_> = stdout.lines().filter_map(parse_snapshot_line).collect();
        assert_eq!(snaps.len(), 2);
        assert!(snaps[0].createtxg < snaps[1].createtxg);
    }
}
