//! Process lookup by executable name
//!
//! Names are normalized before comparison (trimmed, lowercased, `.exe`
//! appended when there is no extension) so `" Notepad "` matches
//! `notepad.exe`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Executable name must not be blank")]
    BlankName,

    #[error("Failed to enumerate processes: {0}")]
    Enumerate(String),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// One running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Which match to report when several processes share a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    Earliest,
    Latest,
    FirstFound,
}

/// Source of process snapshots
pub trait ProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>>;
}

pub fn normalize_exe_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProcessError::BlankName);
    }
    let mut normalized = trimmed.to_lowercase();
    let file_part = normalized.rsplit(['/', '\\']).next().unwrap_or_default();
    if !file_part.contains('.') {
        normalized.push_str(".exe");
    }
    Ok(normalized)
}

fn find_matching<T: ProcessTable + ?Sized>(table: &T, name: &str) -> Result<Vec<ProcessSnapshot>> {
    let wanted = normalize_exe_name(name)?;
    Ok(table
        .snapshot()?
        .into_iter()
        .filter(|p| normalize_exe_name(&p.name).map_or(false, |n| n == wanted))
        .collect())
}

pub fn is_running<T: ProcessTable + ?Sized>(table: &T, name: &str) -> Result<bool> {
    Ok(!find_matching(table, name)?.is_empty())
}

/// Creation time of a matching process, chosen by `pick`
pub fn creation_time<T: ProcessTable + ?Sized>(
    table: &T,
    name: &str,
    pick: Pick,
) -> Result<Option<DateTime<Utc>>> {
    let found = find_matching(table, name)?;
    let times = found.iter().filter_map(|p| p.created);
    Ok(match pick {
        Pick::Earliest => times.min(),
        Pick::Latest => times.max(),
        Pick::FirstFound => found.first().and_then(|p| p.created),
    })
}

/// The operating system's process list
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

#[cfg(target_os = "linux")]
impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
        linux::snapshot()
    }
}

#[cfg(windows)]
impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
        win::snapshot()
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
        Err(ProcessError::Enumerate("unsupported platform".to_string()))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{ProcessError, ProcessSnapshot, Result};
    use chrono::{DateTime, Utc};
    use std::fs;

    // USER_HZ; fixed at 100 on every mainstream Linux configuration
    const CLOCK_TICKS: u64 = 100;

    fn boot_time() -> Option<i64> {
        let stat = fs::read_to_string("/proc/stat").ok()?;
        stat.lines()
            .find_map(|l| l.strip_prefix("btime "))
            .and_then(|v| v.trim().parse().ok())
    }

    fn start_ticks(pid: &str) -> Option<u64> {
        let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        // comm may contain spaces; fields resume after the last ')'
        let rest = stat.get(stat.rfind(')')? + 2..)?;
        // starttime is field 22 overall, 20th after comm and state
        rest.split_whitespace().nth(19)?.parse().ok()
    }

    fn exe_name(pid: &str) -> Option<String> {
        if let Ok(target) = fs::read_link(format!("/proc/{}/exe", pid)) {
            if let Some(name) = target.file_name() {
                return Some(name.to_string_lossy().into_owned());
            }
        }
        fs::read_to_string(format!("/proc/{}/comm", pid))
            .ok()
            .map(|s| s.trim_end().to_string())
    }

    pub(super) fn snapshot() -> Result<Vec<ProcessSnapshot>> {
        let entries = fs::read_dir("/proc").map_err(|e| ProcessError::Enumerate(e.to_string()))?;
        let boot = boot_time();
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let pid = file_name.to_string_lossy();
            if !pid.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let Some(name) = exe_name(&pid) else { continue };
            let created = match (boot, start_ticks(&pid)) {
                (Some(boot), Some(ticks)) => {
                    let millis = boot * 1000 + (ticks * 1000 / CLOCK_TICKS) as i64;
                    DateTime::<Utc>::from_timestamp_millis(millis)
                }
                _ => None,
            };
            out.push(ProcessSnapshot { name, created });
        }
        Ok(out)
    }
}

#[cfg(windows)]
mod win {
    use super::{ProcessError, ProcessSnapshot, Result};
    use chrono::{DateTime, Utc};
    use windows::Win32::Foundation::{CloseHandle, FILETIME};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{
        GetProcessTimes, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    // 100ns intervals between 1601-01-01 and 1970-01-01
    const EPOCH_DIFFERENCE: i64 = 116_444_736_000_000_000;

    fn filetime_to_utc(ft: FILETIME) -> Option<DateTime<Utc>> {
        let ticks = ((ft.dwHighDateTime as i64) << 32) | ft.dwLowDateTime as i64;
        if ticks == 0 {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis((ticks - EPOCH_DIFFERENCE) / 10_000)
    }

    fn created(pid: u32) -> Option<DateTime<Utc>> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
            let mut creation = FILETIME::default();
            let mut exit = FILETIME::default();
            let mut kernel = FILETIME::default();
            let mut user = FILETIME::default();
            let result = GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user);
            let _ = CloseHandle(handle);
            result.ok()?;
            filetime_to_utc(creation)
        }
    }

    pub(super) fn snapshot() -> Result<Vec<ProcessSnapshot>> {
        let mut out = Vec::new();
        unsafe {
            let snap = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| ProcessError::Enumerate(e.to_string()))?;
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };
            let mut more = Process32FirstW(snap, &mut entry).is_ok();
            while more {
                let len = entry.szExeFile.iter().position(|&c| c == 0).unwrap_or(entry.szExeFile.len());
                let name = String::from_utf16_lossy(&entry.szExeFile[..len]);
                out.push(ProcessSnapshot {
                    name,
                    created: created(entry.th32ProcessID),
                });
                more = Process32NextW(snap, &mut entry).is_ok();
            }
            let _ = CloseHandle(snap);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FakeTable(Vec<ProcessSnapshot>);

    impl ProcessTable for FakeTable {
        fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
            Ok(self.0.clone())
        }
    }

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap())
    }

    fn table() -> FakeTable {
        FakeTable(vec![
            ProcessSnapshot { name: "Worker.EXE".into(), created: at(10) },
            ProcessSnapshot { name: "shell.exe".into(), created: at(1) },
            ProcessSnapshot { name: "worker.exe".into(), created: at(8) },
            ProcessSnapshot { name: "worker.exe".into(), created: at(12) },
            ProcessSnapshot { name: "ghost.exe".into(), created: None },
        ])
    }

    #[test]
    fn test_normalize_exe_name() {
        assert_eq!(normalize_exe_name("  Notepad ").unwrap(), "notepad.exe");
        assert_eq!(normalize_exe_name("tool.EXE").unwrap(), "tool.exe");
        assert_eq!(normalize_exe_name("script.bat").unwrap(), "script.bat");
        assert_eq!(normalize_exe_name("C:\\v1.2\\app").unwrap(), "c:\\v1.2\\app.exe");
        assert!(matches!(normalize_exe_name("   "), Err(ProcessError::BlankName)));
    }

    #[test]
    fn test_is_running() {
        let t = table();
        assert!(is_running(&t, "worker").unwrap());
        assert!(is_running(&t, "SHELL.exe").unwrap());
        assert!(!is_running(&t, "missing").unwrap());
        assert!(is_running(&t, "").is_err());
    }

    #[test]
    fn test_creation_time_picks() {
        let t = table();
        assert_eq!(creation_time(&t, "worker", Pick::Earliest).unwrap(), at(8));
        assert_eq!(creation_time(&t, "worker", Pick::Latest).unwrap(), at(12));
        assert_eq!(creation_time(&t, "worker", Pick::FirstFound).unwrap(), at(10));
        assert_eq!(creation_time(&t, "ghost", Pick::Latest).unwrap(), None);
        assert_eq!(creation_time(&t, "missing", Pick::Earliest).unwrap(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_table_lists_processes() {
        let procs = SystemProcessTable.snapshot().unwrap();
        assert!(!procs.is_empty());
    }
}
