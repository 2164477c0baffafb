//! エンジンテスト用のインメモリモックポート群。

use kk_domain::error::DomainError;
use kk_domain::port::driven::{
    AdapterInfo, AppFlags, Clock, DriveEnum, EventLog, KeyLocation, Launcher, MachineIdentity,
    NetworkConfig, ProcessControl, ProcessInfo, ProfileFs, RandomSource, RegistryScope,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

// ---------- ファイルシステム ----------

/// ディレクトリ・ファイル・リンクをインメモリで表すモック。
#[derive(Default)]
pub struct MockFs {
    pub dirs: RefCell<BTreeSet<PathBuf>>,
    pub files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    pub links: RefCell<BTreeMap<PathBuf, PathBuf>>,
    /// リンク作成を失敗させる
    pub fail_link_creation: Cell<bool>,
    /// 移動を失敗させるソースパス
    pub move_failures: RefCell<HashSet<PathBuf>>,
    /// コピーを（残回数分）失敗させるソースパス
    pub copy_failures: RefCell<HashMap<PathBuf, u32>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut dirs = self.dirs.borrow_mut();
        let mut current = path.as_ref().to_path_buf();
        loop {
            dirs.insert(current.clone());
            match current.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    current = parent.to_path_buf();
                }
                _ => break,
            }
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &[u8]) {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files.borrow_mut().insert(path, content.to_vec());
    }

    pub fn add_link(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        if let Some(parent) = link.as_ref().parent() {
            self.add_dir(parent);
        }
        self.links
            .borrow_mut()
            .insert(link.as_ref().to_path_buf(), target.as_ref().to_path_buf());
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.dirs.borrow().contains(path.as_ref())
    }

    pub fn link_target(&self, link: impl AsRef<Path>) -> Option<PathBuf> {
        self.links.borrow().get(link.as_ref()).cloned()
    }

    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let resolved = self.resolve(path.as_ref());
        self.files.borrow().get(&resolved).cloned()
    }

    /// リンクプレフィックスを辿って実パスへ解決する
    fn resolve(&self, path: &Path) -> PathBuf {
        let links = self.links.borrow();
        let mut current = path.to_path_buf();
        for _ in 0..8 {
            let mut next = None;
            for (link, target) in links.iter() {
                if let Ok(rest) = current.strip_prefix(link) {
                    next = Some(if rest.as_os_str().is_empty() {
                        target.clone()
                    } else {
                        target.join(rest)
                    });
                    break;
                }
            }
            match next {
                Some(resolved) => current = resolved,
                None => break,
            }
        }
        current
    }
}

impl ProfileFs for MockFs {
    fn dir_exists(&self, path: &Path) -> bool {
        let resolved = self.resolve(path);
        self.dirs.borrow().contains(&resolved)
    }

    fn file_exists(&self, path: &Path) -> bool {
        let resolved = self.resolve(path);
        self.files.borrow().contains_key(&resolved)
    }

    fn is_reparse_link(&self, path: &Path) -> bool {
        self.links.borrow().contains_key(path)
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), DomainError> {
        self.add_dir(self.resolve(path));
        Ok(())
    }

    fn remove_tree(&self, path: &Path) -> Result<(), DomainError> {
        let resolved = self.resolve(path);
        self.dirs.borrow_mut().retain(|d| !d.starts_with(&resolved));
        self.files.borrow_mut().retain(|f, _| !f.starts_with(&resolved));
        self.links.borrow_mut().retain(|l, _| !l.starts_with(&resolved));
        Ok(())
    }

    fn remove_link(&self, path: &Path) -> Result<(), DomainError> {
        match self.links.borrow_mut().remove(path) {
            Some(_) => Ok(()),
            None => Err(DomainError::IoError(format!(
                "{} is not a link",
                path.display()
            ))),
        }
    }

    fn move_dir(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        if self.move_failures.borrow().contains(from) {
            return Err(DomainError::IoError(format!(
                "simulated move failure for {}",
                from.display()
            )));
        }
        if !self.dirs.borrow().contains(from) {
            return Err(DomainError::IoError(format!(
                "move source missing: {}",
                from.display()
            )));
        }
        let moved_dirs: Vec<PathBuf> = self
            .dirs
            .borrow()
            .iter()
            .filter(|d| d.starts_with(from))
            .cloned()
            .collect();
        let moved_files: Vec<(PathBuf, Vec<u8>)> = self
            .files
            .borrow()
            .iter()
            .filter(|(f, _)| f.starts_with(from))
            .map(|(f, c)| (f.clone(), c.clone()))
            .collect();
        {
            let mut dirs = self.dirs.borrow_mut();
            let mut files = self.files.borrow_mut();
            dirs.retain(|d| !d.starts_with(from));
            files.retain(|f, _| !f.starts_with(from));
            for dir in moved_dirs {
                let rebased = to.join(dir.strip_prefix(from).unwrap_or(&dir));
                dirs.insert(rebased);
            }
            for (file, content) in moved_files {
                let rebased = to.join(file.strip_prefix(from).unwrap_or(&file));
                files.insert(rebased, content);
            }
        }
        self.add_dir(to);
        Ok(())
    }

    fn create_dir_link(&self, link: &Path, target: &Path) -> Result<(), DomainError> {
        if self.fail_link_creation.get() {
            return Err(DomainError::IoError("simulated link failure".into()));
        }
        if self.dirs.borrow().contains(link) || self.links.borrow().contains_key(link) {
            return Err(DomainError::IoError(format!(
                "link path already exists: {}",
                link.display()
            )));
        }
        if !self.dirs.borrow().contains(target) {
            return Err(DomainError::IoError(format!(
                "link target missing: {}",
                target.display()
            )));
        }
        self.links
            .borrow_mut()
            .insert(link.to_path_buf(), target.to_path_buf());
        Ok(())
    }

    fn resolve_real_path(&self, path: &Path) -> Result<PathBuf, DomainError> {
        let resolved = self.resolve(path);
        if self.dirs.borrow().contains(&resolved) || self.files.borrow().contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(DomainError::IoError("Path not found".into()))
        }
    }

    fn list_subdirs(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError> {
        let resolved = self.resolve(path);
        if !self.dirs.borrow().contains(&resolved) {
            return Err(DomainError::IoError(format!(
                "directory missing: {}",
                resolved.display()
            )));
        }
        Ok(self
            .dirs
            .borrow()
            .iter()
            .filter(|d| d.parent() == Some(resolved.as_path()))
            .cloned()
            .collect())
    }

    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError> {
        let resolved = self.resolve(path);
        if !self.dirs.borrow().contains(&resolved) {
            return Err(DomainError::IoError(format!(
                "directory missing: {}",
                resolved.display()
            )));
        }
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|f| f.parent() == Some(resolved.as_path()))
            .cloned()
            .collect())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        {
            let mut failures = self.copy_failures.borrow_mut();
            if let Some(remaining) = failures.get_mut(from) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DomainError::IoError("simulated sharing violation".into()));
                }
            }
        }
        let resolved_from = self.resolve(from);
        let content = self
            .files
            .borrow()
            .get(&resolved_from)
            .cloned()
            .ok_or_else(|| DomainError::IoError(format!("copy source missing: {}", from.display())))?;
        let resolved_to = self.resolve(to);
        self.files.borrow_mut().insert(resolved_to, content);
        Ok(())
    }
}

impl DriveEnum for MockFs {
    fn logical_drives(&self) -> Vec<String> {
        Vec::new()
    }
}

// ---------- ログ ----------

#[derive(Default)]
pub struct MockLog {
    pub entries: RefCell<Vec<(String, String)>>,
}

impl MockLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, level: &str, fragment: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|(l, m)| l == level && m.contains(fragment))
    }

    fn push(&self, level: &str, message: &str) {
        self.entries
            .borrow_mut()
            .push((level.to_string(), message.to_string()));
    }
}

impl EventLog for MockLog {
    fn trace(&self, message: &str) {
        self.push("trace", message);
    }
    fn info(&self, message: &str) {
        self.push("info", message);
    }
    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
}

// ---------- 時刻 ----------

#[derive(Default)]
pub struct MockClock {
    pub slept: RefCell<Vec<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_slept_ms(&self) -> u64 {
        self.slept.borrow().iter().sum()
    }
}

impl Clock for MockClock {
    fn now_iso8601(&self) -> String {
        "2025-01-15T10:30:00.123Z".to_string()
    }

    fn sleep_ms(&self, ms: u64) {
        self.slept.borrow_mut().push(ms);
    }
}

// ---------- 乱数 ----------

pub struct MockRandom {
    state: Cell<u64>,
}

impl MockRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Cell::new(seed),
        }
    }
}

impl RandomSource for MockRandom {
    fn next_u64(&self) -> Result<u64, DomainError> {
        let mut v = self.state.get();
        v ^= v >> 12;
        v ^= v << 25;
        v ^= v >> 27;
        v = v.wrapping_mul(0x2545F4914F6CDD1D).wrapping_add(1);
        self.state.set(v);
        Ok(v)
    }
}

// ---------- プロセス ----------

/// `processes()` 呼び出し毎にフェーズを進めるモック。
/// キューの最後の要素は以後の呼び出しでも返り続ける。
#[derive(Default)]
pub struct MockProcs {
    pub phases: RefCell<VecDeque<Vec<ProcessInfo>>>,
    pub parents: RefCell<HashMap<u32, u32>>,
    pub killed: RefCell<Vec<u32>>,
    pub kill_failures: RefCell<HashSet<u32>>,
}

impl MockProcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_phase(&self, procs: Vec<ProcessInfo>) {
        self.phases.borrow_mut().push_back(procs);
    }

    pub fn set_parent(&self, pid: u32, parent: u32) {
        self.parents.borrow_mut().insert(pid, parent);
    }
}

impl ProcessControl for MockProcs {
    fn processes(&self) -> Vec<ProcessInfo> {
        let mut phases = self.phases.borrow_mut();
        if phases.len() > 1 {
            phases.pop_front().unwrap_or_default()
        } else {
            phases.front().cloned().unwrap_or_default()
        }
    }

    fn parent_pid(&self, pid: u32) -> Option<u32> {
        self.parents.borrow().get(&pid).copied()
    }

    fn kill(&self, pid: u32) -> Result<(), DomainError> {
        if self.kill_failures.borrow().contains(&pid) {
            return Err(DomainError::ProcessLaunchFailed(format!(
                "simulated kill failure for {}",
                pid
            )));
        }
        self.killed.borrow_mut().push(pid);
        Ok(())
    }

    fn kill_and_wait(&self, pid: u32) -> Result<(), DomainError> {
        self.kill(pid)
    }
}

// ---------- 起動 ----------

#[derive(Default)]
pub struct MockLauncher {
    pub urls: RefCell<Vec<String>>,
    pub spawned: RefCell<Vec<PathBuf>>,
    pub tool_runs: RefCell<Vec<(PathBuf, Vec<String>)>>,
    pub fail_spawn: Cell<bool>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Launcher for MockLauncher {
    fn open_url(&self, url: &str) -> Result<(), DomainError> {
        self.urls.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn spawn_detached(&self, exe: &Path) -> Result<(), DomainError> {
        if self.fail_spawn.get() {
            return Err(DomainError::ProcessLaunchFailed("simulated spawn failure".into()));
        }
        self.spawned.borrow_mut().push(exe.to_path_buf());
        Ok(())
    }

    fn run_capture(&self, exe: &Path, args: &[String]) -> Result<String, DomainError> {
        self.tool_runs
            .borrow_mut()
            .push((exe.to_path_buf(), args.to_vec()));
        Ok(String::new())
    }
}

// ---------- アプリフラグ ----------

/// 呼び出し回数ベースでフラグ遷移を表すモック。
pub struct MockFlags {
    /// `is_running` がこの回数 false を返した後 true になる（MAXで永遠にfalse）
    pub running_after: Cell<u32>,
    /// `is_updating` がこの回数 true を返す（0で更新なし、MAXで永遠に更新中）
    pub updating_for: Cell<u32>,
    running_calls: Cell<u32>,
    updating_calls: Cell<u32>,
}

impl MockFlags {
    pub fn new() -> Self {
        Self {
            running_after: Cell::new(0),
            updating_for: Cell::new(0),
            running_calls: Cell::new(0),
            updating_calls: Cell::new(0),
        }
    }
}

impl AppFlags for MockFlags {
    fn is_running(&self, _app_id: &str) -> bool {
        let calls = self.running_calls.get();
        self.running_calls.set(calls.saturating_add(1));
        self.running_after.get() != u32::MAX && calls >= self.running_after.get()
    }

    fn is_updating(&self, _app_id: &str) -> bool {
        let calls = self.updating_calls.get();
        self.updating_calls.set(calls.saturating_add(1));
        calls < self.updating_for.get()
    }
}

// ---------- レジストリ ----------

#[derive(Default)]
pub struct MockNet {
    pub adapters: RefCell<Vec<AdapterInfo>>,
    pub writes: RefCell<Vec<(String, String)>>,
    pub fail_instance_ids: RefCell<HashSet<String>>,
}

impl MockNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_adapter(&self, description: &str, instance_id: &str, address: &str) {
        self.adapters.borrow_mut().push(AdapterInfo {
            description: description.to_string(),
            instance_id: instance_id.to_string(),
            address: address.to_string(),
        });
    }
}

impl NetworkConfig for MockNet {
    fn up_ethernet_adapters(&self) -> Result<Vec<AdapterInfo>, DomainError> {
        Ok(self.adapters.borrow().clone())
    }

    fn set_network_address(&self, instance_id: &str, address: &str) -> Result<(), DomainError> {
        if self.fail_instance_ids.borrow().contains(instance_id) {
            return Err(DomainError::RegistryAccessDenied(format!(
                "simulated failure for {}",
                instance_id
            )));
        }
        self.writes
            .borrow_mut()
            .push((instance_id.to_string(), address.to_string()));
        Ok(())
    }
}

pub struct MockIdentity {
    pub guid: RefCell<Option<String>>,
    pub guid_read_fails: Cell<bool>,
    pub guid_write_fails: Cell<bool>,
    pub locations: Vec<KeyLocation>,
    pub missing: RefCell<HashSet<String>>,
    pub denied: RefCell<HashSet<String>>,
    pub deleted: RefCell<Vec<String>>,
}

impl MockIdentity {
    pub fn new(guid: Option<&str>) -> Self {
        Self {
            guid: RefCell::new(guid.map(|g| g.to_string())),
            guid_read_fails: Cell::new(false),
            guid_write_fails: Cell::new(false),
            locations: vec![
                KeyLocation::new(RegistryScope::CurrentUser, r"Software\Valve\Steam"),
                KeyLocation::new(RegistryScope::LocalMachine, r"SOFTWARE\Valve\Steam"),
                KeyLocation::new(RegistryScope::LocalMachine, r"SOFTWARE\WOW6432Node\Valve\Steam"),
            ],
            missing: RefCell::new(HashSet::new()),
            denied: RefCell::new(HashSet::new()),
            deleted: RefCell::new(Vec::new()),
        }
    }
}

impl MachineIdentity for MockIdentity {
    fn machine_guid(&self) -> Result<Option<String>, DomainError> {
        if self.guid_read_fails.get() {
            return Err(DomainError::RegistryAccessDenied("simulated read failure".into()));
        }
        Ok(self.guid.borrow().clone())
    }

    fn set_machine_guid(&self, guid: &str) -> Result<(), DomainError> {
        if self.guid_write_fails.get() {
            return Err(DomainError::RegistryAccessDenied("simulated write failure".into()));
        }
        *self.guid.borrow_mut() = Some(guid.to_string());
        Ok(())
    }

    fn client_key_locations(&self) -> Vec<KeyLocation> {
        self.locations.clone()
    }

    fn delete_key_tree(&self, location: &KeyLocation) -> Result<bool, DomainError> {
        if self.denied.borrow().contains(&location.path) {
            return Err(DomainError::RegistryAccessDenied(location.to_string()));
        }
        if self.missing.borrow().contains(&location.path) {
            return Ok(false);
        }
        self.deleted.borrow_mut().push(location.path.clone());
        Ok(true)
    }
}

pub struct MockDrives {
    pub drives: Vec<String>,
}

impl DriveEnum for MockDrives {
    fn logical_drives(&self) -> Vec<String> {
        self.drives.clone()
    }
}
