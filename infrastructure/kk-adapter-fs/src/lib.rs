//! ファイルシステムアダプター（プロファイル仮想化の下回り）
//!
//! ディレクトリリンクの作成・判定・実パス解決と、退避に使う移動・
//! 再帰削除・コピー、論理ドライブ列挙を提供する。
//! Windowsではリパースポイント属性とGetFinalPathNameByHandleWを使い、
//! それ以外ではシンボリックリンクで同じ契約を満たす。

use kk_domain::port::driven::{DriveEnum, ProfileFs};
use kk_domain::DomainError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct FsAdapter;

impl FsAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ProfileFs for FsAdapter {
    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_reparse_link(&self, path: &Path) -> bool {
        #[cfg(windows)]
        {
            use std::os::windows::fs::MetadataExt;
            const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0400;
            match fs::symlink_metadata(path) {
                Ok(meta) => meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0,
                Err(_) => false,
            }
        }
        #[cfg(not(windows))]
        {
            fs::symlink_metadata(path)
                .map(|meta| meta.file_type().is_symlink())
                .unwrap_or(false)
        }
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), DomainError> {
        fs::create_dir_all(path)
            .map_err(|e| DomainError::IoError(format!("create_dir_all {}: {}", path.display(), e)))
    }

    fn remove_tree(&self, path: &Path) -> Result<(), DomainError> {
        fs::remove_dir_all(path)
            .map_err(|e| DomainError::IoError(format!("remove_dir_all {}: {}", path.display(), e)))
    }

    fn remove_link(&self, path: &Path) -> Result<(), DomainError> {
        // ディレクトリリンクはリンクオブジェクトのみ消す（リンク先は残す）
        #[cfg(windows)]
        {
            fs::remove_dir(path)
                .map_err(|e| DomainError::IoError(format!("remove link {}: {}", path.display(), e)))
        }
        #[cfg(not(windows))]
        {
            fs::remove_file(path)
                .map_err(|e| DomainError::IoError(format!("remove link {}: {}", path.display(), e)))
        }
    }

    fn move_dir(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        fs::rename(from, to).map_err(|e| {
            DomainError::IoError(format!(
                "move {} -> {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })
    }

    fn create_dir_link(&self, link: &Path, target: &Path) -> Result<(), DomainError> {
        #[cfg(windows)]
        {
            windows_impl::create_dir_link(link, target)
        }
        #[cfg(not(windows))]
        {
            std::os::unix::fs::symlink(target, link).map_err(|e| {
                DomainError::IoError(format!(
                    "link {} -> {}: {}",
                    link.display(),
                    target.display(),
                    e
                ))
            })
        }
    }

    fn resolve_real_path(&self, path: &Path) -> Result<PathBuf, DomainError> {
        #[cfg(windows)]
        {
            windows_impl::resolve_real_path(path)
        }
        #[cfg(not(windows))]
        {
            fs::canonicalize(path)
                .map_err(|e| DomainError::IoError(format!("canonicalize {}: {}", path.display(), e)))
        }
    }

    fn list_subdirs(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError> {
        let entries = fs::read_dir(path)
            .map_err(|e| DomainError::IoError(format!("read_dir {}: {}", path.display(), e)))?;
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| DomainError::IoError(format!("read_dir {}: {}", path.display(), e)))?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError> {
        let entries = fs::read_dir(path)
            .map_err(|e| DomainError::IoError(format!("read_dir {}: {}", path.display(), e)))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| DomainError::IoError(format!("read_dir {}: {}", path.display(), e)))?;
            if entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        fs::copy(from, to).map(|_| ()).map_err(|e| {
            DomainError::IoError(format!(
                "copy {} -> {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })
    }
}

impl DriveEnum for FsAdapter {
    fn logical_drives(&self) -> Vec<String> {
        #[cfg(windows)]
        {
            windows_impl::logical_drives()
        }
        #[cfg(not(windows))]
        {
            Vec::new()
        }
    }
}

/// プロファイルバックアップの既定ルート。
/// Windowsでは Roaming AppData 配下、それ以外では HOME 配下に置く。
pub fn default_backup_root() -> PathBuf {
    #[cfg(windows)]
    {
        windows_impl::roaming_app_data()
            .unwrap_or_else(|| {
                let base = std::env::var("APPDATA").unwrap_or_else(|_| r"C:\Users".to_string());
                PathBuf::from(base)
            })
            .join("Kirikae")
            .join("profiles")
    }
    #[cfg(not(windows))]
    {
        let base = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        base.join(".local")
            .join("share")
            .join("Kirikae")
            .join("profiles")
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, CreateSymbolicLinkW, FILE_FLAG_BACKUP_SEMANTICS, FILE_NAME_NORMALIZED,
        FILE_SHARE_READ, FILE_SHARE_WRITE, GetFinalPathNameByHandleW, GetLogicalDriveStringsW,
        OPEN_EXISTING, SYMBOLIC_LINK_FLAG_DIRECTORY,
    };

    fn to_wide(path: &Path) -> Vec<u16> {
        let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        wide.push(0);
        wide
    }

    pub(super) fn create_dir_link(link: &Path, target: &Path) -> Result<(), DomainError> {
        let link_w = to_wide(link);
        let target_w = to_wide(target);
        let ok = unsafe {
            CreateSymbolicLinkW(
                PCWSTR(link_w.as_ptr()),
                PCWSTR(target_w.as_ptr()),
                SYMBOLIC_LINK_FLAG_DIRECTORY,
            )
        };
        if ok.as_bool() {
            Ok(())
        } else {
            Err(DomainError::IoError(format!(
                "CreateSymbolicLinkW failed for {} -> {}",
                link.display(),
                target.display()
            )))
        }
    }

    pub(super) fn resolve_real_path(path: &Path) -> Result<PathBuf, DomainError> {
        if !path.exists() {
            return Err(DomainError::IoError("Path not found".into()));
        }

        let path_w = to_wide(path);
        let handle = unsafe {
            CreateFileW(
                PCWSTR(path_w.as_ptr()),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS, // ディレクトリハンドルにも必要
                None,
            )
        }
        .map_err(|e| DomainError::IoError(format!("CreateFileW failed: {}", e.message())))?;

        struct HandleGuard(windows::Win32::Foundation::HANDLE);
        impl Drop for HandleGuard {
            fn drop(&mut self) {
                unsafe {
                    let _ = CloseHandle(self.0);
                }
            }
        }
        let _guard = HandleGuard(handle);

        let mut buffer: Vec<u16> = vec![0u16; 512];
        loop {
            let len = unsafe { GetFinalPathNameByHandleW(handle, &mut buffer, FILE_NAME_NORMALIZED) };
            if len == 0 {
                return Err(DomainError::IoError(
                    "GetFinalPathNameByHandleW failed".into(),
                ));
            }
            let len = len as usize;
            if len >= buffer.len() {
                buffer.resize(len + 1, 0);
                continue;
            }
            let raw = String::from_utf16_lossy(&buffer[..len]);
            // 返り値の "\\?\" デバイスプレフィックスは除去する
            let cleaned = raw.strip_prefix(r"\\?\").unwrap_or(&raw).to_string();
            return Ok(PathBuf::from(cleaned));
        }
    }

    pub(super) fn logical_drives() -> Vec<String> {
        let mut buffer: Vec<u16> = vec![0u16; 260];
        let len = unsafe { GetLogicalDriveStringsW(Some(buffer.as_mut_slice())) } as usize;
        if len == 0 || len > buffer.len() {
            return Vec::new();
        }
        // "C:\\\0D:\\\0\0" 形式のダブルnull終端リストを分解する
        buffer[..len]
            .split(|c| *c == 0)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| String::from_utf16_lossy(chunk))
            .collect()
    }

    pub(super) fn roaming_app_data() -> Option<PathBuf> {
        use windows::core::PWSTR;
        use windows::Win32::System::Com::CoTaskMemFree;
        use windows::Win32::UI::Shell::{
            FOLDERID_RoamingAppData, KF_FLAG_DEFAULT, SHGetKnownFolderPath,
        };

        unsafe {
            let raw: PWSTR = SHGetKnownFolderPath(&FOLDERID_RoamingAppData, KF_FLAG_DEFAULT, None).ok()?;
            let s = pwstr_to_string(raw);
            CoTaskMemFree(Some(raw.0 as _));
            if s.is_empty() {
                None
            } else {
                Some(PathBuf::from(s))
            }
        }
    }

    #[cfg(windows)]
    fn pwstr_to_string(pwstr: windows::core::PWSTR) -> String {
        unsafe {
            if pwstr.is_null() {
                return String::new();
            }
            let mut len = 0usize;
            while *pwstr.0.add(len) != 0 {
                len += 1;
            }
            let slice = std::slice::from_raw_parts(pwstr.0, len);
            String::from_utf16_lossy(slice)
        }
    }
}
