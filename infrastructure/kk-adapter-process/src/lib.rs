//! プロセス・起動・昇格アダプター
//!
//! Toolhelp32スナップショットによるプロセス列挙と親PID解決、
//! プロセス終了、URLスキーム起動、外部ツールの出力キャプチャ、
//! 管理者判定と runas 再起動を提供する。

use kk_domain::port::driven::{Launcher, ProcessControl, ProcessInfo};
use kk_domain::DomainError;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Default)]
pub struct ProcessAdapter;

impl ProcessAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for ProcessAdapter {
    fn processes(&self) -> Vec<ProcessInfo> {
        #[cfg(windows)]
        {
            windows_process::processes()
        }
        #[cfg(not(windows))]
        {
            Vec::new()
        }
    }

    fn parent_pid(&self, pid: u32) -> Option<u32> {
        #[cfg(windows)]
        {
            windows_process::parent_pid(pid)
        }
        #[cfg(not(windows))]
        {
            let _ = pid; // 非Windows用の未使用警告抑制
            None
        }
    }

    fn kill(&self, pid: u32) -> Result<(), DomainError> {
        #[cfg(windows)]
        {
            windows_process::kill(pid, 0)
        }
        #[cfg(not(windows))]
        {
            Err(DomainError::ProcessLaunchFailed(format!(
                "terminating pid {} is not supported on this platform",
                pid
            )))
        }
    }

    fn kill_and_wait(&self, pid: u32) -> Result<(), DomainError> {
        #[cfg(windows)]
        {
            // 終了しないプロセスで単発実行のエンジンを固めないよう待機は有限にする
            windows_process::kill(pid, 10_000)
        }
        #[cfg(not(windows))]
        {
            Err(DomainError::ProcessLaunchFailed(format!(
                "terminating pid {} is not supported on this platform",
                pid
            )))
        }
    }
}

impl Launcher for ProcessAdapter {
    fn open_url(&self, url: &str) -> Result<(), DomainError> {
        #[cfg(windows)]
        {
            windows_shell::open_url(url)
        }
        #[cfg(not(windows))]
        {
            Err(DomainError::ProcessLaunchFailed(format!(
                "URL launch is not supported on this platform: {}",
                url
            )))
        }
    }

    fn spawn_detached(&self, exe: &Path) -> Result<(), DomainError> {
        let mut command = Command::new(exe);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
            .spawn()
            .map(|_| ())
            .map_err(|e| DomainError::ProcessLaunchFailed(format!("{}: {}", exe.display(), e)))
    }

    fn run_capture(&self, exe: &Path, args: &[String]) -> Result<String, DomainError> {
        let mut command = Command::new(exe);
        command.args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command
            .output()
            .map_err(|e| DomainError::ProcessLaunchFailed(format!("{}: {}", exe.display(), e)))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// 現在のプロセスが管理者権限を持つか確認
pub fn is_admin() -> bool {
    #[cfg(windows)]
    {
        windows_admin::check_admin()
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// 同一の引数ベクタで自分自身を昇格要求付きで再起動する。
/// 呼び出し側は成功後に即座に終了コード0で終了すること
/// （以後の出力は2番目のプロセスが担う）。
#[cfg(windows)]
pub fn relaunch_elevated(args: &[String]) -> Result<(), DomainError> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let exe = std::env::current_exe()
        .map_err(|e| DomainError::ProcessLaunchFailed(format!("current_exe: {}", e)))?;

    fn wstr(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    let params = args
        .iter()
        .map(|arg| quote_windows_arg(OsStr::new(arg)))
        .collect::<Vec<_>>()
        .join(" ");

    let op = wstr(OsStr::new("runas"));
    let file = wstr(exe.as_os_str());
    let params_w = wstr(OsStr::new(&params));

    let result = unsafe {
        ShellExecuteW(
            None,
            PCWSTR(op.as_ptr()),
            PCWSTR(file.as_ptr()),
            PCWSTR(params_w.as_ptr()),
            PCWSTR::null(),
            SW_SHOWNORMAL,
        )
    };
    let code = result.0 as isize;
    if code <= 32 {
        return Err(DomainError::ProcessLaunchFailed(format!(
            "ShellExecuteW(runas) failed: {}",
            code
        )));
    }
    Ok(())
}

#[cfg(not(windows))]
pub fn relaunch_elevated(_args: &[String]) -> Result<(), DomainError> {
    Err(DomainError::ProcessLaunchFailed(
        "elevation is not supported on this platform".into(),
    ))
}

/// 空白・引用符を含む引数を再起動用に引用する
#[cfg_attr(not(windows), allow(dead_code))]
fn quote_windows_arg(arg: &std::ffi::OsStr) -> String {
    let s = arg.to_string_lossy();
    if s.contains([' ', '\t', '\n', '\r', '"']) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

#[cfg(windows)]
mod windows_shell {
    use super::*;
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    pub(super) fn open_url(url: &str) -> Result<(), DomainError> {
        let op: Vec<u16> = OsStr::new("open")
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let file: Vec<u16> = OsStr::new(url)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let result = unsafe {
            ShellExecuteW(
                None,
                PCWSTR(op.as_ptr()),
                PCWSTR(file.as_ptr()),
                PCWSTR::null(),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };
        let code = result.0 as isize;
        if code <= 32 {
            return Err(DomainError::ProcessLaunchFailed(format!(
                "ShellExecuteW failed for {}: {}",
                url, code
            )));
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
mod windows_admin {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::Security::{
        GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    pub fn check_admin() -> bool {
        unsafe {
            let mut token = windows::Win32::Foundation::HANDLE::default();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
                return false;
            }

            let mut elevation = TOKEN_ELEVATION::default();
            let mut return_length = 0u32;
            let result = GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut _),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut return_length,
            );

            let _ = CloseHandle(token);
            result.is_ok() && elevation.TokenIsElevated != 0
        }
    }
}

#[cfg(target_os = "windows")]
mod windows_process {
    use super::*;
    use windows::Win32::Foundation::{CloseHandle, WAIT_TIMEOUT};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_SYNCHRONIZE, PROCESS_TERMINATE, TerminateProcess,
        WaitForSingleObject,
    };

    struct HandleGuard(windows::Win32::Foundation::HANDLE);
    impl Drop for HandleGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// 現在の全プロセスのスナップショット
    pub fn processes() -> Vec<ProcessInfo> {
        let mut list = Vec::new();
        unsafe {
            let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
                return list;
            };
            let _guard = HandleGuard(snapshot);
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    list.push(ProcessInfo {
                        pid: entry.th32ProcessID,
                        name: wchar_to_string(&entry.szExeFile),
                    });
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
        }
        list
    }

    /// 指定PIDの親プロセスIDを取得
    pub fn parent_pid(pid: u32) -> Option<u32> {
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).ok()?;
            let _guard = HandleGuard(snapshot);
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    if entry.th32ProcessID == pid {
                        return Some(entry.th32ParentProcessID);
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            None
        }
    }

    /// プロセスを終了させる。`wait_ms > 0` なら終了を待つ。
    pub fn kill(pid: u32, wait_ms: u32) -> Result<(), DomainError> {
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE | PROCESS_SYNCHRONIZE, false, pid)
                .map_err(|e| {
                    DomainError::ProcessLaunchFailed(format!(
                        "OpenProcess({}) failed: {}",
                        pid,
                        e.message()
                    ))
                })?;
            let _guard = HandleGuard(handle);

            TerminateProcess(handle, 1).map_err(|e| {
                DomainError::ProcessLaunchFailed(format!(
                    "TerminateProcess({}) failed: {}",
                    pid,
                    e.message()
                ))
            })?;

            if wait_ms > 0 {
                let wait = WaitForSingleObject(handle, wait_ms);
                if wait == WAIT_TIMEOUT {
                    return Err(DomainError::Timeout(format!(
                        "process {} did not exit within {}ms",
                        pid, wait_ms
                    )));
                }
            }
        }
        Ok(())
    }

    fn wchar_to_string(wchar: &[u16]) -> String {
        let end = wchar.iter().position(|&c| c == 0).unwrap_or(wchar.len());
        String::from_utf16_lossy(&wchar[..end])
    }
}
