//! プロセス制御ポート

use crate::DomainError;

/// スナップショットに現れるプロセス情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// 実行ファイル名（例: `steam.exe`）
    pub name: String,
}

/// プロセスの列挙・親子関係の解決・終了。
pub trait ProcessControl {
    /// 現在のプロセス一覧のスナップショット
    fn processes(&self) -> Vec<ProcessInfo>;

    /// 直接の親プロセスID。取得できなければ `None`。
    fn parent_pid(&self, pid: u32) -> Option<u32>;

    /// プロセスを終了させる（終了待ちはしない）
    fn kill(&self, pid: u32) -> Result<(), DomainError>;

    /// プロセスを終了させ、終了を待つ
    fn kill_and_wait(&self, pid: u32) -> Result<(), DomainError>;
}
