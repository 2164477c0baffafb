//! プロセス判定サービス
//!
//! スナップショット差分と、クライアント自身のプロセス名判定。

use crate::model::{CLIENT_PROCESS, CLIENT_WEB_HELPER};
use crate::port::driven::ProcessInfo;
use std::collections::HashSet;

/// プロセス名を比較用に正規化する（小文字化し `.exe` を除去）。
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    match lower.strip_suffix(".exe") {
        Some(base) => base.to_string(),
        None => lower,
    }
}

/// スナップショットに存在しなかったプロセスを返す。
pub fn new_processes(snapshot: &[ProcessInfo], current: &[ProcessInfo]) -> Vec<ProcessInfo> {
    let known: HashSet<u32> = snapshot.iter().map(|p| p.pid).collect();
    current
        .iter()
        .filter(|p| !known.contains(&p.pid))
        .cloned()
        .collect()
}

/// クライアントのメインプロセスか。
pub fn is_client_main(name: &str) -> bool {
    normalize_process_name(name) == CLIENT_PROCESS
}

/// クライアント自身のプロセス（メインまたはWebヘルパー）か。
/// これらは設定複製時の終了対象から除外する。
pub fn is_client_process(name: &str) -> bool {
    let normalized = normalize_process_name(name);
    normalized == CLIENT_PROCESS || normalized == CLIENT_WEB_HELPER
}

/// クライアント名を含むプロセスか（クライアント全終了の対象判定）。
pub fn name_contains_client(name: &str) -> bool {
    normalize_process_name(name).contains(CLIENT_PROCESS)
}
