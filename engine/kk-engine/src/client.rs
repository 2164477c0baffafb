//! クライアントプロセス制御ワークフロー。

use kk_domain::model::CLIENT_EXE;
use kk_domain::port::driven::{EventLog, Launcher, ProcessControl, ProfileFs};
use kk_domain::service::process_service;
use std::path::Path;

/// クライアント名を含む全プロセスを終了し、終了を待つ。
/// プロセス毎の失敗は警告のみ。
pub fn terminate_client(procs: &impl ProcessControl, log: &impl EventLog) {
    for process in procs.processes() {
        if !process_service::name_contains_client(&process.name) {
            continue;
        }
        log.trace(&format!(
            "Terminating: {} (ID: {})",
            process.name, process.pid
        ));
        if let Err(err) = procs.kill_and_wait(process.pid) {
            log.warn(&format!(
                "Can't terminate process {}: {}",
                process.name, err
            ));
        }
    }
    log.info("Terminated Steam.");
}

/// インストールパス配下のクライアント実行ファイルをデタッチ起動する。
pub fn start_client_service(
    fs: &impl ProfileFs,
    launcher: &impl Launcher,
    log: &impl EventLog,
    install_path: &Path,
) {
    let exe = install_path.join(CLIENT_EXE);
    if !fs.file_exists(&exe) {
        log.error("Cannot find steam.exe");
        return;
    }
    match launcher.spawn_detached(&exe) {
        Ok(()) => log.info("Started Steam service."),
        Err(err) => log.error(&format!("Failed to start steam.exe: {}", err)),
    }
}

/// パスがクライアントのインストールディレクトリとして妥当か。
pub fn is_install_path_valid(fs: &impl ProfileFs, install_path: &Path) -> bool {
    fs.file_exists(&install_path.join(CLIENT_EXE))
}
