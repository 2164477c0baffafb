//! 設定複製ワークフロー。
//!
//! 対象アプリの設定は実行中のクライアントにもキャッシュされるため、
//! ファイルコピーだけでは完結しない。アプリをURLスキームで起動させ、
//! 起動完了を待ち、ゲームプロセスだけを終了させてからコピーし、
//! 最後に再起動してユーザーへ制御を返す。

use kk_domain::error::DomainError;
use kk_domain::model::{AccountId, AppId, ProfileName, LAUNCH_URL_PREFIX, USERDATA_SUBTREE};
use kk_domain::port::driven::{
    AppFlags, Clock, EventLog, Launcher, ProcessControl, ProcessInfo, ProfileFs,
};
use kk_domain::service::process_service;
use std::path::Path;

/// 起動待ちポーリング間隔
const POLL_INTERVAL_MS: u64 = 500;
/// 起動待ちの上限（秒）
const START_TIMEOUT_SECS: u64 = 180;
/// 起動待ちの総ティック数
const START_TICKS: u64 = START_TIMEOUT_SECS * 1000 / POLL_INTERVAL_MS;
/// 更新待ちの上限（秒）。起動待ち上限の3倍。
const UPDATE_TIMEOUT_SECS: u64 = START_TIMEOUT_SECS * 3;
/// 新規プロセス検出のリトライ回数
const DIFF_ATTEMPTS: u32 = 3;
/// ファイルコピーのリトライ上限
const COPY_ATTEMPTS: u32 = 10;
/// コピーリトライの待機（ミリ秒）
const COPY_RETRY_DELAY_MS: u64 = 1000;

/// 参照アカウントのアプリ設定を、対象プロファイル配下で同じアプリを
/// 持つ全アカウントへ複製する。
///
/// 前提条件を満たさない場合とタイムアウトは情報ログ付きの早期リターン
/// （非致命的）。コピーリトライの枯渇のみが致命的で、呼び出し元へ伝播する。
pub fn replicate_settings(
    fs: &impl ProfileFs,
    flags: &impl AppFlags,
    procs: &impl ProcessControl,
    launcher: &impl Launcher,
    clock: &impl Clock,
    log: &impl EventLog,
    backup_root: &Path,
    app_id: &AppId,
    ref_profile: &ProfileName,
    ref_account: &AccountId,
    target_profile: &ProfileName,
) -> Result<(), DomainError> {
    if app_id.is_none() {
        log.info("App ID is 0, skipping settings transfer.");
        return Ok(());
    }
    if target_profile == ref_profile {
        log.info("Profile names are the same, skipping settings transfer.");
        return Ok(());
    }

    let target_userdata = backup_root
        .join(target_profile.as_str())
        .join(USERDATA_SUBTREE);
    if !fs.dir_exists(&target_userdata) {
        log.info("New profile userdata directory does not exist, skipping settings transfer.");
        return Ok(());
    }
    let accounts = fs.list_subdirs(&target_userdata)?;
    if accounts.is_empty() {
        log.info("No account directories found in new profile userdata, skipping settings transfer.");
        return Ok(());
    }
    let game_known = accounts
        .iter()
        .any(|account| fs.dir_exists(&account.join(app_id.as_str())));
    if !game_known {
        log.info(&format!(
            "Game with ID {} does not exist in new profile userdata, skipping settings transfer.",
            app_id.as_str()
        ));
        return Ok(());
    }

    let snapshot = procs.processes();
    launch_app(launcher, log, app_id)?;

    if !wait_for_app(flags, clock, log, app_id.as_str()) {
        return Ok(());
    }

    if close_new_game_processes(procs, clock, log, &snapshot) {
        copy_settings(
            fs,
            clock,
            log,
            backup_root,
            app_id,
            ref_profile,
            ref_account,
            target_profile,
        )?;
        launch_app(launcher, log, app_id)?;
    }
    Ok(())
}

fn launch_app(
    launcher: &impl Launcher,
    log: &impl EventLog,
    app_id: &AppId,
) -> Result<(), DomainError> {
    launcher.open_url(&format!("{}{}", LAUNCH_URL_PREFIX, app_id.as_str()))?;
    log.info("Started app successfully.");
    Ok(())
}

/// Running フラグが立つまでポーリングする。更新中なら拡張ウィンドウで
/// 更新完了を待ち、どちらかのタイムアウトで false を返す（ログ済み）。
fn wait_for_app(
    flags: &impl AppFlags,
    clock: &impl Clock,
    log: &impl EventLog,
    app_id: &str,
) -> bool {
    for tick in 0..START_TICKS {
        if tick % 20 == 0 {
            log.info(&format!(
                "Waiting for app to start ({}/{})",
                tick * POLL_INTERVAL_MS / 1000,
                START_TIMEOUT_SECS
            ));
        }
        clock.sleep_ms(POLL_INTERVAL_MS);
        if flags.is_updating(app_id) && !wait_for_update(flags, clock, log, app_id) {
            return false;
        }
        if flags.is_running(app_id) {
            return true;
        }
    }
    log.error(&format!(
        "App did not start within the period ({0}/{0})",
        START_TIMEOUT_SECS
    ));
    false
}

fn wait_for_update(
    flags: &impl AppFlags,
    clock: &impl Clock,
    log: &impl EventLog,
    app_id: &str,
) -> bool {
    for second in 0..UPDATE_TIMEOUT_SECS {
        if !flags.is_updating(app_id) {
            log.info("App updated successfully.");
            return true;
        }
        if second % 10 == 0 {
            log.info(&format!(
                "Waiting for app to update ({}/{} seconds)",
                second, UPDATE_TIMEOUT_SECS
            ));
        }
        clock.sleep_ms(1000);
    }
    if flags.is_updating(app_id) {
        log.error(&format!(
            "App is still updating after {} seconds",
            UPDATE_TIMEOUT_SECS
        ));
        return false;
    }
    log.info("App updated successfully.");
    true
}

/// スナップショットに無かったプロセスのうち、クライアントのメイン
/// プロセスを親に持つゲームプロセスを終了させる。
/// 何も終了できなければ false（コピーしてはならない）。
fn close_new_game_processes(
    procs: &impl ProcessControl,
    clock: &impl Clock,
    log: &impl EventLog,
    snapshot: &[ProcessInfo],
) -> bool {
    let mut fresh: Vec<ProcessInfo> = Vec::new();
    for attempt in 0..DIFF_ATTEMPTS {
        fresh = process_service::new_processes(snapshot, &procs.processes());
        if !fresh.is_empty() {
            break;
        }
        log.info(&format!(
            "Waiting for new processes to start ({}/{} seconds)",
            attempt + 1,
            DIFF_ATTEMPTS
        ));
        clock.sleep_ms(1000);
    }
    if fresh.is_empty() {
        log.warn("No new processes found.");
        return false;
    }

    let client_pid = procs
        .processes()
        .iter()
        .find(|p| process_service::is_client_main(&p.name))
        .map(|p| p.pid);

    let mut closed = false;
    for process in fresh {
        if process_service::is_client_process(&process.name) {
            continue;
        }
        let parent = procs.parent_pid(process.pid);
        if parent.is_none() || parent != client_pid {
            continue;
        }
        match procs.kill(process.pid) {
            Ok(()) => {
                log.trace(&format!("Killed process: {}", process.name));
                closed = true;
            }
            Err(err) => log.info(&format!(
                "Error terminating process {}: {}",
                process.pid, err
            )),
        }
    }

    if closed {
        log.info("App closed successfully.");
    } else {
        log.warn("Failed to find app.");
    }
    closed
}

fn copy_settings(
    fs: &impl ProfileFs,
    clock: &impl Clock,
    log: &impl EventLog,
    backup_root: &Path,
    app_id: &AppId,
    ref_profile: &ProfileName,
    ref_account: &AccountId,
    target_profile: &ProfileName,
) -> Result<(), DomainError> {
    let source = backup_root
        .join(ref_profile.as_str())
        .join(USERDATA_SUBTREE)
        .join(ref_account.as_str())
        .join(app_id.as_str());
    if !fs.dir_exists(&source) {
        return Ok(());
    }

    let target_userdata = backup_root
        .join(target_profile.as_str())
        .join(USERDATA_SUBTREE);
    for account in fs.list_subdirs(&target_userdata)? {
        let destination = account.join(app_id.as_str());
        if !fs.dir_exists(&destination) {
            continue;
        }
        copy_dir_with_retry(fs, clock, log, &source, &destination)?;
    }
    Ok(())
}

/// ディレクトリを再帰コピーする。個々のファイルはI/Oエラー時に
/// 1秒間隔で最大10回リトライし、枯渇したら全体を致命的エラーにする
/// （ゲーム自身やアンチウイルスが一時的にロックを握ることがある）。
fn copy_dir_with_retry(
    fs: &impl ProfileFs,
    clock: &impl Clock,
    log: &impl EventLog,
    source: &Path,
    destination: &Path,
) -> Result<(), DomainError> {
    if source
        .to_string_lossy()
        .eq_ignore_ascii_case(&destination.to_string_lossy())
    {
        return Ok(());
    }
    fs.ensure_dir(destination)?;

    for file in fs.list_files(source)? {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = destination.join(name);
        let mut attempts = 0u32;
        loop {
            match fs.copy_file(&file, &target) {
                Ok(()) => {
                    if attempts > 0 {
                        log.info(&format!(
                            "Successfully copied {} after {} attempts.",
                            name.to_string_lossy(),
                            attempts
                        ));
                    }
                    break;
                }
                Err(err) => {
                    attempts += 1;
                    log.trace(&format!(
                        "Attempt {} failed to copy {}: {}",
                        attempts,
                        name.to_string_lossy(),
                        err
                    ));
                    if attempts >= COPY_ATTEMPTS {
                        return Err(DomainError::CopyRetriesExhausted {
                            file: name.to_string_lossy().into_owned(),
                            attempts: COPY_ATTEMPTS,
                        });
                    }
                    clock.sleep_ms(COPY_RETRY_DELAY_MS);
                }
            }
        }
    }

    for subdir in fs.list_subdirs(source)? {
        let Some(name) = subdir.file_name() else {
            continue;
        };
        copy_dir_with_retry(fs, clock, log, &subdir, &destination.join(name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockClock, MockFlags, MockFs, MockLauncher, MockLog, MockProcs};
    use std::path::PathBuf;

    fn backup() -> PathBuf {
        PathBuf::from("/backup")
    }

    fn app() -> AppId {
        AppId::new("730").unwrap()
    }

    fn profile(name: &str) -> ProfileName {
        ProfileName::new(name).unwrap()
    }

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn proc(pid: u32, name: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
        }
    }

    /// 複製先に2アカウント、複製元に設定ファイルを用意する
    fn seed_profiles(fs: &MockFs) {
        fs.add_file(backup().join("main/userdata/100/730/cfg/video.cfg"), b"ref-video");
        fs.add_file(backup().join("main/userdata/100/730/local.cfg"), b"ref-local");
        fs.add_file(backup().join("alt/userdata/111/730/local.cfg"), b"old-a");
        fs.add_file(backup().join("alt/userdata/222/730/local.cfg"), b"old-b");
        // このアカウントは対象アプリを持たないため対象外
        fs.add_dir(backup().join("alt/userdata/333/440"));
    }

    fn run(
        fs: &MockFs,
        flags: &MockFlags,
        procs: &MockProcs,
        launcher: &MockLauncher,
        clock: &MockClock,
        log: &MockLog,
    ) -> Result<(), DomainError> {
        replicate_settings(
            fs,
            flags,
            procs,
            launcher,
            clock,
            log,
            &backup(),
            &app(),
            &profile("main"),
            &account("100"),
            &profile("alt"),
        )
    }

    #[test]
    fn sentinel_app_id_short_circuits() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        let none = AppId::new("0").unwrap();
        replicate_settings(
            &fs, &flags, &procs, &launcher, &clock, &log,
            &backup(), &none, &profile("main"), &account("100"), &profile("alt"),
        )
        .unwrap();
        assert!(launcher.urls.borrow().is_empty());
        assert!(log.contains("info", "App ID is 0"));
    }

    #[test]
    fn identical_profiles_short_circuit() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        replicate_settings(
            &fs, &flags, &procs, &launcher, &clock, &log,
            &backup(), &app(), &profile("main"), &account("100"), &profile("main"),
        )
        .unwrap();
        assert!(launcher.urls.borrow().is_empty());
        assert!(log.contains("info", "Profile names are the same"));
    }

    #[test]
    fn missing_userdata_short_circuits() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();
        assert!(launcher.urls.borrow().is_empty());
        assert!(log.contains("info", "userdata directory does not exist"));
    }

    #[test]
    fn no_accounts_short_circuits() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        fs.add_dir(backup().join("alt/userdata"));
        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();
        assert!(launcher.urls.borrow().is_empty());
        assert!(log.contains("info", "No account directories"));
    }

    #[test]
    fn game_never_played_on_target_short_circuits() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        fs.add_dir(backup().join("alt/userdata/111/440"));
        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();
        assert!(launcher.urls.borrow().is_empty());
        assert!(log.contains("info", "does not exist in new profile userdata"));
    }

    #[test]
    fn update_never_clearing_aborts_without_copy() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        flags.updating_for.set(u32::MAX);
        flags.running_after.set(u32::MAX);
        procs.push_phase(vec![proc(1, "steam.exe")]);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        // 起動要求は1回だけ。再起動もコピーも行われない
        assert_eq!(launcher.urls.borrow().len(), 1);
        assert!(log.contains("error", "still updating"));
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"old-a".to_vec())
        );
        assert!(procs.killed.borrow().is_empty());
    }

    #[test]
    fn app_never_starting_aborts_without_copy() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        flags.running_after.set(u32::MAX);
        procs.push_phase(vec![proc(1, "steam.exe")]);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        assert_eq!(launcher.urls.borrow().len(), 1);
        assert!(log.contains("error", "did not start within the period"));
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"old-a".to_vec())
        );
        // 外側ポーリングは0.5秒刻みで上限まで回った
        assert!(clock.total_slept_ms() >= START_TIMEOUT_SECS * 1000);
    }

    #[test]
    fn no_new_process_aborts_without_copy() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        // スナップショットと同じプロセスしか現れない
        procs.push_phase(vec![proc(1, "steam.exe")]);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        assert!(log.contains("warn", "No new processes found."));
        assert_eq!(launcher.urls.borrow().len(), 1);
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"old-a".to_vec())
        );
    }

    #[test]
    fn helper_children_are_not_killed() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        // 新規プロセスはWebヘルパーと、steam以外を親に持つプロセスのみ
        procs.push_phase(vec![proc(1, "steam.exe")]);
        procs.push_phase(vec![
            proc(1, "steam.exe"),
            proc(6, "steamwebhelper.exe"),
            proc(7, "updater.exe"),
        ]);
        procs.set_parent(6, 1);
        procs.set_parent(7, 99);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        assert!(procs.killed.borrow().is_empty());
        assert!(log.contains("warn", "Failed to find app."));
        // コピーは行われない
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"old-a".to_vec())
        );
    }

    #[test]
    fn successful_replication_copies_to_all_owning_accounts() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        procs.push_phase(vec![proc(1, "steam.exe")]);
        procs.push_phase(vec![
            proc(1, "steam.exe"),
            proc(5, "game.exe"),
            proc(6, "steamwebhelper.exe"),
        ]);
        procs.set_parent(5, 1);
        procs.set_parent(6, 1);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        // ゲームプロセスだけが終了された
        assert_eq!(*procs.killed.borrow(), vec![5]);
        // 対象アプリを持つ両アカウントに複製（サブディレクトリも再帰）
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"ref-local".to_vec())
        );
        assert_eq!(
            fs.file_content("/backup/alt/userdata/222/730/local.cfg"),
            Some(b"ref-local".to_vec())
        );
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/cfg/video.cfg"),
            Some(b"ref-video".to_vec())
        );
        // アプリを持たないアカウントには作られない
        assert!(fs.file_content("/backup/alt/userdata/333/730/local.cfg").is_none());
        // 最後に再起動された
        assert_eq!(launcher.urls.borrow().len(), 2);
        assert_eq!(launcher.urls.borrow()[0], "steam://rungameid/730");
        assert!(log.contains("info", "App closed successfully."));
    }

    #[test]
    fn transient_copy_failures_are_retried() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        procs.push_phase(vec![proc(1, "steam.exe")]);
        procs.push_phase(vec![proc(1, "steam.exe"), proc(5, "game.exe")]);
        procs.set_parent(5, 1);
        fs.copy_failures
            .borrow_mut()
            .insert(backup().join("main/userdata/100/730/local.cfg"), 2);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        assert!(log.contains("info", "Successfully copied local.cfg after 2 attempts."));
        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"ref-local".to_vec())
        );
    }

    #[test]
    fn exhausted_copy_retries_are_fatal() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        seed_profiles(&fs);
        procs.push_phase(vec![proc(1, "steam.exe")]);
        procs.push_phase(vec![proc(1, "steam.exe"), proc(5, "game.exe")]);
        procs.set_parent(5, 1);
        fs.copy_failures
            .borrow_mut()
            .insert(backup().join("main/userdata/100/730/local.cfg"), u32::MAX);

        let result = run(&fs, &flags, &procs, &launcher, &clock, &log);

        assert!(matches!(
            result,
            Err(DomainError::CopyRetriesExhausted { attempts: 10, .. })
        ));
        // 失敗後に再起動はしない
        assert_eq!(launcher.urls.borrow().len(), 1);
    }

    #[test]
    fn missing_reference_source_is_a_quiet_noop_copy() {
        let (fs, flags, procs, launcher, clock, log) = fixtures();
        // 対象側にはアプリがあるが、参照元アカウントにアプリのデータが無い
        fs.add_file(backup().join("alt/userdata/111/730/local.cfg"), b"old-a");
        fs.add_dir(backup().join("main/userdata/100"));
        procs.push_phase(vec![proc(1, "steam.exe")]);
        procs.push_phase(vec![proc(1, "steam.exe"), proc(5, "game.exe")]);
        procs.set_parent(5, 1);

        run(&fs, &flags, &procs, &launcher, &clock, &log).unwrap();

        assert_eq!(
            fs.file_content("/backup/alt/userdata/111/730/local.cfg"),
            Some(b"old-a".to_vec())
        );
        // プロセスは閉じられ、再起動もされる（コピーが空なだけ）
        assert_eq!(*procs.killed.borrow(), vec![5]);
        assert_eq!(launcher.urls.borrow().len(), 2);
    }

    fn fixtures() -> (MockFs, MockFlags, MockProcs, MockLauncher, MockClock, MockLog) {
        (
            MockFs::new(),
            MockFlags::new(),
            MockProcs::new(),
            MockLauncher::new(),
            MockClock::new(),
            MockLog::new(),
        )
    }
}
