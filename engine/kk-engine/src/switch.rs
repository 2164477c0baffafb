//! プロファイル切替ワークフロー。
//!
//! ライブインストール直下の固定サブツリーを、選択プロファイルの
//! バックアップコピーへのリパースリンクに差し替える。どの遷移でも
//! データを暗黙に失わないことが不変条件。

use kk_domain::error::DomainError;
use kk_domain::model::{AccountId, ProfileName, BACKUP_SUBTREES, CONFIG_SUBTREE, USERDATA_SUBTREE};
use kk_domain::port::driven::{EventLog, ProfileFs};
use kk_domain::service::path_service;
use std::path::Path;

/// 切替開始時にライブ状態から一度だけ計算する整合性状態。
/// 名目上の「前プロファイル」と実際のアクティブプロファイルが食い違う場合、
/// 以前の切替が本経路を通らずに中断したことを意味する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Consistent,
    Diverged,
}

impl SwitchState {
    pub fn classify(previous: &ProfileName, actual_current: Option<&str>) -> Self {
        match actual_current {
            Some(actual) if actual == previous.as_str() => Self::Consistent,
            _ => Self::Diverged,
        }
    }
}

/// ライブサブツリーを `previous` のバックアップへ退避し、`target` の
/// バックアップへのリンクに差し替える。
///
/// 移動の失敗は切替全体として致命的（部分状態を隠さない）。
/// リンク作成の失敗は警告に留め、残りのサブツリーを続行する。
pub fn switch_profile(
    fs: &impl ProfileFs,
    log: &impl EventLog,
    install_path: &Path,
    backup_root: &Path,
    previous: &ProfileName,
    target: &ProfileName,
    actual_current: Option<&str>,
) -> Result<(), DomainError> {
    let state = SwitchState::classify(previous, actual_current);
    let previous_root = backup_root.join(previous.as_str());
    let target_root = backup_root.join(target.as_str());

    fs.ensure_dir(&previous_root)?;
    fs.ensure_dir(&target_root)?;

    for subtree in BACKUP_SUBTREES {
        let live = install_path.join(subtree);
        let previous_backup = previous_root.join(subtree);
        let target_backup = target_root.join(subtree);

        if state == SwitchState::Diverged && fs.is_reparse_link(&live) {
            // 中断された切替が残したリンク。リンク先のツリーを previous の
            // ものとして温存してはならないため、先に削除する。
            match fs.resolve_real_path(&live) {
                Ok(stale) if fs.dir_exists(&stale) => fs.remove_tree(&stale)?,
                _ => {}
            }
        }

        if fs.is_reparse_link(&live) {
            log.trace(&format!(
                "{} is a reparse link. Replacing it with actual one",
                live.display()
            ));
            fs.remove_link(&live)?;
        } else {
            log.info(&format!(
                "Backing up {} to {}",
                subtree,
                previous_backup.display()
            ));
            if fs.dir_exists(&previous_backup) {
                fs.remove_tree(&previous_backup)?;
            }
            fs.ensure_dir(&live)?;
            if let Err(err) = fs.move_dir(&live, &previous_backup) {
                log.error(&format!(
                    "Error while moving {} -> {}: {}",
                    live.display(),
                    previous_backup.display(),
                    err
                ));
                return Err(err);
            }
        }

        // リンクを張る前にリンク先を必ず作る（ぶら下がりリンク禁止）
        fs.ensure_dir(&target_backup)?;
        match fs.create_dir_link(&live, &target_backup) {
            Ok(()) => log.trace(&format!(
                "Linked {} -> {}",
                live.display(),
                target_backup.display()
            )),
            Err(err) => log.warn(&format!(
                "Failed to create link for {}: {}",
                live.display(),
                err
            )),
        }
    }

    log.info("Backup completed.");
    Ok(())
}

/// ライブの config サブツリーの実パスから、実際にアクティブな
/// プロファイル名を解決する。外部に保存された選択状態より常に優先される。
pub fn resolve_active_profile(
    fs: &impl ProfileFs,
    log: &impl EventLog,
    install_path: &Path,
) -> Option<String> {
    let config = install_path.join(CONFIG_SUBTREE);
    if !fs.dir_exists(&config) {
        return None;
    }
    match fs.resolve_real_path(&config) {
        Ok(real) => path_service::profile_from_real_path(&real),
        Err(err) => {
            log.error(&format!("Failed to get selected profile: {}", err));
            None
        }
    }
}

/// プロファイルのバックアップルートを丸ごと削除する。
pub fn remove_profile(
    fs: &impl ProfileFs,
    log: &impl EventLog,
    backup_root: &Path,
    name: &ProfileName,
) -> bool {
    let profile_root = backup_root.join(name.as_str());
    if !fs.dir_exists(&profile_root) {
        log.warn(&format!(
            "Profile backup directory {} does not exist.",
            profile_root.display()
        ));
        return false;
    }
    match fs.remove_tree(&profile_root) {
        Ok(()) => {
            log.info(&format!(
                "Removed profile backup directory: {}",
                profile_root.display()
            ));
            true
        }
        Err(err) => {
            log.error(&format!(
                "Failed to remove profile backup directory {}: {}",
                profile_root.display(),
                err
            ));
            false
        }
    }
}

/// プロファイル配下の1アカウントのサブツリーを削除する。
pub fn remove_account(
    fs: &impl ProfileFs,
    log: &impl EventLog,
    backup_root: &Path,
    profile: &ProfileName,
    account: &AccountId,
) -> bool {
    let account_root = backup_root
        .join(profile.as_str())
        .join(USERDATA_SUBTREE)
        .join(account.as_str());
    if !fs.dir_exists(&account_root) {
        log.warn(&format!(
            "Account directory {} does not exist in profile {}.",
            account_root.display(),
            profile.as_str()
        ));
        return false;
    }
    match fs.remove_tree(&account_root) {
        Ok(()) => {
            log.info(&format!(
                "Removed account {} from profile {}.",
                account.as_str(),
                profile.as_str()
            ));
            true
        }
        Err(err) => {
            log.error(&format!(
                "Failed to remove account {} from profile {}: {}",
                account.as_str(),
                profile.as_str(),
                err
            ));
            false
        }
    }
}
