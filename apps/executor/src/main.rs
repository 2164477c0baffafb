//! kk-executor: Kirikae エンジンのエントリポイント。
//!
//! ホストUIから単発コマンドとして起動され、結果を標準出力のNDJSONで返す。
//! 照会系（パス取得・プロファイル取得・削除）は昇格なしで応答して終了し、
//! 変更系パイプラインは昇格を要求してから順に実行する。

use clap::Parser;
use kk_adapter_clock::ClockAdapter;
use kk_adapter_fs::{default_backup_root, FsAdapter};
use kk_adapter_process::ProcessAdapter;
use kk_adapter_registry::RegistryAdapter;
use kk_domain::model::{exit_codes, AccountId, AppId, EngineCommand, ProfileName};
use kk_domain::port::driven::{EventLog, InstallLocator};
use kk_domain::DomainError;
use kk_wire::JsonLogger;
use serde::Serialize;
use std::path::Path;

/// ホストUIとのワイヤ契約。フラグ名は従来のcamelCaseを維持する。
#[derive(Parser, Debug, Serialize)]
#[command(name = "kk-executor", about = "Kirikae privileged executor")]
struct Cli {
    /// インストールパスを取得して終了
    #[arg(long = "getSteamPath")]
    get_steam_path: bool,

    /// アクティブプロファイル名を取得して終了
    #[arg(long = "getSelectedProfile")]
    get_selected_profile: bool,

    /// クライアントのインストールパス
    #[arg(long = "steamPath")]
    steam_path: Option<String>,

    /// 切替前（名目上の現在）プロファイル名
    #[arg(long = "selectedProfileName")]
    selected_profile_name: Option<String>,

    /// 切替先プロファイル名
    #[arg(long = "newProfileName")]
    new_profile_name: Option<String>,

    /// 削除対象プロファイル名
    #[arg(long = "removeProfileName")]
    remove_profile_name: Option<String>,

    /// 削除対象アカウントID
    #[arg(long = "removeAccountId")]
    remove_account_id: Option<String>,

    /// 設定複製対象のアプリID（0で対象なし）
    #[arg(long = "appId", default_value = "0")]
    app_id: String,

    /// 複製元プロファイル名
    #[arg(long = "refProfileName")]
    ref_profile_name: Option<String>,

    /// 複製元アカウントID
    #[arg(long = "refAccountId")]
    ref_account_id: Option<String>,

    /// ボリュームシリアル書換ツールのパス
    #[arg(long = "toolPath")]
    tool_path: Option<String>,

    /// プロファイル切替を実行
    #[arg(long = "performUnlink")]
    perform_unlink: bool,

    /// 設定複製を実行
    #[arg(long = "autoCopySettings")]
    auto_copy_settings: bool,

    /// クライアントの全プロセスを終了
    #[arg(long = "terminateSteam")]
    terminate_steam: bool,

    /// ボリュームシリアルを書き換え
    #[arg(long = "changeHwid")]
    change_hwid: bool,

    /// 有線アダプターのMACアドレスをランダム化
    #[arg(long = "randomMacs")]
    random_macs: bool,

    /// クライアントのレジストリキーを削除
    #[arg(long = "cleanRegedit")]
    clean_regedit: bool,

    /// マシンGUIDを再生成
    #[arg(long = "changeMguid")]
    change_mguid: bool,

    /// クライアントサービスを起動
    #[arg(long = "startSteamService")]
    start_steam_service: bool,
}

impl Cli {
    fn into_command(self) -> EngineCommand {
        EngineCommand {
            get_steam_path: self.get_steam_path,
            get_selected_profile: self.get_selected_profile,
            steam_path: non_blank(self.steam_path),
            selected_profile_name: non_blank(self.selected_profile_name),
            new_profile_name: non_blank(self.new_profile_name),
            remove_profile_name: non_blank(self.remove_profile_name),
            remove_account_id: non_blank(self.remove_account_id),
            app_id: self.app_id,
            ref_profile_name: non_blank(self.ref_profile_name),
            ref_account_id: non_blank(self.ref_account_id),
            tool_path: non_blank(self.tool_path),
            perform_unlink: self.perform_unlink,
            auto_copy_settings: self.auto_copy_settings,
            terminate_steam: self.terminate_steam,
            change_hwid: self.change_hwid,
            random_macs: self.random_macs,
            clean_regedit: self.clean_regedit,
            change_mguid: self.change_mguid,
            start_steam_service: self.start_steam_service,
        }
    }
}

/// UIは未指定の値を空文字で渡すことがある
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 実行結果の終端レコード種別
enum Terminal {
    /// `{"success":true}`
    Success,
    /// 付加値つき成功（キーはワイヤ契約のcamelCase）
    SuccessWith(&'static str, String),
    /// 前提未充足などの `{"error":...}`（終了コードは0）
    Failure(String),
    /// 昇格のための再起動。出力は2番目のプロセスが担うため何も出さない
    Silent,
}

fn main() {
    let logger = JsonLogger::new();
    let cli = Cli::parse();
    let trace_line = serde_json::to_string(&cli).unwrap_or_default();
    let command = cli.into_command();

    let code = match run(&command, &trace_line, &logger) {
        Ok(Terminal::Success) => {
            kk_wire::emit_terminal(&kk_wire::success_record());
            exit_codes::SUCCESS
        }
        Ok(Terminal::SuccessWith(key, value)) => {
            kk_wire::emit_terminal(&kk_wire::success_record_with(key, &value));
            exit_codes::SUCCESS
        }
        Ok(Terminal::Failure(message)) => {
            kk_wire::emit_terminal(&kk_wire::error_record(&message));
            exit_codes::SUCCESS
        }
        Ok(Terminal::Silent) => exit_codes::SUCCESS,
        Err(err) => {
            // 最上位境界: 捕捉されなかったエラーは終端errorレコードに変換する
            kk_wire::emit_terminal(&kk_wire::error_record(&err.to_string()));
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}

fn run(
    command: &EngineCommand,
    trace_line: &str,
    log: &JsonLogger,
) -> Result<Terminal, DomainError> {
    let registry = RegistryAdapter::new();
    let fs = FsAdapter::new();
    let procs = ProcessAdapter::new();
    let clock = ClockAdapter::new();
    let backup_root = default_backup_root();

    // --- 照会・削除系は昇格なしで応答して終了する ---

    if command.get_steam_path {
        return Ok(match registry.install_path()? {
            Some(path) => Terminal::SuccessWith("steamPath", path),
            None => Terminal::Failure("Steam path not found.".into()),
        });
    }

    if command.get_selected_profile {
        if let Some(steam_path) = &command.steam_path {
            return Ok(
                match kk_engine::resolve_active_profile(&fs, log, Path::new(steam_path)) {
                    Some(profile) => Terminal::SuccessWith("currentProfile", profile),
                    None => Terminal::Failure("Failed to get selected profile.".into()),
                },
            );
        }
    }

    if let (Some(account_id), Some(profile_name)) =
        (&command.remove_account_id, &command.remove_profile_name)
    {
        let profile = ProfileName::new(profile_name.as_str())?;
        let account = AccountId::new(account_id.as_str())?;
        return Ok(
            if kk_engine::remove_account(&fs, log, &backup_root, &profile, &account) {
                Terminal::Success
            } else {
                Terminal::Failure(format!(
                    "Failed to remove account {} from profile {}.",
                    account, profile
                ))
            },
        );
    }

    if let Some(profile_name) = &command.remove_profile_name {
        let profile = ProfileName::new(profile_name.as_str())?;
        return Ok(
            if kk_engine::remove_profile(&fs, log, &backup_root, &profile) {
                Terminal::Success
            } else {
                Terminal::Failure(format!("Failed to remove profile {}.", profile))
            },
        );
    }

    // --- ここから変更系。昇格していなければ再起動して透過的に引き継ぐ ---

    #[cfg(windows)]
    {
        if !kk_adapter_process::is_admin() {
            log.trace("Not running as administrator, restarting with elevated privileges.");
            let args: Vec<String> = std::env::args().skip(1).collect();
            kk_adapter_process::relaunch_elevated(&args)?;
            return Ok(Terminal::Silent);
        }
    }

    log.trace(&format!("Starting executor with options: {}", trace_line));

    if command.terminate_steam {
        kk_engine::terminate_client(&procs, log);
    }

    if command.change_hwid {
        if let Some(tool_path) = &command.tool_path {
            kk_engine::randomize_volume_serials(
                &fs,
                &fs,
                &procs,
                &clock,
                log,
                Path::new(tool_path),
            );
        }
    }

    if command.random_macs {
        kk_engine::randomize_network_addresses(&registry, &clock, log);
    }

    if command.clean_regedit {
        kk_engine::purge_client_registry(&registry, log);
    }

    if command.change_mguid {
        kk_engine::reset_machine_guid(&registry, &clock, log);
    }

    if command.perform_unlink {
        if let (Some(steam_path), Some(previous), Some(target)) = (
            &command.steam_path,
            &command.selected_profile_name,
            &command.new_profile_name,
        ) {
            let previous = ProfileName::new(previous.as_str())?;
            let target = ProfileName::new(target.as_str())?;
            let actual = kk_engine::resolve_active_profile(&fs, log, Path::new(steam_path));
            kk_engine::switch_profile(
                &fs,
                log,
                Path::new(steam_path),
                &backup_root,
                &previous,
                &target,
                actual.as_deref(),
            )?;
        }
    }

    if command.start_steam_service {
        if let Some(steam_path) = &command.steam_path {
            kk_engine::start_client_service(&fs, &procs, log, Path::new(steam_path));
        }
    }

    if command.auto_copy_settings {
        if let (Some(ref_profile), Some(ref_account), Some(target_profile)) = (
            &command.ref_profile_name,
            &command.ref_account_id,
            &command.new_profile_name,
        ) {
            let app_id = AppId::new(command.app_id.as_str())?;
            let ref_profile = ProfileName::new(ref_profile.as_str())?;
            let ref_account = AccountId::new(ref_account.as_str())?;
            let target_profile = ProfileName::new(target_profile.as_str())?;
            kk_engine::replicate_settings(
                &fs,
                &registry,
                &procs,
                &procs,
                &clock,
                log,
                &backup_root,
                &app_id,
                &ref_profile,
                &ref_account,
                &target_profile,
            )?;
        }
    }

    // 切替を行った場合は、切替後に実際にアクティブなプロファイルを報告する
    let steam_path = match &command.steam_path {
        Some(path) if command.perform_unlink => path,
        _ => return Ok(Terminal::Success),
    };
    Ok(
        match kk_engine::resolve_active_profile(&fs, log, Path::new(steam_path)) {
            Some(profile) => Terminal::SuccessWith("selectedProfile", profile),
            None => Terminal::Failure("Failed to get selected profile.".into()),
        },
    )
}
