//! マシン識別子リセットワークフロー。
//!
//! ネットワークアドレス・マシンGUID・クライアントレジストリキー・
//! ボリュームシリアルを対象にする。いずれもベストエフォートで、
//! 個別の失敗はログに残して続行する。

use kk_domain::port::driven::{
    DriveEnum, EventLog, Launcher, MachineIdentity, NetworkConfig, ProfileFs, RandomSource,
};
use kk_domain::service::identity_service;
use std::path::Path;

/// リンクアップ中の有線アダプター全てに、ローカル管理ビットを立てた
/// 新しいハードウェアアドレスを割り当てる。アダプター毎の失敗は
/// 残りのアダプターを中断しない。
pub fn randomize_network_addresses(
    net: &impl NetworkConfig,
    random: &impl RandomSource,
    log: &impl EventLog,
) {
    let adapters = match net.up_ethernet_adapters() {
        Ok(adapters) => adapters,
        Err(err) => {
            log.error(&format!("Can't open network adapters: {}", err));
            return;
        }
    };
    for adapter in adapters {
        log.trace(&format!(
            "NIC: {} ({})",
            adapter.description, adapter.instance_id
        ));
        log.trace(&format!("Current MAC: {}", adapter.address));
        let mac = match identity_service::generate_mac_address(random) {
            Ok(mac) => mac,
            Err(err) => {
                log.trace(&format!("Can't generate address: {}", err));
                continue;
            }
        };
        match net.set_network_address(&adapter.instance_id, &mac) {
            Ok(()) => log.trace(&format!("New mac address: {}", mac)),
            Err(err) => log.trace(&format!("Can't change registry: {}", err)),
        }
    }
    log.info("Randomized MAC addresses.");
}

/// マシンの暗号GUID値を新しいランダムGUIDへ差し替える。
/// 値が存在しなければ何もしない。失敗はログのみで致命的にしない。
pub fn reset_machine_guid(
    identity: &impl MachineIdentity,
    random: &impl RandomSource,
    log: &impl EventLog,
) {
    let current = match identity.machine_guid() {
        Ok(current) => current,
        Err(err) => {
            log.error(&format!("Can't read Machine GUID: {}", err));
            return;
        }
    };
    if current.is_none() {
        return;
    }
    let guid = match identity_service::generate_machine_guid(random) {
        Ok(guid) => guid,
        Err(err) => {
            log.error(&format!("Can't generate Machine GUID: {}", err));
            return;
        }
    };
    match identity.set_machine_guid(&guid) {
        Ok(()) => {
            log.trace(&format!("New MachineGuid: {}", guid));
            log.info("Randomized Machine GUID.");
        }
        Err(err) => log.error(&format!("Can't change Machine GUID: {}", err)),
    }
}

/// クライアントの既知レジストリキーを削除する。
/// キー毎に独立したベストエフォートで、存在しないキーはエラーではない。
pub fn purge_client_registry(identity: &impl MachineIdentity, log: &impl EventLog) {
    for location in identity.client_key_locations() {
        match identity.delete_key_tree(&location) {
            Ok(true) => log.trace(&format!("Deleted: {}", location)),
            Ok(false) => log.trace(&format!("Key not found: {}", location)),
            Err(err) => log.trace(&format!("Failed to delete {}: {}", location, err)),
        }
    }
    log.info("Deleted registry keys.");
}

/// 全論理ドライブのボリュームシリアルを外部ツールで書き換える。
/// ツール自体が見つからなければドライブ毎の試行はせず、単一のエラーで終わる。
pub fn randomize_volume_serials(
    fs: &impl ProfileFs,
    drives: &impl DriveEnum,
    launcher: &impl Launcher,
    random: &impl RandomSource,
    log: &impl EventLog,
    tool_path: &Path,
) {
    if !fs.file_exists(tool_path) {
        log.error(&format!(
            "Could not locate extracted tool at {}",
            tool_path.display()
        ));
        return;
    }
    for drive in drives.logical_drives() {
        let serial = match identity_service::generate_volume_serial(random) {
            Ok(serial) => serial,
            Err(err) => {
                log.warn(&format!("Can't generate serial for {}: {}", drive, err));
                continue;
            }
        };
        let Some(letter) = drive.chars().next() else {
            continue;
        };
        let args = vec![format!("{}:", letter.to_ascii_lowercase()), serial.clone()];
        match launcher.run_capture(tool_path, &args) {
            Ok(output) => {
                log.trace(&format!("Serial tool output for {}: {}", drive, output));
                log.info(&format!("Randomized HWID for {} to {}", drive, serial));
            }
            Err(err) => log.warn(&format!(
                "Failed to run serial tool for drive {}: {}",
                drive, err
            )),
        }
    }
}
