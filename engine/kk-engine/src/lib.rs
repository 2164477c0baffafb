//! kk-engine: プロファイル切替／設定複製／識別子リセット／クライアント制御の
//! ワークフローを実装する層。ドメイン（kk-domain）のポートにのみ依存する。

pub mod client;
pub mod identity;
pub mod replicate;
pub mod switch;

pub use client::{is_install_path_valid, start_client_service, terminate_client};
pub use identity::{
    purge_client_registry, randomize_network_addresses, randomize_volume_serials,
    reset_machine_guid,
};
pub use replicate::replicate_settings;
pub use switch::{remove_account, remove_profile, resolve_active_profile, switch_profile, SwitchState};

#[cfg(test)]
mod testutil;
