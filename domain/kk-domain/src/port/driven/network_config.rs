//! ネットワークアダプター構成ポート

use crate::DomainError;

/// 列挙されたアダプターの情報
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// 表示名（ログ用。一意とは限らない）
    pub description: String,
    /// アダプターインスタンスID（レジストリサブキー照合に使う）
    pub instance_id: String,
    /// 現在のハードウェアアドレス（16進、ログ用）
    pub address: String,
}

/// 有線アダプターの列挙とアドレス上書き。
pub trait NetworkConfig {
    /// リンクアップ中の有線（Ethernet）アダプターのみを返す。
    fn up_ethernet_adapters(&self) -> Result<Vec<AdapterInfo>, DomainError>;

    /// インスタンスIDで特定したアダプターにアドレス上書き値を書き込む。
    /// 名前ではなくインスタンスIDで照合すること（名前は一意でも安定でもない）。
    fn set_network_address(&self, instance_id: &str, address: &str) -> Result<(), DomainError>;
}
