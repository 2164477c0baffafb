//! マシン識別子レジストリポート

use crate::DomainError;
use std::fmt;

/// レジストリルートのスコープ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryScope {
    CurrentUser,
    LocalMachine,
}

impl RegistryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentUser => "HKEY_CURRENT_USER",
            Self::LocalMachine => "HKEY_LOCAL_MACHINE",
        }
    }
}

/// ルートスコープ＋サブキーパスで表すレジストリ位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocation {
    pub scope: RegistryScope,
    pub path: String,
}

impl KeyLocation {
    pub fn new(scope: RegistryScope, path: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
        }
    }
}

impl fmt::Display for KeyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.scope.as_str(), self.path)
    }
}

/// マシンGUIDとクライアントキーの読み書き。
pub trait MachineIdentity {
    /// 現在のマシンGUID値。キーまたは値が無ければ `Ok(None)`。
    fn machine_guid(&self) -> Result<Option<String>, DomainError>;

    /// マシンGUID値を上書きする。
    fn set_machine_guid(&self, guid: &str) -> Result<(), DomainError>;

    /// 削除対象となるクライアントの既知キー一覧。
    fn client_key_locations(&self) -> Vec<KeyLocation>;

    /// キーのサブツリーを削除する。キーが存在しなければ `Ok(false)`。
    fn delete_key_tree(&self, location: &KeyLocation) -> Result<bool, DomainError>;
}
