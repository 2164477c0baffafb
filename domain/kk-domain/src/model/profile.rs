use crate::DomainError;

/// ライブインストール直下で仮想化対象となる固定サブツリー。
/// プロファイルのバックアップルート直下も同じ構成を取る。
pub const BACKUP_SUBTREES: [&str; 5] = ["appcache", "config", "dumps", "logs", "userdata"];

/// アクティブプロファイル解決の基準となるサブツリー。
pub const CONFIG_SUBTREE: &str = "config";

/// アカウント毎のユーザーデータを保持するサブツリー。
pub const USERDATA_SUBTREE: &str = "userdata";

/// プロファイル名。バックアップルート直下のディレクトリ名になるため、
/// 作成時にファイルシステム安全であることを検証する。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProfileName(String);

impl ProfileName {
    pub fn new<S: Into<String>>(name: S) -> Result<Self, DomainError> {
        let raw: String = name.into();
        validate_profile_name(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_profile_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::ValidationError(
            "Profile name must not be empty".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(DomainError::ValidationError(format!(
            "Profile name '{}' is reserved",
            name
        )));
    }
    if name.contains('\0') {
        return Err(DomainError::ValidationError(
            "Profile name must not contain NUL characters".into(),
        ));
    }
    if name.contains('\\') || name.contains('/') {
        return Err(DomainError::ValidationError(format!(
            "Profile name '{}' must not contain path separators",
            name
        )));
    }
    // Windowsのファイル名で使用できない文字
    if name.chars().any(|c| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*')) {
        return Err(DomainError::ValidationError(format!(
            "Profile name '{}' contains characters invalid in a directory name",
            name
        )));
    }
    Ok(())
}
