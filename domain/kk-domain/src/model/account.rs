use crate::DomainError;

/// プロファイルの userdata 配下に現れる数値アカウントID。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId(String);

impl AccountId {
    pub fn new<S: Into<String>>(id: S) -> Result<Self, DomainError> {
        let raw: String = id.into();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::ValidationError(format!(
                "Account id '{}' must be numeric",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 数値アプリID。`"0"` は「対象アプリなし」を表すセンチネル値。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppId(String);

impl AppId {
    pub const NONE: &'static str = "0";

    pub fn new<S: Into<String>>(id: S) -> Result<Self, DomainError> {
        let raw: String = id.into();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::ValidationError(format!(
                "App id '{}' must be numeric",
                raw
            )));
        }
        Ok(Self(raw))
    }

    /// センチネル（対象アプリなし）かどうか。
    pub fn is_none(&self) -> bool {
        self.0 == Self::NONE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_must_be_numeric() {
        assert!(AccountId::new("76500001").is_ok());
        assert!(AccountId::new("").is_err());
        assert!(AccountId::new("12a").is_err());
        assert!(AccountId::new("../x").is_err());
    }

    #[test]
    fn app_id_sentinel() {
        assert!(AppId::new("0").unwrap().is_none());
        assert!(!AppId::new("730").unwrap().is_none());
        assert!(AppId::new("steam").is_err());
    }
}
