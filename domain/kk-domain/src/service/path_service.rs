//! パス解析サービス
//!
//! リンク解決後の実パスからアクティブプロファイル名を抽出する。
//! 末尾側の `config` コンポーネントの直前セグメントがプロファイル名。

use crate::model::CONFIG_SUBTREE;
use std::ffi::OsStr;
use std::path::{Component, Path};

/// 実パスからアクティブプロファイル名を抽出する。
/// `config` コンポーネントが見つからない、または直前に通常セグメントが
/// 無い場合は `None`。
pub fn profile_from_real_path(path: &Path) -> Option<String> {
    let components: Vec<Component> = path.components().collect();
    let config = OsStr::new(CONFIG_SUBTREE);
    let index = components
        .iter()
        .rposition(|c| matches!(c, Component::Normal(name) if *name == config))?;
    if index == 0 {
        return None;
    }
    match components[index - 1] {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_segment_before_config() {
        assert_eq!(
            profile_from_real_path(Path::new("/backup/profiles/alt/config")),
            Some("alt".to_string())
        );
    }

    #[test]
    fn takes_last_config_component() {
        assert_eq!(
            profile_from_real_path(Path::new("/a/config/deep/main/config")),
            Some("main".to_string())
        );
    }

    #[test]
    fn non_virtualized_install_yields_install_dir_name() {
        // 実体ディレクトリのままならインストールディレクトリ名が返る
        assert_eq!(
            profile_from_real_path(Path::new("/opt/Steam/config")),
            Some("Steam".to_string())
        );
    }

    #[test]
    fn missing_config_yields_none() {
        assert_eq!(profile_from_real_path(Path::new("/backup/alt/logs")), None);
        assert_eq!(profile_from_real_path(Path::new("config")), None);
        assert_eq!(profile_from_real_path(Path::new("/config")), None);
    }
}
