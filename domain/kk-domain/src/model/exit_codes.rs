//! エグゼキュータの終了コード定義

/// 正常終了（終端レコードを出力できた。error レコードでも 0）
pub const SUCCESS: i32 = 0;
/// 致命的エラー（最上位境界で捕捉し、error 終端レコードを出力済み）
pub const FATAL: i32 = 1;
