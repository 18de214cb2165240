use serde::{Deserialize, Serialize};

/// Top-level configuration (loaded from saltpack.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltpackConfig {
    pub armor: ArmorConfig,
    pub paperkey: PaperKeyConfig,
    pub logging: LoggingConfig,
}

/// Defaults applied when armoring output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorConfig {
    /// Application name placed in armor framing (e.g. "KEYBASE")
    pub app_name: Option<String>,
    /// Emit raw armor without header and footer
    pub raw: bool,
}

/// scrypt cost parameters for paper key derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperKeyConfig {
    /// log2 of the scrypt cost N (default: 15 = 32768)
    pub scrypt_log_n: u8,
    /// scrypt block size r (default: 8)
    pub scrypt_r: u32,
    /// scrypt parallelism p (default: 1)
    pub scrypt_p: u32,
}

impl Default for PaperKeyConfig {
    fn default() -> Self {
        Self {
            scrypt_log_n: 15,
            scrypt_r: 8,
            scrypt_p: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
