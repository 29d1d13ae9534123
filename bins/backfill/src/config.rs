use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use broker_local::LocalBrokerConfig;

use crate::error::CliError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "backfill", about = "Backfill событий в topic через временные trigger'ы")]
pub struct Cli {
    /// Путь к TOML конфиг файлу
    #[arg(long, global = true, default_value = "backfill.toml", env = "BACKFILL_CONFIG")]
    pub config: String,

    /// Корневая директория брокера (перекрывает `root` из конфига)
    #[arg(long, global = true)]
    pub root: Option<String>,

    /// Размер batch'а при чтении source'а
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Создать topic/trigger'ы и опубликовать события из source'а
    Backfill(BackfillArgs),
    /// Удалить всё, что перечислено в recovery manifest'е
    CleanBackfill(CleanArgs),
}

#[derive(Args, Clone, Debug)]
pub struct BackfillArgs {
    /// Логическое имя topic'а
    #[arg(long)]
    pub topic: String,

    /// Trigger (consumer), можно повторять
    #[arg(long = "trigger")]
    pub triggers: Vec<String>,

    /// Создать временный topic `backfill-<id>` вместо существующего
    #[arg(long)]
    pub temporary_topic: bool,

    /// Источник событий, напр. `json://data/*.jsonl`
    #[arg(long)]
    pub source: Option<String>,

    /// Фильтр событий (если source его поддерживает)
    #[arg(long)]
    pub filter: Option<String>,

    /// Куда записать recovery manifest (по умолчанию `backfill-<id>.json`)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct CleanArgs {
    /// Recovery manifest, записанный командой backfill
    #[arg(long)]
    pub manifest: PathBuf,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub root: Option<String>,
    pub batch_size: Option<usize>,
    pub read_ahead: Option<usize>,
    pub publish_buffer: Option<usize>,
    pub default_source: Option<String>,
}

/// Отсутствующий файл = значения по умолчанию; существующий, но
/// нечитаемый или невалидный файл — ошибка.
pub fn load_config(path: &str) -> Result<Config, CliError> {
    if !Path::new(path).exists() {
        tracing::debug!(path, "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    toml::from_str(&content)
        .map_err(|e| CliError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: backfill.toml < CLI
#[derive(Debug)]
pub struct Effective {
    pub broker: LocalBrokerConfig,
}

impl Effective {
    pub fn new(cli: &Cli) -> Result<Self, CliError> {
        let cfg = load_config(&cli.config)?;
        Ok(Self::merge(cli, cfg))
    }

    fn merge(cli: &Cli, cfg: Config) -> Self {
        let defaults = LocalBrokerConfig::default();
        let broker = LocalBrokerConfig {
            root: cli.root.clone().or(cfg.root).unwrap_or(defaults.root),
            batch_size: cli.batch_size.or(cfg.batch_size).unwrap_or(defaults.batch_size),
            read_ahead: cfg.read_ahead.or(defaults.read_ahead),
            publish_buffer: cfg.publish_buffer.unwrap_or(defaults.publish_buffer),
            default_source: cfg.default_source,
        };
        Self { broker }
    }
}
