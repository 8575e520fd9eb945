use std::sync::Once;

/// Logger configuration.
///
/// Filter precedence: `env_filter`, then `RUST_LOG`, then `default_level` plus
/// `module_levels`. Filters use `env_logger` syntax, e.g.
/// "glint_engine=debug,wgpu_core=warn".
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,

    /// Per-module overrides applied with `default_level`.
    pub module_levels: Vec<(String, log::LevelFilter)>,

    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        // Device loss makes the wgpu internals very chatty at info.
        let quiet = ["wgpu_core", "wgpu_hal", "naga"]
            .into_iter()
            .map(|m| (m.to_string(), log::LevelFilter::Warn))
            .collect();

        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            module_levels: quiet,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` once; later calls are no-ops.
///
/// A logger installed by someone else is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(config.default_level);
                for (module, level) in &config.module_levels {
                    builder.filter_module(module, *level);
                }
            }
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            log::debug!("logger already installed; keeping it");
            return;
        }

        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quiets_wgpu_internals() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_level, log::LevelFilter::Info);
        assert!(
            config
                .module_levels
                .iter()
                .any(|(m, l)| m == "wgpu_core" && *l == log::LevelFilter::Warn)
        );
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig {
            env_filter: Some("trace".to_string()),
            ..Default::default()
        });
    }
}
