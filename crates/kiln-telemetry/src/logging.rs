// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logger initialisation.

use env_logger::{Builder, Env};
use kiln_core::renderer::LoggingConfig;

/// Builds the logger described by `config`. `RUST_LOG` and `RUST_LOG_STYLE` take precedence.
pub fn logger_builder(config: &LoggingConfig) -> Builder {
    let env = Env::default()
        .default_filter_or(config.default_level.as_str())
        .default_write_style_or(config.write_style.as_str());
    let mut builder = Builder::from_env(env);
    builder.filter_module("wgpu_hal", log::LevelFilter::Error);
    builder.filter_module("wgpu_core", log::LevelFilter::Warn);
    builder
}

/// Installs the global logger.
///
/// ## Returns
///
/// `false` when a logger was already installed; the existing one stays in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let installed = logger_builder(config).try_init().is_ok();
    if installed {
        log::debug!(
            "Logging initialised (default level '{}')",
            config.default_level
        );
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        // Another test in this binary may have installed the logger first.
        init_logging(&config);
        assert!(!init_logging(&config));
        log::info!("logger reachable");
    }
}
