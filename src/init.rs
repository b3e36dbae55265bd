use crate::hook::Hook;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::Registry;

/// Конфигурация глобального subscriber'а.
///
/// **Поля**
/// - `enable_stdout`: если `true`, поверх [`Hook`] добавляется
///   `tracing_subscriber::fmt::Layer` и все события печатаются в консоль.
#[derive(Clone, Debug)]
pub struct InitConfig {
    pub enable_stdout: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self { enable_stdout: true }
    }
}

/// Install `hook` as part of the global `tracing` subscriber.
///
/// **Parameters**
/// - `hook`: the [`Hook`] that forwards qualifying events. Keep a clone to
///   adjust tags or flush later.
/// - `config`: [`InitConfig`] controlling console output.
///
/// **Returns**
/// - `Err(..)` if a global subscriber was already installed.
pub fn init_tracing_with_config(hook: Hook, config: InitConfig) -> Result<(), TryInitError> {
    // Хук подключаем всегда; `fmt`-слой только при `enable_stdout = true`.
    // `Option<Layer>` сам является слоем, поэтому тип subscriber'а один.
    let fmt_layer = config.enable_stdout.then(tracing_subscriber::fmt::layer);
    Registry::default().with(hook).with(fmt_layer).try_init()
}

/// Equivalent to [`init_tracing_with_config`] with [`InitConfig::default`].
pub fn init_tracing(hook: Hook) -> Result<(), TryInitError> {
    init_tracing_with_config(hook, InitConfig::default())
}
