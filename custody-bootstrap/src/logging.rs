use anyhow::Result;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use custody_infrastructure::{AppConfig, LogFormat};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Loads the config while a plain stderr subscriber is active, so loader
/// warnings are visible before the configured subscriber exists.
pub async fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let startup = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .finish();
    load_config_with(path, startup).await
}

async fn load_config_with(path: Option<&str>, subscriber: impl Into<Dispatch>) -> Result<AppConfig> {
    let load = async {
        match path {
            Some(path) => AppConfig::load_from(path).await,
            None => AppConfig::load().await,
        }
    };
    load.with_subscriber(subscriber).await
}

/// Installs the global subscriber. The returned guard flushes the file
/// appender and must live until shutdown.
pub fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "custody.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = builder.with_writer(writer).with_ansi(false);
            match config.log_format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Text => builder.init(),
            }
            Some(guard)
        }
        None => {
            match config.log_format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Text => builder.init(),
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_config_warning_reaches_the_startup_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let path = std::env::temp_dir()
            .join(format!("custody-absent-{}-config.toml", std::process::id()))
            .to_string_lossy()
            .into_owned();

        let config = load_config_with(Some(path.as_str()), subscriber)
            .await
            .expect("defaults");
        assert_eq!(config.ledger_backend, AppConfig::default().ledger_backend);

        let output = String::from_utf8(captured.0.lock().expect("lock").clone()).expect("utf8");
        assert!(output.contains("not found, using defaults"), "{output}");
    }
}
