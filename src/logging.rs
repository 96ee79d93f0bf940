use std::sync::Arc;

use log::Log;

use crate::multi::Registry;

/// Wraps a [`Registry`] and a [`Log`] implementor, suspending the registry's
/// bars while a log message is written so that bars and log lines do not
/// get mixed up.
///
/// Warnings the crate emits itself (under the `progmeter::*` targets) go
/// through the wrapped logger like any other record.
pub struct LogWrapper<L: Log> {
    registry: Arc<Registry>,
    log: L,
}

impl<L: Log + 'static> LogWrapper<L> {
    pub fn new(registry: Arc<Registry>, log: L) -> Self {
        Self { registry, log }
    }

    /// Wraps `log` around the process-wide registry.
    pub fn global(log: L) -> Self {
        Self::new(Registry::global(), log)
    }

    /// installs this as the global logger,
    ///
    /// tries to find the correct argument to set_max_level
    /// by reading the logger configuration,
    /// you may want to set it manually though.
    pub fn try_init(self) -> Result<(), log::SetLoggerError> {
        use log::LevelFilter::*;
        let levels = [Off, Error, Warn, Info, Debug, Trace];

        for level_filter in levels.iter().rev() {
            let level = match level_filter.to_level() {
                Some(level) => level,
                // off is the last level, just do nothing in that case
                None => continue,
            };
            let meta = log::Metadata::builder().level(level).build();
            if self.enabled(&meta) {
                log::set_max_level(*level_filter);
                break;
            }
        }

        log::set_boxed_logger(Box::new(self))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl<L: Log> Log for LogWrapper<L> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.log.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.registry.suspend(|| self.log.log(record))
    }

    fn flush(&self) {
        self.log.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl Log for Collect {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Info
        }

        fn log(&self, record: &log::Record) {
            self.0.lock().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    #[test]
    fn forwards_records_under_the_registry_lock() {
        let wrapper = LogWrapper::new(
            Registry::with_monitor_interval(Duration::ZERO),
            Collect::default(),
        );
        let meta = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(!wrapper.enabled(&meta));

        wrapper.log(
            &log::Record::builder()
                .args(format_args!("hello"))
                .level(log::Level::Info)
                .build(),
        );
        assert_eq!(*wrapper.log.0.lock(), vec!["hello".to_owned()]);
    }
}
