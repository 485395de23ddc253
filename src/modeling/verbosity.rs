use log::LevelFilter;

/// Lowers the global log level to `Error` until dropped.
///
/// The previous maximum level is restored on drop, so guards nest.
///
/// ```
/// use madrid_air_quality::QuietLogs;
///
/// log::set_max_level(log::LevelFilter::Info);
/// {
///     let _quiet = QuietLogs::new();
///     assert_eq!(log::max_level(), log::LevelFilter::Error);
/// }
/// assert_eq!(log::max_level(), log::LevelFilter::Info);
/// ```
#[derive(Debug)]
#[must_use = "logs are restored as soon as the guard is dropped"]
pub struct QuietLogs {
    previous: LevelFilter,
}

impl QuietLogs {
    pub fn new() -> Self {
        let previous = log::max_level();
        log::set_max_level(previous.min(LevelFilter::Error));
        Self { previous }
    }
}

impl Default for QuietLogs {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QuietLogs {
    fn drop(&mut self) {
        log::set_max_level(self.previous);
    }
}
