use tracing::level_filters::LevelFilter;

/// Install a global fmt subscriber at `level` (`"info"`, `"debug"`, ...).
///
/// Unknown levels fall back to `info`. Returns `false` if a subscriber was
/// already installed; the existing one is kept.
pub fn init(level: &str) -> bool {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
