use fern::colors::{Color, ColoredLevelConfig};

pub use _log::LevelFilter;

/// Log configuration. Mirrors the engine's config-file-driven ambient
/// setup: a level filter plus an optional rotating file sink path.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
        }
    }
}

/// Initialize the global logger. Safe to call once per process; a second
/// call returns an error via `anyhow` rather than panicking the caller.
pub fn init(config: LogConfig) -> anyhow::Result<()> {
    setup_logger(config)?;
    info!("log initialized");
    Ok(())
}

fn setup_logger(config: LogConfig) -> anyhow::Result<()> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Magenta)
        .info(Color::Cyan)
        .warn(Color::Yellow)
        .error(Color::Red);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new().level(config.level).chain(console);

    if let Some(path) = config.file_path {
        let file = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{}[{}][{}] {}",
                    chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                    record.target(),
                    record.level(),
                    message
                ))
            })
            .chain(fern::log_file(path)?);

        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;

    Ok(())
}
