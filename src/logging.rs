use color_eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// `RUST_LOG` decides the filter. Without it, `DEBUG` switches between `debug`
/// and `info`.
pub fn init_logging() -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level(std::env::var("DEBUG").ok().as_deref()))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}

fn default_level(debug: Option<&str>) -> &'static str {
    match debug.map(str::trim) {
        Some(value) if value == "1" || value.eq_ignore_ascii_case("t") || value.eq_ignore_ascii_case("true") => {
            "debug"
        }
        _ => "info",
    }
}
