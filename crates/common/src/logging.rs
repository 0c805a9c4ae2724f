use tracing_core::Level;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Logging;

/// Install the global subscriber. Output goes to stderr so that stdout only carries command results.
pub fn init(logging: &Logging) {
    let fmt = fmt::format().with_target(false).compact();

    let target_filters = Targets::new()
        .with_target("reqwest", Level::WARN)
        .with_target("hyper", Level::WARN)
        .with_default(logging.level);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(fmt)
                .with_writer(std::io::stderr),
        )
        .with(target_filters)
        .init();
}
