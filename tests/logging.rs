use tadawul_features::logging;

#[test]
fn logging_initialization_is_idempotent() {
    logging::init_logging().expect("first initialization succeeds");
    logging::init_logging().expect("subsequent initialization succeeds");
}

#[test]
fn log_event_accepts_ticker_context() {
    logging::log_event(
        file!(),
        "LoggingTest",
        "log_event_accepts_ticker_context",
        "tests.logging",
        line!(),
        "event emitted",
        None,
        Some("TASI"),
    );
}
