use turntable::cli::CliOverrides;
use turntable::run_with_overrides;

fn main() {
    env_logger::init();
    let overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed.into_config_overrides(),
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run_with_overrides(overrides) {
        log::error!("application error: {err:?}");
    }
}
