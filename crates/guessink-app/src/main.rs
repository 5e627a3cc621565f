use std::process::ExitCode;

use guessink_app::{App, AppConfig};

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting GuessInk");

    let config = AppConfig::from_env(std::env::args().skip(1));
    match App::new(config).and_then(App::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
