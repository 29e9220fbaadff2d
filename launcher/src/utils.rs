use log::warn;

pub fn set_sigint_handler() {
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(130);
    }) {
        warn!("Error setting Ctrl-C handler: {}", e);
    }
}
