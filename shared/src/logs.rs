use env_logger::Builder;
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

// every record goes to stderr and to the log file
pub fn setup_logger(logs_path: &Path, level: LevelFilter) {
    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_path)
    {
        Ok(file) => Some(Mutex::new(file)),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", logs_path.display(), e);
            None
        }
    };

    let mut builder = Builder::new();
    builder.filter(None, level);
    builder.parse_default_env();

    builder.format(move |buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Some(log_file) = &log_file {
            if let Ok(mut log_file) = log_file.lock() {
                let _ = writeln!(
                    log_file,
                    "[{}][{}][{}] - {}",
                    timestamp,
                    record.target(),
                    record.level(),
                    record.args()
                );
            }
        }
        writeln!(buf, "{} - {}", record.level(), record.args())
    });

    // a second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
