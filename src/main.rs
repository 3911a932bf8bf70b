use ansible_provisioner::config::RuntimeContext;
use ansible_provisioner::playbook::ProcessRunner;
use ansible_provisioner::{cli, ProvisionerError};

use colored::Colorize;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

fn main() {
    // Delay logger initialization until after parsing arguments
    let matches = cli::build_cli().get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Custom log format
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log_level)
        .init();

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("{} {}", "ERROR:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = cli::run(
        &matches,
        &cwd,
        RuntimeContext::from_process(),
        Box::new(ProcessRunner),
        &mut out,
    );

    if let Err(e) = result {
        eprintln!("{} {:#}", "ERROR:".red().bold(), e);
        let code = e
            .downcast_ref::<ProvisionerError>()
            .map(ProvisionerError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
