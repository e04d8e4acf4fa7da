//! QCN Tool Example
//!
//! Command-line front end for the qcn_diag library:
//! - Listing ports that answer DIAG commands
//! - Saving the device identities to a QCN file
//! - Writing a QCN file back to the device
//! - Editing the identities inside a QCN file
//!
//! Run with `RUST_LOG=debug` to see the DIAG traffic.

use qcn_diag::{validator, CancelFlag, DeviceSession, DiagConfig, TransportScanner};

const USAGE: &str = "\
Usage:
  qcn_tool scan
  qcn_tool read <port> <file.qcn>
  qcn_tool write <port> <file.qcn>
  qcn_tool edit <file.qcn> <identity1> [identity2]
  qcn_tool check <identity>";

fn main() {
    // Initialize logging
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> qcn_diag::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let config = DiagConfig::default();
    let cancel = CancelFlag::new();

    match args.as_slice() {
        ["scan"] => {
            let ports = TransportScanner::new(config).scan();
            if ports.is_empty() {
                println!("No DIAG port found");
            }
            for port in ports {
                println!("DIAG port: {}", port);
            }
        }
        ["read", port, file] => {
            let mut session = DeviceSession::new(config);
            session.connect(port)?;
            let record = session.read_from_device(file, &cancel)?;
            println!("\n{}", record);
        }
        ["write", port, file] => {
            let mut session = DeviceSession::new(config);
            session.connect(port)?;
            session.write_to_device(file, &cancel)?;
            println!("\nReboot the device to apply the new identities");
        }
        ["edit", file, primary, rest @ ..] if rest.len() <= 1 => {
            let mut session = DeviceSession::new(config);
            let record = session.edit_identity_in_file(file, primary, rest.first().copied())?;
            println!("\n{}", record);
        }
        ["check", id] => {
            let verdict = if validator::is_plausible(id) {
                "plausible"
            } else {
                "implausible"
            };
            println!("{}: {}", id, verdict);
        }
        _ => println!("{}", USAGE),
    }

    Ok(())
}
