//! segscan binary entry point.

fn main() {
    if let Err(e) = segscan_cli::run() {
        eprintln!("segscan: {e:#}");
        std::process::exit(1);
    }
}
