fn main() {
    let args = std::env::args().collect();
    if let Err(e) = pyfdw_cli::runner::main(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
