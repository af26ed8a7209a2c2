fn main() {
    if let Err(err) = audiopress::run() {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}
