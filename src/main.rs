fn main() {
    if let Err(e) = phytoscan::run() {
        eprintln!("phytoscan: {e}");
        std::process::exit(1);
    }
}
