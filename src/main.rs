fn main() {
    if let Err(err) = sheetbridge::run() {
        eprintln!("error: {err:#}");
        std::process::exit(sheetbridge::exit_code(&err));
    }
}
