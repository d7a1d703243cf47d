fn main() {
    if let Err(err) = unctl::cli::run() {
        unctl::ui::eprintln_error(&err);
        std::process::exit(unctl::exit::exit_code(&err));
    }
}
