fn main() {
    if let Err(err) = patchdelta::cli::run() {
        patchdelta::ui::eprintln_error(&err);
        std::process::exit(patchdelta::exit::exit_code(&err));
    }
}
