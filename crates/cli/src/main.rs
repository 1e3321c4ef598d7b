fn main() {
    if let Err(error) = siteinspect_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
