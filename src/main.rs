fn main() {
    #[cfg(feature = "cli")]
    rspatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("rspatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
