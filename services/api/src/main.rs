use survey_bridge_api::run;

// Stays synchronous: the blocking HTTP client must be built outside the
// async runtime, which `serve` starts itself.
fn main() {
    if let Err(err) = run() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}
