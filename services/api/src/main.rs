use blind_hire_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("blind-hire error: {err}");
        std::process::exit(1);
    }
}
