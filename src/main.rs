mod app;
mod ci_vendor;
mod config;
mod helpers;
mod local_logger;
mod prelude;
mod reporter;
mod request_client;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit_code = match crate::app::run().await {
        Ok(exit_code) => exit_code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}
