use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let port = parse_port_arg(&args, "--port")
        .or_else(|| std::env::var("SEGCORE_HTTP_PORT").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(7878);
    let data_dir = parse_str_arg(&args, "--data-dir")
        .or_else(|| std::env::var("SEGCORE_DATA_DIR").ok())
        .unwrap_or_else(|| "shards".to_string());

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "segcore",
        "segcore starting: RUST_LOG='{}', http_port={}, data_dir='{}'",
        rust_log, port, data_dir
    );

    segcore::server::run_with_port(port, &data_dir).await
}
