use clap::Parser;

use metro_rail_service::server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database written by the loadlametrorail command
    #[arg(long, default_value = "lametrorail.db")]
    db_path: String,

    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();
    println!("Browsing L.A. Metro Rail data from {}", args.db_path);
    server::run(args.db_path, &args.bind).await
}
