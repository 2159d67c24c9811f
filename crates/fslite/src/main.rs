mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Health, Reap, Serve, Version, Volumes};

command_enum! {
    (Serve, Serve),
    (Reap, Reap),
    (Health, Health),
    (Volumes, Volumes),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = match cli::op::OpContext::new(args.remote, args.service_secret.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
