pub use clap::Parser;

use url::Url;

#[derive(Parser, Debug)]
#[command(name = "fslite")]
#[command(about = "Quota-bounded volume and resource storage")]
pub struct Args {
    /// Running fslite service for client commands
    #[arg(long, global = true, env = "FSL_REMOTE", default_value = "http://localhost:8079")]
    pub remote: Url,

    /// X-Service-Secret sent by client commands
    #[arg(long, global = true, env = "SERVICE_SECRET_KEY", hide_env_values = true)]
    pub service_secret: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
