use clap::Args;

use fslite::http_server::api::client::ClientError;
use fslite::http_server::api::volume::get::GetVolumesRequest;

/// List volumes on the running service.
#[derive(Args, Debug, Clone)]
pub struct Volumes {
    #[command(flatten)]
    pub request: GetVolumesRequest,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Volumes {
    type Error = ClientError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let volumes = ctx.client.call(self.request.clone()).await?;
        let lines: Vec<String> = volumes
            .iter()
            .map(|v| {
                format!(
                    "{:>4}  {:<32} {:>12.6} / {:<12.6} GB",
                    v.vid,
                    v.name,
                    v.usage.as_gb(),
                    v.capacity.as_gb()
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
