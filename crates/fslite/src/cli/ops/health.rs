use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("service is not healthy:\n{0}")]
    Unhealthy(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        let mut lines = vec![format!("fslite ({}):", base)];
        let mut healthy = true;
        for check in ["livez", "readyz"] {
            let url = format!("{}/_status/{}", base.as_str().trim_end_matches('/'), check);
            let line = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => format!("  {}: OK", check),
                Ok(resp) => {
                    healthy = false;
                    format!("  {}: UNHEALTHY ({})", check, resp.status())
                }
                Err(_) => {
                    healthy = false;
                    format!("  {}: NOT REACHABLE", check)
                }
            };
            lines.push(line);
        }

        let report = lines.join("\n");
        if healthy {
            Ok(report)
        } else {
            Err(HealthError::Unhealthy(report))
        }
    }
}
