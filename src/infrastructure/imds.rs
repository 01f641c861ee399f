//! Instance metadata self-identification (IMDSv2).
//!
//! The agent needs to know which instance it is before it can attach the
//! volume to itself or terminate itself, and which region its providers
//! live in. Both come from the instance metadata service.

use std::time::Duration;

use anyhow::Context;
use tracing::info;

const IMDS_BASE: &str = "http://169.254.169.254";
const TOKEN_TTL_SECONDS: &str = "21600";

#[derive(Debug, Clone)]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub region: String,
}

/// Resolve this instance's id and region from the metadata service.
pub async fn fetch_identity() -> anyhow::Result<InstanceIdentity> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("build metadata client")?;

    let token = client
        .put(format!("{IMDS_BASE}/latest/api/token"))
        .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS)
        .send()
        .await
        .context("request metadata token")?
        .error_for_status()
        .context("metadata token request rejected")?
        .text()
        .await
        .context("read metadata token")?;

    let instance_id = fetch_path(&client, &token, "/latest/meta-data/instance-id").await?;
    let region = fetch_path(&client, &token, "/latest/meta-data/placement/region").await?;

    info!(
        instance_id = instance_id,
        region = region,
        "Worker identified itself"
    );
    Ok(InstanceIdentity {
        instance_id,
        region,
    })
}

async fn fetch_path(
    client: &reqwest::Client,
    token: &str,
    path: &str,
) -> anyhow::Result<String> {
    let value = client
        .get(format!("{IMDS_BASE}{path}"))
        .header("X-aws-ec2-metadata-token", token)
        .send()
        .await
        .with_context(|| format!("request metadata {path}"))?
        .error_for_status()
        .with_context(|| format!("metadata request {path} rejected"))?
        .text()
        .await
        .with_context(|| format!("read metadata {path}"))?;
    Ok(value.trim().to_string())
}
