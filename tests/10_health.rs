mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let body = server
        .client
        .get(server.url("/"))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;

    assert_eq!(body["data"]["endpoints"]["users"], "/api/admin/users (admin session required)");
    Ok(())
}
