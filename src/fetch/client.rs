use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared HTTP request. The seam lets the fetcher run against
/// any transport, including test doubles.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
