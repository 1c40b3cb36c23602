use http::Extensions;
use log::{info, warn};
use reqwest_middleware::{
    reqwest::{self, Client},
    ClientBuilder, ClientWithMiddleware, Middleware,
};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

/// Clients for calls to the application. Both wrap the same connection pool
/// and cookie store, so the provider's CSRF cookie travels with the sign-in form.
#[derive(Clone)]
pub struct HttpClients {
    /// Retries transient failures; for reads and idempotent calls
    pub retrying: ClientWithMiddleware,
    /// Sends each request once; for calls that must not be repeated
    pub single_attempt: ClientWithMiddleware,
}

pub fn build_reqwest_clients() -> Result<HttpClients, reqwest::Error> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    let client = Client::builder().cookie_store(true).build()?;

    Ok(HttpClients {
        retrying: ClientBuilder::new(client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(LoggingMiddleware)
            .build(),
        single_attempt: ClientBuilder::new(client).with(LoggingMiddleware).build(),
    })
}

struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let method = req.method().clone();
        let url = req.url().clone();

        info!("Making {} request to: {}", method, url);

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => {
                info!("{} {} -> Status: {}", method, url, response.status());
            }
            Err(error) => {
                warn!("{} {} -> Error: {:?}", method, url, error);
            }
        }

        result
    }
}
