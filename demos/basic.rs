use std::sync::Arc;
use std::time::Duration;

use remotecall_http::{
    ClientConfiguration, EnvSettings, ErrorCategory, HttpCallError, HttpClient, RequestDescriptor,
    RetryExecutor, RetryPolicy, TracingLogger,
};
use reqwest::Method;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("REMOTECALL_BASE_URL")?;

    // Reads HTTP_TIMEOUT_MS, HTTP_VALIDATION, RETRY_MAX_RETRIES, ...
    let settings = EnvSettings::new();
    let client = HttpClient::new(&settings, Arc::new(TracingLogger))?;
    client.setup_instance(
        ClientConfiguration::new()
            .with_base_url(base_url)
            .with_header("Accept", "application/json")
            .with_random_user_agent(),
    )?;

    let user = client
        .request(RequestDescriptor::new(Method::GET, "/users/:id").url_var("id", 42))
        .await?
        .into_data();
    println!("{user}");

    let retry = RetryExecutor::new(Arc::new(TracingLogger));
    let created = retry
        .run(
            || client.post("/users", serde_json::json!({"name": "Kit"})),
            RetryPolicy::from_settings(&settings)?
                .named("create-user")
                .delay_between(Duration::from_millis(250))
                .abort_if(|err: &HttpCallError| {
                    err.category() == Some(ErrorCategory::ValidationFailure)
                }),
        )
        .await?;
    println!("{}", created.data());

    Ok(())
}
