use agatha_client::app::App;
use agatha_client::config::Config;
use agatha_client::http::{Failure, RequestDescriptor, Response};
use anyhow::{bail, Context, Result};
use reqwest::Method;
use tracing::{info, warn};

const USAGE: &str = "usage: agatha-client [METHOD] PATH [JSON_BODY]";

/// Parse `[METHOD] PATH [JSON_BODY]`; the method defaults to GET.
fn parse_args(args: &[String]) -> Result<RequestDescriptor> {
    let (method, rest) = match args {
        [] => bail!(USAGE),
        [path] => (Method::GET, vec![path.clone()]),
        [first, rest @ ..] if first.starts_with('/') || first.starts_with("http") => {
            let mut all = vec![first.clone()];
            all.extend(rest.iter().cloned());
            (Method::GET, all)
        }
        [method, rest @ ..] => (
            Method::from_bytes(method.to_uppercase().as_bytes()).with_context(|| format!("Unknown method '{}'", method))?,
            rest.to_vec(),
        ),
    };

    let request = match rest.as_slice() {
        [path] => RequestDescriptor::new(method, path.clone()),
        [path, body] => {
            let body: serde_json::Value = serde_json::from_str(body).context("Request body is not valid JSON")?;
            RequestDescriptor::new(method, path.clone()).json(&body)?
        }
        _ => bail!(USAGE),
    };

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agatha_client=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = parse_args(&args)?;

    let config = Config::from_env()?;
    let app = App::from_config(config)?;

    info!(method = %request.method(), target = request.target(), "sending request");
    let outcome = app.client.send(&request).await;

    let alerts = app.alerts.list();
    if !alerts.is_empty() {
        eprintln!("{}", serde_json::to_string_pretty(&alerts)?);
    }

    finish(outcome)
}

/// Print a successful body; turn a failure into the process error.
fn finish(outcome: Result<Response, Failure>) -> Result<()> {
    match outcome {
        Ok(response) => {
            info!(status = %response.status(), "request succeeded");
            println!("{}", response.text());
            Ok(())
        }
        Err(failure) => {
            warn!(kind = %failure.kind(), "request failed");
            if let Some(login) = failure.login_redirect() {
                eprintln!("Authentication required: {}", login);
            }
            Err(anyhow::Error::new(failure).context("Request failed"))
        }
    }
}
