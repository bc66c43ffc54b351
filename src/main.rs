use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use courier::http::{Body, LogObserver, Reply};
use courier::{ClientConfig, ErrorKind, HttpClient, RequestOptions};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// courier - resilient HTTP requests
///
/// Sends one request to the configured server, retrying failures with a
/// fixed delay. On failure the classified error is printed to stderr as
/// JSON: {code, message_id, message, extra}.
///
/// Examples:
///   courier --server https://api.example.com GET /status
///   courier -s http://localhost:8080 POST /items --form name=demo --retries 3
#[derive(Parser, Debug)]
#[command(author, version = env!("COURIER_VERSION"), about)]
struct Cli {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    #[arg(value_name = "METHOD")]
    method: String,

    /// Path appended to the server URL, e.g. /api/items
    #[arg(value_name = "PATH")]
    path: String,

    /// Server base URL (overrides the config file)
    #[arg(long, short = 's', env = "COURIER_SERVER", value_name = "URL")]
    server: Option<String>,

    /// JSON client configuration file
    #[arg(long, short = 'c', env = "COURIER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra request header
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Query string parameter
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE", value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// Raw request body
    #[arg(long, short = 'd', conflicts_with = "form")]
    data: Option<String>,

    /// Form field, sent url-encoded
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_pair)]
    form: Vec<(String, String)>,

    /// Per-attempt timeout in seconds
    #[arg(long, short = 't', value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Number of attempts
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    retries: Option<i64>,

    /// Delay between attempts in seconds
    #[arg(long, value_name = "SECONDS")]
    retry_delay: Option<f64>,

    /// Error kind never retried (message id, status code or name)
    #[arg(long, value_name = "KIND")]
    no_retry_on: Vec<ErrorKind>,

    #[arg(long, short = 'u', env = "COURIER_USERNAME")]
    username: Option<String>,

    #[arg(long, short = 'p', env = "COURIER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, short = 'k')]
    insecure: bool,

    /// Print the status line and headers before the body
    #[arg(long, short = 'i')]
    include: bool,

    /// Stream the body to stdout as it arrives
    #[arg(long)]
    stream: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };

        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if config.server.is_empty() {
            bail!("No server configured. Pass --server, set COURIER_SERVER or use --config.");
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = self.retries {
            config.retry_number = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.password.is_some() {
            config.password = self.password.clone();
        }
        if self.insecure {
            config.ssl_verify = false;
        }

        Ok(config)
    }

    fn request_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new()
            .parse_output(!self.include && !self.stream)
            .stream(self.stream);
        for (name, value) in &self.headers {
            options = options.header(name, value);
        }
        for (key, value) in &self.query {
            options = options.param(key, value);
        }
        if let Some(data) = &self.data {
            options = options.data(data.as_str());
        }
        for (key, value) in &self.form {
            options = options.form(key, value);
        }
        for kind in &self.no_retry_on {
            options = options.no_retry_on(*kind);
        }
        if let Some(timeout) = self.timeout {
            if let Ok(timeout) = Duration::try_from_secs_f64(timeout) {
                options = options.timeout(timeout);
            }
        }
        options
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{}', expected NAME:VALUE", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{}', empty name", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid pair '{}', expected KEY=VALUE", s))?;
    Ok((key.to_string(), value.to_string()))
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Writes the reply to `out`, copying a streamed body chunk by chunk.
async fn write_reply<W: AsyncWrite + Unpin>(reply: Reply, include: bool, out: &mut W) -> Result<()> {
    let response = match reply {
        Reply::Text(text) => {
            out.write_all(text.as_bytes()).await?;
            return Ok(out.flush().await?);
        }
        Reply::Raw(response) => response,
    };

    if include {
        let mut head = format!("HTTP {}\n", response.status());
        for (name, value) in response.headers() {
            head.push_str(&format!("{}: {}\n", name, value));
        }
        head.push('\n');
        out.write_all(head.as_bytes()).await?;
    }

    match response.into_body() {
        Body::Full(bytes) => out.write_all(&bytes).await?,
        Body::Streaming(mut chunks) => {
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.context("Failed to read response stream")?;
                out.write_all(&chunk).await?;
            }
        }
    }
    Ok(out.flush().await?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level(cli.verbose)))
        .init();

    let client = HttpClient::new(cli.client_config()?)?.with_observer(LogObserver);

    match client
        .do_request(&cli.method, &cli.path, cli.request_options())
        .await
    {
        Ok(reply) => {
            write_reply(reply, cli.include, &mut tokio::io::stdout()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_minimal_parsing() {
        let cli = Cli::try_parse_from(["courier", "GET", "/hello", "--server", "http://x"]).unwrap();
        assert_eq!(cli.method, "GET");
        assert_eq!(cli.path, "/hello");
        assert_eq!(cli.server.as_deref(), Some("http://x"));
        assert!(!cli.insecure);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_missing_path_fails() {
        assert!(Cli::try_parse_from(["courier", "GET"]).is_err());
    }

    #[test]
    fn test_cli_headers_and_pairs() {
        let cli = Cli::try_parse_from([
            "courier",
            "POST",
            "/items",
            "-H",
            "Accept: application/json",
            "--query",
            "page=2",
            "--form",
            "name=demo",
        ])
        .unwrap();
        assert_eq!(
            cli.headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
        assert_eq!(cli.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(cli.form, vec![("name".to_string(), "demo".to_string())]);
    }

    #[test]
    fn test_cli_data_conflicts_with_form() {
        let result =
            Cli::try_parse_from(["courier", "POST", "/x", "--data", "a", "--form", "b=c"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_retry_on_parsing() {
        let cli = Cli::try_parse_from([
            "courier",
            "GET",
            "/x",
            "--no-retry-on",
            "HTTP-02752",
            "--no-retry-on",
            "404",
        ])
        .unwrap();
        assert_eq!(
            cli.no_retry_on,
            vec![ErrorKind::INTERNAL_SERVER_ERROR, ErrorKind::NOT_FOUND]
        );

        assert!(Cli::try_parse_from(["courier", "GET", "/x", "--no-retry-on", "bogus"]).is_err());
    }

    #[test]
    fn test_cli_negative_retries() {
        let cli = Cli::try_parse_from([
            "courier", "GET", "/x", "--server", "http://x", "--retries", "-1",
        ])
        .unwrap();
        let config = cli.client_config().unwrap();
        assert_eq!(config.retry_number, -1);
    }

    #[test]
    fn test_client_config_overrides() {
        let cli = Cli::try_parse_from([
            "courier",
            "GET",
            "/x",
            "--server",
            "http://x",
            "--timeout",
            "2.5",
            "--retry-delay",
            "0",
            "-u",
            "user",
            "-p",
            "pass",
            "-k",
        ])
        .unwrap();
        let config = cli.client_config().unwrap();
        assert_eq!(config.server, "http://x");
        assert_eq!(config.timeout, 2.5);
        assert_eq!(config.retry_delay, 0.0);
        assert!(config.credentials().is_some());
        assert!(!config.ssl_verify);
    }

    #[test]
    fn test_parse_header_rejects_missing_colon() {
        assert!(parse_header("Accept").is_err());
        assert!(parse_header(": value").is_err());
        assert_eq!(
            parse_header("X-Id:  42 ").unwrap(),
            ("X-Id".to_string(), "42".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_reply_text() {
        let mut out = Vec::new();
        write_reply(Reply::Text("Hello world".to_string()), true, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"Hello world");
    }

    #[tokio::test]
    async fn test_write_reply_streams_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/logs")
            .with_status(200)
            .with_header("x-request-id", "abc")
            .with_body("line 1\nline 2\n")
            .create_async()
            .await;

        let client = HttpClient::new(ClientConfig::new(server.url())).unwrap();
        let reply = client
            .do_request(
                "GET",
                "/logs",
                RequestOptions::new().parse_output(false).stream(true),
            )
            .await
            .unwrap();

        let mut out = Vec::new();
        write_reply(reply, true, &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("HTTP 200\n"));
        assert!(out.contains("x-request-id: abc\n"));
        assert!(out.ends_with("\n\nline 1\nline 2\n"));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(5), "debug");
    }
}
