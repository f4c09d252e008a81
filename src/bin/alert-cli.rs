use clap::Parser;
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "alert-cli")]
#[command(about = "Query a running alert status API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:19751")]
    url: String,

    /// Region name (public or canonical); lists every region when omitted
    name: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut url = Url::parse(&cli.url)?;
    if let Some(name) = &cli.name {
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot be a base URL", cli.url))?
            .pop_if_empty()
            .push(name);
    }

    let res = client.get(url).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
