use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use superagent_sdk::config::config_search_paths;
use superagent_sdk::{
    ChatCompletionRequest, ClientConfig, Message, SdkConfig, SuperAgentClient,
    VerificationRequest, VerifierClient,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "superagent-cli",
    about = "Command-line client for the SuperAgent and Verifier services",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the target service (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key for the target service (overrides config and environment)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to SuperAgent
    Chat {
        prompt: String,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        system: Option<String>,
        /// Print the answer as it arrives
        #[arg(long)]
        stream: bool,
    },
    /// List SuperAgent models
    Models,
    /// SuperAgent health
    Health,
    /// Verify a model with the Verifier
    Verify { model: String, provider: String },
    /// Show a model's score
    Score { model: String },
    /// Show the best-scoring models
    Top {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Health of every monitored provider
    ProvidersHealth,
    /// Print config search paths and exit
    ShowConfigPaths,
}

impl Cli {
    fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        if let Some(ref key) = self.api_key {
            config.api_key = Some(key.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superagent_sdk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Command::ShowConfigPaths = cli.command {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let config = SdkConfig::find_and_load(cli.config.as_deref())?;

    match &cli.command {
        Command::Chat {
            prompt,
            model,
            system,
            stream,
        } => {
            let client = SuperAgentClient::new(&cli.apply_overrides(config.superagent()))?;

            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system.as_str()));
            }
            messages.push(Message::user(prompt.as_str()));

            let mut request = ChatCompletionRequest::new(messages);
            if let Some(model) = model {
                request = request.model(model.as_str());
            }

            if *stream {
                let mut chunks = client.chat_completion_stream(request).await?;
                let mut stdout = std::io::stdout();
                while let Some(chunk) = chunks.next().await {
                    if let Some(text) = chunk?.delta_content() {
                        write!(stdout, "{text}")?;
                        stdout.flush()?;
                    }
                }
                writeln!(stdout)?;
            } else {
                let completion = client.chat_completion(request).await?;
                println!("{}", completion.content().unwrap_or_default());
                if let Some(usage) = completion.usage {
                    info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion finished"
                    );
                }
            }
        }
        Command::Models => {
            let client = SuperAgentClient::new(&cli.apply_overrides(config.superagent()))?;
            for model in client.list_models().await? {
                println!("{}\t{}", model.id, model.owned_by);
            }
        }
        Command::Health => {
            let client = SuperAgentClient::new(&cli.apply_overrides(config.superagent()))?;
            println!("{}", serde_json::to_string_pretty(&client.health().await?)?);
        }
        Command::Verify { model, provider } => {
            let client = VerifierClient::new(&cli.apply_overrides(config.verifier()))?;
            let result = client
                .verify_model(&VerificationRequest::new(model.as_str(), provider.as_str()))
                .await?;
            println!(
                "{} ({}): verified={} score={:.1}{} code_visible={}",
                result.model_id,
                result.provider,
                result.verified,
                result.overall_score,
                result.score_suffix,
                result.code_visible
            );
            let mut tests: Vec<_> = result.tests.iter().collect();
            tests.sort();
            for (name, passed) in tests {
                println!("  {} {}", if *passed { "pass" } else { "FAIL" }, name);
            }
        }
        Command::Score { model } => {
            let client = VerifierClient::new(&cli.apply_overrides(config.verifier()))?;
            let score = client.model_score(model).await?;
            println!(
                "{} {:.2} {}",
                score.model_id, score.overall_score, score.score_suffix
            );
            let c = &score.components;
            println!(
                "  speed={:.2} efficiency={:.2} cost={:.2} capability={:.2} recency={:.2}",
                c.speed_score, c.efficiency_score, c.cost_score, c.capability_score, c.recency_score
            );
        }
        Command::Top { limit } => {
            let client = VerifierClient::new(&cli.apply_overrides(config.verifier()))?;
            for model in client.top_models(*limit).await? {
                println!(
                    "{:>3}. {} ({}) {:.2}",
                    model.rank, model.name, model.provider, model.overall_score
                );
            }
        }
        Command::ProvidersHealth => {
            let client = VerifierClient::new(&cli.apply_overrides(config.verifier()))?;
            for health in client.all_providers_health().await? {
                println!(
                    "{}\t{}\t{}\t{}ms\t{:.1}%",
                    health.provider_id,
                    if health.healthy { "healthy" } else { "unhealthy" },
                    health.circuit_state,
                    health.avg_response_ms,
                    health.uptime_percent
                );
            }
        }
        Command::ShowConfigPaths => {}
    }

    Ok(())
}
