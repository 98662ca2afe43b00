use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genux::transport::{Transport, TransportClient};
use genux::{proxy, ArtifactType, Config, FeatureId, FeatureRequest, Genux, PageDocument};

#[derive(Parser)]
#[command(name = "genux")]
#[command(about = "Generate UI features from natural-language requests")]
struct Cli {
    /// JSON config file, applied before GENUX_* environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, store and apply a new feature
    Generate {
        prompt: String,

        #[arg(short = 't', long = "type", value_enum, default_value = "markup")]
        artifact_type: ArtifactType,
    },
    /// List stored features
    List,
    /// Remove a stored feature
    Remove { id: FeatureId },
    /// Remove every stored feature
    Clear,
    /// Print the page with every stored feature applied
    Render,
    /// Run the generation proxy server
    Proxy {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

/// Logs go to stderr so `list` and `render` output stays clean.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "genux=info,tower_http=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let base = match path {
        Some(path) => Config::load_file(path)?,
        None => Config::default(),
    };
    Ok(base.with_env()?)
}

/// Build the coordinator over `page` and apply every saved feature to it.
async fn open(config: Config, page: &Arc<Mutex<PageDocument>>) -> anyhow::Result<Genux> {
    Ok(Genux::builder(config)
        .document(page.clone())
        .initialize()
        .await?)
}

async fn serve_proxy(config: Config, port: u16) -> anyhow::Result<()> {
    let client = TransportClient::new(Transport::Direct {
        endpoint: config.api_endpoint,
        api_key: config.api_key,
    });
    let app = proxy::create_router(client);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Genux proxy listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_ref())?;
    let page = Arc::new(Mutex::new(PageDocument::new()));

    match cli.command {
        Commands::Generate {
            prompt,
            artifact_type,
        } => {
            let genux = open(config, &page).await?;
            let feature = genux
                .create(FeatureRequest::new(prompt, artifact_type))
                .await?;
            println!("{}\t{}", feature.id, feature.artifact_type);
            println!("{}", feature.code);
        }
        Commands::List => {
            let genux = open(config, &page).await?;
            for feature in genux.list_features().await? {
                println!("{}\t{}\t{}", feature.id, feature.artifact_type, feature.prompt);
            }
        }
        Commands::Remove { id } => {
            let genux = open(config, &page).await?;
            if genux.get_feature(id).await?.is_none() {
                anyhow::bail!("Feature not found: {}", id);
            }
            genux.remove_feature(id, false).await?;
        }
        Commands::Clear => {
            let genux = open(config, &page).await?;
            genux.clear_features(false).await?;
        }
        Commands::Render => {
            open(config, &page).await?;
            let page = page.lock().expect("document lock poisoned");
            println!("{}", page.render());
        }
        Commands::Proxy { port } => serve_proxy(config, port).await?,
    }

    Ok(())
}
