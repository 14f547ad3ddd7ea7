use anyhow::Result;
use clap::{Parser, Subcommand};
use douyin_sync::cli::{query, sync, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "ds", version, about = "Douyin → Feishu Bitable sync CLI")]
struct Cli {
    /// Verbose logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch one video and print its normalized record
    Query {
        /// Douyin video id (19 digits)
        #[arg(long)]
        video_id: Option<String>,
        /// Douyin video or share URL
        #[arg(long)]
        url: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// Sync a Feishu Bitable table against the platform
    Sync {
        /// Bitable app token
        #[arg(long)]
        app_token: String,
        /// Table id
        #[arg(long)]
        table_id: String,
        /// Optional view id
        #[arg(long)]
        view_id: Option<String>,
        /// Re-fetch rows that already look complete
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    douyin_sync::logging::init_tracing(default_filter)?;

    match cli.command {
        Commands::Query {
            video_id,
            url,
            output,
        } => {
            let Some(video) = video_id.or(url) else {
                anyhow::bail!("provide --video-id or --url");
            };
            query::run(query::QueryConfig { video, output }).await
        }
        Commands::Sync {
            app_token,
            table_id,
            view_id,
            force,
            output,
        } => {
            sync::run(sync::SyncConfig {
                app_token,
                table_id,
                view_id,
                force,
                output,
            })
            .await
        }
    }
}
