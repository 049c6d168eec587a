//! degrees: realtime lobby and session server.
//!
//! Serves the game's WebSocket protocol and resolves artists through the
//! Spotify Web API.

use clap::Parser;
use degrees::{DEFAULT_PLAYLIST_ID, DegreesServer, ServerConfig};
use degrees_lobby::LobbyConfig;
use degrees_metadata::{SpotifyCatalog, SpotifyConfig};
use tracing::{error, info, warn};

/// degrees: artist-hopping lobby server
#[derive(Parser, Debug)]
#[command(name = "degrees", version, about = "Artist-hopping lobby server")]
struct Cli {
    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Playlist the start and target artists are drawn from
    #[arg(long, env = "DEGREES_PLAYLIST_ID", default_value = DEFAULT_PLAYLIST_ID)]
    playlist_id: String,

    /// Spotify client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Spotify client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Maximum players per lobby
    #[arg(long, default_value_t = 8)]
    max_players: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cli.port,
        "starting degrees"
    );

    if cli.client_id.is_none() || cli.client_secret.is_none() {
        warn!("SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET not set, artist lookups will fail");
    }

    let catalog = match SpotifyCatalog::new(SpotifyConfig {
        client_id: cli.client_id,
        client_secret: cli.client_secret,
        ..SpotifyConfig::default()
    }) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "failed to create catalog client");
            std::process::exit(1);
        }
    };

    let config = ServerConfig {
        bind_addr: format!("{}:{}", cli.host, cli.port),
        playlist_id: cli.playlist_id,
        lobby: LobbyConfig {
            max_players: cli.max_players,
            ..LobbyConfig::default()
        },
        ..ServerConfig::default()
    };

    let server = match DegreesServer::builder().config(config).build(catalog).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
