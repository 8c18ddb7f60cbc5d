//! Entry point: parses launch configuration, binds the authenticated IPC
//! socket, accepts the one connection this invocation will ever serve, and
//! dispatches requests until the helper hands off to the Shutdown
//! Controller.

mod config;
mod error;
mod request_handler;
mod shutdown;
mod version;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Args;
use error::HelperError;
use flashd_ipc::{request_tag, response_tag, AllowedPeer, Connection, Message};

fn main() {
    let args = Args::parse();
    init_logging(&args);
    shutdown::init();

    match run(&args) {
        Ok(()) => shutdown::exit_success(),
        Err(err) => shutdown::exit_with_error(&err),
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn run(args: &Args) -> Result<(), HelperError> {
    let allowed = AllowedPeer {
        bundle_id: args.allowed_bundle_id.clone(),
        team_id: args.allowed_team_id.clone(),
    };

    let listener = flashd_ipc::transport::bind(&args.socket_path).map_err(HelperError::Transport)?;
    let mut connection = flashd_ipc::transport::accept(&listener, &allowed).map_err(HelperError::Transport)?;
    tracing::info!(
        bundle_id = %connection.peer.bundle_id,
        team_id = %connection.peer.team_id,
        "accepted authenticated peer"
    );

    loop {
        let message = match connection.recv().map_err(HelperError::Transport)? {
            Some(message) => message,
            None => {
                tracing::info!("peer disconnected");
                return Ok(());
            }
        };

        match message.tag() {
            Some(request_tag::INITIAL_PING) => {
                connection
                    .send(&Message::new(response_tag::INITIAL_PONG))
                    .map_err(HelperError::Transport)?;
            }
            Some(request_tag::GET_HELPER_VERSION) => {
                let mut reply = Message::new(response_tag::HELPER_VERSION_OBTAINED);
                reply.set_str("version", version::VERSION);
                connection.send(&reply).map_err(HelperError::Transport)?;
            }
            Some(request_tag::WRITE_ISO_TO_DEVICE) => {
                request_handler::handle_write_image(&mut connection, args, &message)?;
                return Ok(());
            }
            Some(other) => {
                tracing::warn!(tag = other, "ignoring unknown request tag");
            }
            None => {
                tracing::warn!("ignoring message with no tag");
            }
        }
    }
}
