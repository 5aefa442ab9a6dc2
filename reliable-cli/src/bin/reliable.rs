//! reliable - byte streams over UDP
//!
//! `client` sends stdin to a server and writes whatever comes back to
//! stdout. `server` echoes every peer's stream back to it. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reliable_cli::{
    format_bytes, format_session_stats, AwaitReply, BufferedOutput, ChannelInput, ClientConfig,
    Config, EchoServer, ServerConfig, SessionSettings, StatsBoard, Teardown, UdpTransport,
};
use reliable_io::{DatagramSocket, TickTimer};
use reliable_protocol::packet::MAX_PACKET_SIZE;
use reliable_protocol::Session;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Longest the loop sleeps when nothing happened
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Kernel socket buffer size requested for both directions
const SOCKET_BUFFER: usize = 256 * 1024;

/// Chunks the stdin reader may queue ahead of the session
const INPUT_DEPTH: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "reliable")]
#[command(about = "Reliable in-order byte streams over UDP", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Window size in packets
    #[arg(short, long, global = true)]
    window: Option<usize>,

    /// Retransmission timeout in ticks
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Tick length in milliseconds
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Send stdin to a server and write the reply stream to stdout
    Client {
        /// Server address
        #[arg(long)]
        connect: Option<SocketAddr>,

        /// Local bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Statistics interval in seconds (0 disables)
        #[arg(long)]
        stats: Option<u64>,

        /// Exit once input is sent and acknowledged, without waiting for the echo
        #[arg(long)]
        no_await: bool,
    },
    /// Echo each peer's stream back to it
    Server {
        /// Listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Statistics interval in seconds (0 disables)
        #[arg(long)]
        stats: Option<u64>,

        /// Drop peers silent for this many seconds (0 disables)
        #[arg(long)]
        idle_timeout: Option<u64>,
    },
    /// Write an example configuration file
    ExampleConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => Config::default(),
    };
    apply_session_overrides(&mut config.session, &args);

    match args.mode {
        Mode::Client {
            connect,
            bind,
            stats,
            no_await,
        } => {
            let mut client = match (config.client.take(), connect) {
                (Some(mut client), peer) => {
                    if let Some(peer) = peer {
                        client.peer = peer;
                    }
                    client
                }
                (None, Some(peer)) => ClientConfig {
                    peer,
                    bind: None,
                    output_buffer: 64 * 1024,
                    stats_interval_secs: 0,
                    await_reply: true,
                },
                (None, None) => anyhow::bail!("Client mode needs --connect or a [client] table"),
            };
            if bind.is_some() {
                client.bind = bind;
            }
            if let Some(secs) = stats {
                client.stats_interval_secs = secs;
            }
            if no_await {
                client.await_reply = false;
            }
            run_client(&client, &config.session)
        }
        Mode::Server {
            listen,
            stats,
            idle_timeout,
        } => {
            let mut server = match (config.server.take(), listen) {
                (Some(mut server), addr) => {
                    if let Some(addr) = addr {
                        server.listen = addr;
                    }
                    server
                }
                (None, Some(listen)) => ServerConfig {
                    listen,
                    echo_buffer: 64 * 1024,
                    stats_interval_secs: 1,
                    idle_timeout_secs: 30,
                },
                (None, None) => anyhow::bail!("Server mode needs --listen or a [server] table"),
            };
            if let Some(secs) = stats {
                server.stats_interval_secs = secs;
            }
            if let Some(secs) = idle_timeout {
                server.idle_timeout_secs = secs;
            }
            run_server(&server, &config.session)
        }
        Mode::ExampleConfig { path } => {
            Config::example().to_file(&path)?;
            tracing::info!("Wrote example configuration to {}", path.display());
            Ok(())
        }
    }
}

fn apply_session_overrides(session: &mut SessionSettings, args: &Args) {
    if let Some(window) = args.window {
        session.window_size = window;
    }
    if let Some(timeout) = args.timeout {
        session.retransmission_timeout = timeout;
    }
    if let Some(tick_ms) = args.tick_ms {
        session.tick_interval_ms = tick_ms;
    }
}

fn tune_socket(socket: &DatagramSocket) {
    if let Err(e) = socket
        .set_send_buffer_size(SOCKET_BUFFER)
        .and_then(|_| socket.set_recv_buffer_size(SOCKET_BUFFER))
    {
        tracing::warn!(error = %e, "could not resize socket buffers");
    }
}

fn run_client(client: &ClientConfig, settings: &SessionSettings) -> anyhow::Result<()> {
    let session_config = settings.session_config()?;

    let socket = match client.bind {
        Some(addr) => DatagramSocket::bind(addr)?,
        None => DatagramSocket::bind_any_for(client.peer)?,
    };
    tune_socket(&socket);
    let socket = Rc::new(socket);
    tracing::info!(
        local = %socket.local_addr()?,
        peer = %client.peer,
        window = session_config.window_size,
        timeout = session_config.retransmission_timeout,
        "client starting"
    );

    let stdin = ChannelInput::stdin(INPUT_DEPTH)?;
    let input = if client.await_reply {
        AwaitReply::new(stdin)
    } else {
        AwaitReply::passthrough(stdin)
    };
    let mut session = Session::new(
        session_config,
        UdpTransport::new(Rc::clone(&socket), client.peer),
        input,
        BufferedOutput::stdout(client.output_buffer),
    )?;

    let board = StatsBoard::new();
    if let Some(interval) = client.stats_interval() {
        board.spawn_reporter(interval)?;
    }
    let peer_label = client.peer.to_string();

    let mut timer = TickTimer::new(settings.tick_interval());
    let mut buffer = vec![0u8; MAX_PACKET_SIZE * 4];

    loop {
        let mut busy = false;

        while let Some((n, from)) = socket.try_recv_from(&mut buffer)? {
            busy = true;
            if from != client.peer {
                tracing::debug!(%from, "ignoring datagram from unknown peer");
                continue;
            }
            session.on_packet_received(&buffer[..n]);
        }

        let returned = session.stats().bytes_delivered;
        session.input_mut().set_returned(returned);
        session.on_input_available();

        if session.output_mut().flush_pending()? > 0 {
            busy = true;
            session.on_output_space_freed();
        }

        let ticks = timer.poll();
        for _ in 0..ticks {
            session.on_timer_tick();
        }
        if ticks > 0 {
            board.publish(&peer_label, session.stats());
        }

        if session.is_closed() {
            session.output_mut().flush_pending()?;
            break;
        }

        if !busy {
            thread::sleep(timer.time_until_next().min(IDLE_SLEEP));
        }
    }

    let stats = session.stats();
    tracing::info!(
        "Session closed: sent {}, received {}",
        format_bytes(stats.bytes_sent),
        format_bytes(stats.bytes_delivered)
    );
    tracing::info!("{}", format_session_stats(&peer_label, stats));
    Ok(())
}

fn run_server(server: &ServerConfig, settings: &SessionSettings) -> anyhow::Result<()> {
    let socket = DatagramSocket::bind(server.listen)?;
    tune_socket(&socket);
    let socket = Rc::new(socket);
    let idle_limit = server.idle_limit_ticks(settings.tick_interval());
    let mut echo: EchoServer<UdpTransport> =
        EchoServer::new(settings.session_config()?, server.echo_buffer, idle_limit)?;
    tracing::info!(
        local = %socket.local_addr()?,
        window = echo.config().window_size,
        timeout = echo.config().retransmission_timeout,
        idle_limit,
        "server listening"
    );

    let board = StatsBoard::new();
    if let Some(interval) = server.stats_interval() {
        board.spawn_reporter(interval)?;
    }

    let mut timer = TickTimer::new(settings.tick_interval());
    let mut buffer = vec![0u8; MAX_PACKET_SIZE * 4];

    loop {
        let mut busy = false;

        while let Some((n, from)) = socket.try_recv_from(&mut buffer)? {
            busy = true;
            echo.on_datagram(from, &buffer[..n], |peer| {
                UdpTransport::new(Rc::clone(&socket), *peer)
            });
        }

        echo.pump();

        let ticks = timer.poll();
        if ticks > 0 {
            for (peer, teardown) in echo.on_ticks(u64::from(ticks)) {
                if teardown == Teardown::Idle {
                    tracing::warn!(%peer, "peer went silent, session dropped");
                }
                board.remove(&peer.to_string());
            }
            for (peer, session) in echo.sessions() {
                board.publish(&peer.to_string(), session.stats());
            }
        }

        if !busy {
            thread::sleep(timer.time_until_next().min(IDLE_SLEEP));
        }
    }
}
