//! `liveboard`: command-line client for the LiveBoard relay.
//!
//! Speaks the same protobuf frame protocol as the browser canvas, so every
//! subcommand is an ordinary relay peer: it connects to `/api/ws`, waits for
//! `session:connected`, joins a room, and then issues requests.
//!
//! Data goes to stdout (JSON, one value per line) so output can be piped into
//! `jq` or back into `liveboard draw`; progress and summaries go through
//! `tracing` on stderr.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use frames::syscall::{self, field};
use frames::{DrawItem, Frame, ItemError, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket failed: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("input line {line}: {source}")]
    InvalidItem {
        line: usize,
        #[source]
        source: ItemError,
    },
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "liveboard", about = "LiveBoard relay CLI")]
struct Cli {
    #[arg(long, env = "LIVEBOARD_BASE_URL", default_value = "http://localhost:3001")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the relay is up.
    Ping,
    /// Join a room and print every frame the relay sends.
    Watch(WatchArgs),
    /// Join a room and print its draw history as JSONL.
    Export(RoomArgs),
    /// Stream JSONL draw items into a room.
    Draw(DrawArgs),
    /// Post a chat message.
    Chat(ChatArgs),
    /// Pop the most recent draw item in a room.
    Undo(RoomArgs),
    /// Erase a room's drawing.
    Clear(RoomArgs),
}

#[derive(Args, Debug)]
struct RoomArgs {
    #[arg(long)]
    room: String,

    #[arg(long, default_value = "cli")]
    name: String,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    room: RoomArgs,

    #[arg(long, help = "Stop after this many relayed frames")]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct DrawArgs {
    #[command(flatten)]
    room: RoomArgs,

    #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = false, help = "Skip lines that are not valid draw items")]
    skip_invalid: bool,

    #[arg(long, help = "Stop after this many sent items")]
    max_items: Option<usize>,

    #[arg(long, default_value_t = 1000)]
    progress_every: usize,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[command(flatten)]
    room: RoomArgs,

    text: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url;

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::Watch(args) => run_watch(&base_url, args).await,
        Command::Export(args) => run_export(&base_url, args).await,
        Command::Draw(args) => run_draw(&base_url, args).await,
        Command::Chat(args) => run_chat(&base_url, args).await,
        Command::Undo(args) => run_simple(&base_url, &args, syscall::DRAW_UNDO).await,
        Command::Clear(args) => run_simple(&base_url, &args, syscall::DRAW_CLEAR).await,
    }
}

// =============================================================================
// SUBCOMMANDS
// =============================================================================

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            syscall: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_watch(base_url: &str, args: WatchArgs) -> Result<(), CliError> {
    let (mut stream, snapshot) = connect_and_join(base_url, &args.room).await?;
    print_frame(&snapshot)?;

    let mut seen = 0_usize;
    while args.limit.is_none_or(|limit| seen < limit) {
        let frame = next_frame(&mut stream).await?;
        print_frame(&frame)?;
        seen = seen.saturating_add(1);
    }
    stream.close(None).await?;
    Ok(())
}

async fn run_export(base_url: &str, args: RoomArgs) -> Result<(), CliError> {
    let (mut stream, snapshot) = connect_and_join(base_url, &args).await?;
    let history = snapshot
        .data
        .get(field::DRAW_HISTORY)
        .and_then(Value::as_array)
        .ok_or(CliError::MissingField(field::DRAW_HISTORY))?;

    for item in history {
        println!("{}", serde_json::to_string(item)?);
    }
    info!(room = %args.room, items = history.len(), "export complete");
    stream.close(None).await?;
    Ok(())
}

async fn run_draw(base_url: &str, args: DrawArgs) -> Result<(), CliError> {
    let mut reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.input)?))
    };

    let (mut stream, _) = connect_and_join(base_url, &args.room).await?;

    let mut sent = 0_usize;
    let mut skipped = 0_usize;
    let mut line_no = 0_usize;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no = line_no.saturating_add(1);

        let item = match parse_draw_line(&line) {
            Ok(Some(item)) => item,
            Ok(None) => continue,
            Err(source) if args.skip_invalid => {
                warn!(line = line_no, error = %source, "skipping invalid draw item");
                skipped = skipped.saturating_add(1);
                continue;
            }
            Err(source) => return Err(CliError::InvalidItem { line: line_no, source }),
        };

        // draw:append is never acknowledged; the relay applies a connection's
        // frames in the order they arrive.
        let req = request_frame(syscall::DRAW_APPEND, &args.room.room, json!({ "item": item.to_value() }));
        send(&mut stream, &req).await?;

        sent = sent.saturating_add(1);
        if args.progress_every > 0 && sent.is_multiple_of(args.progress_every) {
            info!(sent, "streaming draw items");
        }
        if args.max_items.is_some_and(|limit| sent >= limit) {
            break;
        }
    }

    stream.close(None).await?;
    info!(room = %args.room.room, sent, skipped, "draw complete");
    Ok(())
}

async fn run_chat(base_url: &str, args: ChatArgs) -> Result<(), CliError> {
    let (mut stream, _) = connect_and_join(base_url, &args.room).await?;
    let message = json!({ "author": args.room.name, "text": args.text });
    let req = request_frame(syscall::CHAT_SEND, &args.room.room, json!({ "message": message }));
    send(&mut stream, &req).await?;
    wait_for_terminal_response(&mut stream, &req.id, syscall::CHAT_SEND).await?;
    stream.close(None).await?;
    println!("ok");
    Ok(())
}

/// Join, issue one payload-free request, and wait for its `done`.
async fn run_simple(base_url: &str, args: &RoomArgs, name: &str) -> Result<(), CliError> {
    let (mut stream, _) = connect_and_join(base_url, args).await?;
    let req = request_frame(name, &args.room, Value::Object(Map::new()));
    send(&mut stream, &req).await?;
    wait_for_terminal_response(&mut stream, &req.id, name).await?;
    stream.close(None).await?;
    println!("ok");
    Ok(())
}

// =============================================================================
// SESSION
// =============================================================================

/// Connect, wait for the greeting, and join `args.room`. Returns the stream
/// and the `room:join` snapshot frame.
async fn connect_and_join(base_url: &str, args: &RoomArgs) -> Result<(WsStream, Frame), CliError> {
    let url = ws_url(base_url)?;
    let (mut stream, _) = connect_async(url.as_str()).await?;
    let peer_id = wait_for_session_connected(&mut stream).await?;

    let join = request_frame(
        syscall::ROOM_JOIN,
        &args.room,
        json!({ "room_id": args.room, "name": args.name }),
    );
    send(&mut stream, &join).await?;
    let snapshot = wait_for_terminal_response(&mut stream, &join.id, syscall::ROOM_JOIN).await?;
    info!(%url, %peer_id, room = %args.room, "joined");
    Ok((stream, snapshot))
}

async fn wait_for_session_connected(stream: &mut WsStream) -> Result<String, CliError> {
    loop {
        let frame = recv_next(stream, CONNECT_TIMEOUT).await?;
        if frame.syscall == syscall::SESSION_CONNECTED {
            return frame
                .data
                .get(field::PEER_ID)
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .ok_or(CliError::MissingField(field::PEER_ID));
        }
    }
}

async fn wait_for_terminal_response(stream: &mut WsStream, request_id: &str, syscall: &str) -> Result<Frame, CliError> {
    loop {
        let frame = recv_next(stream, REPLY_TIMEOUT).await?;
        if frame.answers(request_id) && frame.syscall == syscall && frame.status.is_terminal() {
            return terminal_result(frame);
        }
    }
}

/// Map a terminal reply onto success or [`CliError::ServerError`].
fn terminal_result(frame: Frame) -> Result<Frame, CliError> {
    if frame.status != Status::Error {
        return Ok(frame);
    }
    let message = frame.error_message().unwrap_or("unknown websocket error").to_owned();
    Err(CliError::ServerError { syscall: frame.syscall, message })
}

async fn recv_next(stream: &mut WsStream, timeout: Duration) -> Result<Frame, CliError> {
    tokio::time::timeout(timeout, next_frame(stream))
        .await
        .map_err(|_| CliError::Timeout)?
}

async fn next_frame(stream: &mut WsStream) -> Result<Frame, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(CliError::WsClosed);
        };
        match message? {
            Message::Binary(bytes) => return frames::decode_frame(&bytes).map_err(CliError::from),
            Message::Close(_) => return Err(CliError::WsClosed),
            _ => {}
        }
    }
}

async fn send(stream: &mut WsStream, frame: &Frame) -> Result<(), CliError> {
    stream.send(Message::Binary(frames::encode_frame(frame).into())).await?;
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws"));
    }
    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn request_frame(syscall: &str, room_id: &str, data: Value) -> Frame {
    Frame {
        id: Uuid::new_v4().to_string(),
        parent_id: None,
        ts: now_ms(),
        room_id: Some(room_id.to_owned()),
        from: None,
        syscall: syscall.to_owned(),
        status: Status::Request,
        data,
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

fn print_frame(frame: &Frame) -> Result<(), CliError> {
    println!("{}", serde_json::to_string(frame)?);
    Ok(())
}

/// One JSONL input line. Blank lines and `#` comments yield `None`.
fn parse_draw_line(line: &str) -> Result<Option<DrawItem>, ItemError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let value = serde_json::from_str::<Value>(trimmed)?;
    DrawItem::from_value(&value).map(Some)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
