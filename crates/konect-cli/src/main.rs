mod banner;
mod commands;

use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use konect_client::{ChatSession, ClientConfig, HttpApi, SessionStore, SessionUpdate, WsConnector};

use crate::banner::Banner;
use crate::commands::Command;

type Session = ChatSession<HttpApi, WsConnector>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging (stderr, so it does not interleave with the timeline)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "konect=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    info!("Using server {}", config.server_url);

    let store = SessionStore::open(&config.session_path);
    let api = HttpApi::new(config.server_url.clone());
    let connector = WsConnector::new(config.server_url.clone());
    let mut session = ChatSession::new(api, connector, store, &config);

    let mut banner = Banner::default();
    session.start().await;
    if session.is_signed_in() {
        print_rooms(&session, &mut banner);
    } else {
        println!("Not signed in. Use /login <email> <password> or /register <username> <email> <password>.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    show_notice(&session, &mut banner);
    loop {
        let expiry = session.notices().expires_at();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going = handle_line(&mut session, &mut banner, line).await?;
                show_notice(&session, &mut banner);
                if !keep_going {
                    break;
                }
            }
            _ = tokio::time::sleep_until(expiry.unwrap_or_else(Instant::now).into()), if expiry.is_some() => {
                if session.notices().current(Instant::now()).is_none() {
                    session.dismiss_notice();
                }
            }
            update = session.next_event() => {
                match update {
                    Some(SessionUpdate::Appended(pos)) => print_entry(&session, pos),
                    Some(SessionUpdate::Disconnected(room_id)) => {
                        println!("-- disconnected from {}; /join it again to resume", room_id);
                    }
                    Some(SessionUpdate::SignedOut) => println!("-- signed out"),
                    Some(SessionUpdate::Ignored) => {}
                    None => break,
                }
                show_notice(&session, &mut banner);
            }
        }
    }

    Ok(())
}

async fn handle_line(session: &mut Session, banner: &mut Banner, line: String) -> anyhow::Result<bool> {
    let command = match Command::parse(&line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(true),
        Err(usage) => {
            println!("{}", usage);
            return Ok(true);
        }
    };

    match command {
        Command::Quit => return Ok(false),
        Command::Auth(credentials) => {
            if session.authenticate(credentials).await {
                if let Some(me) = session.identity() {
                    println!("Signed in as {}", me.username);
                }
                print_rooms(session, banner);
            }
        }
        Command::Logout => {
            session.logout();
            println!("Signed out.");
        }
        Command::Rooms => {
            if session.load_rooms().await {
                print_rooms(session, banner);
            }
        }
        Command::Create { name, description } => {
            if session.create_room(&name, description.as_deref()).await.is_some() {
                print_timeline(session, banner);
            }
        }
        Command::Join(target) => {
            let room = target
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| session.rooms().get(i))
                .or_else(|| session.rooms().iter().find(|r| r.id.as_str() == target))
                .cloned();
            match room {
                Some(room) => {
                    session.select_room(room).await;
                    print_timeline(session, banner);
                }
                None => println!("No room '{}'. Use /rooms to list them.", target),
            }
        }
        Command::Upload(paths) => {
            let mut files = Vec::with_capacity(paths.len());
            for path in paths {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        let filename = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "unknown".into());
                        files.push((filename, bytes));
                    }
                    Err(e) => println!("Cannot read {}: {}", path.display(), e),
                }
            }
            session.upload_files(files).await;
        }
        Command::Say(text) => {
            let mut draft = text;
            session.send_message(&mut draft).await;
        }
    }
    Ok(true)
}

fn show_notice(session: &Session, banner: &mut Banner) {
    if let Some(message) = banner.fresh(session.notices(), Instant::now()) {
        eprintln!("! {}", message);
    }
}

fn show_live_notice(session: &Session, banner: &mut Banner) {
    if let Some(message) = banner.live(session.notices(), Instant::now()) {
        eprintln!("! {}", message);
    }
}

fn print_rooms(session: &Session, banner: &mut Banner) {
    show_live_notice(session, banner);
    if session.rooms().is_empty() {
        println!("No rooms yet. Create one with /create <name> [description].");
        return;
    }
    for (i, room) in session.rooms().iter().enumerate() {
        match &room.description {
            Some(desc) => println!("{:>3}. {} - {}", i + 1, room.name, desc),
            None => println!("{:>3}. {}", i + 1, room.name),
        }
    }
}

fn print_timeline(session: &Session, banner: &mut Banner) {
    if let Some(room) = session.active_room() {
        println!("== {} ==", room.name);
    }
    show_live_notice(session, banner);
    for pos in 0..session.timeline().len() {
        print_entry(session, pos);
    }
}

fn print_entry(session: &Session, pos: usize) {
    let Some(message) = session.timeline().get(pos) else {
        return;
    };
    let author = if session.is_own(message) {
        "You".to_string()
    } else {
        message
            .author_name
            .clone()
            .unwrap_or_else(|| "User".to_string())
    };
    let time = message.created_at.with_timezone(&chrono::Local).format("%H:%M:%S");
    println!("[{}] {}: {}", time, author, message.preview());
}
