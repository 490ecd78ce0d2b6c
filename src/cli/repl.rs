use log::error;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use crate::history::format_turns_for_display;
use crate::models::websocket::StreamEvent;
use crate::scheduler::{ parse_schedule_time, PostScheduler };
use crate::session::ChatSession;

const HELP: &str = "Commands: /post <YYYY-MM-DD HH:MM>, /dismiss, /scheduled, /history, /mode, /quit";

/// Interactive console loop over stdin.
pub async fn run(
    mut session: ChatSession,
    scheduler: PostScheduler,
    session_id: String
) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("LinkedIn agent ready. {}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => {
                break;
            }
            "/help" => println!("{}", HELP),
            "/mode" => println!("Transport: {}", session.mode()),
            "/history" => print!("{}", format_turns_for_display(session.state())),
            "/dismiss" =>
                match session.dismiss_publish_offer() {
                    Some(_) => println!("Post preview discarded."),
                    None => println!("No post preview to discard."),
                }
            "/post" =>
                match parse_schedule_time(rest) {
                    Some(at) =>
                        match session.schedule_pending(&scheduler, &session_id, at).await {
                            Ok(post) => println!("Scheduled for {}.", post.schedule_time),
                            Err(e) => println!("Could not schedule post: {}", e),
                        }
                    None => println!("Usage: /post <YYYY-MM-DD HH:MM>"),
                }
            "/scheduled" =>
                match scheduler.list(&session_id).await {
                    Ok(posts) if posts.is_empty() => println!("No scheduled posts."),
                    Ok(posts) => {
                        for post in posts {
                            println!(
                                "[{}] {}: {}",
                                post.status.as_deref().unwrap_or("scheduled"),
                                post.schedule_time,
                                post.content
                            );
                        }
                    }
                    Err(e) => println!("Could not load scheduled posts: {}", e),
                }
            _ => send_message(&mut session, line).await,
        }
    }

    session.close();
    Ok(())
}

async fn send_message(session: &mut ChatSession, text: &str) {
    let result = session.send(text, |event| {
        match event {
            StreamEvent::Fragment { text } => print!("{}", text),
            StreamEvent::Complete { .. } => println!(),
            StreamEvent::Error { message } => println!("\n[error] {}", message),
        }
        if let Err(e) = std::io::stdout().flush() {
            error!("Failed to flush stdout: {}", e);
        }
    }).await;

    if let Err(e) = result {
        println!("{}", e);
        return;
    }

    if let Some(preview) = session.state().pending_publish_content() {
        println!("\n--- Post preview ---\n{}\n--------------------", preview);
        println!("Schedule it with /post <YYYY-MM-DD HH:MM> or discard it with /dismiss.");
    }
}
