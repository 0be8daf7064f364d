//! services/discussion_client/src/bin/discussion_watch.rs
//!
//! Joins one discussion thread and logs everything that happens in it until Ctrl-C.

use clap::Parser;
use discussion_client_lib::{
    adapters::WebSocketTransport, config::ClientConfig, error::ClientError,
    DiscussionSocketService,
};
use discussion_core::ThreadRoster;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "discussion-watch", about = "Watch a discussion thread in real time")]
struct Args {
    /// Thread to join (course review or lesson discussion thread id).
    #[arg(long)]
    thread: String,
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    user_name: String,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let args = Args::parse();
    let config = ClientConfig::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Watching thread {}", args.thread);

    // --- 2. Connect ---
    let transport = Arc::new(WebSocketTransport::new());
    let mut service = DiscussionSocketService::new(transport, &config);
    service.connect()?;

    // --- 3. Subscribe ---
    let roster = Arc::new(Mutex::new(ThreadRoster::new()));

    service.on_new_post(|post| {
        let kind = if post.is_reply() { "reply" } else { "post" };
        info!("New {} {} by {}: {}", kind, post.id, post.author_id, post.content);
    })?;
    service.on_update_post(|post| {
        let summary = post.reaction_summary();
        info!(
            "Post {} updated (edited: {}, {} reactions)",
            post.id, post.is_edited, summary.total
        );
    })?;
    service.on_delete_post(|deleted| info!("Post {} deleted", deleted.post_id))?;

    let snapshot_roster = roster.clone();
    service.on_thread_users(move |users| {
        let mut roster = snapshot_roster.lock();
        roster.apply_snapshot(users.clone());
        info!("{} user(s) viewing thread {}", roster.len(), users.thread_id);
    })?;
    let joined_roster = roster.clone();
    service.on_user_joined(move |user| {
        let mut roster = joined_roster.lock();
        if roster.apply_joined(user.clone()) {
            info!("{} joined ({} viewing)", user.user_name, roster.len());
        }
    })?;
    service.on_disconnect(|reason| warn!("Lost the gateway: {}", reason))?;

    // --- 4. Join and Wait ---
    service.join_thread(&args.thread, &args.user_id, &args.user_name)?;
    tokio::signal::ctrl_c().await?;

    // --- 5. Cleanup ---
    info!("Leaving thread {}", args.thread);
    if let Err(e) = service.leave_thread(&args.thread, &args.user_id) {
        warn!("Failed to announce leave: {}", e);
    }
    // Let the transport flush the leave announcement before closing.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    service.disconnect();
    info!("Disconnected.");
    Ok(())
}
