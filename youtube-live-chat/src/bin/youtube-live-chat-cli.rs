use eyre::{Context, bail};
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_live_chat::youtube_api::{LiveChatMessage, StaticToken, YouTubeClient};
use youtube_live_chat::{CancellationToken, ChatHandlers, LiveChatPoller, LiveChatStream};

const USAGE: &str = "usage: youtube-live-chat-cli [--stream] <live-chat-id>";

fn body(message: &LiveChatMessage) -> &str {
    message
        .text()
        .or(message.snippet.display_message.as_deref())
        .unwrap_or_default()
}

fn install_handlers(handlers: &ChatHandlers, ctx: &CancellationToken) {
    handlers.on_connect(|| tracing::info!("connected"));
    handlers.on_disconnect(|| tracing::info!("disconnected"));
    handlers.on_message(|m| {
        println!("{} [{}] {}", m.author_name(), m.snippet.details, body(m));
    });
    handlers.on_delete(|m| println!("-- {}", body(m)));
    handlers.on_ban(|m| println!("-- {}", body(m)));
    handlers.on_poll_complete(|count, interval| {
        tracing::debug!(count, ?interval, "poll complete");
    });

    let ctx = ctx.clone();
    handlers.on_error(move |e| {
        if e.is_chat_ended() {
            tracing::info!(error = %e, "exiting");
            ctx.cancel();
        } else {
            tracing::warn!(error = %e, "live chat error");
        }
    });
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let mut use_stream = false;
    let mut live_chat_id = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--stream" => use_stream = true,
            "-h" | "--help" => {
                eprintln!("{USAGE}");
                return Ok(());
            }
            _ if live_chat_id.is_none() => live_chat_id = Some(arg),
            _ => bail!("unexpected argument {arg:?}\n{USAGE}"),
        }
    }
    let Some(live_chat_id) = live_chat_id else {
        bail!("{USAGE}");
    };

    let token =
        std::env::var("YOUTUBE_ACCESS_TOKEN").context("read YOUTUBE_ACCESS_TOKEN from env")?;
    let mut client = YouTubeClient::new(StaticToken::new(token));
    if let Ok(base_url) = std::env::var("YOUTUBE_API_BASE_URL") {
        client = client.with_base_url(base_url);
    }

    let ctx = CancellationToken::new();
    if use_stream {
        let stream = LiveChatStream::new(client, live_chat_id);
        install_handlers(stream.handlers(), &ctx);
        stream.start(&ctx).context("start live chat stream")?;
        wait_for_exit(&ctx).await?;
        stream.stop().await;
    } else {
        let poller = LiveChatPoller::new(client, live_chat_id);
        install_handlers(poller.handlers(), &ctx);
        poller.start(&ctx).context("start live chat poller")?;
        wait_for_exit(&ctx).await?;
        poller.stop().await;
    }

    Ok(())
}

/// Returns on Ctrl-C or once the chat has ended.
async fn wait_for_exit(ctx: &CancellationToken) -> eyre::Result<()> {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.context("listen for Ctrl-C")?,
        _ = ctx.cancelled() => {}
    }
    Ok(())
}
