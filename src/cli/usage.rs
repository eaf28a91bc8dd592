// src/cli/usage.rs — `xeerchat usage [--watch]`

use std::time::Instant;

use crate::cli::AppContext;
use crate::usage::{fetch_usage, render_usage, UsagePoller, UsageState};

pub async fn run_usage(ctx: &AppContext, watch: bool) -> anyhow::Result<()> {
    if !watch {
        let state = fetch_usage(ctx.backend.as_ref()).await;
        println!("{}", render_usage(&state, Instant::now()));
        if state == UsageState::Unavailable {
            anyhow::bail!("usage data unavailable");
        }
        return Ok(());
    }

    let mut poller = UsagePoller::start(ctx.backend.clone(), ctx.config.usage.poll_interval());
    let mut updates = poller.subscribe();
    loop {
        let state = updates.borrow_and_update().clone();
        if state != UsageState::Loading {
            println!("{}\n", render_usage(&state, Instant::now()));
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    poller.stop();
    eprintln!("Usage watch stopped.");
    Ok(())
}
