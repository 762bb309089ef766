// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive shell: the reference transport over the orchestrator.
//!
//! Lines from stdin become user turns; `/new` and `/reset` are the two
//! transport commands; proactive scheduler replies print as they
//! arrive.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::error;

use mnemos_agent::App;
use mnemos_config::Config;
use mnemos_core::Error;

const APOLOGY: &str = "Sorry, something went wrong on my side; your message was not lost - please try again.";

pub async fn run(config: &Config) -> Result<(), Error> {
    let mut app = App::build(config).await?;
    let cancel = CancellationToken::new();

    let scheduler = app.scheduler;
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });

    println!("mnemos shell - /new rotates the session, /reset discards it, /quit exits");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(|e| Error::UpstreamFailure {
                    message: format!("stdin read failed: {e}"),
                    source: Some(Box::new(e)),
                })? else {
                    break;
                };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                match input {
                    "/quit" | "/exit" => break,
                    "/new" => match app.orchestrator.new_session().await {
                        Ok(session_id) => println!("(session rotated: {session_id})"),
                        Err(e) => {
                            error!(error = %e, kind = e.kind(), "session rotate failed");
                            println!("{APOLOGY}");
                        }
                    },
                    "/reset" => match app.orchestrator.reset_session().await {
                        Ok(session_id) => println!("(session reset: {session_id})"),
                        Err(e) => {
                            error!(error = %e, kind = e.kind(), "session reset failed");
                            println!("{APOLOGY}");
                        }
                    },
                    text => match app.orchestrator.handle_user_turn(text).await {
                        Ok(reply) => println!("{reply}"),
                        Err(e) => {
                            // The input is not silently dropped: the
                            // error is surfaced and the user can retry.
                            error!(error = %e, kind = e.kind(), "turn failed");
                            println!("{APOLOGY}");
                        }
                    },
                }
            }
            reply = app.proactive_rx.recv() => {
                if let Some(reply) = reply {
                    println!("{reply}");
                }
            }
        }
    }

    cancel.cancel();
    let _ = scheduler_handle.await;
    Ok(())
}
