use std::io::{self, BufRead, Write};

use colored::*;

use newhealth_chat::ChatSession;

use crate::output::{print_banner, print_turn};

/// Sends one prompt and prints the assistant's reply.
pub async fn run_single_query(session: &ChatSession, prompt: &str) {
    session.send_message(prompt, None).await;
    if let Some(reply) = session.turns().await.last() {
        print_turn(reply);
    }
}

/// Interactive loop: lines go to the assistant, slash commands control the
/// session.
pub async fn run_interactive_chat(session: &ChatSession) -> anyhow::Result<()> {
    print_banner();
    for turn in session.turns().await.iter() {
        print_turn(turn);
    }

    let stdin = io::stdin();
    loop {
        print!("{} ", ">".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear().await;
                for turn in session.turns().await.iter() {
                    print_turn(turn);
                }
            }
            "/deep" => {
                let enabled = !session.deep_analysis();
                session.set_deep_analysis(enabled);
                let status = if enabled { "on" } else { "off" };
                println!("{}", format!("Deep analysis {}.", status).dimmed());
            }
            prompt => {
                session.send_message(prompt, None).await;
                if let Some(reply) = session.turns().await.last() {
                    print_turn(reply);
                }
            }
        }
    }
    Ok(())
}
