use std::sync::Arc;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use newhealth_chat::{ChatSession, ContentService, TextEndpointRef};
use newhealth_core::{
    get_default_config_dir, get_default_config_file, AssistantConfig, GeminiClient,
};
use newhealth_store::{ContentCache, ConversationStore, FileStore, KeyValueStoreRef};

mod app;
mod cli;
mod output;
mod voice;

use crate::cli::Args;
use crate::output::{print_content, print_usage_instructions};

const APP_NAME: &str = "newhealth";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME)?,
    };
    let config = AssistantConfig::load_from_file(&config_path)?.with_env_overrides();

    let data_dir = get_default_config_dir(APP_NAME)?.join("data");
    let store: KeyValueStoreRef = Arc::new(FileStore::new(data_dir)?);

    // Without a key the content command still works from the fallback copy,
    // but chat has nothing to talk to.
    let endpoint: Option<TextEndpointRef> = match GeminiClient::new(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::debug!("no usable API client: {}", e);
            None
        }
    };

    let content_service = ContentService::new(
        endpoint.clone(),
        ContentCache::new(Arc::clone(&store)),
        &config,
    );
    let pharmacy = content_service
        .fetch_pharmacy_content(newhealth_chat::now_epoch_ms())
        .await;

    if args.content {
        print_content(&pharmacy);
        return Ok(());
    }

    if args.voice {
        return voice::run_voice_call(&config, &pharmacy).await;
    }

    let Some(endpoint) = endpoint else {
        eprintln!(
            "{}",
            "No API key configured. Set GEMINI_API_KEY or add api_key to the config file."
                .red()
        );
        std::process::exit(1);
    };

    let mut conversation = ConversationStore::load(Arc::clone(&store))
        .await
        .with_persistence(config.save_history.unwrap_or(true));
    if args.fresh {
        conversation.clear().await;
    }

    let session = ChatSession::new(endpoint, config, pharmacy, conversation);
    session.set_deep_analysis(args.deep);

    if args.interactive {
        app::run_interactive_chat(&session).await?;
    } else if let Some(prompt) = &args.prompt {
        app::run_single_query(&session, prompt).await;
    } else {
        print_usage_instructions();
    }

    Ok(())
}
