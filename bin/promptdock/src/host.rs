use std::sync::Arc;

use anyhow::Context;
use promptdock_api::{HttpApiClient, PromptApi};
use promptdock_core::{AuthState, CachedPromptSet, Paths, Request, Response, Settings};
use promptdock_dispatch::{DesktopNotifier, Dispatcher};
use promptdock_scheduler::SyncService;
use promptdock_selectors::{FallbackPolicy, SelectorCache};
use promptdock_storage::{keys, StateStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use uuid::Uuid;

struct Components {
    store: Arc<StateStore>,
    dispatcher: Arc<Dispatcher>,
    selectors: Arc<SelectorCache>,
}

/// Wire everything up once at process start; handlers get their
/// collaborators injected instead of reaching for globals.
async fn build() -> anyhow::Result<Components> {
    let paths = Paths::new();
    paths.ensure_dirs().context("failed to create state directories")?;
    let store = Arc::new(StateStore::new(paths));

    let settings = store
        .get::<Settings>(keys::SETTINGS)
        .await?
        .unwrap_or_default();
    let api = Arc::new(HttpApiClient::new(settings.api_url.clone()));

    // Restore the session token so the scheduler can sync immediately.
    if let Some(auth) = store.get::<AuthState>(keys::AUTH_STATE).await? {
        if let Some(token) = &auth.token {
            api.set_token(Some(token));
        }
    }

    let selectors = Arc::new(SelectorCache::new(
        api.clone(),
        store.clone(),
        FallbackPolicy::Lenient,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        api,
        store.clone(),
        selectors.clone(),
        Arc::new(DesktopNotifier),
    ));

    Ok(Components {
        store,
        dispatcher,
        selectors,
    })
}

pub async fn run() -> anyhow::Result<()> {
    let components = build().await?;
    let scheduler = Arc::new(SyncService::new(
        components.dispatcher.clone(),
        components.selectors.clone(),
    ));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let scheduler_handle = tokio::spawn(scheduler.run_loop(shutdown_tx.subscribe()));

    info!("Message host started");
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        let response = match serde_json::from_str::<Request>(&line) {
                            Ok(request) => {
                                let request_id = Uuid::new_v4();
                                debug!(request_id = %request_id, kind = request.kind(), "Request received");
                                components.dispatcher.dispatch(request).await
                            }
                            Err(e) => Response::err(format!("unrecognized request: {}", e)),
                        };
                        let mut encoded = serde_json::to_string(&response)?;
                        encoded.push('\n');
                        stdout.write_all(encoded.as_bytes()).await?;
                        stdout.flush().await?;
                    }
                    // stdin closed: the extension disconnected.
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = scheduler_handle.await;
    info!("Message host stopped");
    Ok(())
}

pub async fn status() -> anyhow::Result<()> {
    let components = build().await?;

    let auth = components.dispatcher.auth_state().await?;
    match auth.user {
        Some(user) if auth.is_authenticated => {
            println!("Signed in as {} <{}>", user.name, user.email)
        }
        _ => println!("Not signed in"),
    }

    match components
        .store
        .get::<CachedPromptSet>(keys::PROMPT_CACHE)
        .await?
    {
        Some(cached) => {
            let fetched = chrono::DateTime::from_timestamp(cached.fetched_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            println!("Cached prompts: {} (fetched {})", cached.prompts.len(), fetched);
        }
        None => println!("Cached prompts: none"),
    }

    components.selectors.initialize().await?;
    let configs = components.selectors.get_configs().await?;
    println!(
        "Selector configs: {} (version {})",
        configs.len(),
        components.selectors.version().await
    );

    Ok(())
}

pub async fn config_show() -> anyhow::Result<()> {
    let components = build().await?;
    let settings = components.dispatcher.settings().await;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

pub async fn config_set(key: &str, value: &str) -> anyhow::Result<()> {
    let components = build().await?;
    let mut settings = components.dispatcher.settings().await;
    apply_setting(&mut settings, key, value)?;
    components.store.set(keys::SETTINGS, &settings).await?;
    println!("{} = {}", key, value);
    Ok(())
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "apiUrl" => settings.api_url = value.to_string(),
        "theme" => settings.theme = value.to_string(),
        "autoInsert" => settings.auto_insert = value.parse()?,
        "showVariablePrompt" => settings.show_variable_prompt = value.parse()?,
        "cacheEnabled" => settings.cache_enabled = value.parse()?,
        "syncIntervalSecs" => settings.sync_interval_secs = value.parse()?,
        _ => anyhow::bail!(
            "unknown setting '{}' (expected apiUrl, theme, autoInsert, showVariablePrompt, cacheEnabled, or syncIntervalSecs)",
            key
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_setting_parses_each_field() {
        let mut settings = Settings::default();
        apply_setting(&mut settings, "theme", "dark").unwrap();
        apply_setting(&mut settings, "autoInsert", "false").unwrap();
        apply_setting(&mut settings, "syncIntervalSecs", "600").unwrap();

        assert_eq!(settings.theme, "dark");
        assert!(!settings.auto_insert);
        assert_eq!(settings.sync_interval_secs, 600);
    }

    #[test]
    fn apply_setting_rejects_unknown_keys_and_bad_values() {
        let mut settings = Settings::default();
        assert!(apply_setting(&mut settings, "nope", "1").is_err());
        assert!(apply_setting(&mut settings, "cacheEnabled", "maybe").is_err());
    }
}
