//! Storage selection from command-line and environment configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use ritual_store::{DuckStore, MemoryStore, Storage};
use ritual_sync::RemoteStore;
use tracing::{info, warn};

const DB_FILE: &str = "ritual.duckdb";

#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// DuckDB database file; defaults to ritual.duckdb in the user data dir.
    #[arg(long, env = "RITUAL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Keep everything in memory for this run; nothing is saved. Overrides --db.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Hosted backend base URL. Takes precedence over --db.
    #[arg(long, env = "RITUAL_REMOTE_URL", global = true)]
    pub remote_url: Option<String>,

    /// Project API key for the hosted backend.
    #[arg(long, env = "RITUAL_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Signed-in session token for the hosted backend.
    #[arg(long, env = "RITUAL_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Backend<'a> {
    Remote { url: &'a str, api_key: &'a str },
    Persistent(PathBuf),
    Ephemeral,
}

/// `ritual/ritual.duckdb` under the platform data directory.
fn default_db_path(data_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = data_dir.context("no user data directory; set RITUAL_DB or pass --db")?;
    Ok(dir.join("ritual").join(DB_FILE))
}

fn choose<'a>(args: &'a StorageArgs, data_dir: Option<&Path>) -> anyhow::Result<Backend<'a>> {
    if let Some(url) = args.remote_url.as_deref() {
        let api_key = args
            .api_key
            .as_deref()
            .context("RITUAL_API_KEY is required when RITUAL_REMOTE_URL is set")?;
        return Ok(Backend::Remote { url, api_key });
    }
    if args.ephemeral {
        return Ok(Backend::Ephemeral);
    }
    let path = match &args.db {
        Some(path) => path.clone(),
        None => default_db_path(data_dir)?,
    };
    Ok(Backend::Persistent(path))
}

/// Open the configured storage once for the lifetime of the command.
pub fn open_storage(args: &StorageArgs) -> anyhow::Result<Box<dyn Storage>> {
    let data_dir = dirs::data_local_dir();
    match choose(args, data_dir.as_deref())? {
        Backend::Remote { url, api_key } => {
            info!(url, "using hosted backend");
            let mut store = RemoteStore::new(url.to_string(), api_key.to_string());
            if let Some(token) = &args.access_token {
                store = store.with_access_token(token.clone());
            }
            Ok(Box::new(store))
        }
        Backend::Persistent(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            info!(path = %path.display(), "opening DuckDB store");
            let store = DuckStore::open_persistent(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(store))
        }
        Backend::Ephemeral => {
            warn!("--ephemeral: changes are discarded when the command exits");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_takes_precedence() {
        let args = StorageArgs {
            db: Some(PathBuf::from("ritual.duckdb")),
            remote_url: Some("https://project.example.co".into()),
            api_key: Some("key".into()),
            ..Default::default()
        };
        assert_eq!(
            choose(&args, None).unwrap(),
            Backend::Remote {
                url: "https://project.example.co",
                api_key: "key"
            }
        );
    }

    #[test]
    fn remote_without_key_is_an_error() {
        let args = StorageArgs {
            remote_url: Some("https://project.example.co".into()),
            ..Default::default()
        };
        assert!(choose(&args, None).is_err());
    }

    #[test]
    fn default_is_a_file_in_the_data_dir() {
        let data = PathBuf::from("/home/u/.local/share");
        assert_eq!(
            choose(&StorageArgs::default(), Some(&data)).unwrap(),
            Backend::Persistent(data.join("ritual").join("ritual.duckdb"))
        );
    }

    #[test]
    fn no_data_dir_and_no_db_is_an_error() {
        assert!(choose(&StorageArgs::default(), None).is_err());
    }

    #[test]
    fn explicit_db_path_wins_over_default() {
        let args = StorageArgs {
            db: Some(PathBuf::from("/tmp/mine.duckdb")),
            ..Default::default()
        };
        assert_eq!(
            choose(&args, Some(Path::new("/data"))).unwrap(),
            Backend::Persistent(PathBuf::from("/tmp/mine.duckdb"))
        );
    }

    #[test]
    fn in_memory_only_when_asked() {
        let args = StorageArgs {
            ephemeral: true,
            ..Default::default()
        };
        assert_eq!(choose(&args, None).unwrap(), Backend::Ephemeral);
    }

    #[tokio::test]
    async fn writes_survive_between_commands() {
        let dir = tempfile::tempdir().unwrap();
        let args = StorageArgs {
            db: Some(dir.path().join("nested").join("ritual.duckdb")),
            ..Default::default()
        };

        let first = open_storage(&args).unwrap();
        first
            .upsert_contact("u1", &ritual_core::Contact::new("c1", "Jisoo"))
            .await
            .unwrap();
        drop(first);

        let second = open_storage(&args).unwrap();
        let contacts = second.list_contacts("u1").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Jisoo");
    }

    #[tokio::test]
    async fn daily_pick_is_reused_by_the_next_command() {
        let dir = tempfile::tempdir().unwrap();
        let args = StorageArgs {
            db: Some(dir.path().join("ritual.duckdb")),
            ..Default::default()
        };
        let today = chrono::NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let tz = ritual_core::clock::kst();

        let first = open_storage(&args).unwrap();
        for i in 0..10 {
            let contact = ritual_core::Contact::new(format!("c{i}"), format!("Person {i}"));
            first.upsert_contact("u1", &contact).await.unwrap();
        }
        let pick = ritual_store::daily_picks(first.as_ref(), "u1", today, &tz)
            .await
            .unwrap();
        drop(first);

        let second = open_storage(&args).unwrap();
        assert_eq!(
            second.get_daily_pick("u1", today).await.unwrap(),
            Some(pick)
        );
    }
}
