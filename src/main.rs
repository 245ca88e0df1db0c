//! Entry point for the mangacbz CLI and HTTP API.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mangacbz::cbz::{format_size, pack_files};
use mangacbz::cli::{Cli, Command};
use mangacbz::http::HttpClient;
use mangacbz::logs;
use mangacbz::server::{self, AppState};
use mangacbz::service::{MangaService, chapter_file_name};
use mangacbz::source::MangaHere;
use mangacbz::store::{ArchiveStore, CatboxStore, LocalStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if !logs::from_env()? {
        logs::from_args(cli.verbose);
    }

    let http = Arc::new(HttpClient::new(cli.client.client_config())?);
    let source = Arc::new(MangaHere::new(http.clone()));
    let service =
        MangaService::new(source, http.clone()).with_page_delay(cli.client.page_delay());

    match cli.command {
        Command::Search { query, page } => print_json(&service.search(&query, page).await?)?,
        Command::Info { manga_id } => print_json(&service.info(&manga_id).await?)?,
        Command::Pages {
            manga_id,
            chapter_id,
        } => print_json(&service.pages(&manga_id, &chapter_id).await?)?,
        Command::Download {
            manga_id,
            chapter_id,
            output_dir,
            upload,
            catbox_user_hash,
        } => {
            let store: Box<dyn ArchiveStore> = if upload {
                let Some(user_hash) = catbox_user_hash else {
                    bail!("--upload needs a catbox user hash (--catbox-user-hash or CATBOX_USER_HASH)");
                };
                Box::new(CatboxStore::new(http.inner().clone(), user_hash))
            } else {
                Box::new(LocalStore::new(output_dir))
            };
            download(&service, store.as_ref(), &manga_id, &chapter_id).await?;
            eprintln!(
                "Total bytes transferred: {}",
                format_size(http.transferred_bytes())
            );
        }
        Command::Pack { images, output } => pack(&images, &output).await?,
        Command::Serve {
            host,
            port,
            catbox_user_hash,
            storage_dir,
            retention_hours,
        } => {
            let (service, local_store) = match catbox_user_hash {
                Some(user_hash) => {
                    let store = Arc::new(CatboxStore::new(http.inner().clone(), user_hash));
                    (service.with_store(store), None)
                }
                None => {
                    let store = Arc::new(
                        LocalStore::new(storage_dir)
                            .with_retention(Duration::from_secs(retention_hours * 60 * 60)),
                    );
                    (service.with_store(store.clone()), Some(store))
                }
            };
            server::run(
                AppState {
                    service,
                    local_store,
                },
                &host,
                port,
            )
            .await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn download(
    service: &MangaService,
    store: &dyn ArchiveStore,
    manga_id: &str,
    chapter_id: &str,
) -> Result<()> {
    let file_name = chapter_file_name(manga_id, chapter_id);
    let chapter = service.build_chapter(manga_id, chapter_id).await?;
    let (packed, total) = (chapter.pages_packed, chapter.pages_total);
    let skipped = chapter.skipped;
    let stored = store.put(&file_name, chapter.bytes).await?;

    println!("  packaged: {} ({})", file_name, format_size(stored.size));
    println!("  pages:    {}/{}", packed, total);
    if !skipped.is_empty() {
        println!("  skipped:  {:?}", skipped);
    }
    println!("  stored:   {}", stored.location);
    Ok(())
}

async fn pack(images: &[PathBuf], output: &Path) -> Result<()> {
    let archive = pack_files(images).await?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, &archive)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "  packaged: {} ({} pages, {})",
        output.display(),
        images.len(),
        format_size(archive.len() as u64)
    );
    Ok(())
}
