//! Command handlers.

use super::commands::{Commands, ObjectArgs};
use coffer::{Coffer, CofferResult, ObjectRef, StorageError, StorageErrorKind};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Dispatch a parsed command.
pub async fn handle_command(coffer: &Coffer, command: Commands) -> CofferResult<()> {
    match command {
        Commands::Put { object, file, name } => put(coffer, &object, &file, name.as_deref()).await,
        Commands::Get { object, out } => get(coffer, &object, out.as_deref()).await,
        Commands::Exists { object } => {
            let found = coffer.exists(&object.store, object_ref(&object)).await?;
            println!("{}", found);
            Ok(())
        }
        Commands::Info { object } => {
            match coffer.info(&object.store, object_ref(&object)).await? {
                Some(info) => println!("{}\t{}", info.file_name, info.file_length),
                None => println!("No content recorded for {}", object_ref(&object)),
            }
            Ok(())
        }
        Commands::Delete { object } => coffer.delete(&object.store, object_ref(&object)).await,
        Commands::Stores => stores(coffer).await,
    }
}

fn object_ref(args: &ObjectArgs) -> ObjectRef {
    ObjectRef::from_ids(args.object_id, args.type_id)
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::Io(format!("{}: {}", path.display(), e)))
}

async fn put(coffer: &Coffer, args: &ObjectArgs, file: &Path, name: Option<&str>) -> CofferResult<()> {
    let handle = tokio::fs::File::open(file)
        .await
        .map_err(|e| io_error(file, e))?;
    let size = handle
        .metadata()
        .await
        .map_err(|e| io_error(file, e))?
        .len();
    let file_name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let size = i64::try_from(size).unwrap_or(-1);
    let written = coffer
        .put(&args.store, object_ref(args), Box::new(handle), size, &file_name)
        .await?;
    println!("Stored {} bytes for {}", written, object_ref(args));
    Ok(())
}

async fn get(coffer: &Coffer, args: &ObjectArgs, out: Option<&Path>) -> CofferResult<()> {
    let copied = match out {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .map_err(|e| io_error(path, e))?;
            let copied = coffer.get(&args.store, object_ref(args), &mut file).await?;
            file.sync_all().await.map_err(|e| io_error(path, e))?;
            copied
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let copied = coffer.get(&args.store, object_ref(args), &mut stdout).await?;
            stdout
                .flush()
                .await
                .map_err(|e| StorageError::new(StorageErrorKind::Io(e.to_string())))?;
            copied
        }
    };

    if copied.is_none() {
        return Err(StorageError::new(StorageErrorKind::NotFound(format!(
            "No content stored for {}",
            object_ref(args)
        )))
        .into());
    }
    Ok(())
}

async fn stores(coffer: &Coffer) -> CofferResult<()> {
    let stores = coffer.stores().await?;
    println!("{:<6} {:<20} {:<16} UUID", "ID", "NAME", "BACKEND");
    println!("{:-<80}", "");
    for store in &stores {
        println!(
            "{:<6} {:<20} {:<16} {}",
            store.id(),
            store.name(),
            store.backend(),
            store.uuid()
        );
    }
    println!("Total: {} stores", stores.len());
    Ok(())
}
