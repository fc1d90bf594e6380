use std::path::Path;

use anyhow::{Context, Result, bail};
use eywa::{
    Eywa, FileFilter, FileInput, FolderFilter, FolderInput, LogRecord, ProgressFn, Report,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{Command, FilesCommand, FoldersCommand};

pub async fn run(eywa: &Eywa, command: Command) -> Result<()> {
    match command {
        Command::Graphql { query, variables } => run_graphql(eywa, &query, variables).await,
        Command::Log {
            level,
            message,
            data,
        } => {
            let mut record = LogRecord::new(level.into(), message);
            if let Some(data) = data {
                record = record.with_data(parse_json("--data", &data)?);
            }
            eywa.log(record).await.context("Failed to send log")
        }
        Command::Task => {
            let task = eywa.get_task().await.context("Failed to get task")?;
            publish(eywa, "Current task", task).await
        }
        Command::Upload {
            path,
            name,
            euuid,
            content_type,
            folder,
        } => {
            let input = FileInput {
                name,
                content_type,
                folder: folder.folder_ref(),
                ..FileInput::default()
            };
            run_upload(eywa, &path, euuid, input).await
        }
        Command::Download { uuid, output } => {
            let saved = match output {
                Some(output) => eywa.download_to(&uuid, &output, None).await,
                None => eywa.quick_download(&uuid, None).await,
            }
            .with_context(|| format!("Failed to download {uuid}"))?;
            info!(path = %saved.display(), "Downloaded file");
            eprintln!("Saved {}", saved.display());
            Ok(())
        }
        Command::Files { command } => run_files(eywa, command).await,
        Command::Folders { command } => run_folders(eywa, command).await,
        Command::Hash { .. } => bail!("hash runs locally and needs no task connection"),
    }
}

async fn run_graphql(eywa: &Eywa, query: &str, variables: Option<String>) -> Result<()> {
    let query = match query.strip_prefix('@') {
        Some(file) => tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read query from {file}"))?,
        None => query.to_string(),
    };
    let variables = variables
        .map(|raw| parse_json("--variables", &raw))
        .transpose()?;

    let data = eywa.graphql_data(&query, variables).await?;
    publish(eywa, "GraphQL result", data).await
}

async fn run_upload(
    eywa: &Eywa,
    path: &Path,
    euuid: Option<String>,
    mut input: FileInput,
) -> Result<()> {
    let euuid = euuid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    input.euuid = Some(euuid.clone());

    let progress: &ProgressFn = &|done, total| {
        debug!(done, total, "Upload progress");
    };
    eywa.upload(path, input, Some(progress))
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;

    eprintln!("Uploaded {} as {euuid}", path.display());
    publish(eywa, "Uploaded file", serde_json::json!({ "euuid": euuid })).await
}

async fn run_files(eywa: &Eywa, command: FilesCommand) -> Result<()> {
    match command {
        FilesCommand::List {
            name,
            status,
            limit,
            folder,
        } => {
            let filter = FileFilter {
                limit,
                status,
                name,
                folder: folder.folder_ref(),
            };
            let files = eywa.list_files(&filter).await?;
            publish(eywa, "Files", serde_json::to_value(files)?).await
        }
        FilesCommand::Info { uuid } => match eywa.file_info(&uuid).await? {
            Some(file) => publish(eywa, "File", serde_json::to_value(file)?).await,
            None => bail!("File {uuid} not found"),
        },
        FilesCommand::Delete { uuid } => {
            if !eywa.delete_file(&uuid).await? {
                bail!("File {uuid} was not deleted");
            }
            eprintln!("Deleted file {uuid}");
            Ok(())
        }
    }
}

async fn run_folders(eywa: &Eywa, command: FoldersCommand) -> Result<()> {
    match command {
        FoldersCommand::List {
            name,
            limit,
            parent,
        } => {
            let filter = FolderFilter {
                limit,
                name,
                parent: parent.parent_filter(),
            };
            let folders = eywa.list_folders(&filter).await?;
            publish(eywa, "Folders", serde_json::to_value(folders)?).await
        }
        FoldersCommand::Create {
            name,
            euuid,
            parent_uuid,
            parent_path,
        } => {
            let mut folder = FolderInput::new(name);
            folder.euuid = euuid;
            folder.parent = crate::folder_ref(parent_uuid, parent_path);
            let created = eywa.create_folder(&folder).await?;
            publish(eywa, "Created folder", serde_json::to_value(created)?).await
        }
        FoldersCommand::Info { folder } => {
            let Some(folder) = folder.folder_ref() else {
                bail!("Either --uuid or --path is required");
            };
            match eywa.get_folder_info(&folder).await? {
                Some(found) => publish(eywa, "Folder", serde_json::to_value(found)?).await,
                None => bail!("Folder {folder:?} not found"),
            }
        }
        FoldersCommand::Delete { uuid } => {
            if !eywa.delete_folder(&uuid).await? {
                bail!("Folder {uuid} was not deleted");
            }
            eprintln!("Deleted folder {uuid}");
            Ok(())
        }
    }
}

fn parse_json(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{flag} is not valid JSON"))
}

/// Echo a result on stderr and hand it to the host as a task report.
async fn publish(eywa: &Eywa, title: &str, data: Value) -> Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(&data)?);
    eywa.report(Report::new(title).with_data(data))
        .await
        .context("Failed to send report")
}
