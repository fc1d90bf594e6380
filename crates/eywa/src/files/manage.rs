use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::FileError;
use crate::{
    Eywa, FileFilter, FileRecord, FolderFilter, FolderInput, FolderRecord, FolderRef,
    ParentFilter, ROOT_UUID, Result,
};

const GET_FILE: &str = "
query GetFile($uuid: UUID!) {
    getFile(euuid: $uuid) {
        euuid
        name
        status
        content_type
        size
        uploaded_at
        uploaded_by {
            name
        }
        folder {
            euuid
            name
            path
        }
    }
}";

const DELETE_FILE: &str = "
mutation DeleteFile($uuid: UUID!) {
    deleteFile(euuid: $uuid)
}";

const CREATE_FOLDER: &str = "
mutation CreateFolder($folder: FolderInput!) {
    stackFolder(data: $folder) {
        euuid
        name
        path
        modified_on
        parent {
            euuid
            name
            path
        }
    }
}";

const LIST_FOLDERS: &str = "
query ListFolders($limit: Int, $where: searchFolderOperator) {
    searchFolder(_limit: $limit, _where: $where, _order_by: {name: asc}) {
        euuid
        name
        path
        modified_on
        parent {
            euuid
            name
        }
    }
}";

const GET_FOLDER_BY_UUID: &str = "
query GetFolder($euuid: UUID!) {
    getFolder(euuid: $euuid) {
        euuid
        name
        path
        modified_on
        parent {
            euuid
            name
        }
    }
}";

const GET_FOLDER_BY_PATH: &str = "
query GetFolder($path: String!) {
    getFolder(path: $path) {
        euuid
        name
        path
        modified_on
        parent {
            euuid
            name
        }
    }
}";

const DELETE_FOLDER: &str = "
mutation DeleteFolder($uuid: UUID!) {
    deleteFolder(euuid: $uuid)
}";

impl Eywa {
    /// Look up a file record. `None` when no such file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn file_info(&self, file_uuid: &str) -> Result<Option<FileRecord>> {
        self.query_field(
            GET_FILE,
            json!({ "uuid": file_uuid }),
            "getFile",
            "Failed to get file info",
        )
        .await
    }

    /// Files matching `filter`, newest upload first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn list_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let query = list_files_query(filter.folder.as_ref());
        let variables = search_variables(filter.limit, file_conditions(filter));
        let files: Option<Vec<FileRecord>> = self
            .query_field(&query, variables, "searchFile", "Failed to list files")
            .await?;
        Ok(files.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn delete_file(&self, file_uuid: &str) -> Result<bool> {
        let deleted: Option<bool> = self
            .query_field(
                DELETE_FILE,
                json!({ "uuid": file_uuid }),
                "deleteFile",
                "Failed to delete file",
            )
            .await?;
        Ok(deleted.unwrap_or(false))
    }

    /// Create a folder. Without a parent it lands under the root folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, the API reports errors, or no
    /// folder comes back.
    pub async fn create_folder(&self, folder: &FolderInput) -> Result<FolderRecord> {
        let created: Option<FolderRecord> = self
            .query_field(
                CREATE_FOLDER,
                json!({ "folder": folder }),
                "stackFolder",
                "Failed to create folder",
            )
            .await?;
        created.ok_or_else(|| FileError::new("Failed to create folder: no folder returned").into())
    }

    /// Folders matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn list_folders(&self, filter: &FolderFilter) -> Result<Vec<FolderRecord>> {
        let variables = search_variables(filter.limit, folder_conditions(filter));
        let folders: Option<Vec<FolderRecord>> = self
            .query_field(LIST_FOLDERS, variables, "searchFolder", "Failed to list folders")
            .await?;
        Ok(folders.unwrap_or_default())
    }

    /// Look up a folder by id or path. `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn get_folder_info(&self, folder: &FolderRef) -> Result<Option<FolderRecord>> {
        let (query, variables) = match folder {
            FolderRef::Euuid(euuid) => (GET_FOLDER_BY_UUID, json!({ "euuid": euuid })),
            FolderRef::Path(path) => (GET_FOLDER_BY_PATH, json!({ "path": path })),
        };
        self.query_field(query, variables, "getFolder", "Failed to get folder info")
            .await
    }

    /// Delete a folder. The API refuses folders that still have content.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the API reports errors.
    pub async fn delete_folder(&self, folder_uuid: &str) -> Result<bool> {
        let deleted: Option<bool> = self
            .query_field(
                DELETE_FOLDER,
                json!({ "uuid": folder_uuid }),
                "deleteFolder",
                "Failed to delete folder",
            )
            .await?;
        Ok(deleted.unwrap_or(false))
    }

    /// Run `query` and decode `data.<field>`; a missing or `null` field is `None`.
    async fn query_field<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        field: &str,
        context: &str,
    ) -> Result<Option<T>> {
        let response = self.graphql(query, Some(variables)).await?;
        if let Some(summary) = response.error_summary() {
            return Err(FileError::new(format!("{context}: {summary}")).into());
        }

        match response.field(field) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

/// `searchFile` query text. The folder constraint has to sit on the
/// `folder` relation itself, so it is rendered into the query.
fn list_files_query(folder: Option<&FolderRef>) -> String {
    let folder_where = folder.map_or_else(String::new, |folder| {
        let (key, value) = match folder {
            FolderRef::Euuid(euuid) => ("euuid", euuid),
            FolderRef::Path(path) => ("path", path),
        };
        // A JSON string literal is also a valid GraphQL string literal
        format!("(_where: {{{key}: {{_eq: {}}}}})", Value::String(value.clone()))
    });

    format!(
        "
query ListFiles($limit: Int, $where: searchFileOperator) {{
    searchFile(_limit: $limit, _where: $where, _order_by: {{uploaded_at: desc}}) {{
        euuid
        name
        status
        content_type
        size
        uploaded_at
        uploaded_by {{
            name
        }}
        folder{folder_where} {{
            euuid
            name
            path
        }}
    }}
}}"
    )
}

fn file_conditions(filter: &FileFilter) -> Vec<Value> {
    let mut conditions = Vec::new();
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(json!({ "status": { "_eq": status } }));
    }
    if let Some(name) = filter.name.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(json!({ "name": { "_ilike": format!("%{name}%") } }));
    }
    conditions
}

fn folder_conditions(filter: &FolderFilter) -> Vec<Value> {
    let mut conditions = Vec::new();
    if let Some(name) = filter.name.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(json!({ "name": { "_ilike": format!("%{name}%") } }));
    }
    match &filter.parent {
        ParentFilter::Any => {}
        ParentFilter::Root => {
            conditions.push(json!({ "parent": { "euuid": { "_eq": ROOT_UUID } } }));
        }
        ParentFilter::Folder(FolderRef::Euuid(euuid)) => {
            conditions.push(json!({ "parent": { "euuid": { "_eq": euuid } } }));
        }
        ParentFilter::Folder(FolderRef::Path(path)) => {
            conditions.push(json!({ "parent": { "path": { "_eq": path } } }));
        }
    }
    conditions
}

/// `{limit?, where?}`; several conditions are joined with `_and`.
fn search_variables(limit: Option<u32>, mut conditions: Vec<Value>) -> Value {
    let mut variables = Map::new();
    if let Some(limit) = limit.filter(|&l| l > 0) {
        variables.insert("limit".to_string(), json!(limit));
    }
    match conditions.len() {
        0 => {}
        1 => {
            variables.insert("where".to_string(), conditions.remove(0));
        }
        _ => {
            variables.insert("where".to_string(), json!({ "_and": conditions }));
        }
    }
    Value::Object(variables)
}
