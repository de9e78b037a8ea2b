//! Object storage for uploaded images.
//!
//! Objects live in named buckets and are addressed by a public URL of the
//! form `{public_url}/storage/{bucket}/{path}`, which this server also serves.

use std::future::Future;
use std::str::FromStr;

use axum::http::Uri;
use bytes::Bytes;
use serde::Serialize;

use self::local::LocalStore;
use self::memory::MemoryStore;
use crate::config::{Config, StorageBackend};
use crate::models::ProfileImage;

pub mod local;
pub mod memory;

/// Bucket holding project images.
pub const PROJECTS_BUCKET: &str = "projects";
/// Bucket holding profile avatars and backgrounds.
pub const PROFILE_IMAGES_BUCKET: &str = "project-images";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ObjectStore {
    fn name(&self) -> &str;

    /// Read an object
    fn get(&self, key: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send;

    /// Write an object, replacing any existing one
    fn put(&self, key: &str, data: Bytes) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete an object
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

#[derive(Debug)]
pub enum AnyStore {
    Local(LocalStore),
    Memory(MemoryStore),
}

impl ObjectStore for AnyStore {
    fn name(&self) -> &str {
        match self {
            AnyStore::Local(store) => store.name(),
            AnyStore::Memory(store) => store.name(),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        match self {
            AnyStore::Local(store) => store.get(key).await,
            AnyStore::Memory(store) => store.get(key).await,
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        match self {
            AnyStore::Local(store) => store.put(key, data).await,
            AnyStore::Memory(store) => store.put(key, data).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            AnyStore::Local(store) => store.delete(key).await,
            AnyStore::Memory(store) => store.delete(key).await,
        }
    }
}

/// What an upload is for; decides bucket and path layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Project,
    Avatar,
    Background,
}

impl UploadKind {
    pub fn bucket(self) -> &'static str {
        match self {
            UploadKind::Project => PROJECTS_BUCKET,
            UploadKind::Avatar | UploadKind::Background => PROFILE_IMAGES_BUCKET,
        }
    }

    /// The profile field an upload of this kind replaces, if any.
    pub fn profile_image(self) -> Option<ProfileImage> {
        match self {
            UploadKind::Project => None,
            UploadKind::Avatar => Some(ProfileImage::Avatar),
            UploadKind::Background => Some(ProfileImage::Background),
        }
    }

    /// Path prefix under which `owner`'s objects of this kind live.
    fn owner_prefix(self, owner: &str) -> String {
        match self {
            UploadKind::Project => format!("{owner}/"),
            UploadKind::Avatar | UploadKind::Background => format!("profiles/{owner}/"),
        }
    }

    fn object_path(self, owner: &str, ext: &str) -> String {
        let id = uuid::Uuid::new_v4().simple();
        match self {
            UploadKind::Project => format!("{owner}/{id}.{ext}"),
            UploadKind::Avatar => format!("profiles/{owner}/avatar_{id}.{ext}"),
            UploadKind::Background => format!("profiles/{owner}/background_{id}.{ext}"),
        }
    }
}

impl FromStr for UploadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(UploadKind::Project),
            "avatar" => Ok(UploadKind::Avatar),
            "background" => Ok(UploadKind::Background),
            other => Err(format!("Unknown upload kind: {}", other)),
        }
    }
}

/// A stored object and where it can be fetched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub image_url: String,
    pub bucket: String,
    pub path: String,
}

/// Upload policy and URL mapping over an object store.
#[derive(Debug)]
pub struct Storage {
    store: AnyStore,
    public_url: String,
    max_bytes: usize,
    image_hosts: Vec<String>,
}

impl Storage {
    pub fn new(store: AnyStore, config: &Config) -> Self {
        Self {
            store,
            public_url: config.public_url.clone(),
            max_bytes: config.max_upload_bytes,
            image_hosts: config.image_hosts.clone(),
        }
    }

    /// Build the configured backend.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let store = match config.storage {
            StorageBackend::Local => AnyStore::Local(LocalStore::new(&config.storage_path).await?),
            StorageBackend::Memory => AnyStore::Memory(MemoryStore::new()),
        };
        tracing::info!(backend = store.name(), "Object storage ready");
        Ok(Self::new(store, config))
    }

    /// Store an image for `owner` and return its public location.
    #[tracing::instrument(skip(self, data), fields(size = data.len()), err)]
    pub async fn upload_image(
        &self,
        owner: &str,
        kind: UploadKind,
        file_name: &str,
        data: Bytes,
    ) -> Result<StoredObject, StorageError> {
        if data.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: data.len(),
                limit: self.max_bytes,
            });
        }
        if data.is_empty() {
            return Err(StorageError::UnsupportedType("empty file".to_string()));
        }

        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if content_type_for(&ext).is_none() {
            return Err(StorageError::UnsupportedType(file_name.to_string()));
        }

        let bucket = kind.bucket();
        let path = kind.object_path(owner, &ext);
        self.store.put(&format!("{bucket}/{path}"), data).await?;

        Ok(StoredObject {
            image_url: self.public_url(bucket, &path),
            bucket: bucket.to_string(),
            path,
        })
    }

    /// Read an object with its content type.
    pub async fn fetch(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<(Bytes, &'static str), StorageError> {
        if bucket != PROJECTS_BUCKET && bucket != PROFILE_IMAGES_BUCKET {
            return Err(StorageError::NotFound);
        }
        let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        let content_type = ext
            .as_deref()
            .and_then(content_type_for)
            .unwrap_or("application/octet-stream");

        let data = self.store.get(&format!("{bucket}/{path}")).await?;
        Ok((data, content_type))
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{}/{}", self.public_url, bucket, path)
    }

    /// Split one of our public URLs back into bucket and path.
    pub fn locate(&self, url: &str) -> Option<(String, String)> {
        let rest = url
            .strip_prefix(&self.public_url)?
            .strip_prefix("/storage/")?;
        let (bucket, path) = rest.split_once('/')?;
        if bucket.is_empty() || path.is_empty() {
            return None;
        }
        Some((bucket.to_string(), path.to_string()))
    }

    /// Locate a hosted object of `kind` that belongs to `owner`.
    ///
    /// URLs into another user's namespace, another bucket, or with dot
    /// segments resolve to `None`.
    pub fn locate_owned(&self, url: &str, owner: &str, kind: UploadKind) -> Option<String> {
        let (bucket, path) = self.locate(url)?;
        if bucket != kind.bucket() || !path.starts_with(&kind.owner_prefix(owner)) {
            return None;
        }
        if path.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
            return None;
        }
        Some(path)
    }

    /// Delete `owner`'s object behind a public URL.
    ///
    /// Returns `false`, deleting nothing, for foreign URLs and for objects
    /// owned by someone else.
    pub async fn delete_owned(
        &self,
        url: &str,
        owner: &str,
        kind: UploadKind,
    ) -> Result<bool, StorageError> {
        let Some(path) = self.locate_owned(url, owner, kind) else {
            return Ok(false);
        };
        self.store.delete(&format!("{}/{}", kind.bucket(), path)).await?;
        Ok(true)
    }

    /// Whether `owner` may reference an image URL for `kind`.
    ///
    /// URLs we host must be `owner`'s own upload of that kind; other URLs
    /// must be on an allowed host.
    pub fn is_allowed_image_url(&self, url: &str, owner: &str, kind: UploadKind) -> bool {
        if self.locate(url).is_some() {
            return self.locate_owned(url, owner, kind).is_some();
        }
        let Ok(uri) = url.parse::<Uri>() else {
            return false;
        };
        if !matches!(uri.scheme_str(), Some("https") | Some("http")) {
            return false;
        }
        uri.host()
            .map(|host| self.image_hosts.iter().any(|allowed| host.eq_ignore_ascii_case(allowed)))
            .unwrap_or(false)
    }
}

fn content_type_for(ext: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, content_type)| *content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            api_psk: None,
            db_path: PathBuf::from("unused.sqlite"),
            index_path: PathBuf::from("unused-index"),
            storage: StorageBackend::Memory,
            storage_path: PathBuf::from("unused-storage"),
            public_url: "http://files.test".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "info".to_string(),
            max_upload_bytes: 16,
            require_project_image: false,
            image_hosts: vec!["res.cloudinary.com".to_string()],
            session_ttl_hours: 1,
        }
    }

    fn storage() -> Storage {
        Storage::new(AnyStore::Memory(MemoryStore::new()), &config())
    }

    #[tokio::test]
    async fn test_upload_layout_per_kind() {
        let storage = storage();

        let project = storage
            .upload_image("u1", UploadKind::Project, "shot.PNG", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(project.bucket, "projects");
        assert!(project.path.starts_with("u1/"));
        assert!(project.path.ends_with(".png"));
        assert_eq!(
            project.image_url,
            format!("http://files.test/storage/projects/{}", project.path)
        );

        let avatar = storage
            .upload_image("u1", UploadKind::Avatar, "me.jpg", Bytes::from_static(b"jpg"))
            .await
            .unwrap();
        assert_eq!(avatar.bucket, "project-images");
        assert!(avatar.path.starts_with("profiles/u1/avatar_"));

        let (data, content_type) = storage.fetch(&avatar.bucket, &avatar.path).await.unwrap();
        assert_eq!(&data[..], b"jpg");
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_files() {
        let storage = storage();

        let too_large = storage
            .upload_image("u1", UploadKind::Project, "big.png", Bytes::from(vec![0u8; 17]))
            .await;
        assert!(matches!(too_large, Err(StorageError::TooLarge { size: 17, limit: 16 })));

        let script = storage
            .upload_image("u1", UploadKind::Project, "run.sh", Bytes::from_static(b"#!"))
            .await;
        assert!(matches!(script, Err(StorageError::UnsupportedType(_))));

        let no_ext = storage
            .upload_image("u1", UploadKind::Project, "image", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(no_ext, Err(StorageError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_delete_owned() {
        let storage = storage();
        let stored = storage
            .upload_image("u1", UploadKind::Project, "a.gif", Bytes::from_static(b"gif"))
            .await
            .unwrap();

        // Someone else's project cannot take it down
        assert!(!storage
            .delete_owned(&stored.image_url, "u2", UploadKind::Project)
            .await
            .unwrap());
        assert!(storage.fetch(&stored.bucket, &stored.path).await.is_ok());

        assert!(storage
            .delete_owned(&stored.image_url, "u1", UploadKind::Project)
            .await
            .unwrap());
        assert!(matches!(
            storage.fetch(&stored.bucket, &stored.path).await,
            Err(StorageError::NotFound)
        ));
        assert!(!storage
            .delete_owned("https://elsewhere.test/x.png", "u1", UploadKind::Project)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_owned_leaves_profile_images() {
        let storage = storage();
        let avatar = storage
            .upload_image("u1", UploadKind::Avatar, "me.png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert!(!storage
            .delete_owned(&avatar.image_url, "u1", UploadKind::Project)
            .await
            .unwrap());
        assert!(storage.fetch(&avatar.bucket, &avatar.path).await.is_ok());
    }

    #[test]
    fn test_locate_and_allow_list() {
        let storage = storage();

        assert_eq!(
            storage.locate("http://files.test/storage/projects/u1/a.png"),
            Some(("projects".to_string(), "u1/a.png".to_string()))
        );
        assert_eq!(storage.locate("http://files.test/storage/projects"), None);

        let allowed = |url: &str, kind| storage.is_allowed_image_url(url, "u1", kind);
        assert!(allowed("http://files.test/storage/projects/u1/a.png", UploadKind::Project));
        assert!(allowed("https://res.cloudinary.com/demo/x.png", UploadKind::Project));
        assert!(!allowed("https://evil.test/x.png", UploadKind::Project));
        assert!(!allowed("javascript:alert(1)", UploadKind::Project));
    }

    #[test]
    fn test_hosted_urls_must_be_own_uploads() {
        let storage = storage();
        let allowed = |url: &str, kind| storage.is_allowed_image_url(url, "u1", kind);

        assert!(!allowed("http://files.test/storage/projects/u2/a.png", UploadKind::Project));
        assert!(!allowed(
            "http://files.test/storage/project-images/profiles/u2/avatar_x.png",
            UploadKind::Avatar
        ));
        assert!(!allowed(
            "http://files.test/storage/project-images/profiles/u1/avatar_x.png",
            UploadKind::Project
        ));
        assert!(!allowed("http://files.test/storage/projects/u1/../u2/a.png", UploadKind::Project));
        assert!(allowed(
            "http://files.test/storage/project-images/profiles/u1/avatar_x.png",
            UploadKind::Avatar
        ));
        assert!(allowed(
            "http://files.test/storage/project-images/profiles/u1/background_x.png",
            UploadKind::Background
        ));
    }

    #[test]
    fn test_upload_kind_parse() {
        assert_eq!("avatar".parse::<UploadKind>(), Ok(UploadKind::Avatar));
        assert_eq!(UploadKind::Background.profile_image(), Some(ProfileImage::Background));
        assert!("banner".parse::<UploadKind>().is_err());
    }
}
