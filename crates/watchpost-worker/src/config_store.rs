//! Persisted application configuration.

use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::info;
use watchpost_models::{AppConfig, CameraConfig, CameraId, ClassSelection, PipelineConfig};

use crate::error::{WorkerError, WorkerResult};

/// JSON config file with an in-memory copy.
///
/// Every mutation is written to disk before the in-memory copy changes, so a
/// failed write leaves both untouched.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Load the file, writing a default config if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref().to_path_buf();

        let config = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<AppConfig>(&bytes).map_err(|e| {
                WorkerError::config_error(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = AppConfig::default();
                write_atomic(&path, &config).await?;
                info!(path = %path.display(), "Created default config");
                config
            }
            Err(e) => return Err(e.into()),
        };

        for camera in &config.cameras {
            camera.classes().validate(&config.detection.class_names)?;
        }

        info!(
            path = %path.display(),
            cameras = config.cameras.len(),
            phones = config.phones.len(),
            "Loaded config"
        );

        Ok(Self {
            path,
            current: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> AppConfig {
        self.current.read().await.clone()
    }

    pub async fn pipeline_config(&self, camera: &CameraId) -> Option<PipelineConfig> {
        self.current.read().await.pipeline_config(camera)
    }

    /// Pipeline configs for every configured camera.
    pub async fn pipeline_configs(&self) -> Vec<PipelineConfig> {
        let config = self.current.read().await;
        config
            .cameras
            .iter()
            .map(|camera| PipelineConfig::from_settings(camera, &config.phones, &config.detection))
            .collect()
    }

    /// Class names of the configured model, in output order.
    pub async fn class_names(&self) -> Vec<String> {
        self.current.read().await.detection.class_names.clone()
    }

    pub async fn add_camera(&self, camera: CameraConfig) -> WorkerResult<()> {
        self.update(|config| {
            camera.classes().validate(&config.detection.class_names)?;
            if config.camera(&camera.id).is_some() {
                return Err(WorkerError::CameraExists(camera.id.clone()));
            }
            config.cameras.push(camera);
            Ok(())
        })
        .await
    }

    pub async fn remove_camera(&self, id: &CameraId) -> WorkerResult<CameraConfig> {
        self.update(|config| {
            let index = config
                .cameras
                .iter()
                .position(|camera| &camera.id == id)
                .ok_or_else(|| WorkerError::CameraNotFound(id.clone()))?;
            Ok(config.cameras.remove(index))
        })
        .await
    }

    pub async fn set_classes(
        &self,
        id: &CameraId,
        classes: ClassSelection,
    ) -> WorkerResult<CameraConfig> {
        self.update(|config| {
            classes.validate(&config.detection.class_names)?;
            let camera = config
                .camera_mut(id)
                .ok_or_else(|| WorkerError::CameraNotFound(id.clone()))?;
            camera.display_classes = classes.display;
            camera.alert_classes = classes.alert;
            Ok(camera.clone())
        })
        .await
    }

    pub async fn set_phones(&self, phones: Vec<String>) -> WorkerResult<()> {
        self.update(|config| {
            config.phones = phones;
            Ok(())
        })
        .await
    }

    async fn update<T>(
        &self,
        mutate: impl FnOnce(&mut AppConfig) -> WorkerResult<T>,
    ) -> WorkerResult<T> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        let result = mutate(&mut next)?;
        write_atomic(&self.path, &next).await?;
        *current = next;
        Ok(result)
    }
}

/// Write pretty JSON to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, config: &AppConfig) -> WorkerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(config)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = ConfigStore::open(&path).await.unwrap();
        assert!(path.exists());
        let config = store.snapshot().await;
        assert!(config.cameras.is_empty());
        assert!(config.phones.is_empty());
    }

    #[tokio::test]
    async fn test_mutations_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(&path).await.unwrap();

        store
            .add_camera(CameraConfig::new(CameraId::device(0), "Gate"))
            .await
            .unwrap();
        store
            .set_classes(&CameraId::device(0), ClassSelection::new(["tank", "bmp"], ["tank"]))
            .await
            .unwrap();
        store.set_phones(vec!["380501112233".to_string()]).await.unwrap();

        let reopened = ConfigStore::open(&path).await.unwrap();
        let config = reopened.snapshot().await;
        assert_eq!(config.phones, vec!["380501112233".to_string()]);
        let camera = config.camera(&CameraId::device(0)).unwrap();
        assert_eq!(camera.name, "Gate");
        assert!(camera.alert_classes.contains("tank"));
        assert_eq!(camera.display_classes.len(), 2);

        let pipeline = reopened.pipeline_config(&CameraId::device(0)).await.unwrap();
        assert_eq!(pipeline.recipients, vec!["380501112233".to_string()]);
        assert_eq!(reopened.pipeline_configs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_cameras() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).await.unwrap();

        store
            .add_camera(CameraConfig::new(CameraId::device(1), "Yard"))
            .await
            .unwrap();
        assert!(matches!(
            store.add_camera(CameraConfig::new(CameraId::device(1), "Again")).await,
            Err(WorkerError::CameraExists(_))
        ));
        assert!(matches!(
            store.remove_camera(&CameraId::device(9)).await,
            Err(WorkerError::CameraNotFound(_))
        ));

        let removed = store.remove_camera(&CameraId::device(1)).await.unwrap();
        assert_eq!(removed.name, "Yard");
        assert!(store.snapshot().await.cameras.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_class_rejected_and_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).await.unwrap();
        store
            .add_camera(CameraConfig::new(CameraId::device(0), "Gate"))
            .await
            .unwrap();

        let result = store
            .set_classes(&CameraId::device(0), ClassSelection::new(["spaceship"], ["tank"]))
            .await;
        assert!(matches!(result, Err(WorkerError::UnknownClass(_))));
        assert!(store.snapshot().await.cameras[0].display_classes.is_empty());
    }

    #[tokio::test]
    async fn test_classes_validate_against_configured_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.detection.class_names = vec!["drone".to_string(), "person".to_string()];
        let mut camera = CameraConfig::new(CameraId::device(0), "Roof");
        camera.alert_classes.insert("drone".to_string());
        config.cameras.push(camera);
        tokio::fs::write(&path, serde_json::to_vec(&config).unwrap())
            .await
            .unwrap();

        let store = ConfigStore::open(&path).await.unwrap();
        assert_eq!(store.class_names().await, vec!["drone", "person"]);

        store
            .set_classes(&CameraId::device(0), ClassSelection::new(["person"], ["drone"]))
            .await
            .unwrap();
        let result = store
            .set_classes(&CameraId::device(0), ClassSelection::new(["tank"], ["drone"]))
            .await;
        assert!(matches!(result, Err(WorkerError::UnknownClass(_))));
    }

    #[tokio::test]
    async fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(matches!(
            ConfigStore::open(&path).await,
            Err(WorkerError::ConfigError(_))
        ));
    }
}
