use super::BuildApi;
use crate::app::{BranchModule, Build, LogChunk, LogSize, ModuleState, RepoBuild};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use serde::de::DeserializeOwned;

/// `BuildApi` over the CI server's REST endpoints.
pub struct HttpBuildApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBuildApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(eyre!("GET {url} returned {status}"));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BuildApi for HttpBuildApi {
    async fn branch_history(&self, branch_id: u64) -> Result<Vec<RepoBuild>> {
        self.get_json(&format!("/builds/history/branch/{branch_id}"))
            .await
    }

    async fn branch_modules(&self, branch_id: u64) -> Result<Vec<BranchModule>> {
        self.get_json(&format!("/branches/{branch_id}/modules")).await
    }

    async fn repo_build_module_builds(&self, repo_build_id: u64) -> Result<Vec<Build>> {
        self.get_json(&format!("/branches/builds/{repo_build_id}/modules"))
            .await
    }

    async fn branch_module_states(&self, branch_id: u64) -> Result<Vec<ModuleState>> {
        self.get_json(&format!("/branches/state/{branch_id}/modules"))
            .await
    }

    async fn module_build(&self, build_id: u64) -> Result<Build> {
        self.get_json(&format!("/modules/builds/{build_id}")).await
    }

    async fn log_size(&self, build_id: u64) -> Result<LogSize> {
        self.get_json(&format!("/builds/{build_id}/log/size")).await
    }

    async fn log_chunk(&self, build_id: u64, offset: u64, length: u64) -> Result<LogChunk> {
        self.get_json(&format!(
            "/builds/{build_id}/log?offset={offset}&length={length}"
        ))
        .await
    }
}
