//! Writer that commits each record through the GitHub contents API.
//!
//! `githubapi://{owner}/{repo}?access_token={token}&branch={branch}&prefix=data&new={msg}&update={msg}`
//!
//! A `%s` in the `new` / `update` commit messages is replaced with the path being written.

use super::Writer;
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("depiction-geo/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GithubApiWriter {
    owner: String,
    repo: String,
    branch: String,
    prefix: String,
    access_token: String,
    new_message: String,
    update_message: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

impl GithubApiWriter {
    pub fn new(writer_uri: &str) -> Result<Self> {
        let parsed = Url::parse(writer_uri).map_err(|source| GeoError::InvalidUri {
            uri: writer_uri.to_string(),
            source,
        })?;

        let owner = parsed.host_str().unwrap_or_default().to_string();
        let repo = parsed.path().trim_matches('/').to_string();

        if owner.is_empty() || repo.is_empty() {
            return Err(GeoError::UnsupportedScheme(format!(
                "{} (expected githubapi://owner/repo)",
                writer_uri
            )));
        }

        let mut writer = Self {
            owner,
            repo,
            branch: String::from("main"),
            prefix: String::from("data"),
            access_token: String::new(),
            new_message: String::from("Created %s"),
            update_message: String::from("Updated %s"),
            client: reqwest::Client::new(),
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "branch" => writer.branch = value.into_owned(),
                "prefix" => writer.prefix = value.trim_matches('/').to_string(),
                "access_token" => writer.access_token = value.into_owned(),
                "new" => writer.new_message = value.into_owned(),
                "update" => writer.update_message = value.into_owned(),
                _ => {}
            }
        }

        Ok(writer)
    }

    fn repo_path(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');

        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    fn contents_url(&self, repo_path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            API_ROOT, self.owner, self.repo, repo_path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT);

        if self.access_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.access_token)
        }
    }

    async fn current_sha(&self, repo_path: &str) -> Result<Option<String>> {
        let url = self.contents_url(repo_path);

        let response = self
            .request(reqwest::Method::GET, &url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|source| GeoError::Http {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(GeoError::HttpStatus {
                url,
                status: status.as_u16(),
            }),
            _ => {
                let contents: ContentsResponse = response
                    .json()
                    .await
                    .map_err(|source| GeoError::Http { url, source })?;
                Ok(Some(contents.sha))
            }
        }
    }
}

#[async_trait]
impl Writer for GithubApiWriter {
    async fn write(&self, path: &str, body: Bytes) -> Result<()> {
        let repo_path = self.repo_path(path);
        let sha = self.current_sha(&repo_path).await?;

        let template = match sha {
            Some(_) => &self.update_message,
            None => &self.new_message,
        };

        let payload = PutContents {
            message: template.replace("%s", &repo_path),
            content: STANDARD.encode(&body),
            branch: &self.branch,
            sha,
        };

        let url = self.contents_url(&repo_path);

        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| GeoError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(GeoError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        info!(
            "Committed {} to {}/{}#{}",
            repo_path, self.owner, self.repo, self.branch
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_writer_uri() {
        let writer = GithubApiWriter::new(
            "githubapi://sfomuseum-data/sfomuseum-data-media-collection?branch=georef&access_token=s33kret&new=%5Bbob%5D+update+georeference+data+for+%25s",
        )
        .unwrap();

        assert_eq!(writer.owner, "sfomuseum-data");
        assert_eq!(writer.repo, "sfomuseum-data-media-collection");
        assert_eq!(writer.branch, "georef");
        assert_eq!(writer.access_token, "s33kret");
        assert_eq!(writer.new_message, "[bob] update georeference data for %s");
        assert_eq!(writer.update_message, "Updated %s");
        assert_eq!(
            writer.repo_path("151/194/928/9/1511949289.geojson"),
            "data/151/194/928/9/1511949289.geojson"
        );
    }

    #[test]
    fn test_missing_repo() {
        assert!(GithubApiWriter::new("githubapi://sfomuseum-data").is_err());
    }
}
