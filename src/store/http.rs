use super::Reader;
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use url::Url;

/// Read-only store rooted at a base URL, e.g. `https://data.whosonfirst.org`.
pub struct HttpReader {
    base: Url,
    client: reqwest::Client,
}

impl HttpReader {
    pub fn new(base_uri: &str) -> Result<Self> {
        let with_slash = if base_uri.ends_with('/') {
            base_uri.to_string()
        } else {
            format!("{}/", base_uri)
        };

        let base = Url::parse(&with_slash).map_err(|source| GeoError::InvalidUri {
            uri: base_uri.to_string(),
            source,
        })?;

        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|source| GeoError::Http {
                url: base_uri.to_string(),
                source,
            })?;

        Ok(Self { base, client })
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|source| GeoError::InvalidUri {
                uri: path.to_string(),
                source,
            })
    }
}

#[async_trait]
impl Reader for HttpReader {
    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.url_for(path)?;

        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|source| GeoError::Http {
                url: url.to_string(),
                source,
            })?;

        Ok(response.status().is_success())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let url = self.url_for(path)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| GeoError::Http {
                url: url.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GeoError::NotFound(url.to_string())),
            status if !status.is_success() => Err(GeoError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            _ => response.bytes().await.map_err(|source| GeoError::Http {
                url: url.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let reader = HttpReader::new("https://data.whosonfirst.org").unwrap();

        assert_eq!(
            reader.url_for("101/736/545/101736545.geojson").unwrap().as_str(),
            "https://data.whosonfirst.org/101/736/545/101736545.geojson"
        );
    }
}
