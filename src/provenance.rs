//! Commit message and pull request annotations for writers backed by GitHub.

use crate::error::{GeoError, Result};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Georeference,
    Geotag,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Georeference => write!(f, "georeference"),
            Action::Geotag => write!(f, "geotag"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateWriterUriOptions {
    pub id: i64,
    pub author: String,
    pub action: Action,
}

fn set_query(url: &mut Url, pairs: &[(&str, String)]) {
    let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !keys.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();

    for (k, v) in &kept {
        query.append_pair(k, v);
    }

    for (k, v) in pairs {
        query.append_pair(k, v);
    }
}

/// Rewrites `githubapi://` and `githubapi-pr://` writer URIs so that commits and pull requests
/// say who changed what. Every other scheme is returned unchanged.
pub fn update_writer_uri(opts: &UpdateWriterUriOptions, writer_uri: &str) -> Result<String> {
    let scheme = writer_uri.split_once("://").map(|(s, _)| s);

    if !matches!(scheme, Some("githubapi") | Some("githubapi-pr")) {
        return Ok(writer_uri.to_string());
    }

    let mut parsed = Url::parse(writer_uri).map_err(|source| GeoError::InvalidUri {
        uri: writer_uri.to_string(),
        source,
    })?;

    match parsed.scheme() {
        "githubapi" => {
            let message = format!("[{}] update {} data for %s", opts.author, opts.action);
            set_query(
                &mut parsed,
                &[("new", message.clone()), ("update", message)],
            );
        }
        "githubapi-pr" => {
            let title = format!(
                "[{}] update {} data for {}",
                opts.author, opts.action, opts.id
            );

            let branch = match opts.action {
                Action::Georeference => format!(
                    "{}-{}-{}-{}",
                    opts.author,
                    crate::unix_timestamp(),
                    opts.action,
                    opts.id
                ),
                Action::Geotag => format!("{}-{}-{}", opts.author, opts.action, opts.id),
            };

            set_query(
                &mut parsed,
                &[
                    ("pr-branch", branch),
                    ("pr-title", title.clone()),
                    ("pr-description", title),
                ],
            );
        }
        _ => {}
    }

    Ok(parsed.to_string())
}
