//! Store locations and defaults, from flags or `GEO_*` environment variables.

use crate::error::{GeoError, Result};
use crate::georeference::{AssignReferencesOptions, RecompileOptions, RecompileSubjectsOptions};
use crate::geotag::GeotagOptions;
use crate::store::{self, DefaultWriterFactory, Reader, ThrottledReader, WriterFactory};
use std::sync::Arc;
use url::Url;

#[derive(clap::Args, Debug, Clone)]
pub struct GeoConfig {
    #[arg(
        long,
        env = "GEO_DEPICTION_READER_URI",
        default_value = "repo:///usr/local/data/sfomuseum-data-media-collection"
    )]
    pub depiction_reader_uri: String,

    #[arg(
        long,
        env = "GEO_DEPICTION_WRITER_URI",
        default_value = "repo:///usr/local/data/sfomuseum-data-media-collection"
    )]
    pub depiction_writer_uri: String,

    #[arg(
        long,
        env = "GEO_SUBJECT_READER_URI",
        default_value = "repo:///usr/local/data/sfomuseum-data-collection"
    )]
    pub subject_reader_uri: String,

    #[arg(
        long,
        env = "GEO_SUBJECT_WRITER_URI",
        default_value = "repo:///usr/local/data/sfomuseum-data-collection"
    )]
    pub subject_writer_uri: String,

    /// Places being referenced, and the default geometry record.
    #[arg(
        long,
        env = "GEO_WHOSONFIRST_READER_URI",
        default_value = "repo:///usr/local/data/sfomuseum-data-whosonfirst"
    )]
    pub whosonfirst_reader_uri: String,

    /// Who is making the change. Shows up in GitHub commit messages.
    #[arg(long, env = "GEO_AUTHOR", default_value = "juniper")]
    pub author: String,

    /// Record whose centroid is used when nothing else supplies a geometry.
    #[arg(long, env = "GEO_DEFAULT_GEOMETRY_ID")]
    pub default_geometry_id: Option<i64>,

    #[arg(long, env = "GEO_SRC_GEOM_SUFFIX")]
    pub src_geom_suffix: Option<String>,

    /// Added to `githubapi://` writer URIs that don't carry their own token.
    #[arg(long, env = "GEO_GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    pub github_access_token: Option<String>,

    #[arg(long, env = "GEO_MAX_CONCURRENT", default_value_t = 32)]
    pub max_concurrent: usize,

    #[arg(short, long, env = "GEO_VERBOSE")]
    pub verbose: bool,
}

/// Sets `access_token` on GitHub writer URIs that don't already have one.
pub fn ensure_access_token(writer_uri: &str, token: Option<&str>) -> Result<String> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(writer_uri.to_string()),
    };

    if !(writer_uri.starts_with("githubapi://") || writer_uri.starts_with("githubapi-pr://")) {
        return Ok(writer_uri.to_string());
    }

    let mut parsed = Url::parse(writer_uri).map_err(|source| GeoError::InvalidUri {
        uri: writer_uri.to_string(),
        source,
    })?;

    if parsed.query_pairs().any(|(k, v)| k == "access_token" && !v.is_empty()) {
        return Ok(writer_uri.to_string());
    }

    parsed.query_pairs_mut().append_pair("access_token", token);
    Ok(parsed.to_string())
}

impl GeoConfig {
    fn reader(&self, uri: &str) -> Result<Arc<dyn Reader>> {
        Ok(Arc::new(ThrottledReader::new(
            store::new_reader(uri)?,
            self.max_concurrent,
        )))
    }

    fn writer_uri(&self, uri: &str) -> Result<String> {
        ensure_access_token(uri, self.github_access_token.as_deref())
    }

    fn writer_factory(&self) -> Arc<dyn WriterFactory> {
        Arc::new(DefaultWriterFactory)
    }

    pub fn assign_options(&self) -> Result<AssignReferencesOptions> {
        Ok(AssignReferencesOptions {
            depiction_reader: self.reader(&self.depiction_reader_uri)?,
            subject_reader: self.reader(&self.subject_reader_uri)?,
            whosonfirst_reader: self.reader(&self.whosonfirst_reader_uri)?,
            depiction_writer_uri: self.writer_uri(&self.depiction_writer_uri)?,
            subject_writer_uri: self.writer_uri(&self.subject_writer_uri)?,
            writer_factory: self.writer_factory(),
            author: self.author.clone(),
            source_geom_suffix: self.src_geom_suffix.clone(),
            default_geometry_id: self.default_geometry_id,
        })
    }

    pub fn recompile_options(&self) -> Result<RecompileOptions> {
        Ok(RecompileOptions {
            depiction_reader: self.reader(&self.depiction_reader_uri)?,
            whosonfirst_reader: self.reader(&self.whosonfirst_reader_uri)?,
            default_geometry_id: self.default_geometry_id,
        })
    }

    pub fn recompile_subjects_options(&self) -> Result<RecompileSubjectsOptions> {
        Ok(RecompileSubjectsOptions {
            recompile: self.recompile_options()?,
            subject_reader: self.reader(&self.subject_reader_uri)?,
            subject_writer_uri: self.writer_uri(&self.subject_writer_uri)?,
            writer_factory: self.writer_factory(),
        })
    }

    pub fn geotag_options(&self) -> Result<GeotagOptions> {
        Ok(GeotagOptions {
            depiction_reader: self.reader(&self.depiction_reader_uri)?,
            subject_reader: self.reader(&self.subject_reader_uri)?,
            whosonfirst_reader: self.reader(&self.whosonfirst_reader_uri)?,
            depiction_writer_uri: self.writer_uri(&self.depiction_writer_uri)?,
            subject_writer_uri: self.writer_uri(&self.subject_writer_uri)?,
            writer_factory: self.writer_factory(),
            author: self.author.clone(),
            default_geometry_id: self.default_geometry_id,
        })
    }
}
