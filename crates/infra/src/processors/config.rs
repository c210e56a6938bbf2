//! Per-tenant processor configuration: external records, the validated tagged
//! union, and the hot-swappable store holding them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use relay_core::TenantId;
use relay_events::{ProcessorError, ProcessorResult};

use crate::config::ConfigError;

pub const PARAM_TOPIC: &str = "topic";
pub const PARAM_CONFIG_PATH: &str = "config_path";
pub const PARAM_URL: &str = "url";
pub const PARAM_TYPE_NAME: &str = "type_name";
pub const PARAM_BEAN_NAME: &str = "bean_name";

/// The closed set of processor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorKind {
    Queue,
    Webhook,
    CustomClass,
    CustomBean,
}

impl ProcessorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::Queue => "QUEUE",
            ProcessorKind::Webhook => "WEBHOOK",
            ProcessorKind::CustomClass => "CUSTOM_CLASS",
            ProcessorKind::CustomBean => "CUSTOM_BEAN",
        }
    }
}

impl core::fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorKind {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUE" => Ok(ProcessorKind::Queue),
            "WEBHOOK" => Ok(ProcessorKind::Webhook),
            "CUSTOM_CLASS" => Ok(ProcessorKind::CustomClass),
            "CUSTOM_BEAN" => Ok(ProcessorKind::CustomBean),
            _ => Err(ProcessorError::UnsupportedProcessorType(s.to_string())),
        }
    }
}

/// A processor configuration as it arrives from outside (file or management API).
///
/// Unvalidated: convert with [`ProcessorConfig::try_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRecord {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ProcessorRecord {
    pub fn new(tenant: impl Into<String>, kind: ProcessorKind) -> Self {
        Self {
            tenant: tenant.into(),
            kind: Some(kind.as_str().to_string()),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Kind-specific, validated processor parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorSpec {
    /// Publish to `topic` using the connection settings stored at `config_path`.
    Queue { topic: String, config_path: PathBuf },
    /// POST to an absolute http(s) URL.
    Webhook { url: Url },
    /// Instantiate the handler registered under `type_name`.
    CustomClass { type_name: String },
    /// Look up the component registered under `bean_name`.
    CustomBean { bean_name: String },
}

impl ProcessorSpec {
    pub fn kind(&self) -> ProcessorKind {
        match self {
            ProcessorSpec::Queue { .. } => ProcessorKind::Queue,
            ProcessorSpec::Webhook { .. } => ProcessorKind::Webhook,
            ProcessorSpec::CustomClass { .. } => ProcessorKind::CustomClass,
            ProcessorSpec::CustomBean { .. } => ProcessorKind::CustomBean,
        }
    }

    fn parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        match self {
            ProcessorSpec::Queue { topic, config_path } => {
                params.insert(PARAM_TOPIC.to_string(), topic.clone());
                params.insert(
                    PARAM_CONFIG_PATH.to_string(),
                    config_path.display().to_string(),
                );
            }
            ProcessorSpec::Webhook { url } => {
                params.insert(PARAM_URL.to_string(), url.to_string());
            }
            ProcessorSpec::CustomClass { type_name } => {
                params.insert(PARAM_TYPE_NAME.to_string(), type_name.clone());
            }
            ProcessorSpec::CustomBean { bean_name } => {
                params.insert(PARAM_BEAN_NAME.to_string(), bean_name.clone());
            }
        }
        params
    }
}

/// A validated processor configuration for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    tenant: TenantId,
    spec: ProcessorSpec,
}

impl ProcessorConfig {
    pub fn new(tenant: TenantId, spec: ProcessorSpec) -> Self {
        Self { tenant, spec }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn spec(&self) -> &ProcessorSpec {
        &self.spec
    }

    pub fn kind(&self) -> ProcessorKind {
        self.spec.kind()
    }

    pub fn to_record(&self) -> ProcessorRecord {
        ProcessorRecord {
            tenant: self.tenant.to_string(),
            kind: Some(self.kind().as_str().to_string()),
            parameters: self.spec.parameters(),
        }
    }
}

impl TryFrom<ProcessorRecord> for ProcessorConfig {
    type Error = ProcessorError;

    fn try_from(record: ProcessorRecord) -> Result<Self, Self::Error> {
        let tenant = TenantId::parse(&record.tenant)
            .map_err(|_| ProcessorError::validation("null or empty tenant"))?;

        let kind: ProcessorKind = match record.kind.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ProcessorError::validation(format!(
                    "null processor type for tenant: {tenant}"
                )));
            }
            Some(kind) => kind.parse()?,
        };

        let params = &record.parameters;
        let spec = match kind {
            ProcessorKind::Queue => ProcessorSpec::Queue {
                topic: required(params, PARAM_TOPIC, kind, &tenant)?,
                config_path: PathBuf::from(required(params, PARAM_CONFIG_PATH, kind, &tenant)?),
            },
            ProcessorKind::Webhook => ProcessorSpec::Webhook {
                url: webhook_url(&required(params, PARAM_URL, kind, &tenant)?, &tenant)?,
            },
            ProcessorKind::CustomClass => ProcessorSpec::CustomClass {
                type_name: required(params, PARAM_TYPE_NAME, kind, &tenant)?,
            },
            ProcessorKind::CustomBean => ProcessorSpec::CustomBean {
                bean_name: required(params, PARAM_BEAN_NAME, kind, &tenant)?,
            },
        };

        Ok(Self { tenant, spec })
    }
}

fn required(
    params: &BTreeMap<String, String>,
    key: &str,
    kind: ProcessorKind,
    tenant: &TenantId,
) -> ProcessorResult<String> {
    match params.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ProcessorError::validation(format!(
            "{kind} processor for tenant {tenant} requires parameter '{key}'"
        ))),
    }
}

fn webhook_url(raw: &str, tenant: &TenantId) -> ProcessorResult<Url> {
    let url = Url::parse(raw).map_err(|e| {
        ProcessorError::validation(format!("invalid webhook url for tenant {tenant}: {e}"))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProcessorError::validation(format!(
            "webhook url for tenant {tenant} must be http(s), got scheme '{other}'"
        ))),
    }
}

/// Tenant → processor configuration, safe to read and replace concurrently.
#[derive(Debug, Default)]
pub struct ProcessorConfigStore {
    configs: RwLock<HashMap<TenantId, Arc<ProcessorConfig>>>,
}

impl ProcessorConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an ordered sequence of records.
    ///
    /// Fails on the first malformed record, or if two records name the same tenant.
    pub fn load<I>(records: I) -> ProcessorResult<Self>
    where
        I: IntoIterator<Item = ProcessorRecord>,
    {
        let mut configs = HashMap::new();
        for record in records {
            let config = ProcessorConfig::try_from(record)?;
            let tenant = config.tenant().clone();
            if configs.insert(tenant.clone(), Arc::new(config)).is_some() {
                return Err(ProcessorError::validation(format!(
                    "duplicate processor config for tenant: {tenant}"
                )));
            }
        }

        info!(tenants = configs.len(), "processor configs loaded");
        Ok(Self {
            configs: RwLock::new(configs),
        })
    }

    /// Parse a JSON array of records and load them.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let records: Vec<ProcessorRecord> = serde_json::from_str(json)?;
        Ok(Self::load(records)?)
    }

    /// Read a JSON array of records from `path` and load them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "reading processor configs");
        Self::from_json_str(&raw)
    }

    /// Replace (or insert) the tenant's config, returning the previous one.
    pub fn register(&self, config: ProcessorConfig) -> Option<Arc<ProcessorConfig>> {
        let tenant = config.tenant().clone();
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant, Arc::new(config))
    }

    pub fn get(&self, tenant: &TenantId) -> ProcessorResult<Arc<ProcessorConfig>> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tenant)
            .cloned()
            .ok_or_else(|| ProcessorError::ConfigNotFound(tenant.clone()))
    }

    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(tenant)
    }

    /// Configured tenants, sorted.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tenants.sort();
        tenants
    }

    /// Current configs, sorted by tenant.
    pub fn configs(&self) -> Vec<Arc<ProcessorConfig>> {
        let mut configs: Vec<Arc<ProcessorConfig>> = self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.tenant().cmp(b.tenant()));
        configs
    }

    pub fn len(&self) -> usize {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
