//! Context filtering.
use std::{borrow::Cow, collections::HashMap};

use cirrus_event::{measurement::Tag, MeasurementType, MetricsContext, ParseMeasurementTypeError};
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

/// Filter error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum FilterError {
    /// A configured measurement type is not recognized.
    #[snafu(display("Invalid measurement type in filter."))]
    InvalidMeasurementType {
        /// Error source.
        source: ParseMeasurementTypeError,
    },
}

/// Context filter configuration.
///
/// Every criterion is optional. Criteria that are left empty allow everything through, so the default configuration
/// allows every measurement in every context.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FilterConfiguration {
    /// Names of the contexts to report.
    ///
    /// When empty, all contexts are reported.
    #[serde(default)]
    pub contexts: Vec<String>,

    /// Measurement types to report, such as `counter` or `timer`.
    ///
    /// When empty, all measurement types are reported.
    #[serde(default)]
    pub types: Vec<String>,

    /// Prefix a measurement name must start with to be reported.
    #[serde(default)]
    pub name_prefix: String,

    /// Measurement names that are never reported.
    #[serde(default)]
    pub name_blocklist: Vec<String>,

    /// Whether entries in `name_blocklist` match as prefixes instead of exact names.
    #[serde(default)]
    pub name_blocklist_match_prefix: bool,

    /// Tags a measurement must carry to be reported, as `key:value` or a bare `key`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Display names to report contexts under, keyed by the original context name.
    #[serde(default)]
    pub context_renames: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Blocklist {
    data: Vec<String>,
    match_prefix: bool,
}

impl Blocklist {
    fn new(data: &[String], match_prefix: bool) -> Self {
        let mut data = data.to_owned();
        data.sort();
        data.dedup();

        // With prefix matching, an entry already covered by a shorter entry is redundant.
        if match_prefix && !data.is_empty() {
            let mut i = 0;
            for j in 1..data.len() {
                if !data[j].starts_with(&data[i]) {
                    i += 1;
                    data.swap(i, j);
                }
            }
            data.truncate(i + 1);
        }

        Blocklist { data, match_prefix }
    }

    fn contains(&self, name: &str) -> bool {
        if self.data.is_empty() {
            return false;
        }

        match self.data.binary_search_by(|k| k.as_str().cmp(name)) {
            Ok(_) => true,
            Err(index) => self.match_prefix && index > 0 && name.starts_with(&self.data[index - 1]),
        }
    }
}

/// Context filter.
///
/// Narrows a [`MetricsContext`] down to the measurements that should be reported, and optionally renames it. The filter
/// is built once and holds no state between applications: applying it never mutates the source context.
#[derive(Debug, Default)]
pub struct MetricsFilter {
    contexts: Vec<String>,
    types: MeasurementType,
    name_prefix: String,
    blocklist: Blocklist,
    required_tags: Vec<Tag>,
    context_renames: HashMap<String, String>,
}

impl MetricsFilter {
    /// Creates a filter that reports everything unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `MetricsFilter` from the given configuration.
    ///
    /// # Errors
    ///
    /// If a configured measurement type is not recognized, an error is returned.
    pub fn from_configuration(config: &FilterConfiguration) -> Result<Self, FilterError> {
        let types = if config.types.is_empty() {
            MeasurementType::all_bits()
        } else {
            config.types.iter().try_fold(MeasurementType::none(), |acc, raw| {
                raw.parse::<MeasurementType>()
                    .map(|ty| acc | ty)
                    .context(InvalidMeasurementType)
            })?
        };

        Ok(Self {
            contexts: config.contexts.clone(),
            types,
            name_prefix: config.name_prefix.clone(),
            blocklist: Blocklist::new(&config.name_blocklist, config.name_blocklist_match_prefix),
            required_tags: config.tags.iter().map(|raw| Tag::from(raw.as_str())).collect(),
            context_renames: config.context_renames.clone(),
        })
    }

    /// Only reports contexts with the given name. May be called multiple times.
    pub fn allow_context(mut self, name: impl Into<String>) -> Self {
        self.contexts.push(name.into());
        self
    }

    /// Only reports measurements of the given types.
    pub fn with_types(mut self, types: MeasurementType) -> Self {
        self.types = types;
        self
    }

    /// Only reports measurements whose name starts with `prefix`.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Never reports measurements whose name is in `names`, or starts with one of them if `match_prefix` is set.
    pub fn with_name_blocklist(mut self, names: &[String], match_prefix: bool) -> Self {
        self.blocklist = Blocklist::new(names, match_prefix);
        self
    }

    /// Only reports measurements carrying the given tag. May be called multiple times.
    pub fn require_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.required_tags.push(tag.into());
        self
    }

    /// Reports the context named `from` under the name `to`.
    pub fn rename_context(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.context_renames.insert(from.into(), to.into());
        self
    }

    fn filters_measurements(&self) -> bool {
        self.types != MeasurementType::all_bits()
            || !self.name_prefix.is_empty()
            || !self.blocklist.data.is_empty()
            || !self.required_tags.is_empty()
    }

    fn keep(&self, ty: MeasurementType, name: &str, tags: &[Tag]) -> bool {
        if !self.types.contains(ty) || !name.starts_with(&self.name_prefix) {
            return false;
        }

        if self.blocklist.contains(name) {
            debug!(measurement = name, "Measurement excluded due to blocklist.");
            return false;
        }

        self.required_tags.iter().all(|required| tags.contains(required))
    }

    /// Applies the filter to a context.
    ///
    /// Returns `None` if the context is excluded entirely. If the filter neither removes measurements from nor renames
    /// the context, the context is returned as-is; otherwise, a reduced copy is returned.
    pub fn apply<'a>(&self, context: &'a MetricsContext) -> Option<Cow<'a, MetricsContext>> {
        if !self.contexts.is_empty() && !self.contexts.iter().any(|name| name == context.name()) {
            return None;
        }

        let display_name = self.context_renames.get(context.name());
        if !self.filters_measurements() {
            return match display_name {
                Some(name) => Some(Cow::Owned(context.filtered(name.as_str(), |_, _, _| true))),
                None => Some(Cow::Borrowed(context)),
            };
        }

        let name = display_name.map(String::as_str).unwrap_or(context.name());
        Some(Cow::Owned(
            context.filtered(name, |ty, name, tags| self.keep(ty, name, tags)),
        ))
    }
}
