use std::path::Path;

use figment::{
    providers::{Format, Json, Yaml},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};

/// A provider whose data has already been read and parsed.
///
/// Files are read eagerly so that a missing or malformed file surfaces when it is added to the loader rather than when
/// configuration is first queried.
pub struct ResolvedProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl ResolvedProvider {
    pub fn from_file<F, P>(path: P, source_name: &'static str) -> Result<Self, Error>
    where
        F: Format,
        P: AsRef<Path>,
    {
        let file_data = std::fs::read_to_string(path.as_ref()).map_err(|e| e.to_string())?;
        let data = F::string(&file_data).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from(source_name, path.as_ref()),
        })
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_file::<Yaml, _>(path, "YAML file")
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_file::<Json, _>(path, "JSON file")
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, Error> {
        Ok(Self {
            data: Yaml::string(contents).data()?,
            metadata: Metadata::named("YAML string"),
        })
    }
}

impl Provider for ResolvedProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}
