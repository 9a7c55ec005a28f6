use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use regforms::services::{
    HttpSubmissionService, HttpSubmissionServiceConfig, SimulatedSubmissionService,
    SubmissionService,
};
use regforms::{FormDefinition, FormRegistry};
use serde_derive::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub submission: SubmissionConfiguration,

    #[serde(default)]
    pub forms: Vec<FormDefinition>,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Configuration> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Built-in forms, with configured forms added or replacing them by id.
    pub fn registry(&self) -> Result<FormRegistry> {
        let mut registry = FormRegistry::with_builtin_forms()?;
        for form in &self.forms {
            if registry.replace(form.clone())?.is_some() {
                tracing::info!(form = %form.id, "built-in form overridden by configuration");
            }
        }
        Ok(registry)
    }

    pub fn submission_service(&self) -> Result<Box<dyn SubmissionService>> {
        match &self.submission.endpoint {
            Some(endpoint) => Ok(Box::new(HttpSubmissionService::new(endpoint.clone().into())?)),
            None => Ok(Box::new(SimulatedSubmissionService::new(Duration::from_millis(
                self.submission.simulated_delay_ms,
            )))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmissionConfiguration {
    pub endpoint: Option<EndpointConfiguration>,

    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
}

impl Default for SubmissionConfiguration {
    fn default() -> Self {
        Self {
            endpoint: None,
            simulated_delay_ms: default_simulated_delay_ms(),
        }
    }
}

fn default_simulated_delay_ms() -> u64 {
    SimulatedSubmissionService::DEFAULT_DELAY.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfiguration {
    pub baseurl: String,
    pub token: Option<String>,
}

impl From<EndpointConfiguration> for HttpSubmissionServiceConfig {
    fn from(config: EndpointConfiguration) -> Self {
        Self {
            baseurl: config.baseurl,
            token: config.token,
        }
    }
}
