//! Machine configuration.
//!
//! Set once by the caller and never mutated afterwards; commands only read it.

use std::fmt;
use std::path::Path;

use dmachine_shared::errors::{MachineError, MachineResult};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default executable used to manage the machine.
pub const DEFAULT_TOOL: &str = "docker-machine";

/// A single `--flag [value]` pair forwarded verbatim to `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOption {
    pub flag: String,
    /// `None` or an empty string means the flag is passed without a value.
    pub value: Option<String>,
}

impl CreateOption {
    pub fn new(flag: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            flag: flag.into(),
            value: value.map(Into::into),
        }
    }

    /// Value to pass after the flag, if any.
    pub fn argument(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    /// Parse `key=value` or a bare `key` as given on the command line.
    pub fn parse(raw: &str) -> MachineResult<Self> {
        let (flag, value) = match raw.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (raw, None),
        };
        let flag = flag.trim_start_matches("--");
        if flag.is_empty() {
            return Err(MachineError::InvalidConfig(format!(
                "create option '{}' has no flag name",
                raw
            )));
        }
        Ok(Self::new(flag, value))
    }
}

impl fmt::Display for CreateOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(value) => write!(f, "{}={}", self.flag, value),
            None => write!(f, "{}", self.flag),
        }
    }
}

/// Static machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    /// Machine name passed to every tool invocation.
    pub name: String,
    /// Create the machine when the status query reports it missing.
    #[serde(default)]
    pub auto_create: bool,
    /// Flags for `create`, in insertion order.
    #[serde(
        default,
        serialize_with = "serialize_create_options",
        deserialize_with = "deserialize_create_options"
    )]
    pub create_options: Vec<CreateOption>,
    /// Executable to run.
    #[serde(default = "default_tool")]
    pub tool: String,
    /// Query status again after create/start instead of assuming `Running`.
    #[serde(default)]
    pub verify_after_start: bool,
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

impl MachineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_create: false,
            create_options: Vec::new(),
            tool: default_tool(),
            verify_after_start: false,
        }
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Append a create option. A repeated flag is appended again, not merged.
    pub fn with_create_option(
        mut self,
        flag: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        self.create_options.push(CreateOption::new(flag, value));
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_verify_after_start(mut self, verify: bool) -> Self {
        self.verify_after_start = verify;
        self
    }

    /// Parse a JSON document, keeping `createOptions` in document order.
    pub fn from_json_str(json: &str) -> MachineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MachineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MachineResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MachineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> MachineResult<()> {
        if self.name.trim().is_empty() {
            return Err(MachineError::InvalidConfig(
                "machine name must not be empty".into(),
            ));
        }
        if self.tool.trim().is_empty() {
            return Err(MachineError::InvalidConfig("tool must not be empty".into()));
        }
        Ok(())
    }

    /// Human-readable rendering of the create options for progress logs.
    pub fn describe_create_options(&self) -> String {
        let rendered: Vec<String> = self.create_options.iter().map(|o| o.to_string()).collect();
        format!("[{}]", rendered.join(", "))
    }
}

fn serialize_create_options<S>(options: &[CreateOption], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(options.len()))?;
    for option in options {
        map.serialize_entry(&option.flag, &option.value)?;
    }
    map.end()
}

// Visits the JSON object directly so entries come out in document order.
fn deserialize_create_options<'de, D>(deserializer: D) -> Result<Vec<CreateOption>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedOptions;

    impl<'de> Visitor<'de> for OrderedOptions {
        type Value = Vec<CreateOption>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of create flags to optional string values")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut options = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((flag, value)) = access.next_entry::<String, Option<String>>()? {
                options.push(CreateOption { flag, value });
            }
            Ok(options)
        }
    }

    deserializer.deserialize_any(OrderedOptions)
}
