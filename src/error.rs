use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionerError>;

#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("The source path '{}' does not exist.", .0.display())]
    SourcePathMissing(PathBuf),
    #[error("Instances missing from the 'platform' section of molecule.yml.")]
    MissingPlatforms,
    #[error("Key '{0}' is not present in the environment mapping")]
    MissingEnvKey(String),
    #[error("Idempotence test failed because of the following tasks:\n{}", .0.join("\n"))]
    NotIdempotent(Vec<String>),
    #[error("Ansible return code was {code}, command was: {command}")]
    PlaybookFailed { code: i32, command: String },
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML in '{}': {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("YAML serialization failed: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("Template rendering failed: {0}")]
    Template(#[from] tera::Error),
}

impl ProvisionerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process status the command line layer exits with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionerError::PlaybookFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
